//! Snake tuner CLI
//!
//! Commands:
//! - run: start a new evolution from the default heuristic and random ones
//! - resume: continue from the generation history checkpoint

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use snake_tuner::{init_terminal_logger, prelude::*};

#[derive(Parser)]
#[command(name = "snake-tuner")]
#[command(about = "Evolutionary tuning of snake agent heuristics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new evolution
    Run {
        /// Total number of generations to play
        #[arg(long, default_value = "100")]
        generations: usize,
        #[arg(long, default_value = "10")]
        population: usize,
        /// Heuristic to put in the first generation, as a JSON object (repeatable)
        #[arg(long = "heuristic")]
        heuristics: Vec<Heuristic>,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Continue the evolution stored in the checkpoint
    Resume {
        /// Number of generations to play on top of the stored ones
        #[arg(long, default_value = "100")]
        generations: usize,
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args)]
struct CommonArgs {
    #[arg(long, default_value = "../bamboozle_snake/target/release/bamboozle_snake")]
    agent_binary: PathBuf,
    #[arg(long, default_value = "bamboozle_snake")]
    engine_binary: PathBuf,
    #[arg(long, default_value = "8080")]
    base_port: u16,
    /// Per-move budget of the agents, in milliseconds
    #[arg(long, default_value = "400")]
    move_timeout: u64,
    #[arg(long, default_value = "1")]
    threads_per_game: usize,
    /// Maximum number of matches running at the same time
    #[arg(long, default_value = "7")]
    parallel: usize,
    #[arg(long, default_value = "2")]
    matches_per_pair: usize,
    #[arg(long, default_value = "royale")]
    mode: String,
    /// Open every match in the browser
    #[arg(long)]
    browser: bool,
    #[arg(long, default_value = "generations.json")]
    checkpoint: PathBuf,
    #[arg(long)]
    seed: Option<u64>,
    /// Write every trace to a timestamped log file instead of the terminal
    #[arg(long)]
    log: bool,
    /// Do not print match progress
    #[arg(long)]
    quiet: bool,
    /// Forward the agents' stderr to the logs
    #[arg(long)]
    debug_agent_stderr: bool,
}

impl CommonArgs {
    fn configuration(&self) -> Configuration {
        Configuration::new()
            .with_agent_binary(&self.agent_binary)
            .with_engine_binary(&self.engine_binary)
            .with_base_port(self.base_port)
            .with_move_timeout_ms(self.move_timeout)
            .with_threads_per_game(self.threads_per_game)
            .with_max_parallel_matches(self.parallel)
            .with_matches_per_pair(self.matches_per_pair)
            .with_game_mode(self.mode.clone())
            .with_browser(self.browser)
            .with_checkpoint_path(&self.checkpoint)
            .with_log(self.log)
            .with_verbose(!self.quiet)
            .with_debug_agent_stderr(self.debug_agent_stderr)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            generations,
            population,
            heuristics,
            common,
        } => {
            if !common.log {
                init_terminal_logger()?;
            }
            let heuristics = initial_heuristics(heuristics, population, common.seed);
            let mut evolution = Evolution::new(common.configuration(), heuristics, common.seed)?;
            evolution.run_until(generations, print_generation)?;
        }
        Commands::Resume {
            generations,
            common,
        } => {
            if !common.log {
                init_terminal_logger()?;
            }
            let mut evolution = Evolution::resume(common.configuration(), common.seed)?;
            let total = evolution.history().len() + generations;
            evolution.run_until(total, print_generation)?;
        }
    }
    Ok(())
}

/// The given heuristics, or two copies of the default one, completed with random ones.
fn initial_heuristics(mut heuristics: Vec<Heuristic>, population: usize, seed: Option<u64>) -> Vec<Heuristic> {
    let mut rng = match seed {
        // distinct stream from the one driving the evolution
        Some(seed) => ChaCha8Rng::seed_from_u64(seed.wrapping_add(1)),
        None => ChaCha8Rng::from_entropy(),
    };
    if heuristics.is_empty() {
        heuristics = vec![Heuristic::default(); 2];
    }
    while heuristics.len() < population {
        heuristics.push(Heuristic::create_random(&mut rng));
    }
    heuristics
}

fn print_generation(number: usize, generation: &Generation) {
    println!("Step {number}");
    for entry in generation.entries() {
        println!("{}: {}", entry.wins, entry.heuristic);
    }
}
