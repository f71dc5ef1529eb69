//! # Snake Tuner
//!
//! Evolutionary tuning of the heuristic weights of a Battlesnake agent, by making
//! configurations of the same agent binary play against each other.
//!
//! It provides:
//! - the weight vector being tuned and its genetic operators ([`Heuristic`](crate::heuristic::Heuristic))
//! - agent servers launched as OS processes, one per candidate
//! - round-robin tournaments played through the external engine, with a bounded number of
//!   matches at the same time ([`Evaluator`](crate::evaluator::Evaluator))
//! - elitist, win-proportional selection ([`Population`](crate::population::Population))
//! - a JSON history of every generation that a run can be resumed from
//!   ([`History`](crate::checkpoint::History))
//!
//! Each generation, every candidate gets its own agent server on `base_port + index`. Every
//! pair of candidates then plays
//! [`matches_per_pair`](crate::configuration::Configuration::with_matches_per_pair) matches. The
//! winner of each match is read from the engine's stderr; a win is worth 1 and a draw 0.5
//! to each side. Candidates are ranked by their credit and the next population is derived
//! from the ranking.
//!
//! # Documentation Overview
//!
//! - For the generation loop and checkpointing, see [`Evolution`](crate::evolution::Evolution).
//! - For binaries, ports, parallelism and mutation parameters, see
//!   [`Configuration`](crate::configuration::Configuration).
//! - To plug other agents or engines, see the [`AgentLauncher`](crate::game_interface::AgentLauncher)
//!   and [`MatchEngine`](crate::game_interface::MatchEngine) traits.
//!
//! # Usage Example
//!
//! ```no_run
//! use snake_tuner::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Configuration::new()
//!         .with_agent_binary("../bamboozle_snake/target/release/bamboozle_snake")
//!         .with_max_parallel_matches(4)
//!         .with_checkpoint_path("generations.json");
//!
//!     let mut rng = rand::thread_rng();
//!     let mut heuristics = vec![Heuristic::default(); 2];
//!     heuristics.extend((0..8).map(|_| Heuristic::create_random(&mut rng)));
//!
//!     let mut evolution = Evolution::new(config, heuristics, None)?;
//!     evolution.run_until(50, |number, generation| {
//!         if let Some(best) = generation.best() {
//!             println!("generation {number}: {} wins with {}", best.wins, best.heuristic);
//!         }
//!     })?;
//!     Ok(())
//! }
//! ```

mod agent_server;
pub mod candidate;
pub mod checkpoint;
pub mod configuration;
pub mod evaluator;
pub mod evolution;
pub mod game_interface;
pub mod heuristic;
mod logger;
pub mod match_runner;
pub mod population;
mod process_output;
mod tournament_scheduler;
pub mod tournament_strategy;

pub use anyhow;
pub use logger::init_terminal_logger;

/// Commonly used types and traits for quick access.
///
/// ```rust
/// use snake_tuner::prelude::*;
/// ```
pub mod prelude {
    pub use crate::checkpoint::History;
    pub use crate::configuration::{Configuration, MutationSettings};
    pub use crate::evaluator::Evaluator;
    pub use crate::evolution::Evolution;
    pub use crate::game_interface::{AgentLauncher, AgentProcess, MatchEngine, Outcome, Participant};
    pub use crate::heuristic::{Feature, Heuristic};
    pub use crate::population::{Generation, Population, RankedHeuristic};
}
