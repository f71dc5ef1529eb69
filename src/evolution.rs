//! The generation loop.
//!
//! An [`Evolution`] alternates tournaments and selection, appends every ranked
//! [`Generation`] to the [`History`] and checkpoints it right away. A run started with
//! [`Evolution::new`] begins from an explicit list of heuristics; [`Evolution::resume`]
//! picks up from the last generation of an existing checkpoint.

use anyhow::Context;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, instrument};

use crate::checkpoint::History;
use crate::configuration::Configuration;
use crate::evaluator::Evaluator;
use crate::heuristic::Heuristic;
use crate::logger::init_logger;
use crate::population::{Generation, Population};

pub struct Evolution {
    config: Configuration,
    evaluator: Evaluator,
    population: Population,
    history: History,
    rng: ChaCha8Rng,
}

impl Evolution {
    /// Fresh run whose first generation is made of `heuristics`.
    ///
    /// # Errors
    /// With fewer than two heuristics, or if the file logger cannot be installed.
    pub fn new(
        config: Configuration,
        heuristics: Vec<Heuristic>,
        seed: Option<u64>,
    ) -> anyhow::Result<Evolution> {
        Self::setup_logging(&config)?;
        let population = Population::new(heuristics, *config.mutation())?;
        info!(population = population.len(), "starting new run");

        Ok(Evolution {
            evaluator: Evaluator::new(&config),
            population,
            history: History::new(),
            rng: create_rng(seed),
            config,
        })
    }

    /// Continue the run checkpointed at [`Configuration::with_checkpoint_path`].
    ///
    /// The population is rebuilt from the wins recorded in the last generation.
    #[instrument(skip_all, fields(checkpoint = %config.checkpoint_path().display()))]
    pub fn resume(config: Configuration, seed: Option<u64>) -> anyhow::Result<Evolution> {
        Self::setup_logging(&config)?;
        let history = History::load(config.checkpoint_path())?;
        let mut rng = create_rng(seed);

        let last = history
            .last()
            .context("checkpoint holds no generation to resume from")?;
        info!(
            generations = history.len(),
            population = last.len(),
            "resuming run"
        );
        let population = Population::from_generation(last, *config.mutation(), &mut rng)?;

        Ok(Evolution {
            evaluator: Evaluator::new(&config),
            population,
            history,
            rng,
            config,
        })
    }

    fn setup_logging(config: &Configuration) -> anyhow::Result<()> {
        if config.log {
            init_logger()?;
        }
        Ok(())
    }

    /// Replace the evaluator, e.g. to play against in-memory agents.
    pub fn with_evaluator(mut self, evaluator: Evaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Play one generation, record it and checkpoint the history.
    #[instrument(skip(self), fields(generation = self.history.next_generation_number()))]
    pub fn step(&mut self) -> anyhow::Result<&Generation> {
        let number = self.history.next_generation_number();
        let ranked = self
            .population
            .step(&self.evaluator, &mut self.rng)
            .with_context(|| format!("generation {number} failed"))?;

        if let Some(best) = ranked.best() {
            info!(wins = best.wins, heuristic = %best.heuristic, "generation {number} done");
        }

        self.history.push(ranked);
        self.history.save(self.config.checkpoint_path())?;
        self.history
            .last()
            .context("history is empty right after a push")
    }

    /// Run generations until the history holds `total` of them, reporting each one.
    pub fn run_until<F>(&mut self, total: usize, mut on_generation: F) -> anyhow::Result<&History>
    where
        F: FnMut(usize, &Generation),
    {
        while self.history.len() < total {
            let number = self.history.next_generation_number();
            let generation = self.step()?;
            on_generation(number, generation);
        }
        Ok(&self.history)
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn population(&self) -> &Population {
        &self.population
    }
}

fn create_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}
