//! Config for the tuner behaviors
//!
//! [`Configuration`] groups everything the evolution loop needs to know about the external
//! binaries, the tournament and the output. [`MutationSettings`] holds the parameters of
//! the genetic operators.
//!
//! Both are created with `new()` and adjusted through chainable `with_*` setters:
//!
//! ```no_run
//! use snake_tuner::configuration::{Configuration, MutationSettings};
//!
//! let config = Configuration::new()
//!     .with_agent_binary("../bamboozle_snake/target/release/bamboozle_snake")
//!     .with_max_parallel_matches(4)
//!     .with_mutation(MutationSettings::new().with_sigma(0.05));
//! ```

use std::path::{Path, PathBuf};

/// Parameters of [`Heuristic::with_mutation`](crate::heuristic::Heuristic::with_mutation).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MutationSettings {
    /// Threshold compared against a uniform draw; a weight is perturbed when the draw is
    /// greater or equal.
    pub mutation_chance: f64,
    /// Standard deviation of the Gaussian perturbation.
    pub sigma: f64,
    /// Normalize the weights after perturbation.
    pub normalize: bool,
}

impl MutationSettings {
    /// `mutation_chance = 0.3`, `sigma = 0.08`, normalization enabled.
    pub fn new() -> Self {
        Self {
            mutation_chance: 0.3,
            sigma: 0.08,
            normalize: true,
        }
    }

    pub fn with_mutation_chance(mut self, value: f64) -> Self {
        self.mutation_chance = value;
        self
    }

    pub fn with_sigma(mut self, value: f64) -> Self {
        self.sigma = value;
        self
    }

    pub fn with_normalize(mut self, value: bool) -> Self {
        self.normalize = value;
        self
    }
}

impl Default for MutationSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the tuner.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub(crate) agent_binary: PathBuf,
    pub(crate) engine_binary: PathBuf,
    pub(crate) base_port: u16,
    pub(crate) move_timeout_ms: u64,
    pub(crate) threads_per_game: usize,
    pub(crate) max_parallel_matches: usize,
    pub(crate) matches_per_pair: usize,
    pub(crate) game_mode: String,
    pub(crate) sequential: bool,
    pub(crate) browser: bool,
    pub(crate) verbose: bool,
    pub(crate) log: bool,
    pub(crate) debug_agent_stderr: bool,
    pub(crate) checkpoint_path: PathBuf,
    pub(crate) mutation: MutationSettings,
}

impl Configuration {
    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - The agent binary is `../bamboozle_snake/target/release/bamboozle_snake` and the
    ///   engine binary is `bamboozle_snake` (looked up in `PATH`).
    /// - Agent servers listen on ports `8080`, `8081`, ... and get `400` ms per move with
    ///   one search thread.
    /// - At most 7 matches run at the same time, each pair plays twice.
    /// - Matches use the `royale` mode, in sequential engine mode, without browser.
    /// - Progress is printed to stdout, logging to file is disabled.
    /// - Agent stderr is only traced.
    /// - History is checkpointed to `generations.json`.
    pub fn new() -> Self {
        Self {
            agent_binary: PathBuf::from("../bamboozle_snake/target/release/bamboozle_snake"),
            engine_binary: PathBuf::from("bamboozle_snake"),
            base_port: 8080,
            move_timeout_ms: 400,
            threads_per_game: 1,
            max_parallel_matches: 7,
            matches_per_pair: 2,
            game_mode: "royale".to_string(),
            sequential: true,
            browser: false,
            verbose: true,
            log: false,
            debug_agent_stderr: false,
            checkpoint_path: PathBuf::from("generations.json"),
            mutation: MutationSettings::new(),
        }
    }

    /// Path of the agent server executable.
    pub fn with_agent_binary(mut self, value: impl AsRef<Path>) -> Self {
        self.agent_binary = value.as_ref().to_path_buf();
        self
    }

    /// Path of the simulation engine executable.
    pub fn with_engine_binary(mut self, value: impl AsRef<Path>) -> Self {
        self.engine_binary = value.as_ref().to_path_buf();
        self
    }

    /// Port of the first agent server; candidate `i` listens on `base_port + i`.
    pub fn with_base_port(mut self, value: u16) -> Self {
        self.base_port = value;
        self
    }

    /// Per-move time budget given to every agent server, in milliseconds.
    pub fn with_move_timeout_ms(mut self, value: u64) -> Self {
        self.move_timeout_ms = value;
        self
    }

    pub fn with_threads_per_game(mut self, value: usize) -> Self {
        self.threads_per_game = value;
        self
    }

    /// Maximum number of matches running at the same time. Values below 1 are raised to 1.
    pub fn with_max_parallel_matches(mut self, value: usize) -> Self {
        self.max_parallel_matches = value.max(1);
        self
    }

    /// Number of matches played by every pair of candidates. Values below 1 are raised to 1.
    pub fn with_matches_per_pair(mut self, value: usize) -> Self {
        self.matches_per_pair = value.max(1);
        self
    }

    /// Ruleset passed to the engine with `-m`.
    pub fn with_game_mode(mut self, value: impl Into<String>) -> Self {
        self.game_mode = value.into();
        self
    }

    /// Ask the engine to query both agents one after the other.
    pub fn with_sequential(mut self, value: bool) -> Self {
        self.sequential = value;
        self
    }

    /// Ask the engine to open a browser visualization for every match.
    pub fn with_browser(mut self, value: bool) -> Self {
        self.browser = value;
        self
    }

    /// Enable or disable progress output on stdout.
    pub fn with_verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    /// Enable or disable agent stderr output (debug purposes only).
    pub fn with_debug_agent_stderr(mut self, value: bool) -> Self {
        self.debug_agent_stderr = value;
        self
    }

    /// File the generation history is written to after every generation.
    pub fn with_checkpoint_path(mut self, value: impl AsRef<Path>) -> Self {
        self.checkpoint_path = value.as_ref().to_path_buf();
        self
    }

    pub fn with_mutation(mut self, value: MutationSettings) -> Self {
        self.mutation = value;
        self
    }

    pub fn checkpoint_path(&self) -> &Path {
        &self.checkpoint_path
    }

    pub fn mutation(&self) -> &MutationSettings {
        &self.mutation
    }

    pub fn max_parallel_matches(&self) -> usize {
        self.max_parallel_matches
    }

    pub fn matches_per_pair(&self) -> usize {
        self.matches_per_pair
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}
