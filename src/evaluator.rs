//! Evaluation of one generation.
//!
//! The [`Evaluator`] owns the two external capabilities (agent servers and the match
//! engine) and runs a full tournament between the current candidates:
//!
//! - one agent server per candidate, on `base_port + index`
//! - every pair plays [`Configuration::with_matches_per_pair`] matches, in random order
//! - at most [`Configuration::with_max_parallel_matches`] matches run at the same time,
//!   each on its own thread, blocking only on the engine output
//! - finished matches are reported over a channel to the calling thread, which is the
//!   only one touching the tally
//! - all agent servers are stopped before returning, whatever happened
//!
//! # Errors
//!
//! Only launch failures abort an evaluation: an agent server or the engine that cannot be
//! started at all. Everything that goes wrong inside a match is a draw.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, Scope};

use anyhow::{anyhow, Context};
use rand::Rng;
use tracing::{debug, info, instrument};

use crate::agent_server::AgentServerLauncher;
use crate::candidate::Candidate;
use crate::configuration::Configuration;
use crate::game_interface::{AgentLauncher, MatchEngine};
use crate::match_runner::{run_match, MatchReport, MatchSettings, SimulatorEngine};
use crate::tournament_scheduler::TournamentScheduler;
use crate::tournament_strategy::{RoundRobinTournament, WinTally};

/// Runs the tournament of a generation.
pub struct Evaluator {
    launcher: Box<dyn AgentLauncher>,
    engine: Box<dyn MatchEngine>,
    tournament: RoundRobinTournament,
    base_port: u16,
    max_parallel: usize,
    verbose: bool,
}

impl Evaluator {
    /// Evaluator driving the external agent and engine binaries named in `config`.
    pub fn new(config: &Configuration) -> Evaluator {
        Evaluator::with_backends(
            config,
            Box::new(AgentServerLauncher::new(config)),
            Box::new(SimulatorEngine::new(config)),
        )
    }

    /// Evaluator using custom agent and engine implementations.
    pub fn with_backends(
        config: &Configuration,
        launcher: Box<dyn AgentLauncher>,
        engine: Box<dyn MatchEngine>,
    ) -> Evaluator {
        Evaluator {
            launcher,
            engine,
            tournament: RoundRobinTournament::new(config.matches_per_pair),
            base_port: config.base_port,
            max_parallel: config.max_parallel_matches,
            verbose: config.verbose,
        }
    }

    /// Play the tournament between `candidates` and return the win credit of each name.
    ///
    /// Candidates must not have a running server. They have none when this returns.
    #[instrument(skip_all, fields(candidates = candidates.len()))]
    pub fn evaluate<R: Rng + ?Sized>(
        &self,
        candidates: &mut [Candidate],
        rng: &mut R,
    ) -> anyhow::Result<WinTally> {
        let servers = RunningServers::start(candidates, self.launcher.as_ref(), self.base_port)?;

        let participants = servers
            .0
            .iter()
            .map(|c| {
                c.participant()
                    .with_context(|| format!("{} has no agent server", c.name))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let matches = self.tournament.schedule(&participants, rng);
        let total = matches.len();
        info!(matches = total, max_parallel = self.max_parallel, "starting tournament");

        let tally = WinTally::new(participants.iter().map(|p| p.name.as_str()));
        let scheduler = TournamentScheduler::new(matches, tally, self.max_parallel);

        if self.verbose {
            disable_line_wrap();
        }
        let result = self.run_scheduler(scheduler, total);
        if self.verbose {
            enable_line_wrap();
            println!();
        }

        drop(servers);
        result
    }

    fn run_scheduler(&self, mut scheduler: TournamentScheduler, total: usize) -> anyhow::Result<WinTally> {
        let engine = self.engine.as_ref();
        let mut failure: Option<anyhow::Error> = None;

        thread::scope(|scope| {
            let (tx_result, rx_result) = mpsc::channel();
            let mut running = vec![];

            for m in scheduler.advance() {
                self.launch_match(scope, engine, m, tx_result.clone(), &mut running);
            }

            while !scheduler.is_finished() {
                // not finished <=> match running <=> result to receive
                let Ok(report) = rx_result.recv() else {
                    failure.get_or_insert_with(|| anyhow!("match threads vanished"));
                    break;
                };
                remove_running_match(&mut running, &report.settings);
                if self.verbose {
                    print_runner_result(&report, scheduler.finished() + 1, total);
                }

                match scheduler.on_result(report) {
                    Ok(next) => {
                        for m in next {
                            self.launch_match(scope, engine, m, tx_result.clone(), &mut running);
                        }
                    }
                    Err(e) => {
                        debug!(running = scheduler.running(), "draining after failure: {e:#}");
                        failure.get_or_insert(e);
                    }
                }
            }
        });

        match failure {
            Some(e) => Err(e),
            None => Ok(scheduler.into_tally()),
        }
    }

    fn launch_match<'scope, 'env>(
        &self,
        scope: &'scope Scope<'scope, 'env>,
        engine: &'env dyn MatchEngine,
        match_settings: MatchSettings,
        tx_result: Sender<MatchReport>,
        running: &mut Vec<MatchSettings>,
    ) {
        debug!("launching {match_settings}");
        running.push(match_settings.clone());
        if self.verbose {
            print_running_matches(running);
        }

        scope.spawn(move || {
            let report = catch_unwind(AssertUnwindSafe(|| run_match(engine, match_settings.clone())))
                .unwrap_or_else(|_| MatchReport {
                    outcome: Err(anyhow!("match thread panicked")),
                    settings: match_settings,
                });
            // the receiver only goes away once every match reported
            let _ = tx_result.send(report);
        });
    }
}

/// Candidates whose agent servers are up. Stops every server on drop.
struct RunningServers<'c>(&'c mut [Candidate]);

impl<'c> RunningServers<'c> {
    fn start(
        candidates: &'c mut [Candidate],
        launcher: &dyn AgentLauncher,
        base_port: u16,
    ) -> anyhow::Result<RunningServers<'c>> {
        let servers = RunningServers(candidates);
        for (i, candidate) in servers.0.iter_mut().enumerate() {
            let port = u16::try_from(i)
                .ok()
                .and_then(|i| base_port.checked_add(i))
                .context("not enough ports for the population")?;
            candidate
                .start_server(launcher, port)
                .with_context(|| format!("could not start agent server of {}", candidate.name))?;
        }
        Ok(servers)
    }
}

impl Drop for RunningServers<'_> {
    fn drop(&mut self) {
        for candidate in self.0.iter_mut() {
            candidate.stop_server();
        }
    }
}

fn remove_running_match(running: &mut Vec<MatchSettings>, finished: &MatchSettings) {
    if let Some(pos) = running.iter().position(|s| s.id == finished.id) {
        running.swap_remove(pos);
    }
}

fn print_runner_result(report: &MatchReport, done: usize, total: usize) {
    let outcome = match &report.outcome {
        Ok(outcome) => format!("\x1b[39m{outcome}"),
        Err(e) => format!("\x1b[31m{e}"),
    };
    // clear line, green match, result, start of line
    println!(
        "\x1b[2K\x1b[32m({done}/{total}) {}: {outcome}\x1b[39m\x1b[0G",
        report.settings
    );
}

fn print_running_matches(running: &[MatchSettings]) {
    // clear, green, default, start of line
    print!(
        "\x1b[2K\x1b[32mRunning...:\x1b[39m {}\x1b[0G",
        running
            .iter()
            .map(MatchSettings::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    let _ = std::io::Write::flush(&mut std::io::stdout());
}

fn disable_line_wrap() {
    print!("\x1b[?7l");
}

fn enable_line_wrap() {
    print!("\x1b[?7h");
}

#[cfg(test)]
mod evaluator_tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::game_interface::{AgentProcess, Endpoint, Outcome, Participant};
    use crate::heuristic::Heuristic;

    #[derive(Debug)]
    struct FakeServer {
        port: u16,
        live: Arc<AtomicUsize>,
        stopped: bool,
    }

    impl AgentProcess for FakeServer {
        fn endpoint(&self) -> Endpoint {
            Endpoint::local(self.port)
        }

        fn stop(&mut self) {
            if !self.stopped {
                self.stopped = true;
                self.live.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    #[derive(Default)]
    struct FakeLauncher {
        live: Arc<AtomicUsize>,
        fail_on: Option<String>,
    }

    impl AgentLauncher for FakeLauncher {
        fn launch(
            &self,
            name: &str,
            _heuristic: &Heuristic,
            port: u16,
        ) -> anyhow::Result<Box<dyn AgentProcess>> {
            if self.fail_on.as_deref() == Some(name) {
                anyhow::bail!("no such binary");
            }
            self.live.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeServer {
                port,
                live: self.live.clone(),
                stopped: false,
            }))
        }
    }

    /// Lower port wins, tracks peak concurrency.
    #[derive(Default)]
    struct FakeEngine {
        running: AtomicUsize,
        peak: AtomicUsize,
        played: Mutex<Vec<(String, String)>>,
        broken: bool,
    }

    impl MatchEngine for FakeEngine {
        fn play(&self, left: &Participant, right: &Participant) -> anyhow::Result<Outcome> {
            if self.broken {
                anyhow::bail!("engine missing");
            }
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(std::time::Duration::from_millis(5));
            self.played
                .lock()
                .unwrap()
                .push((left.name.clone(), right.name.clone()));
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(Outcome::Winner(left.name.clone()))
        }
    }

    fn candidates(n: usize) -> Vec<Candidate> {
        (0..n)
            .map(|i| Candidate::new(format!("snake{i}"), Heuristic::default()))
            .collect()
    }

    fn config() -> Configuration {
        Configuration::new()
            .with_verbose(false)
            .with_max_parallel_matches(2)
    }

    #[test]
    fn full_tournament_respects_cap_and_stops_servers() {
        let launcher = FakeLauncher::default();
        let live = launcher.live.clone();
        let engine = Arc::new(FakeEngine::default());

        struct Shared(Arc<FakeEngine>);
        impl MatchEngine for Shared {
            fn play(&self, l: &Participant, r: &Participant) -> anyhow::Result<Outcome> {
                self.0.play(l, r)
            }
        }

        let evaluator =
            Evaluator::with_backends(&config(), Box::new(launcher), Box::new(Shared(engine.clone())));
        let mut pop = candidates(4);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let tally = evaluator.evaluate(&mut pop, &mut rng).unwrap();

        assert_eq!(tally.matches(), 12);
        assert_eq!(tally.total(), 12.0);
        // snake0 always sits first against everybody
        assert_eq!(tally.get("snake0"), 6.0);
        assert_eq!(tally.get("snake3"), 0.0);
        assert!(engine.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(engine.played.lock().unwrap().len(), 12);
        assert_eq!(live.load(Ordering::SeqCst), 0);
        assert!(pop.iter().all(|c| !c.is_running()));
    }

    #[test]
    fn agent_launch_failure_stops_started_servers() {
        let launcher = FakeLauncher {
            fail_on: Some("snake2".to_string()),
            ..Default::default()
        };
        let live = launcher.live.clone();
        let evaluator =
            Evaluator::with_backends(&config(), Box::new(launcher), Box::new(FakeEngine::default()));
        let mut pop = candidates(4);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        assert!(evaluator.evaluate(&mut pop, &mut rng).is_err());
        assert_eq!(live.load(Ordering::SeqCst), 0);
        assert!(pop.iter().all(|c| !c.is_running()));
    }

    #[test]
    fn engine_failure_aborts_after_draining() {
        let launcher = FakeLauncher::default();
        let live = launcher.live.clone();
        let engine = FakeEngine {
            broken: true,
            ..Default::default()
        };
        let evaluator = Evaluator::with_backends(&config(), Box::new(launcher), Box::new(engine));
        let mut pop = candidates(3);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        assert!(evaluator.evaluate(&mut pop, &mut rng).is_err());
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }
}
