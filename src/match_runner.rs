use std::fmt::Display;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use anyhow::Context;
use tracing::{debug, instrument, trace, warn};

use crate::configuration::Configuration;
use crate::game_interface::{MatchEngine, Outcome, Participant};
use crate::process_output::lossy_lines;

/// Third token of the engine line announcing the end of a match.
const COMPLETION_EVENT: &str = "Game";
/// Winner token of the `It was a draw.` completion line.
const DRAW_TOKEN: &str = "It";

/// One scheduled match, seats in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSettings {
    pub id: usize,
    pub ordered_player: [Participant; 2],
}

impl Display for MatchSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{} VS {}]",
            self.ordered_player[0].name, self.ordered_player[1].name
        )
    }
}

#[derive(Debug)]
pub struct MatchReport {
    pub settings: MatchSettings,
    pub outcome: anyhow::Result<Outcome>,
}

/// Play `settings` on `engine`. Never panics; an unlaunchable engine is reported in
/// [`MatchReport::outcome`].
#[instrument(skip_all, fields(game = settings.id))]
pub fn run_match(engine: &dyn MatchEngine, settings: MatchSettings) -> MatchReport {
    let [left, right] = &settings.ordered_player;
    let outcome = engine.play(left, right);
    trace!(?outcome);
    MatchReport { settings, outcome }
}

/// The external simulation engine, run once per match.
#[derive(Debug, Clone)]
pub struct SimulatorEngine {
    binary: PathBuf,
    mode: String,
    sequential: bool,
    browser: bool,
}

impl SimulatorEngine {
    pub fn new(config: &Configuration) -> SimulatorEngine {
        SimulatorEngine {
            binary: config.engine_binary.clone(),
            mode: config.game_mode.clone(),
            sequential: config.sequential,
            browser: config.browser,
        }
    }

    fn arguments(&self, left: &Participant, right: &Participant) -> Vec<String> {
        let mut args = vec![
            "play".to_string(),
            "-m".to_string(),
            self.mode.clone(),
            "-n".to_string(),
            left.name.clone(),
            "-n".to_string(),
            right.name.clone(),
            "-u".to_string(),
            left.endpoint.url(),
            "-u".to_string(),
            right.endpoint.url(),
        ];
        if self.browser {
            args.push("--browser".to_string());
        }
        if self.sequential {
            args.push("-s".to_string());
        }
        args
    }
}

impl MatchEngine for SimulatorEngine {
    fn play(&self, left: &Participant, right: &Participant) -> anyhow::Result<Outcome> {
        let mut child = Command::new(&self.binary)
            .args(self.arguments(left, right))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("could not launch engine '{}'", self.binary.display()))?;

        let outcome = match child.stderr.take() {
            Some(stderr) => parse_outcome(BufReader::new(stderr)),
            None => {
                warn!("engine stderr not captured, counting a draw");
                Outcome::Draw
            }
        };

        kill_engine(&mut child);
        Ok(outcome)
    }
}

/// Kill the engine whether or not it already exited, then reap it.
fn kill_engine(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!("engine kill: {e}");
    }
    if let Err(e) = child.wait() {
        warn!("could not reap engine: {e}");
    }
}

/// Scan the engine diagnostic stream for the end of the match.
///
/// The completion line has `Game` as third token and the winner four tokens from the end:
///
/// ```text
/// 2024/01/01 10:00:03 Game completed after 214 turns. snake7 was the winner.
/// 2024/01/01 10:00:03 Game completed after 80 turns. It was a draw.
/// ```
///
/// Lines are decoded lossily, so invalid bytes never hide a later result. A stream that
/// ends, fails, or whose completion line is too short counts as a draw.
pub fn parse_outcome<R: BufRead>(reader: R) -> Outcome {
    for line in lossy_lines(reader) {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("engine stream unreadable ({e}), counting a draw");
                return Outcome::Draw;
            }
        };

        if line.contains("Error") {
            warn!("engine: {line}");
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.get(2) != Some(&COMPLETION_EVENT) {
            continue;
        }

        let Some(winner) = tokens.len().checked_sub(4).map(|i| tokens[i]) else {
            warn!("malformed completion line '{line}', counting a draw");
            return Outcome::Draw;
        };
        return if winner == DRAW_TOKEN {
            Outcome::Draw
        } else {
            Outcome::Winner(winner.to_string())
        };
    }

    warn!("engine exited without reporting a result, counting a draw");
    Outcome::Draw
}
