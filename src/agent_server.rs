use std::io::{BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;

use anyhow::Context;
use tracing::{debug, error, instrument, trace, warn};

use crate::configuration::Configuration;
use crate::game_interface::{AgentLauncher, AgentProcess, Endpoint};
use crate::heuristic::Heuristic;
use crate::process_output::lossy_lines;

/// Launches the external agent server binary.
#[derive(Debug, Clone)]
pub struct AgentServerLauncher {
    binary: PathBuf,
    move_timeout_ms: u64,
    threads_per_game: usize,
    debug_stderr: bool,
}

impl AgentServerLauncher {
    pub fn new(config: &Configuration) -> AgentServerLauncher {
        AgentServerLauncher {
            binary: config.agent_binary.clone(),
            move_timeout_ms: config.move_timeout_ms,
            threads_per_game: config.threads_per_game,
            debug_stderr: config.debug_agent_stderr,
        }
    }

    fn arguments(&self, name: &str, heuristic: &Heuristic, port: u16) -> Vec<String> {
        vec![
            "--timeout".to_string(),
            self.move_timeout_ms.to_string(),
            "--port".to_string(),
            port.to_string(),
            "--duel-heuristic".to_string(),
            heuristic.to_config_string(),
            "--threads-per-game".to_string(),
            self.threads_per_game.to_string(),
            "--name".to_string(),
            name.to_string(),
        ]
    }
}

impl AgentLauncher for AgentServerLauncher {
    /// Spawn the agent server. Its output streams are drained in background threads.
    ///
    /// Child process is killed on drop.
    #[instrument(skip(self, heuristic))]
    fn launch(
        &self,
        name: &str,
        heuristic: &Heuristic,
        port: u16,
    ) -> anyhow::Result<Box<dyn AgentProcess>> {
        let mut child = Command::new(&self.binary)
            .args(self.arguments(name, heuristic, port))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("could not launch agent '{}'", self.binary.display()))?;

        trace!(pid = child.id(), %heuristic, "agent server spawned");

        if let Some(stdout) = child.stdout.take() {
            forward_output(name.to_string(), "stdout", stdout, false);
        }
        if let Some(stderr) = child.stderr.take() {
            forward_output(name.to_string(), "stderr", stderr, self.debug_stderr);
        }

        Ok(Box::new(AgentServer {
            name: name.to_string(),
            endpoint: Endpoint::local(port),
            child: Some(child),
        }))
    }
}

/// A live agent server process.
#[derive(Debug)]
pub struct AgentServer {
    name: String,
    endpoint: Endpoint,
    child: Option<Child>,
}

impl AgentProcess for AgentServer {
    fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        // kill fails when the process already exited, which is fine
        if let Err(e) = child.kill() {
            debug!(agent = %self.name, "kill: {e}");
        }
        if let Err(e) = child.wait() {
            warn!(agent = %self.name, "could not reap agent server: {e}");
        }
        trace!(agent = %self.name, port = self.endpoint.port, "agent server stopped");
    }
}

impl Drop for AgentServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Drain an agent output stream line by line until EOF. Lines mentioning `Error` are
/// always reported.
///
/// The pipe must stay open for as long as the agent lives: an agent writing to a closed
/// pipe is killed by `SIGPIPE`.
fn forward_output<R: Read + Send + 'static>(agent: String, stream: &'static str, source: R, debug: bool) {
    thread::spawn(move || {
        for line in lossy_lines(BufReader::new(source)) {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    debug!(agent = %agent, stream, "output closed: {e}");
                    break;
                }
            };
            if line.contains("Error") {
                error!(agent = %agent, stream, "{line}");
            } else if debug {
                debug!(agent = %agent, stream, "{line}");
            } else {
                trace!(agent = %agent, stream, "{line}");
            }
        }
    });
}
