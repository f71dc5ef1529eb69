//! Capabilities the tuner needs from the outside world.
//!
//! The evolution loop never looks inside the agent server or the simulation engine; it
//! only relies on these contracts. [`AgentServerLauncher`](crate::agent_server::AgentServerLauncher)
//! and [`SimulatorEngine`](crate::match_runner::SimulatorEngine) implement them with real
//! processes, tests implement them in memory.

use std::fmt::{Debug, Display};

use crate::heuristic::Heuristic;

/// Address an agent server answers on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub port: u16,
}

impl Endpoint {
    pub fn local(port: u16) -> Endpoint {
        Endpoint { port }
    }

    /// URL handed to the engine, `http://127.0.0.1:<port>/`.
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}/", self.port)
    }
}

/// A seat in a match: the candidate name the engine reports and where its agent listens.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Participant {
    pub name: String,
    pub endpoint: Endpoint,
}

impl Display for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.endpoint.port)
    }
}

/// Result of one match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Outcome {
    Draw,
    Winner(String),
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Draw => write!(f, "DRAW"),
            Outcome::Winner(name) => write!(f, "{name}"),
        }
    }
}

/// A running agent server.
pub trait AgentProcess: Send + Debug {
    fn endpoint(&self) -> Endpoint;

    /// Terminate the server and release its port.
    ///
    /// Must be safe to call several times and on a process that already exited.
    fn stop(&mut self);
}

/// Starts agent servers.
pub trait AgentLauncher {
    /// Start an agent server named `name`, evaluating positions with `heuristic` and
    /// listening on `port`.
    ///
    /// Returns once the process exists, without waiting for it to accept connections.
    ///
    /// # Errors
    /// Returned when the server cannot be launched at all.
    fn launch(&self, name: &str, heuristic: &Heuristic, port: u16)
        -> anyhow::Result<Box<dyn AgentProcess>>;
}

/// Adjudicates matches between two agent servers.
pub trait MatchEngine: Send + Sync {
    /// Play one match, `left` and `right` being seated in that order.
    ///
    /// # Errors
    /// Only when the engine cannot be started. A match that goes wrong once started is
    /// reported as [`Outcome::Draw`].
    fn play(&self, left: &Participant, right: &Participant) -> anyhow::Result<Outcome>;
}

#[cfg(test)]
mod interface_tests {
    use super::*;

    #[test]
    fn endpoint_url() {
        assert_eq!(Endpoint::local(8083).url(), "http://127.0.0.1:8083/");
    }

    #[test]
    fn outcome_display() {
        assert_eq!(Outcome::Draw.to_string(), "DRAW");
        assert_eq!(Outcome::Winner("snake3".into()).to_string(), "snake3");
    }

    #[derive(Debug)]
    struct DummyProcess {
        port: u16,
        stopped: usize,
    }

    impl AgentProcess for DummyProcess {
        fn endpoint(&self) -> Endpoint {
            Endpoint::local(self.port)
        }

        fn stop(&mut self) {
            self.stopped += 1;
        }
    }

    struct DummyLauncher;

    impl AgentLauncher for DummyLauncher {
        fn launch(
            &self,
            _name: &str,
            _heuristic: &Heuristic,
            port: u16,
        ) -> anyhow::Result<Box<dyn AgentProcess>> {
            Ok(Box::new(DummyProcess { port, stopped: 0 }))
        }
    }

    #[test]
    fn test_dyn_launcher() {
        let launcher: &dyn AgentLauncher = &DummyLauncher;
        let mut process = launcher
            .launch("snake0", &Heuristic::default(), 9000)
            .unwrap();
        assert_eq!(process.endpoint(), Endpoint::local(9000));
        process.stop();
        process.stop();
    }
}
