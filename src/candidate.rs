use anyhow::bail;
use tracing::{instrument, trace};

use crate::game_interface::{AgentLauncher, AgentProcess, Participant};
use crate::heuristic::Heuristic;

/// One evolvable agent configuration.
///
/// The name is reassigned every generation (`snake0`, `snake1`, ...) and is what the
/// engine reports as match winner.
#[derive(Debug)]
pub struct Candidate {
    pub name: String,
    pub heuristic: Heuristic,
    process: Option<Box<dyn AgentProcess>>,
    port: Option<u16>,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.heuristic == other.heuristic
    }
}

impl Candidate {
    pub fn new(name: impl Into<String>, heuristic: Heuristic) -> Candidate {
        Candidate {
            name: name.into(),
            heuristic,
            process: None,
            port: None,
        }
    }

    /// Launch this candidate's agent server on `port`.
    ///
    /// # Errors
    /// Returned if a server is already running for this candidate, or if it cannot be
    /// launched.
    #[instrument(skip(self, launcher), fields(candidate = %self.name))]
    pub fn start_server(&mut self, launcher: &dyn AgentLauncher, port: u16) -> anyhow::Result<()> {
        if let Some(port) = self.port {
            bail!("{} already has an agent server on port {port}", self.name);
        }
        let process = launcher.launch(&self.name, &self.heuristic, port)?;
        self.process = Some(process);
        self.port = Some(port);
        Ok(())
    }

    /// Stop the agent server, if any. Safe to call at any time.
    pub fn stop_server(&mut self) {
        if let Some(mut process) = self.process.take() {
            process.stop();
            trace!(candidate = %self.name, "server stopped");
        }
        self.port = None;
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn is_running(&self) -> bool {
        self.process.is_some()
    }

    /// Seat description for a match, available while the server runs.
    pub fn participant(&self) -> Option<Participant> {
        self.process.as_ref().map(|process| Participant {
            name: self.name.clone(),
            endpoint: process.endpoint(),
        })
    }
}

impl Drop for Candidate {
    fn drop(&mut self) {
        self.stop_server();
    }
}

#[cfg(test)]
mod candidate_tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;
    use crate::game_interface::Endpoint;

    #[derive(Debug)]
    struct CountingProcess {
        port: u16,
        stops: Arc<AtomicUsize>,
    }

    impl AgentProcess for CountingProcess {
        fn endpoint(&self) -> Endpoint {
            Endpoint::local(self.port)
        }

        fn stop(&mut self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct CountingLauncher {
        launches: AtomicUsize,
        stops: Arc<AtomicUsize>,
    }

    impl AgentLauncher for CountingLauncher {
        fn launch(
            &self,
            _name: &str,
            _heuristic: &Heuristic,
            port: u16,
        ) -> anyhow::Result<Box<dyn AgentProcess>> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingProcess {
                port,
                stops: self.stops.clone(),
            }))
        }
    }

    #[test]
    fn start_then_stop() {
        let launcher = CountingLauncher::default();
        let mut candidate = Candidate::new("snake0", Heuristic::default());
        assert!(candidate.participant().is_none());

        candidate.start_server(&launcher, 8080).unwrap();
        assert_eq!(candidate.port(), Some(8080));
        let participant = candidate.participant().unwrap();
        assert_eq!(participant.name, "snake0");
        assert_eq!(participant.endpoint.url(), "http://127.0.0.1:8080/");

        candidate.stop_server();
        candidate.stop_server();
        assert!(!candidate.is_running());
        assert_eq!(candidate.port(), None);
        assert_eq!(launcher.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn second_start_is_refused() {
        let launcher = CountingLauncher::default();
        let mut candidate = Candidate::new("snake0", Heuristic::default());
        candidate.start_server(&launcher, 8080).unwrap();
        assert!(candidate.start_server(&launcher, 8081).is_err());
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
        assert_eq!(candidate.port(), Some(8080));
    }

    #[test]
    fn drop_stops_server() {
        let launcher = CountingLauncher::default();
        {
            let mut candidate = Candidate::new("snake0", Heuristic::default());
            candidate.start_server(&launcher, 8080).unwrap();
        }
        assert_eq!(launcher.stops.load(Ordering::SeqCst), 1);
    }
}
