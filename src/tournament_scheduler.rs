use std::collections::VecDeque;

use tracing::trace;

use crate::match_runner::{MatchReport, MatchSettings};
use crate::tournament_strategy::WinTally;

/// Admission control for the matches of one generation.
///
/// Holds the pending queue, keeps at most `max_parallel` matches running, and folds
/// finished matches into the [`WinTally`]. Only the coordinating thread touches it.
pub struct TournamentScheduler {
    tally: WinTally,
    pending_matches: VecDeque<MatchSettings>,
    max_parallel: usize,
    running_matches: usize,
    finished_matches: usize,
    closed: bool,
}

impl TournamentScheduler {
    pub fn new(matches: Vec<MatchSettings>, tally: WinTally, max_parallel: usize) -> Self {
        TournamentScheduler {
            tally,
            pending_matches: matches.into(),
            max_parallel: max_parallel.max(1),
            running_matches: 0,
            finished_matches: 0,
            closed: false,
        }
    }

    /// Matches to launch now, as many as free slots allow.
    pub fn advance(&mut self) -> Vec<MatchSettings> {
        let mut matches_to_run = vec![];
        if self.closed {
            return matches_to_run;
        }
        while self.running_matches < self.max_parallel {
            let Some(m) = self.pending_matches.pop_front() else {
                break;
            };
            matches_to_run.push(m);
            self.running_matches += 1;
        }
        trace!(
            launched = matches_to_run.len(),
            running = self.running_matches,
            pending = self.pending_matches.len()
        );
        matches_to_run
    }

    /// Record a finished match, then admit the next ones.
    ///
    /// A match whose engine could not be started yields its error; the scheduler then
    /// stops admitting matches and only waits for the running ones.
    pub fn on_result(&mut self, report: MatchReport) -> anyhow::Result<Vec<MatchSettings>> {
        self.running_matches -= 1;
        self.finished_matches += 1;
        match report.outcome {
            Ok(outcome) => {
                self.tally.record(&report.settings, &outcome);
                Ok(self.advance())
            }
            Err(e) => {
                self.close();
                Err(e.context(format!("match {} failed", report.settings)))
            }
        }
    }

    /// Drop every pending match.
    pub fn close(&mut self) {
        self.closed = true;
        self.pending_matches.clear();
    }

    pub fn running(&self) -> usize {
        self.running_matches
    }

    /// Matches reported so far, failed ones included.
    pub fn finished(&self) -> usize {
        self.finished_matches
    }

    /// All admitted matches finished and none is left to admit.
    pub fn is_finished(&self) -> bool {
        self.running_matches == 0 && self.pending_matches.is_empty()
    }

    pub fn tally(&self) -> &WinTally {
        &self.tally
    }

    pub fn into_tally(self) -> WinTally {
        self.tally
    }
}
