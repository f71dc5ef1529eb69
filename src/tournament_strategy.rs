//! Match set and scoring of one generation.
//!
//! Every candidate plays every other candidate [`RoundRobinTournament::matches_per_pair`]
//! times. Seats are never swapped between the repeated matches of a pair: the lower index
//! always sits first.
//!
//! Scoring is a win count: a decisive match gives 1 to its winner, a draw gives 0.5 to
//! each side, so every match distributes exactly 1.0.

use std::collections::HashMap;

use rand::{seq::SliceRandom, Rng};
use tracing::warn;

use crate::game_interface::{Outcome, Participant};
use crate::match_runner::MatchSettings;

/// Round robin with a fixed number of matches per pair.
#[derive(Debug, Clone, Copy)]
pub struct RoundRobinTournament {
    matches_per_pair: usize,
}

impl RoundRobinTournament {
    /// # Panics
    /// If `matches_per_pair` is 0.
    pub fn new(matches_per_pair: usize) -> Self {
        assert!(
            matches_per_pair >= 1,
            "Must play at least one match per pairing."
        );
        Self { matches_per_pair }
    }

    pub fn matches_per_pair(&self) -> usize {
        self.matches_per_pair
    }

    /// All matches of the tournament, in a random order.
    pub fn schedule<R: Rng + ?Sized>(&self, participants: &[Participant], rng: &mut R) -> Vec<MatchSettings> {
        let n = participants.len();
        let mut pending = Vec::with_capacity(n * n.saturating_sub(1) / 2 * self.matches_per_pair);
        for i in 0..n {
            for j in (i + 1)..n {
                for _ in 0..self.matches_per_pair {
                    pending.push([participants[i].clone(), participants[j].clone()]);
                }
            }
        }
        pending.shuffle(rng);

        pending
            .into_iter()
            .enumerate()
            .map(|(id, ordered_player)| MatchSettings { id, ordered_player })
            .collect()
    }
}

/// Accumulated win credit per candidate name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WinTally {
    wins: HashMap<String, f64>,
    matches: usize,
}

impl WinTally {
    /// Tally where every participant starts at 0.
    pub fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            wins: names.into_iter().map(|name| (name.to_string(), 0.0)).collect(),
            matches: 0,
        }
    }

    pub fn record(&mut self, settings: &MatchSettings, outcome: &Outcome) {
        let [left, right] = &settings.ordered_player;
        self.matches += 1;
        match outcome {
            Outcome::Winner(name) if *name == left.name || *name == right.name => {
                *self.wins.entry(name.clone()).or_default() += 1.0;
            }
            Outcome::Winner(name) => {
                warn!("{settings}: engine reported unknown winner '{name}', counting a draw");
                self.record_draw(left, right);
            }
            Outcome::Draw => self.record_draw(left, right),
        }
    }

    fn record_draw(&mut self, left: &Participant, right: &Participant) {
        *self.wins.entry(left.name.clone()).or_default() += 0.5;
        *self.wins.entry(right.name.clone()).or_default() += 0.5;
    }

    pub fn get(&self, name: &str) -> f64 {
        self.wins.get(name).copied().unwrap_or(0.0)
    }

    /// Number of recorded matches.
    pub fn matches(&self) -> usize {
        self.matches
    }

    /// Sum of all credit; equals [`matches`](Self::matches).
    pub fn total(&self) -> f64 {
        self.wins.values().sum()
    }

    pub fn into_inner(self) -> HashMap<String, f64> {
        self.wins
    }
}

#[cfg(test)]
mod strategy_tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::game_interface::Endpoint;

    fn participants(n: usize) -> Vec<Participant> {
        (0..n)
            .map(|i| Participant {
                name: format!("snake{i}"),
                endpoint: Endpoint::local(8080 + i as u16),
            })
            .collect()
    }

    #[test]
    fn match_count_is_p_times_p_minus_one() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let tournament = RoundRobinTournament::new(2);
        for p in 0..8 {
            let schedule = tournament.schedule(&participants(p), &mut rng);
            assert_eq!(schedule.len(), p * p.saturating_sub(1));
        }
    }

    #[test]
    fn every_pair_plays_twice_in_same_seats() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let schedule = RoundRobinTournament::new(2).schedule(&participants(4), &mut rng);
        let mut pairs: HashMap<(String, String), usize> = HashMap::new();
        for m in &schedule {
            let [a, b] = &m.ordered_player;
            assert!(a.name < b.name, "seat order changed: {m}");
            *pairs.entry((a.name.clone(), b.name.clone())).or_default() += 1;
        }
        assert_eq!(pairs.len(), 6);
        assert!(pairs.values().all(|&c| c == 2));

        let mut ids: Vec<_> = schedule.iter().map(|m| m.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..12).collect::<Vec<_>>());
    }

    #[test]
    #[should_panic]
    fn zero_matches_per_pair_is_rejected() {
        RoundRobinTournament::new(0);
    }

    #[test]
    fn tally_rule() {
        let p = participants(3);
        let mut tally = WinTally::new(p.iter().map(|p| p.name.as_str()));
        let m01 = MatchSettings {
            id: 0,
            ordered_player: [p[0].clone(), p[1].clone()],
        };
        let m12 = MatchSettings {
            id: 1,
            ordered_player: [p[1].clone(), p[2].clone()],
        };

        tally.record(&m01, &Outcome::Draw);
        tally.record(&m01, &Outcome::Winner("snake1".to_string()));
        tally.record(&m12, &Outcome::Winner("snake2".to_string()));
        tally.record(&m12, &Outcome::Winner("snake9".to_string()));

        assert_eq!(tally.get("snake0"), 0.5);
        assert_eq!(tally.get("snake1"), 2.0);
        assert_eq!(tally.get("snake2"), 1.5);
        assert_eq!(tally.matches(), 4);
        assert_eq!(tally.total(), 4.0);
    }

    #[test]
    fn losers_keep_a_zero_entry() {
        let p = participants(2);
        let mut tally = WinTally::new(p.iter().map(|p| p.name.as_str()));
        let m = MatchSettings {
            id: 0,
            ordered_player: [p[0].clone(), p[1].clone()],
        };
        tally.record(&m, &Outcome::Winner("snake0".to_string()));
        let wins = tally.into_inner();
        assert_eq!(wins.len(), 2);
        assert_eq!(wins["snake1"], 0.0);
    }
}
