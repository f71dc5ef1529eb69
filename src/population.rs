//! Generational selection.
//!
//! After a tournament the candidates are ranked by win credit into a [`Generation`], and
//! the next roster is derived from that ranking:
//!
//! 1. every candidate scoring at least as much as the second best is kept as is
//! 2. each kept candidate also gets a mutated copy
//! 3. the remaining slots but one are filled with mutants of parents drawn from the whole
//!    ranking, with a probability proportional to their win credit
//! 4. one fully random candidate is added
//! 5. the roster is cut back to the population size and renamed `snake0..`

use anyhow::bail;
use rand::{distributions::WeightedIndex, prelude::Distribution, Rng};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::candidate::Candidate;
use crate::configuration::MutationSettings;
use crate::evaluator::Evaluator;
use crate::heuristic::Heuristic;
use crate::tournament_strategy::WinTally;

/// A heuristic with the win credit it earned in one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedHeuristic {
    pub heuristic: Heuristic,
    pub wins: f64,
}

/// Heuristics of one generation, best first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Generation {
    entries: Vec<RankedHeuristic>,
}

impl Generation {
    /// Sort by descending wins. Equal scores keep their input order.
    pub fn new(mut entries: Vec<RankedHeuristic>) -> Generation {
        entries.sort_by(|a, b| b.wins.total_cmp(&a.wins));
        Generation { entries }
    }

    /// Rank `candidates` by the credit `tally` holds for their names.
    pub fn rank(candidates: &[Candidate], tally: &WinTally) -> Generation {
        Generation::new(
            candidates
                .iter()
                .map(|c| RankedHeuristic {
                    heuristic: c.heuristic.clone(),
                    wins: tally.get(&c.name),
                })
                .collect(),
        )
    }

    pub fn entries(&self) -> &[RankedHeuristic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn best(&self) -> Option<&RankedHeuristic> {
        self.entries.first()
    }

    pub fn total_wins(&self) -> f64 {
        self.entries.iter().map(|e| e.wins).sum()
    }
}

/// The current roster of candidates.
#[derive(Debug)]
pub struct Population {
    candidates: Vec<Candidate>,
    mutation: MutationSettings,
}

impl Population {
    /// # Errors
    /// Returned with fewer than two heuristics.
    pub fn new(heuristics: Vec<Heuristic>, mutation: MutationSettings) -> anyhow::Result<Population> {
        if heuristics.len() < 2 {
            bail!("a population needs at least 2 candidates, got {}", heuristics.len());
        }
        let candidates = heuristics
            .into_iter()
            .enumerate()
            .map(|(i, h)| Candidate::new(candidate_name(i), h))
            .collect();
        Ok(Population {
            candidates,
            mutation,
        })
    }

    /// Population that follows a stored generation: its heuristics are the candidates, and
    /// the next roster is derived from its recorded wins.
    pub fn from_generation<R: Rng + ?Sized>(
        generation: &Generation,
        mutation: MutationSettings,
        rng: &mut R,
    ) -> anyhow::Result<Population> {
        let mut population = Population::new(
            generation
                .entries()
                .iter()
                .map(|e| e.heuristic.clone())
                .collect(),
            mutation,
        )?;
        population.update_candidates(generation, rng);
        Ok(population)
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Evaluate the roster, replace it with the next one, and return the ranking.
    #[instrument(skip_all, fields(population = self.candidates.len()))]
    pub fn step<R: Rng + ?Sized>(&mut self, evaluator: &Evaluator, rng: &mut R) -> anyhow::Result<Generation> {
        let tally = evaluator.evaluate(&mut self.candidates, rng)?;
        let ranked = Generation::rank(&self.candidates, &tally);
        self.update_candidates(&ranked, rng);
        Ok(ranked)
    }

    /// Replace the roster by the offspring of `ranked`. The size never changes.
    pub fn update_candidates<R: Rng + ?Sized>(&mut self, ranked: &Generation, rng: &mut R) {
        let size = self.candidates.len();
        let entries = ranked.entries();
        let mut next: Vec<Heuristic> = Vec::with_capacity(size * 2 + 1);

        if let Some(threshold) = entries.get(1).or(entries.first()).map(|e| e.wins) {
            // elites, and a mutant of each
            next.extend(
                entries
                    .iter()
                    .filter(|e| e.wins >= threshold)
                    .map(|e| e.heuristic.clone()),
            );
            let elites = next.len();
            debug!(elites, threshold);
            for i in 0..elites {
                let mutant = next[i].with_mutation(rng, &self.mutation);
                next.push(mutant);
            }

            let parents = size.saturating_sub(next.len() + 1).max(1);
            for _ in 0..parents {
                let parent = &entries[sample_parent(entries, rng)];
                next.push(parent.heuristic.with_mutation(rng, &self.mutation));
            }
        } else {
            warn!("empty ranking, the next population is random");
        }

        while next.len() < size {
            next.push(Heuristic::create_random(rng));
        }
        next.push(Heuristic::create_random(rng));
        // the fresh random one may be cut when elites fill the roster
        next.truncate(size);

        self.candidates = next
            .into_iter()
            .enumerate()
            .map(|(i, h)| Candidate::new(candidate_name(i), h))
            .collect();
    }
}

fn candidate_name(i: usize) -> String {
    format!("snake{i}")
}

/// Index of a parent drawn with probability proportional to its wins, or uniformly when
/// the wins cannot serve as weights (all zero, negative or not finite).
fn sample_parent<R: Rng + ?Sized>(entries: &[RankedHeuristic], rng: &mut R) -> usize {
    match WeightedIndex::new(entries.iter().map(|e| e.wins)) {
        Ok(dist) => dist.sample(rng),
        Err(e) => {
            debug!("uniform parent selection: {e}");
            rng.gen_range(0..entries.len())
        }
    }
}
