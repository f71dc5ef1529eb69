//! Evaluation weights handed to an agent server, and the genetic operators acting on them.
//!
//! A [`Heuristic`] is a value type: every operator returns a new instance so that the
//! lineage of a weight vector across generations stays auditable.

use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use anyhow::Context;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::configuration::MutationSettings;

/// One term of the agent's evaluation function.
///
/// The serialized names are the keys the agent expects in its `--duel-heuristic` payload,
/// and the declaration order is the order of the canonical encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Cells reachable first by the agent.
    Area,
    /// Cells occupied by the agent's own body.
    SnakeArea,
    /// Hazard cells inside the agent's territory.
    HazardArea,
    /// Remaining health.
    Health,
    /// Body length.
    Length,
    /// Distance to food.
    Food,
}

impl Feature {
    /// Full vocabulary, in canonical order.
    pub const ALL: [Feature; 6] = [
        Feature::Area,
        Feature::SnakeArea,
        Feature::HazardArea,
        Feature::Health,
        Feature::Length,
        Feature::Food,
    ];
}

/// Weight left untouched by [`Heuristic::normalized`].
pub const EXCLUDED_FROM_NORMALIZATION: Feature = Feature::SnakeArea;

/// Named weight vector of an agent's evaluation function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Heuristic {
    weights: BTreeMap<Feature, f64>,
}

impl Default for Heuristic {
    /// The weights the agent uses when started without a heuristic.
    fn default() -> Self {
        Heuristic::new([
            (Feature::Area, 1.0),
            (Feature::SnakeArea, 0.1),
            (Feature::HazardArea, 0.1),
            (Feature::Health, 0.05),
            (Feature::Length, 0.0),
            (Feature::Food, 0.0),
        ])
    }
}

impl Heuristic {
    pub fn new(weights: impl IntoIterator<Item = (Feature, f64)>) -> Heuristic {
        Heuristic {
            weights: weights.into_iter().collect(),
        }
    }

    /// Every feature weighted by an independent uniform sample in `[0, 1)`. Not normalized.
    pub fn create_random<R: Rng + ?Sized>(rng: &mut R) -> Heuristic {
        Heuristic::new(Feature::ALL.iter().map(|&f| (f, rng.gen::<f64>())))
    }

    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.weights.get(&feature).copied()
    }

    pub fn features(&self) -> impl Iterator<Item = Feature> + '_ {
        self.weights.keys().copied()
    }

    pub fn weights(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        self.weights.iter().map(|(&f, &w)| (f, w))
    }

    /// Rescale every weight except [`EXCLUDED_FROM_NORMALIZATION`] so that they sum to 1.
    ///
    /// If the rescaled weights sum to zero (or the sum is not finite) the heuristic is
    /// returned unchanged.
    pub fn normalized(&self) -> Heuristic {
        let sum: f64 = self
            .weights
            .iter()
            .filter(|(f, _)| **f != EXCLUDED_FROM_NORMALIZATION)
            .map(|(_, w)| w)
            .sum();

        if sum == 0.0 || !sum.is_finite() {
            return self.clone();
        }

        Heuristic::new(self.weights().map(|(f, w)| {
            if f == EXCLUDED_FROM_NORMALIZATION {
                (f, w)
            } else {
                (f, w / sum)
            }
        }))
    }

    /// Gaussian perturbation of a random subset of the weights.
    ///
    /// A weight is perturbed when a fresh uniform draw is `>= settings.mutation_chance`,
    /// so the chance acts as a threshold: `0.3` perturbs about 70% of the weights.
    pub fn with_mutation<R: Rng + ?Sized>(&self, rng: &mut R, settings: &MutationSettings) -> Heuristic {
        let mutated = Heuristic::new(self.weights().map(|(f, w)| {
            if rng.gen::<f64>() >= settings.mutation_chance {
                (f, w + settings.sigma * standard_normal(rng))
            } else {
                (f, w)
            }
        }));

        if settings.normalize {
            mutated.normalized()
        } else {
            mutated
        }
    }

    /// The JSON object passed to the agent as its evaluation configuration.
    pub fn to_config_string(&self) -> String {
        // a map of f64 keyed by a unit enum always serializes
        serde_json::to_string(&self.weights).unwrap_or_default()
    }
}

impl Display for Heuristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_config_string())
    }
}

impl FromStr for Heuristic {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s).with_context(|| format!("invalid heuristic '{s}'"))
    }
}

/// Box-Muller transform over two uniform draws.
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
    let u2 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

#[cfg(test)]
mod heuristic_tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn sum_outside_exclusion(h: &Heuristic) -> f64 {
        h.weights()
            .filter(|(f, _)| *f != EXCLUDED_FROM_NORMALIZATION)
            .map(|(_, w)| w)
            .sum()
    }

    #[test]
    fn random_weights_are_in_unit_interval() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..50 {
            let h = Heuristic::create_random(&mut rng);
            assert_eq!(h.features().collect::<Vec<_>>(), Feature::ALL.to_vec());
            assert!(h.weights().all(|(_, w)| (0.0..1.0).contains(&w)));
        }
    }

    #[test]
    fn normalized_sums_to_one() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..50 {
            let h = Heuristic::create_random(&mut rng);
            let n = h.normalized();
            assert!((sum_outside_exclusion(&n) - 1.0).abs() < 1e-9);
            assert_eq!(
                n.get(EXCLUDED_FROM_NORMALIZATION),
                h.get(EXCLUDED_FROM_NORMALIZATION)
            );
        }
    }

    #[test]
    fn normalizing_zero_weights_is_a_no_op() {
        let h = Heuristic::new(Feature::ALL.iter().map(|&f| (f, 0.0)));
        assert_eq!(h.normalized(), h);
    }

    #[test]
    fn mutation_keeps_vocabulary_and_source() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let parent = Heuristic::default();
        let settings = MutationSettings::new();
        for _ in 0..20 {
            let child = parent.with_mutation(&mut rng, &settings);
            assert_eq!(
                child.features().collect::<Vec<_>>(),
                parent.features().collect::<Vec<_>>()
            );
            assert!((sum_outside_exclusion(&child) - 1.0).abs() < 1e-9);
        }
        assert_eq!(parent, Heuristic::default());
    }

    #[test]
    fn mutation_chance_of_one_changes_nothing() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let settings = MutationSettings::new()
            .with_mutation_chance(1.0)
            .with_normalize(false);
        let parent = Heuristic::default();
        assert_eq!(parent.with_mutation(&mut rng, &settings), parent);
    }

    #[test]
    fn mutation_chance_of_zero_perturbs_every_weight() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let settings = MutationSettings::new()
            .with_mutation_chance(0.0)
            .with_normalize(false);
        let parent = Heuristic::default();
        let child = parent.with_mutation(&mut rng, &settings);
        for f in Feature::ALL {
            assert_ne!(parent.get(f), child.get(f), "{f:?} not perturbed");
        }
    }

    #[test]
    fn config_string_uses_agent_keys_in_order() {
        let s = Heuristic::default().to_config_string();
        assert_eq!(
            s,
            r#"{"area":1.0,"snake_area":0.1,"hazard_area":0.1,"health":0.05,"length":0.0,"food":0.0}"#
        );
        assert_eq!(s.parse::<Heuristic>().unwrap(), Heuristic::default());
    }

    #[test]
    fn parse_rejects_unknown_feature() {
        assert!(r#"{"speed":1.0}"#.parse::<Heuristic>().is_err());
    }
}
