//! Deterministic per-edge/per-task random draws (spec §9: "Random draws
//! ... back by a deterministic per-edge/per-task PRNG seeded from workload
//! config for reproducibility").

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// A random distribution over `u64` cycle/size quantities.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Distribution {
    Constant(u64),
    Uniform { low: u64, high: u64 },
    /// Exponential distribution with the given mean, via inverse-CDF sampling.
    Exponential { mean: f64 },
}

impl Distribution {
    pub fn sample(&self, rng: &mut TaskRng) -> u64 {
        match *self {
            Distribution::Constant(v) => v,
            Distribution::Uniform { low, high } => {
                if low >= high {
                    low
                } else {
                    rng.0.gen_range(low..=high)
                }
            }
            Distribution::Exponential { mean } => {
                let u: f64 = rng.0.gen_range(f64::EPSILON..1.0);
                ((-mean * (1.0 - u).ln()).round().max(0.0)) as u64
            }
        }
    }
}

/// A small, fast, reproducible RNG bound to a single edge or task.
///
/// Each `GraphTask`/`GraphEdge` owns one of these, seeded at construction
/// time from the workload's configured seed mixed with the entity's stable
/// id, so a run is reproducible independent of scheduling order.
#[derive(Debug, Clone)]
pub struct TaskRng(SmallRng);

impl TaskRng {
    pub fn from_seed(base_seed: u64, entity_id: u32) -> Self {
        // Splitmix-style mixing so nearby ids don't produce correlated streams.
        let mut z = base_seed ^ (entity_id as u64).wrapping_mul(0x9E3779B97F4A7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^= z >> 31;
        Self(SmallRng::seed_from_u64(z))
    }
}
