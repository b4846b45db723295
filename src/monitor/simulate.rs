use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::monitor::NodeReading;

/// Drifts node readings between simulated monitoring ticks
pub struct LoadSimulator {
    jitter_percent: f64,
    rng: StdRng,
}

impl LoadSimulator {
    /// Seeded, so a given seed always replays the same ticks.
    /// A non-finite jitter disables drift.
    pub fn new(jitter_percent: f64, seed: u64) -> Self {
        let jitter_percent = if jitter_percent.is_finite() {
            jitter_percent.clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            jitter_percent,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Scale every reading by a random factor within ±jitter, kept in 0..=100
    pub fn perturb(&mut self, nodes: &mut [NodeReading]) {
        if self.jitter_percent == 0.0 {
            return;
        }

        for node in nodes {
            node.raftstore_cpu = self.drift(node.raftstore_cpu);
            node.coprocessor_cpu = self.drift(node.coprocessor_cpu);
        }
    }

    fn drift(&mut self, value: f64) -> f64 {
        let factor = 1.0 + self.rng.gen_range(-self.jitter_percent..=self.jitter_percent) / 100.0;
        (value * factor).clamp(0.0, 100.0)
    }
}
