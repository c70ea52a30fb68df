//! Deterministic random number generation for synthetic ledgers.
//!
//! RULE: Nothing in the crate calls a platform RNG. Every random draw
//! flows through a `LedgerRng` seeded from an explicit u64, so a
//! synthetic history is fully reproducible from its seed.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

pub struct LedgerRng {
    inner: Pcg64Mcg,
}

impl LedgerRng {
    /// Derive an independent stream per `stream` index from one master seed.
    pub fn new(master_seed: u64, stream: u64) -> Self {
        let derived_seed = master_seed ^ stream.wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self {
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Uniform draw in [low, high).
    pub fn uniform(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_f64()
    }

    /// Normal draw via Box-Muller.
    pub fn normal(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-12);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}
