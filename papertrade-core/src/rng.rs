//! Deterministic RNG hierarchy.
//!
//! A master seed generates deterministic sub-seeds for each `(scope, index)`
//! pair, e.g. `("random_forest", tree)`. Sub-seeds are derived via BLAKE3, so
//! the stream for one tree does not depend on how many trees were built
//! before it.

use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone)]
pub struct SeedHierarchy {
    master_seed: u64,
}

impl SeedHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Derive a deterministic sub-seed for a specific (scope, index).
    pub fn sub_seed(&self, scope: &str, index: u64) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(scope.as_bytes());
        hasher.update(&index.to_le_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    /// Create a seeded StdRng from a sub-seed.
    pub fn rng_for(&self, scope: &str, index: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(scope, index))
    }
}
