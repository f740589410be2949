use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Seed used when the configuration does not name one.
pub const DEFAULT_SEED: u64 = 42;

/// `rng.0` is a `ChaCha8Rng` implementing `rand::Rng`.
#[derive(Debug, Clone)]
pub struct SimRng(pub ChaCha8Rng);

impl Default for SimRng {
    fn default() -> Self {
        Self(ChaCha8Rng::seed_from_u64(DEFAULT_SEED))
    }
}

impl SimRng {
    pub fn from_seed_u64(seed: u64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed))
    }
}
