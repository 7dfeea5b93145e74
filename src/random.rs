//! Random number generation, used to draw reproducible samples of systematic
//! variations. Uses the abstractions of the standard "rand" crate.

use rand::{Rng, SeedableRng};

/// Random number generation engine in use
type Engine = rand_xoshiro::Xoshiro256Plus;

/// Seed used when the user does not provide one
pub const DEFAULT_SEED: u64 = 12345;

/// Seeded random number generator, so that runs can be reproduced
#[derive(Clone)]
pub struct RandGenerator {
    rng: Engine,
}
//
impl RandGenerator {
    /// Spawn a new random number generator
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Engine::seed_from_u64(seed),
        }
    }

    /// Pick an index in 0..len
    pub fn pick(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

impl Default for RandGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}
