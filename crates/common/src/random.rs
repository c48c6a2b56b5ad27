//! Injectable uniform random draws.
//!
//! Jitter keeps a fleet from renewing in lockstep. The draw is injected so
//! tests can pin it ([`FixedRandom`]) or replay it ([`SeededRandom`]).

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;

/// Source of bounded uniform integers
pub trait RandomSource: Send + Sync + fmt::Debug {
    /// Uniform draw from `[0, bound)`. Returns 0 when `bound` is 0.
    fn below(&self, bound: u64) -> u64;
}

/// Thread-local OS-seeded generator
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn below(&self, bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..bound)
    }
}

/// Deterministic generator seeded once
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    /// Create a generator that replays the same sequence for the same seed
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn below(&self, bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        self.rng.lock().gen_range(0..bound)
    }
}

impl fmt::Debug for SeededRandom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeededRandom").finish_non_exhaustive()
    }
}

/// Always returns the same value, clamped into range
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub u64);

impl RandomSource for FixedRandom {
    fn below(&self, bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        self.0.min(bound - 1)
    }
}
