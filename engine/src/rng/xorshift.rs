//! xorshift64* random number generator
//!
//! Fast, high-quality PRNG used for the in-draw sampling sequence.
//!
//! # Determinism
//!
//! Same seed → same sequence. The orchestrator records the per-draw seed in
//! the decision snapshot, which makes every committed draw replayable: audit
//! tooling can re-run the selection with the stored seed and obtain the same
//! prize.

use serde::{Deserialize, Serialize};

/// Deterministic random number generator using xorshift64*
///
/// # Example
/// ```
/// use loyalty_lottery_core_rs::rng::DrawRng;
///
/// let mut rng = DrawRng::new(12345);
/// let value = rng.next();
/// let pick = rng.range_u64(1_000_000); // [0, 1_000_000)
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawRng {
    /// Internal state (64-bit)
    state: u64,
}

impl DrawRng {
    /// Create a new RNG with the given seed.
    ///
    /// A zero seed is remapped to 1 (xorshift requirement).
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Generate the next random u64 value.
    pub fn next(&mut self) -> u64 {
        // xorshift64* algorithm
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Generate a random value in `[0, bound)`.
    ///
    /// # Panics
    /// Panics if `bound` is zero.
    pub fn range_u64(&mut self, bound: u64) -> u64 {
        assert!(bound > 0, "bound must be positive");
        self.next() % bound
    }

    /// Current RNG state, for audit snapshots.
    pub fn state(&self) -> u64 {
        self.state
    }
}
