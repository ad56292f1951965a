//! Determinism testing utilities.
//!
//! The merge protocol only works if two states that receive identical
//! commands evolve identically; this harness runs the same scripted battle
//! several times and compares the resulting state hashes.
//!
//! Sources of non-determinism to watch for:
//!
//! - **Floating-point math**: different CPUs can produce different
//!   results. The core uses fixed-point arithmetic throughout.
//! - **HashMap iteration order**: the simulation iterates the dense actor
//!   table in index order and never hashes for iteration.
//! - **System randomness**: the core takes no randomness at all.

use skirmish_core::math::Fixed;
use skirmish_core::state::State;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Final state hash from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated per run.
    pub ticks: u64,
}

impl DeterminismResult {
    /// All unique hashes (should be 1 for a deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error
    /// message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run the same scripted battle `runs` times and compare final hashes.
///
/// `build` constructs a fresh world per run; `script` is invoked before
/// every tick with the state and the upcoming tick index, and issues
/// whatever commands the scenario calls for.
pub fn run_scripted<B, S>(build: B, script: S, ticks: u64, runs: usize) -> DeterminismResult
where
    B: Fn() -> State,
    S: Fn(&mut State, u64),
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = build();
        for tick in 0..ticks {
            script(&mut state, tick);
            state.update(Fixed::ONE);
        }
        hashes.push(state.state_hash());
    }

    let is_deterministic = hashes.windows(2).all(|pair| pair[0] == pair[1]);
    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run an unscripted battle `runs` times and compare final hashes.
pub fn run_identical<B>(build: B, ticks: u64, runs: usize) -> DeterminismResult
where
    B: Fn() -> State,
{
    run_scripted(build, |_, _| {}, ticks, runs)
}
