//! Size-reduction loop: lower the encode quality until the file fits the
//! byte budget or the quality floor is reached.
//!
//! The loop is expressed as an explicit [`ReductionState`] advanced one
//! encode at a time, so the termination policy can be tested with synthetic
//! size sequences and no images at all. [`run_reduction`] drives the state
//! with a caller-supplied encode step that returns the measured size.
//!
//! With the default policy (budget 200 KiB, start 100, step 10, floor 40) the
//! attempted qualities are `90, 80, 70, 60, 50`; the floor itself is never
//! attempted. Ending above budget after quality 50 is not an error.

use super::params::Quality;

/// Termination policy for the reduction loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReductionPolicy {
    /// Target ceiling in KiB (inclusive).
    pub budget_kib: u64,
    /// Quality the loop starts from; never encoded itself.
    pub start_quality: u32,
    /// Decrement applied before each encode.
    pub step: u32,
    /// Exclusive lower bound: qualities `<= floor` are never attempted.
    pub floor: u32,
}

impl Default for ReductionPolicy {
    fn default() -> Self {
        Self {
            budget_kib: 200,
            start_quality: 100,
            step: 10,
            floor: 40,
        }
    }
}

impl ReductionPolicy {
    pub fn is_within_budget(&self, size_kib: u64) -> bool {
        size_kib <= self.budget_kib
    }
}

/// Loop state carried between iterations: the last quality tried and the
/// size measured after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReductionState {
    /// `None` before the first lossy encode.
    pub quality: Option<u32>,
    pub size_kib: u64,
}

impl ReductionState {
    /// State right after the compression pass.
    pub fn start(size_kib: u64) -> Self {
        Self {
            quality: None,
            size_kib,
        }
    }

    /// The next quality to encode at, or `None` if the loop is finished.
    pub fn next_quality(&self, policy: &ReductionPolicy) -> Option<u32> {
        if policy.is_within_budget(self.size_kib) || policy.step == 0 {
            return None;
        }
        let current = self.quality.unwrap_or(policy.start_quality);
        current
            .checked_sub(policy.step)
            .filter(|&next| next > policy.floor)
    }

    pub fn advance(self, quality: u32, size_kib: u64) -> Self {
        Self {
            quality: Some(quality),
            size_kib,
        }
    }
}

/// One lossy encode and the size it produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub quality: u32,
    pub size_kib: u64,
}

/// Result of a full reduction run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction {
    /// Size before the loop started (after the compression pass).
    pub initial_kib: u64,
    pub attempts: Vec<Attempt>,
}

impl Reduction {
    pub fn final_kib(&self) -> u64 {
        self.attempts
            .last()
            .map(|a| a.size_kib)
            .unwrap_or(self.initial_kib)
    }

    pub fn final_quality(&self) -> Option<u32> {
        self.attempts.last().map(|a| a.quality)
    }
}

/// Run the loop from `initial_kib`, calling `encode_at` for each quality.
///
/// `encode_at` must persist the re-encoded file and return its size in KiB as
/// measured from disk. The first error aborts the loop.
pub fn run_reduction<E>(
    policy: &ReductionPolicy,
    initial_kib: u64,
    mut encode_at: impl FnMut(Quality) -> Result<u64, E>,
) -> Result<Reduction, E> {
    let mut state = ReductionState::start(initial_kib);
    let mut attempts = Vec::new();

    while let Some(quality) = state.next_quality(policy) {
        let size_kib = encode_at(Quality::new(quality))?;
        attempts.push(Attempt { quality, size_kib });
        state = state.advance(quality, size_kib);
    }

    Ok(Reduction {
        initial_kib,
        attempts,
    })
}
