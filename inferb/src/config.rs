//! Tunables of the inference.
//!
//! Bumping `spacing` keeps the prefetcher from pulling the next slot in while the
//! probe array is being timed, and bumping `iterations` improves accuracy, both at
//! the cost of a slower run.
use crate::error::{InferError, Result};
use crate::platform::CACHE_LINE_SIZE;

/// One slot per value an 8-bit byte can take.
pub const SLOT_COUNT: usize = u8::MAX as usize + 1;

pub const DEFAULT_SPACING: usize = 16 * 1024;

pub const DEFAULT_ITERATIONS: u32 = 20;

/// CPUs tend to hand back zero as a placeholder for a byte they refused to load,
/// so a zero decision is retried up to this many attempts.
pub const DEFAULT_RETRIES_IF_ZERO: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferConfig {
    /// Number of probe slots. Must be `SLOT_COUNT`.
    pub slot_count: usize,
    /// Distance in bytes between two consecutive slots.
    pub spacing: usize,
    /// Probe rounds accumulated before deciding.
    pub iterations: u32,
    /// Maximum number of attempts while the decision is zero. 1 disables retrying.
    pub retries_if_zero: u32,
}

impl Default for InferConfig {
    fn default() -> Self {
        Self {
            slot_count: SLOT_COUNT,
            spacing: DEFAULT_SPACING,
            iterations: DEFAULT_ITERATIONS,
            retries_if_zero: DEFAULT_RETRIES_IF_ZERO,
        }
    }
}

impl InferConfig {
    pub fn with_spacing(mut self, spacing: usize) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_retries_if_zero(mut self, retries_if_zero: u32) -> Self {
        self.retries_if_zero = retries_if_zero;
        self
    }

    /// Size in bytes of one probe array laid out with this configuration.
    pub fn probe_len(&self) -> Option<usize> {
        self.slot_count.checked_mul(self.spacing)
    }

    pub fn validate(&self) -> Result<()> {
        if self.slot_count != SLOT_COUNT {
            return Err(InferError::InvalidSlotCount {
                expected: SLOT_COUNT,
                found: self.slot_count,
            });
        }
        if self.spacing < CACHE_LINE_SIZE {
            return Err(InferError::SpacingTooSmall {
                spacing: self.spacing,
                line: CACHE_LINE_SIZE,
            });
        }
        if self.probe_len().is_none() {
            return Err(InferError::ProbeTooLarge {
                slot_count: self.slot_count,
                spacing: self.spacing,
            });
        }
        if self.iterations == 0 {
            return Err(InferError::ZeroIterations);
        }
        if self.retries_if_zero == 0 {
            return Err(InferError::ZeroRetries);
        }
        Ok(())
    }
}
