use std::sync::atomic::{fence, Ordering};

use crate::error::{InferError, Result};

pub(super) fn detect() -> Result<f64> {
    Err(InferError::CapabilityUnavailable(
        "no user-mode cache eviction instruction on this architecture",
    ))
}

// `detect` never succeeds, so these only keep `NativePlatform` compiling.

pub(super) unsafe fn evict_line(_addr: *const u8) {}

pub(super) fn ticks() -> u64 {
    0
}

pub(super) fn barrier() {
    fence(Ordering::SeqCst);
}
