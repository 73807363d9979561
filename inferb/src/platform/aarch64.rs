use std::arch::asm;

use crate::error::{InferError, Result};

pub(super) fn detect() -> Result<f64> {
    let frequency = counter_frequency();
    if frequency == 0 {
        return Err(InferError::CapabilityUnavailable(
            "cntfrq_el0 reports a zero counter frequency",
        ));
    }
    Ok(1e9 / frequency as f64)
}

fn counter_frequency() -> u64 {
    let frequency: u64;
    unsafe {
        asm!(
            "mrs {}, cntfrq_el0",
            out(reg) frequency,
            options(nomem, nostack, preserves_flags)
        );
    }
    frequency
}

/// Clean and invalidate to the point of coherency.
#[inline(always)]
pub(super) unsafe fn evict_line(addr: *const u8) {
    asm!(
        "dc civac, {0}",
        in(reg) addr,
        options(nostack, preserves_flags)
    );
}

#[inline(always)]
pub(super) fn ticks() -> u64 {
    let count: u64;
    unsafe {
        asm!(
            "mrs {}, cntvct_el0",
            out(reg) count,
            options(nomem, nostack, preserves_flags)
        );
    }
    count
}

/// The `asm!` block leaves out `nomem`, so it is a compiler memory fence as well
/// as a hardware one.
#[inline(always)]
pub(super) fn barrier() {
    unsafe {
        asm!("dsb ish", "isb", options(nostack, preserves_flags));
    }
}
