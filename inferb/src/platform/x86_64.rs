use std::arch::x86_64::{__cpuid, _mm_clflush, _mm_lfence, _mm_mfence, _rdtsc};
use std::sync::atomic::{compiler_fence, Ordering};
use std::time::{Duration, Instant};

use lazy_static::lazy_static;

use crate::error::{InferError, Result};

/// How long the time stamp counter is compared against the OS clock.
const CALIBRATION_WINDOW: Duration = Duration::from_millis(20);

// CPUID leaf 1, EDX
const TSC: u32 = 1 << 4;
const CLFSH: u32 = 1 << 19;

lazy_static! {
    static ref NANOS_PER_TICK: Option<f64> = calibrate();
}

pub(super) fn detect() -> Result<f64> {
    let edx = unsafe { __cpuid(1) }.edx;
    check_features(edx)?;
    NANOS_PER_TICK.ok_or(InferError::CapabilityUnavailable(
        "the time stamp counter does not advance",
    ))
}

fn check_features(edx: u32) -> Result<()> {
    if edx & CLFSH == 0 {
        return Err(InferError::CapabilityUnavailable(
            "CPUID does not report clflush",
        ));
    }
    if edx & TSC == 0 {
        return Err(InferError::CapabilityUnavailable(
            "CPUID does not report a time stamp counter",
        ));
    }
    Ok(())
}

/// The TSC has no architectural rate, so it is measured once per process.
fn calibrate() -> Option<f64> {
    barrier();
    let wall = Instant::now();
    let start = ticks();
    while wall.elapsed() < CALIBRATION_WINDOW {
        std::hint::spin_loop();
    }
    barrier();
    let elapsed = ticks().wrapping_sub(start);
    let nanos = wall.elapsed().as_nanos() as f64;

    let rate = nanos / elapsed as f64;
    log::debug!("calibrated TSC: {} ticks in {}ns", elapsed, nanos);
    (elapsed > 0 && rate.is_finite()).then_some(rate)
}

#[inline(always)]
pub(super) unsafe fn evict_line(addr: *const u8) {
    _mm_clflush(addr);
}

#[inline(always)]
pub(super) fn ticks() -> u64 {
    unsafe { _rdtsc() }
}

#[inline(always)]
pub(super) fn barrier() {
    compiler_fence(Ordering::SeqCst);
    unsafe {
        _mm_mfence();
        _mm_lfence();
    }
    compiler_fence(Ordering::SeqCst);
}
