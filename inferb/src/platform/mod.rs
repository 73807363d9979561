//! The handful of hardware facilities the inference depends on.
//!
//! Everything the engine needs from the CPU goes through [`Platform`]: cache line
//! eviction, a monotonic tick counter with its rate, a full ordering barrier, and
//! a load the compiler is not allowed to drop. [`NativePlatform`] issues the real
//! instructions, [`SimulatedPlatform`] models a cache for tests.
use std::ptr;

use crate::error::Result;

#[cfg(target_arch = "aarch64")]
#[path = "aarch64.rs"]
mod arch;
#[cfg(target_arch = "x86_64")]
#[path = "x86_64.rs"]
mod arch;
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[path = "unsupported.rs"]
mod arch;
mod simulated;

pub use simulated::SimulatedPlatform;

/// Size of a single cache line. This is 64 bytes on the x86_64 and arm64 parts
/// we target, Apple Silicon included, though it could be read from `CTR_EL0` or
/// `cpuid` instead.
pub const CACHE_LINE_SIZE: usize = 64;

pub trait Platform {
    /// Cleans and invalidates, from every data cache level of the current core,
    /// each cache line touching `[start, start + len)`. Dirty lines are written
    /// back first. No ordering is implied; call [`Platform::barrier`] afterwards.
    ///
    /// # Safety
    ///
    /// The whole range must be mapped memory of this process.
    unsafe fn evict_range(&self, start: *const u8, len: usize);

    /// Current value of the monotonic tick counter.
    fn monotonic_ticks(&self) -> u64;

    /// Nanoseconds per tick of [`Platform::monotonic_ticks`].
    fn nanos_per_tick(&self) -> f64;

    /// Full memory and instruction barrier. Nothing before it in program order
    /// may complete after it, and it is a compiler fence too.
    fn barrier(&self);

    /// Loads one byte. The load is always performed.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads.
    unsafe fn load(&self, ptr: *const u8) -> u8;
}

/// Start addresses of the cache lines touching `[start, start + len)`.
pub(crate) fn lines(start: *const u8, len: usize) -> impl Iterator<Item = usize> {
    let first = start as usize & !(CACHE_LINE_SIZE - 1);
    let end = if len == 0 {
        first
    } else {
        (start as usize).saturating_add(len)
    };
    (first..end).step_by(CACHE_LINE_SIZE)
}

/// The cache maintenance and timer instructions of the running CPU.
#[derive(Debug, Clone, Copy)]
pub struct NativePlatform {
    nanos_per_tick: f64,
}

impl NativePlatform {
    /// Checks that this CPU can evict lines and count ticks from user mode, and
    /// captures the tick rate.
    pub fn detect() -> Result<Self> {
        let nanos_per_tick = arch::detect()?;
        log::debug!("native tick rate: {:.4}ns per tick", nanos_per_tick);
        Ok(Self { nanos_per_tick })
    }
}

impl Platform for NativePlatform {
    unsafe fn evict_range(&self, start: *const u8, len: usize) {
        for line in lines(start, len) {
            arch::evict_line(line as *const u8);
        }
    }

    #[inline(always)]
    fn monotonic_ticks(&self) -> u64 {
        arch::ticks()
    }

    fn nanos_per_tick(&self) -> f64 {
        self.nanos_per_tick
    }

    #[inline(always)]
    fn barrier(&self) {
        arch::barrier();
    }

    #[inline(always)]
    unsafe fn load(&self, ptr: *const u8) -> u8 {
        ptr::read_volatile(ptr)
    }
}
