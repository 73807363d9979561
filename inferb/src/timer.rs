use crate::platform::Platform;

/// A high resolution timer started at a fixed tick.
///
/// Starting and sampling are both fenced on each side by a full barrier, so work
/// before [`Timer::start`] cannot leak into the timed region and work after
/// [`Timer::elapsed`] cannot be pulled into it.
#[derive(Debug, Clone, Copy)]
pub struct Timer<'p, P: Platform> {
    platform: &'p P,
    start: u64,
    rate: f64,
}

impl<'p, P: Platform> Timer<'p, P> {
    #[inline(always)]
    pub fn start(platform: &'p P) -> Self {
        platform.barrier();
        let start = platform.monotonic_ticks();
        platform.barrier();
        Self {
            platform,
            start,
            rate: platform.nanos_per_tick(),
        }
    }

    /// Nanoseconds since the timer was started.
    #[inline(always)]
    pub fn elapsed(&self) -> f64 {
        self.platform.barrier();
        let now = self.platform.monotonic_ticks();
        self.platform.barrier();
        now.saturating_sub(self.start) as f64 * self.rate
    }
}
