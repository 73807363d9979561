use thiserror::Error;

pub type Result<T> = std::result::Result<T, InferError>;

#[derive(Debug, Error)]
pub enum InferError {
    /// The probe array could not be mapped. Fatal, never retried.
    #[error("could not allocate a probe array of {len} bytes")]
    ProbeAllocation {
        len: usize,
        #[source]
        source: rustix::io::Errno,
    },

    #[error("{slot_count} slots spaced {spacing} bytes apart do not fit the address space")]
    ProbeTooLarge { slot_count: usize, spacing: usize },

    /// The running CPU lacks the eviction or the timing primitive.
    #[error("cache timing is not available on this machine: {0}")]
    CapabilityUnavailable(&'static str),

    #[error("the probe array needs exactly {expected} slots, got {found}")]
    InvalidSlotCount { expected: usize, found: usize },

    #[error("slot spacing of {spacing} bytes is smaller than a cache line ({line} bytes)")]
    SpacingTooSmall { spacing: usize, line: usize },

    #[error("at least one measurement iteration is needed per attempt")]
    ZeroIterations,

    #[error("at least one attempt is needed (1 disables the retry on zero)")]
    ZeroRetries,
}
