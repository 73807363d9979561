//! Common code for the cache time inference of a single byte
//!
//! A probe array of 256 slots is flushed out of the data cache, the slot named by
//! the secret byte is touched, and every slot is then timed. The slot that comes
//! back from the cache fastest is the value of the byte (Flush+Reload).
//!
//! ```no_run
//! use inferb::{InferConfig, Inferrer, NativePlatform};
//!
//! let secret = 42u8;
//! let platform = NativePlatform::detect()?;
//! let inferrer = Inferrer::new(platform, InferConfig::default())?;
//! let inference = inferrer.infer(&secret)?;
//! println!("{} in {}ns", inference.value, inference.elapsed_ns);
//! # Ok::<(), inferb::InferError>(())
//! ```
pub mod config;
pub mod engine;
pub mod error;
pub mod platform;
pub mod probe;
pub mod samples;
pub mod timer;

pub use config::{
    InferConfig, DEFAULT_ITERATIONS, DEFAULT_RETRIES_IF_ZERO, DEFAULT_SPACING, SLOT_COUNT,
};
pub use engine::{retry_if_zero, Inference, Inferrer};
pub use error::{InferError, Result};
pub use platform::{NativePlatform, Platform, SimulatedPlatform, CACHE_LINE_SIZE};
pub use probe::ProbeArray;
pub use samples::TimingSamples;
pub use timer::Timer;
