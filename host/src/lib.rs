//! Harness around `inferb`: plants bytes, infers them back and scores the result.
pub mod affinity;
pub mod stats;
