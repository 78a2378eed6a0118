//! Detector statistics and observability.
//!
//! # PRIVACY INVARIANT
//! Telemetry events must **NEVER** carry audio. Only ticks, durations,
//! counts and signal levels are allowed.
//!
//! # READ-ONLY
//! Nothing in the segmentation path reads telemetry back. Counters are
//! monotonic: they only ever grow, even across a detector reset.

pub mod event;
pub mod metrics;
pub mod recorder;
