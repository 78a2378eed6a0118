//! Deterministic core: windowing, classification boundary, segmentation,
//! listeners and telemetry. No device or file I/O happens in here.

pub mod audio;
pub mod classifier;
pub mod detector;
pub mod event;
pub mod listeners;
pub mod telemetry;
pub mod time;
pub mod timestamps;
