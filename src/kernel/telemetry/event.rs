use serde::{Deserialize, Serialize};

use super::metrics::SignalLevel;
use crate::kernel::time::Tick;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryEvent {
    FrameClassified {
        tick: Tick,
        speech: bool,
    },

    SegmentStarted {
        tick: Tick,
    },

    SegmentEnded {
        tick: Tick,
        duration_ms: u64,
        frames: u64,
        flushed: bool,
    },

    /// Classifier error; the window's vote was skipped.
    ClassifierFault {
        tick: Tick,
    },

    /// Classification took longer than the window it classified.
    Overrun {
        tick: Tick,
        elapsed_us: u64,
        budget_us: u64,
    },

    Signal {
        tick: Tick,
        level: SignalLevel,
    },
}
