use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Position on the stream clock. One tick is one analysis window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tick {
    pub frame: u64,
}

/// Window length at the reference rate. Every supported rate scales to the same 32 ms.
pub const REFERENCE_WINDOW: usize = 512;
pub const REFERENCE_RATE: u32 = 16_000;

pub const SUPPORTED_RATES: [u32; 4] = [8_000, 16_000, 32_000, 48_000];

impl Tick {
    pub fn new() -> Self {
        Tick { frame: 0 }
    }

    pub fn next(&self) -> Self {
        Tick { frame: self.frame + 1 }
    }
}

pub fn is_supported_rate(sample_rate: u32) -> bool {
    SUPPORTED_RATES.contains(&sample_rate)
}

/// 512 samples at 16 kHz, scaled linearly for the other rates.
pub fn window_size_for(sample_rate: u32) -> usize {
    (REFERENCE_WINDOW as u64 * sample_rate as u64 / REFERENCE_RATE as u64) as usize
}

/// Converts ticks to stream offsets. Time is derived from sample counts,
/// never from the wall clock, so replaying a stream reproduces its timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamClock {
    sample_rate: u32,
    window_size: usize,
}

impl StreamClock {
    pub fn new(sample_rate: u32, window_size: usize) -> Self {
        Self { sample_rate, window_size }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn window_duration(&self) -> Duration {
        self.samples_to_duration(self.window_size as u64)
    }

    /// Offset of the first sample of the window at `tick`.
    pub fn at(&self, tick: Tick) -> Duration {
        self.samples_to_duration(tick.frame * self.window_size as u64)
    }

    pub fn samples_to_duration(&self, samples: u64) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let nanos = samples as u128 * 1_000_000_000 / self.sample_rate as u128;
        Duration::from_nanos(nanos as u64)
    }
}
