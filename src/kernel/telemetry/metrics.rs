use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::event::TelemetryEvent;

/// Monotonic detector counters. Purely additive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityStats {
    pub total_frames: u64,
    pub speech_frames: u64,
    pub segments_started: u64,
    pub segments_ended: u64,
    pub segments_flushed: u64,
    pub classifier_faults: u64,
    pub overruns: u64,
    pub speech_ms: u64,
}

impl ActivityStats {
    /// `speech_frames / total_frames`, 0 before the first frame.
    pub fn speech_activity_ratio(&self) -> f64 {
        if self.total_frames == 0 {
            return 0.0;
        }
        self.speech_frames as f64 / self.total_frames as f64
    }

    /// Stream time covered by the classified frames.
    pub fn running_time(&self, window: Duration) -> Duration {
        window.saturating_mul(self.total_frames.min(u32::MAX as u64) as u32)
    }

    pub fn apply(&mut self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::FrameClassified { speech, .. } => {
                self.total_frames += 1;
                if *speech {
                    self.speech_frames += 1;
                }
            }
            TelemetryEvent::SegmentStarted { .. } => self.segments_started += 1,
            TelemetryEvent::SegmentEnded { duration_ms, flushed, .. } => {
                self.segments_ended += 1;
                if *flushed {
                    self.segments_flushed += 1;
                }
                self.speech_ms += duration_ms;
            }
            TelemetryEvent::ClassifierFault { .. } => self.classifier_faults += 1,
            TelemetryEvent::Overrun { .. } => self.overruns += 1,
            TelemetryEvent::Signal { .. } => {}
        }
    }
}

/// Level measurements for one window, on the 16-bit sample scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalLevel {
    pub rms: f64,
    /// 20th percentile of absolute sample values.
    pub noise_floor: f64,
    pub snr_db: f64,
}

const NOISE_FLOOR_PERCENTILE: f64 = 0.2;

impl SignalLevel {
    pub fn measure(samples: &[f32]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let scaled: Vec<f64> = samples.iter().map(|&s| s as f64 * 32768.0).collect();
        let rms = (scaled.iter().map(|s| s * s).sum::<f64>() / scaled.len() as f64).sqrt();

        let mut magnitudes: Vec<f64> = scaled.iter().map(|s| s.abs()).collect();
        magnitudes.sort_by(|a, b| a.total_cmp(b));
        let index = ((magnitudes.len() as f64 * NOISE_FLOOR_PERCENTILE) as usize).min(magnitudes.len() - 1);
        let noise_floor = magnitudes[index];

        let snr_db = 20.0 * (rms.max(1.0) / noise_floor.max(1.0)).log10();
        Self { rms, noise_floor, snr_db }
    }

    pub fn noise_floor_db(&self) -> f64 {
        20.0 * self.noise_floor.max(1.0).log10()
    }
}

/// Running mean, extremes and sample standard deviation (Welford).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningSummary {
    pub count: u64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    m2: f64,
}

impl RunningSummary {
    pub fn push(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn std_dev(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        (self.m2 / (self.count - 1) as f64).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_tracks_mean_and_spread() {
        let mut s = RunningSummary::default();
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            s.push(v);
        }
        assert_eq!(s.count, 8);
        assert!((s.mean - 5.0).abs() < 1e-12);
        assert_eq!(s.min, 2.0);
        assert_eq!(s.max, 9.0);
        assert!((s.std_dev() - 2.138089935).abs() < 1e-6);
    }

    #[test]
    fn silence_has_zero_snr() {
        let level = SignalLevel::measure(&[0.0; 512]);
        assert_eq!(level.rms, 0.0);
        assert_eq!(level.snr_db, 0.0);
    }
}
