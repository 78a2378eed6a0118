use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::VadError;
use crate::kernel::audio::segmenter::FlushPolicy;
use crate::kernel::classifier::EnergyParams;
use crate::kernel::time::{is_supported_rate, window_size_for};
use crate::kernel::timestamps::TimestampParams;

/// Aggressiveness of the WebRTC detector, least to most.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebRtcMode {
    Quality,
    LowBitrate,
    #[default]
    Aggressive,
    VeryAggressive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierKind {
    Energy(EnergyParams),
    #[serde(rename = "webrtc")]
    WebRtc {
        #[serde(default)]
        mode: WebRtcMode,
    },
}

impl Default for ClassifierKind {
    fn default() -> Self {
        ClassifierKind::Energy(EnergyParams::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub sample_rate: u32,
    /// Probability at or above which a window is speech.
    pub threshold: f32,
    pub flush_policy: FlushPolicy,
    pub classifier: ClassifierKind,
    /// Frames between live status reports. 0 disables them.
    pub status_interval_frames: u64,
    /// Capture queue size in seconds of audio.
    pub capture_buffer_secs: f32,
    pub timestamps: TimestampParams,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            threshold: 0.5,
            flush_policy: FlushPolicy::Emit,
            classifier: ClassifierKind::default(),
            status_interval_frames: 50,
            capture_buffer_secs: 2.0,
            timestamps: TimestampParams::default(),
        }
    }
}

impl DetectorConfig {
    pub fn from_json_str(json: &str) -> Result<Self, VadError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, VadError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), VadError> {
        if !is_supported_rate(self.sample_rate) {
            return Err(VadError::UnsupportedSampleRate(self.sample_rate));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(VadError::InvalidThreshold(self.threshold));
        }
        if let ClassifierKind::Energy(params) = &self.classifier {
            if !(params.floor_rms > 0.0 && params.floor_rms < params.ceiling_rms) {
                return Err(VadError::InvalidConfig(format!(
                    "energy floor {} must be positive and below ceiling {}",
                    params.floor_rms, params.ceiling_rms
                )));
            }
        }
        if !(self.capture_buffer_secs > 0.0) {
            return Err(VadError::InvalidConfig(format!(
                "capture buffer of {}s",
                self.capture_buffer_secs
            )));
        }
        if let Some(secs) = self.timestamps.max_speech_secs {
            if !(secs > 0.0) {
                return Err(VadError::InvalidConfig(format!("max speech of {secs}s")));
            }
        }
        Ok(())
    }

    pub fn window_size(&self) -> usize {
        window_size_for(self.sample_rate)
    }

    /// Capture queue capacity in samples, never less than a few windows.
    pub fn capture_capacity(&self) -> usize {
        let samples = (self.sample_rate as f32 * self.capture_buffer_secs) as usize;
        samples.max(self.window_size() * 4)
    }
}
