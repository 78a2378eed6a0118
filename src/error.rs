use thiserror::Error;

use crate::kernel::classifier::ClassifierError;
use crate::kernel::time::Tick;

#[derive(Debug, Error)]
pub enum VadError {
    #[error("unsupported sample rate {0} Hz (expected 8000, 16000, 32000 or 48000)")]
    UnsupportedSampleRate(u32),

    #[error("threshold {0} is outside [0, 1]")]
    InvalidThreshold(f32),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("window of {actual} samples, expected {expected}")]
    WindowSize { expected: usize, actual: usize },

    /// The window was consumed but its vote was skipped. Segmentation state is untouched.
    #[error("classifier failed on frame {}: {source}", .tick.frame)]
    Classifier {
        tick: Tick,
        #[source]
        source: ClassifierError,
    },

    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),

    #[error("resampling failed: {0}")]
    Resample(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl VadError {
    /// True for per-window faults a streaming caller can log and move past.
    pub fn is_transient(&self) -> bool {
        matches!(self, VadError::Classifier { .. })
    }
}
