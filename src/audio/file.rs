use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use super::wav::{self, MonoAudio};
use crate::config::DetectorConfig;
use crate::error::VadError;
use crate::kernel::classifier::{checked_probability, Classifier};
use crate::kernel::time::Tick;
use crate::kernel::timestamps::{speech_timestamps, SpeechTimestamp};

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub sample_rate: u32,
    pub duration_secs: f64,
    pub frames: usize,
    /// Windows whose classification failed; scored as silence.
    pub faulted_frames: usize,
    pub segments: Vec<SpeechTimestamp>,
}

impl FileReport {
    pub fn speech_secs(&self) -> f64 {
        self.segments.iter().map(|s| s.duration_secs()).sum()
    }
}

/// Batch detection over a WAV file: resample to the configured rate,
/// classify every full window, then extract padded speech timestamps.
pub fn detect_file(path: impl AsRef<Path>, config: &DetectorConfig) -> Result<FileReport, VadError> {
    config.validate()?;
    let path = path.as_ref();
    info!("Analysing {}", path.display());

    let audio = wav::resample(wav::read_mono(path)?, config.sample_rate)?;
    let mut classifier = super::build_classifier(&config.classifier, config.sample_rate)?;
    detect_audio(&audio, config, &mut classifier)
}

pub fn detect_audio<C: Classifier + ?Sized>(
    audio: &MonoAudio,
    config: &DetectorConfig,
    classifier: &mut C,
) -> Result<FileReport, VadError> {
    if audio.sample_rate != config.sample_rate {
        return Err(VadError::UnsupportedSampleRate(audio.sample_rate));
    }
    let window_size = config.window_size();

    let mut probabilities = Vec::with_capacity(audio.samples.len() / window_size + 1);
    let mut faulted = 0;
    for (i, window) in audio.samples.chunks_exact(window_size).enumerate() {
        let p = classifier
            .classify(window, audio.sample_rate)
            .and_then(checked_probability)
            .unwrap_or_else(|e| {
                warn!("{}", VadError::Classifier { tick: Tick { frame: i as u64 }, source: e });
                faulted += 1;
                0.0
            });
        probabilities.push(p);
    }

    let segments = speech_timestamps(
        &probabilities,
        config.threshold,
        &config.timestamps,
        audio.sample_rate,
        window_size,
        audio.samples.len(),
    );

    Ok(FileReport {
        sample_rate: audio.sample_rate,
        duration_secs: audio.duration_secs(),
        frames: probabilities.len(),
        faulted_frames: faulted,
        segments,
    })
}
