use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::debug;

use crate::error::VadError;
use crate::kernel::audio::convert;

const RESAMPLE_CHUNK: usize = 1024;

/// Mono float samples and their rate.
#[derive(Debug, Clone, PartialEq)]
pub struct MonoAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl MonoAudio {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Reads any PCM or float WAV, down-mixed to mono.
pub fn read_mono(path: impl AsRef<Path>) -> Result<MonoAudio, VadError> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    debug!(
        "WAV: {}Hz, {} channels, {} bits, {:?}",
        spec.sample_rate, spec.channels, spec.bits_per_sample, spec.sample_format
    );

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    Ok(MonoAudio {
        samples: convert::downmix(&interleaved, spec.channels as usize),
        sample_rate: spec.sample_rate,
    })
}

/// Sinc resampling to `target_rate`. Returns the input untouched when the rates already match.
pub fn resample(audio: MonoAudio, target_rate: u32) -> Result<MonoAudio, VadError> {
    if audio.sample_rate == target_rate || audio.samples.is_empty() {
        return Ok(MonoAudio {
            sample_rate: if audio.samples.is_empty() { target_rate } else { audio.sample_rate },
            samples: audio.samples,
        });
    }

    let ratio = target_rate as f64 / audio.sample_rate as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, RESAMPLE_CHUNK, 1)
        .map_err(|e| VadError::Resample(e.to_string()))?;

    let expected = (audio.samples.len() as f64 * ratio).round() as usize;
    let mut output = Vec::with_capacity(expected + RESAMPLE_CHUNK);
    let mut chunk = vec![vec![0.0f32; RESAMPLE_CHUNK]];

    // Trailing zeros flush the filter delay.
    let delay = resampler.output_delay();
    let mut pos = 0;
    while output.len() < expected + delay {
        let end = (pos + RESAMPLE_CHUNK).min(audio.samples.len());
        chunk[0].fill(0.0);
        if pos < end {
            chunk[0][..end - pos].copy_from_slice(&audio.samples[pos..end]);
        }
        pos += RESAMPLE_CHUNK;

        let out = resampler
            .process(&chunk, None)
            .map_err(|e| VadError::Resample(e.to_string()))?;
        output.extend_from_slice(&out[0]);
    }

    let samples: Vec<f32> = output.into_iter().skip(delay).take(expected).collect();
    Ok(MonoAudio {
        samples,
        sample_rate: target_rate,
    })
}

pub fn pcm16_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Writes PCM16-LE bytes as a mono 16-bit WAV.
pub fn write_pcm16(path: impl AsRef<Path>, sample_rate: u32, pcm: &[u8]) -> Result<(), VadError> {
    let mut writer = WavWriter::create(path, pcm16_spec(sample_rate))?;
    for sample in convert::pcm16_samples(pcm) {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Appends speech audio to one long recording.
pub struct SessionRecorder {
    writer: WavWriter<BufWriter<File>>,
    samples: u64,
}

impl SessionRecorder {
    pub fn create(path: impl AsRef<Path>, sample_rate: u32) -> Result<Self, VadError> {
        Ok(Self {
            writer: WavWriter::create(path, pcm16_spec(sample_rate))?,
            samples: 0,
        })
    }

    pub fn append(&mut self, pcm: &[u8]) -> Result<(), VadError> {
        for sample in convert::pcm16_samples(pcm) {
            self.writer.write_sample(sample)?;
            self.samples += 1;
        }
        Ok(())
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn finalize(self) -> Result<(), VadError> {
        self.writer.finalize()?;
        Ok(())
    }
}
