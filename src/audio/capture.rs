use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::traits::Producer;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::kernel::audio::convert;
use crate::kernel::time::is_supported_rate;

/// Live microphone input. Samples are down-mixed to mono, normalized to
/// [-1, 1] and pushed into a bounded ring buffer; if the consumer falls
/// behind, the overflow is dropped here and counted in `dropped`.
pub struct AudioCapture {
    stream: cpal::Stream,
    pub sample_rate: u32,
    pub channels: u16,
    pub device_name: String,
    dropped: Arc<AtomicU64>,
    active: Arc<AtomicBool>,
}

impl AudioCapture {
    pub fn new<P>(producer: P, sample_rate: u32) -> Result<Self, anyhow::Error>
    where
        P: Producer<Item = f32> + Send + 'static,
    {
        if !is_supported_rate(sample_rate) {
            return Err(anyhow::anyhow!(
                "Unsupported sample rate: {}. VAD requires 8k, 16k, 32k, or 48k.",
                sample_rate
            ));
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow::anyhow!("No input device available"))?;
        let device_name = device.name().unwrap_or_default();
        info!("Audio Input Device: {}", device_name);

        // Prefer the fewest channels that support the requested rate.
        let mut candidates: Vec<_> = device
            .supported_input_configs()?
            .filter(|range| {
                range.min_sample_rate().0 <= sample_rate && range.max_sample_rate().0 >= sample_rate
            })
            .collect();
        candidates.sort_by_key(|range| range.channels());
        let config = candidates
            .into_iter()
            .next()
            .map(|range| range.with_sample_rate(cpal::SampleRate(sample_rate)))
            .ok_or_else(|| anyhow::anyhow!("Input device cannot capture at {}Hz", sample_rate))?;

        let channels = config.channels();
        info!(
            "Audio Config Selected: Rate={}Hz, Channels={}, Format={:?}",
            sample_rate,
            channels,
            config.sample_format()
        );

        let dropped = Arc::new(AtomicU64::new(0));
        let active = Arc::new(AtomicBool::new(true));
        let err_fn = |err| error!("an error occurred on stream: {}", err);
        let mut sink = CaptureSink::new(producer, channels as usize, dropped.clone(), active.clone());

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_input_stream(
                &config.into(),
                move |data: &[f32], _: &_| sink.write_f32(data),
                err_fn,
                None,
            )?,
            cpal::SampleFormat::I16 => device.build_input_stream(
                &config.into(),
                move |data: &[i16], _: &_| sink.write_i16(data),
                err_fn,
                None,
            )?,
            other => return Err(anyhow::anyhow!("Unsupported sample format {:?}", other)),
        };

        stream.play()?;

        Ok(Self {
            stream,
            sample_rate,
            channels,
            device_name,
            dropped,
            active,
        })
    }

    /// Stops feeding the queue: callbacks starting after this push nothing,
    /// and the device stream is paused where supported.
    pub fn stop(&self) {
        self.active.store(false, Ordering::Release);
        if let Err(e) = self.stream.pause() {
            warn!("Could not pause input stream: {}", e);
        }
        info!("Audio Capture stopped");
    }

    /// Samples lost to a full queue since capture started.
    pub fn dropped_samples(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Callback-side state: converts device frames and feeds the queue.
pub struct CaptureSink<P> {
    producer: P,
    channels: usize,
    scratch: Vec<f32>,
    dropped: Arc<AtomicU64>,
    active: Arc<AtomicBool>,
}

impl<P> CaptureSink<P>
where
    P: Producer<Item = f32>,
{
    pub fn new(producer: P, channels: usize, dropped: Arc<AtomicU64>, active: Arc<AtomicBool>) -> Self {
        Self {
            producer,
            channels: channels.max(1),
            scratch: Vec::new(),
            dropped,
            active,
        }
    }

    pub fn write_f32(&mut self, input: &[f32]) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        self.scratch.clear();
        if self.channels == 1 {
            self.scratch.extend_from_slice(input);
        } else {
            self.scratch.extend(
                input
                    .chunks_exact(self.channels)
                    .map(|frame| frame.iter().sum::<f32>() / self.channels as f32),
            );
        }
        self.push_scratch();
    }

    pub fn write_i16(&mut self, input: &[i16]) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        self.scratch.clear();
        self.scratch.extend(
            input
                .chunks_exact(self.channels)
                .map(|frame| frame.iter().map(|&s| convert::i16_to_f32(s)).sum::<f32>() / self.channels as f32),
        );
        self.push_scratch();
    }

    fn push_scratch(&mut self) {
        let pushed = self.producer.push_slice(&self.scratch);
        let lost = self.scratch.len() - pushed;
        if lost > 0 {
            let before = self.dropped.fetch_add(lost as u64, Ordering::Relaxed);
            if before == 0 {
                warn!("Capture queue full; dropping input");
            }
        }
    }
}
