use ringbuf::traits::Consumer;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DetectorConfig;
use crate::error::VadError;
use crate::kernel::classifier::Classifier;
use crate::kernel::detector::SpeechDetector;
use crate::kernel::event::{FrameResult, SpeechEnded, SpeechStarted};
use crate::kernel::telemetry::recorder::TelemetrySnapshot;
use crate::kernel::time::Tick;

const IDLE_SLEEP: Duration = Duration::from_millis(5);

/// Messages from the processing thread to the front-end.
#[derive(Debug, Clone)]
pub enum DetectorMessage {
    Started(SpeechStarted),
    Ended(SpeechEnded),
    Status {
        frame: FrameResult,
        snapshot: TelemetrySnapshot,
    },
    Fault {
        tick: Tick,
        message: String,
    },
    Stopped(TelemetrySnapshot),
}

/// Owns the detector on a dedicated thread: drains the capture queue,
/// segments, and forwards events. All segmentation state lives here, so
/// nothing is shared with the capture callback except the lock-free queue.
pub struct AudioProcessor<C>
where
    C: Consumer<Item = f32> + Send,
{
    consumer: C,
    tx: mpsc::Sender<DetectorMessage>,
    config: DetectorConfig,
    cancel: CancellationToken,
}

impl<C> AudioProcessor<C>
where
    C: Consumer<Item = f32> + Send,
{
    pub fn new(consumer: C, tx: mpsc::Sender<DetectorMessage>, config: DetectorConfig, cancel: CancellationToken) -> Self {
        Self {
            consumer,
            tx,
            config,
            cancel,
        }
    }

    /// Runs until cancelled, then drains the queue and ends the stream with
    /// the configured flush policy. Must run on a plain thread, not inside
    /// the async runtime.
    pub fn run(self) -> Result<TelemetrySnapshot, VadError> {
        let classifier = super::build_classifier(&self.config.classifier, self.config.sample_rate)?;
        self.run_with(classifier)
    }

    pub fn run_with<K: Classifier>(mut self, classifier: K) -> Result<TelemetrySnapshot, VadError> {
        let mut detector = SpeechDetector::new(&self.config, classifier)?;
        info!("Audio Processor Started. Rate: {}Hz", detector.sample_rate());

        let started_tx = self.tx.clone();
        detector.listeners_mut().speech_started.subscribe(move |event| {
            info!("Audio Control: Speech START detected");
            let _ = started_tx.blocking_send(DetectorMessage::Started(event.clone()));
        });
        let ended_tx = self.tx.clone();
        detector.listeners_mut().speech_ended.subscribe(move |event| {
            info!("Audio Control: Speech END detected ({:?})", event.duration());
            let _ = ended_tx.blocking_send(DetectorMessage::Ended(event.clone()));
        });

        let mut chunk = vec![0.0f32; detector.window_size()];
        let mut last_status_frame = 0u64;

        loop {
            let stopping = self.cancel.is_cancelled();

            let read = self.consumer.pop_slice(&mut chunk);
            if read == 0 {
                if stopping {
                    break;
                }
                std::thread::sleep(IDLE_SLEEP);
                continue;
            }

            self.feed(&mut detector, &chunk[..read])?;

            let interval = self.config.status_interval_frames;
            let total = detector.stats().total_frames;
            if interval > 0 && total / interval > last_status_frame / interval {
                last_status_frame = total;
                if let Some(frame) = detector.last_frame() {
                    let _ = self.tx.blocking_send(DetectorMessage::Status {
                        frame: *frame,
                        snapshot: detector.telemetry().snapshot(),
                    });
                }
            }
        }

        debug!("Audio Processor draining; {} samples buffered", detector.buffered());
        detector.finish();

        let snapshot = detector.telemetry().snapshot();
        let _ = self.tx.blocking_send(DetectorMessage::Stopped(snapshot.clone()));
        info!("Audio Processor Stopped after {} frames", snapshot.stats.total_frames);
        Ok(snapshot)
    }

    /// Classifier faults are reported and skipped; the windows behind a
    /// fault are retried right away so none are left waiting for more input.
    fn feed<K: Classifier>(&self, detector: &mut SpeechDetector<K>, samples: &[f32]) -> Result<(), VadError> {
        let mut result = detector.feed_samples(samples);
        loop {
            match result {
                Ok(_) => return Ok(()),
                Err(VadError::Classifier { tick, source }) => {
                    warn!("Skipping frame {}: {}", tick.frame, source);
                    let _ = self.tx.blocking_send(DetectorMessage::Fault {
                        tick,
                        message: source.to_string(),
                    });
                    result = detector.drain();
                }
                Err(e) => return Err(e),
            }
        }
    }
}
