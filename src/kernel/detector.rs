use std::time::Instant;
use tracing::{debug, info, warn};

use super::audio::convert;
use super::audio::segmenter::{FlushPolicy, SegmentationMachine, SpeechState};
use super::audio::windower::{AudioWindow, FrameWindower};
use super::classifier::{checked_probability, Classifier};
use super::event::{FrameResult, SegmentEvent};
use super::listeners::EventListeners;
use super::telemetry::event::TelemetryEvent;
use super::telemetry::metrics::{ActivityStats, SignalLevel};
use super::telemetry::recorder::TelemetryRecorder;
use super::time::StreamClock;
use crate::config::DetectorConfig;
use crate::error::VadError;

/// Streaming speech detector: windower, classifier and segmentation machine
/// behind one owner. Every mutation goes through `&mut self`, so whoever
/// owns the detector (one processing thread, or a `Mutex`) serializes access.
#[derive(Debug)]
pub struct SpeechDetector<C> {
    classifier: C,
    windower: FrameWindower,
    machine: SegmentationMachine,
    clock: StreamClock,
    flush_policy: FlushPolicy,
    listeners: EventListeners,
    telemetry: TelemetryRecorder,
    last_frame: Option<FrameResult>,
    pcm: Vec<u8>,
}

impl<C: Classifier> SpeechDetector<C> {
    pub fn new(config: &DetectorConfig, classifier: C) -> Result<Self, VadError> {
        config.validate()?;
        let window_size = config.window_size();
        info!(
            "Speech detector ready: {}Hz, window {} samples, threshold {:.2}, classifier {}",
            config.sample_rate,
            window_size,
            config.threshold,
            classifier.name()
        );

        Ok(Self {
            classifier,
            windower: FrameWindower::new(window_size),
            machine: SegmentationMachine::new(config.threshold),
            clock: StreamClock::new(config.sample_rate, window_size),
            flush_policy: config.flush_policy,
            listeners: EventListeners::default(),
            telemetry: TelemetryRecorder::new(),
            last_frame: None,
            pcm: Vec::with_capacity(window_size * convert::BYTES_PER_SAMPLE),
        })
    }

    pub fn listeners_mut(&mut self) -> &mut EventListeners {
        &mut self.listeners
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn classifier_mut(&mut self) -> &mut C {
        &mut self.classifier
    }

    pub fn clock(&self) -> StreamClock {
        self.clock
    }

    pub fn sample_rate(&self) -> u32 {
        self.clock.sample_rate()
    }

    pub fn window_size(&self) -> usize {
        self.clock.window_size()
    }

    pub fn threshold(&self) -> f32 {
        self.machine.threshold()
    }

    pub fn state(&self) -> SpeechState {
        self.machine.state()
    }

    pub fn is_speaking(&self) -> bool {
        self.machine.is_speaking()
    }

    pub fn stats(&self) -> &ActivityStats {
        self.telemetry.stats()
    }

    pub fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }

    pub fn last_frame(&self) -> Option<&FrameResult> {
        self.last_frame.as_ref()
    }

    /// Samples waiting for a full window.
    pub fn buffered(&self) -> usize {
        self.windower.buffered()
    }

    /// Feeds raw PCM16-LE bytes. An odd trailing byte is dropped.
    /// Returns how many windows were processed.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Result<usize, VadError> {
        if bytes.len() % convert::BYTES_PER_SAMPLE != 0 {
            debug!("Dropping trailing partial sample ({} bytes)", bytes.len());
        }
        self.windower.push_bytes(bytes);
        self.drain()
    }

    pub fn feed_i16(&mut self, samples: &[i16]) -> Result<usize, VadError> {
        self.windower.push_i16(samples);
        self.drain()
    }

    pub fn feed_samples(&mut self, samples: &[f32]) -> Result<usize, VadError> {
        self.windower.push_samples(samples);
        self.drain()
    }

    /// Processes every complete buffered window. Stops at the first
    /// classifier fault; windows behind it stay buffered for the next call.
    pub fn drain(&mut self) -> Result<usize, VadError> {
        let mut processed = 0;
        while let Some(window) = self.windower.pop_window() {
            processed += 1;
            self.process_window(&window)?;
        }
        Ok(processed)
    }

    /// Classifies one window and advances segmentation.
    ///
    /// On classifier failure the window's vote is skipped, a fault is
    /// counted and the machine is left exactly as it was.
    pub fn process_window(&mut self, window: &AudioWindow) -> Result<Option<SegmentEvent>, VadError> {
        if window.len() != self.window_size() {
            return Err(VadError::WindowSize {
                expected: self.window_size(),
                actual: window.len(),
            });
        }

        // 1. Classify
        let started = Instant::now();
        let verdict = self
            .classifier
            .classify(&window.samples, self.sample_rate())
            .and_then(checked_probability);
        let elapsed = started.elapsed();

        let budget = self.clock.window_duration();
        if elapsed > budget {
            warn!(
                "Classification overran frame {}: {:?} > {:?}",
                window.tick.frame, elapsed, budget
            );
            self.telemetry.record(TelemetryEvent::Overrun {
                tick: window.tick,
                elapsed_us: elapsed.as_micros() as u64,
                budget_us: budget.as_micros() as u64,
            });
        }

        let probability = match verdict {
            Ok(p) => p,
            Err(source) => {
                warn!("Classifier fault on frame {}: {}", window.tick.frame, source);
                self.telemetry.record(TelemetryEvent::ClassifierFault { tick: window.tick });
                return Err(VadError::Classifier {
                    tick: window.tick,
                    source,
                });
            }
        };

        // 2. Frame bookkeeping
        let frame = self
            .machine
            .frame(window.tick, probability, self.clock.at(window.tick));
        self.telemetry.record(TelemetryEvent::FrameClassified {
            tick: frame.tick,
            speech: frame.is_speech,
        });
        self.telemetry.record(TelemetryEvent::Signal {
            tick: frame.tick,
            level: SignalLevel::measure(&window.samples),
        });
        self.last_frame = Some(frame);
        self.listeners.frame_classified.emit(&frame);

        // 3. Segmentation
        self.pcm.clear();
        convert::append_pcm16(&window.samples, &mut self.pcm);
        let event = self.machine.step(&frame, &self.pcm);
        if let Some(event) = &event {
            self.dispatch(event);
        }
        Ok(event)
    }

    /// Ends the stream with the configured flush policy.
    pub fn finish(&mut self) -> Option<SegmentEvent> {
        self.finish_with(self.flush_policy)
    }

    /// Ends the stream. Unprocessed samples are discarded; an open segment
    /// is closed at the end of the last classified window or dropped, per
    /// `policy`. Faulted windows after it do not extend the segment.
    pub fn finish_with(&mut self, policy: FlushPolicy) -> Option<SegmentEvent> {
        let leftover = self.windower.discard_partial();
        if leftover > 0 {
            debug!("Discarding {} unprocessed samples", leftover);
        }
        let end_tick = match self.last_frame {
            Some(frame) => frame.tick.next(),
            None => self.windower.next_tick(),
        };

        let was_speaking = self.machine.is_speaking();
        let event = self.machine.finish(end_tick, self.clock.at(end_tick), policy);
        match &event {
            Some(event) => self.dispatch(event),
            None if was_speaking => info!("Open speech segment discarded at stop"),
            None => {}
        }
        event
    }

    /// Restarts the stream: empty buffer, `Silence`, frame numbering from zero.
    /// Statistics are monotonic and survive.
    pub fn reset(&mut self) {
        self.windower.reset();
        self.machine.reset();
        self.classifier.reset();
        self.last_frame = None;
    }

    fn dispatch(&mut self, event: &SegmentEvent) {
        match event {
            SegmentEvent::Started(started) => {
                debug!("Speech START at frame {}", started.tick.frame);
                self.telemetry.record(TelemetryEvent::SegmentStarted { tick: started.tick });
                self.listeners.speech_started.emit(started);
            }
            SegmentEvent::Ended(ended) => {
                debug!(
                    "Speech END at frame {} ({:?})",
                    ended.tick.frame,
                    ended.duration()
                );
                self.telemetry.record(TelemetryEvent::SegmentEnded {
                    tick: ended.tick,
                    duration_ms: ended.duration().as_millis() as u64,
                    frames: ended.segment.frames,
                    flushed: ended.flushed(),
                });
                self.listeners.speech_ended.emit(ended);
            }
        }
    }
}
