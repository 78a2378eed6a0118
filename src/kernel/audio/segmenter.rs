use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::segment::SpeechSegment;
use crate::kernel::event::{FrameResult, SegmentEvent, SpeechEnded, SpeechStarted};
use crate::kernel::time::Tick;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeechState {
    Silence,
    Speaking,
}

/// What to do with a segment that is still open when the stream stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushPolicy {
    /// Close it with a final `SpeechEnded` at the stream end.
    #[default]
    Emit,
    /// Drop it silently.
    Discard,
}

/// Per-window speech/silence state machine.
///
/// A frame is speech when `probability >= threshold`. There is no smoothing
/// across windows: the event sequence is a pure function of the ordered
/// probabilities and the threshold. At most one segment is open at a time.
#[derive(Debug, Clone)]
pub struct SegmentationMachine {
    threshold: f32,
    open: Option<SpeechSegment>,
    next_segment_id: u64,
}

impl SegmentationMachine {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            open: None,
            next_segment_id: 0,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn state(&self) -> SpeechState {
        if self.open.is_some() {
            SpeechState::Speaking
        } else {
            SpeechState::Silence
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.open.is_some()
    }

    pub fn open_segment(&self) -> Option<&SpeechSegment> {
        self.open.as_ref()
    }

    /// Inclusive lower bound: a probability equal to the threshold is speech.
    pub fn is_speech(&self, probability: f32) -> bool {
        probability >= self.threshold
    }

    pub fn frame(&self, tick: Tick, probability: f32, timestamp: Duration) -> FrameResult {
        FrameResult {
            probability,
            is_speech: self.is_speech(probability),
            tick,
            timestamp,
        }
    }

    /// Advances the machine by one classified window. `audio` is that window as PCM16-LE.
    pub fn step(&mut self, frame: &FrameResult, audio: &[u8]) -> Option<SegmentEvent> {
        match (self.open.as_mut(), frame.is_speech) {
            // Silence -> Speaking
            (None, true) => {
                let id = self.next_segment_id;
                self.next_segment_id += 1;
                self.open = Some(SpeechSegment::open(id, frame, audio));
                Some(SegmentEvent::Started(SpeechStarted {
                    segment_id: id,
                    tick: frame.tick,
                    start_time: frame.timestamp,
                    probability: frame.probability,
                    initial_audio: audio.to_vec(),
                }))
            }
            // Speaking -> Speaking
            (Some(segment), true) => {
                segment.extend(frame, audio);
                None
            }
            // Speaking -> Silence
            (Some(_), false) => {
                let mut segment = self.open.take()?;
                segment.close(frame);
                Some(SegmentEvent::Ended(SpeechEnded {
                    tick: frame.tick,
                    segment,
                }))
            }
            // Silence -> Silence
            (None, false) => None,
        }
    }

    /// Ends the stream. An open segment is either closed at `at` or dropped.
    /// Either way the machine is back in `Silence` afterwards.
    pub fn finish(&mut self, tick: Tick, at: Duration, policy: FlushPolicy) -> Option<SegmentEvent> {
        let mut segment = self.open.take()?;
        match policy {
            FlushPolicy::Emit => {
                segment.flush(tick, at);
                Some(SegmentEvent::Ended(SpeechEnded { tick, segment }))
            }
            FlushPolicy::Discard => None,
        }
    }

    /// Back to `Silence` with nothing accumulated and segment ids restarted.
    pub fn reset(&mut self) {
        self.open = None;
        self.next_segment_id = 0;
    }
}
