use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::audio::segment::SpeechSegment;
use super::time::Tick;

/// Classifier verdict for one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameResult {
    pub probability: f32,
    pub is_speech: bool,
    pub tick: Tick,
    /// Stream offset of the window's first sample.
    pub timestamp: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechStarted {
    pub segment_id: u64,
    pub tick: Tick,
    pub start_time: Duration,
    pub probability: f32,
    /// PCM16-LE of the window that opened the segment.
    pub initial_audio: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechEnded {
    pub tick: Tick,
    pub segment: SpeechSegment,
}

impl SpeechEnded {
    pub fn start_time(&self) -> Duration {
        self.segment.start_time
    }

    pub fn end_time(&self) -> Duration {
        self.segment.end_time.unwrap_or(self.segment.start_time)
    }

    pub fn duration(&self) -> Duration {
        self.segment.duration()
    }

    pub fn last_probability(&self) -> f32 {
        self.segment.last_probability
    }

    pub fn audio(&self) -> &[u8] {
        &self.segment.audio
    }

    /// True when the segment was closed by end of stream rather than by silence.
    pub fn flushed(&self) -> bool {
        self.segment.status == super::audio::segment::SegmentStatus::Flushed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SegmentEvent {
    Started(SpeechStarted),
    Ended(SpeechEnded),
}

impl SegmentEvent {
    pub fn is_start(&self) -> bool {
        matches!(self, SegmentEvent::Started(_))
    }

    pub fn is_end(&self) -> bool {
        matches!(self, SegmentEvent::Ended(_))
    }
}
