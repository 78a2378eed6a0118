use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::convert;
use crate::kernel::event::FrameResult;
use crate::kernel::time::Tick;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentStatus {
    Open,
    Closed,  // Ended by a non-speech frame
    Flushed, // Ended by end of stream
}

/// Audio and timing for one contiguous run of speech frames.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechSegment {
    pub id: u64,
    /// PCM16-LE, one window per speech frame.
    pub audio: Vec<u8>,
    pub start_tick: Tick,
    pub end_tick: Option<Tick>,
    pub start_time: Duration,
    pub end_time: Option<Duration>,
    pub status: SegmentStatus,
    pub last_probability: f32,
    pub frames: u64,
    probability_sum: f64,
}

impl SpeechSegment {
    pub fn open(id: u64, frame: &FrameResult, audio: &[u8]) -> Self {
        Self {
            id,
            audio: audio.to_vec(),
            start_tick: frame.tick,
            end_tick: None,
            start_time: frame.timestamp,
            end_time: None,
            status: SegmentStatus::Open,
            last_probability: frame.probability,
            frames: 1,
            probability_sum: frame.probability as f64,
        }
    }

    pub fn extend(&mut self, frame: &FrameResult, audio: &[u8]) {
        self.audio.extend_from_slice(audio);
        self.last_probability = frame.probability;
        self.frames += 1;
        self.probability_sum += frame.probability as f64;
    }

    /// Ends the segment at the non-speech frame that broke it.
    pub fn close(&mut self, frame: &FrameResult) {
        self.end_tick = Some(frame.tick);
        self.end_time = Some(frame.timestamp.max(self.start_time));
        self.last_probability = frame.probability;
        self.status = SegmentStatus::Closed;
    }

    /// Ends the segment at end of stream. `last_probability` keeps the last speech frame's value.
    pub fn flush(&mut self, tick: Tick, at: Duration) {
        self.end_tick = Some(tick);
        self.end_time = Some(at.max(self.start_time));
        self.status = SegmentStatus::Flushed;
    }

    pub fn is_open(&self) -> bool {
        self.status == SegmentStatus::Open
    }

    pub fn duration(&self) -> Duration {
        self.end_time
            .unwrap_or(self.start_time)
            .saturating_sub(self.start_time)
    }

    /// Mean probability over the speech frames only.
    pub fn mean_probability(&self) -> f32 {
        if self.frames == 0 {
            return 0.0;
        }
        (self.probability_sum / self.frames as f64) as f32
    }

    pub fn sample_count(&self) -> usize {
        self.audio.len() / convert::BYTES_PER_SAMPLE
    }
}
