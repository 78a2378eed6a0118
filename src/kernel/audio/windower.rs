use std::collections::VecDeque;

use super::convert;
use crate::kernel::time::Tick;

/// One fixed-size slice of the input stream, tagged with its position.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioWindow {
    pub tick: Tick,
    pub samples: Vec<f32>,
}

impl AudioWindow {
    pub fn new(tick: Tick, samples: Vec<f32>) -> Self {
        Self { tick, samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Buffers an arbitrarily chunked sample stream and hands it back as
/// fixed-size windows, oldest first. Nothing is reordered, merged or dropped.
#[derive(Debug)]
pub struct FrameWindower {
    window_size: usize,
    buffer: VecDeque<f32>,
    next_tick: Tick,
}

impl FrameWindower {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            buffer: VecDeque::with_capacity(window_size * 4),
            next_tick: Tick::new(),
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Samples waiting for a full window.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Tick the next emitted window will carry.
    pub fn next_tick(&self) -> Tick {
        self.next_tick
    }

    /// Appends PCM16-LE bytes. Returns the number of samples appended.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> usize {
        let samples = convert::bytes_to_samples(bytes);
        self.buffer.extend(samples.iter().copied());
        samples.len()
    }

    pub fn push_i16(&mut self, samples: &[i16]) -> usize {
        self.buffer
            .extend(samples.iter().map(|&s| convert::i16_to_f32(s)));
        samples.len()
    }

    pub fn push_samples(&mut self, samples: &[f32]) -> usize {
        self.buffer.extend(samples.iter().copied());
        samples.len()
    }

    pub fn pop_window(&mut self) -> Option<AudioWindow> {
        if self.window_size == 0 || self.buffer.len() < self.window_size {
            return None;
        }
        let samples: Vec<f32> = self.buffer.drain(..self.window_size).collect();
        let tick = self.next_tick;
        self.next_tick = tick.next();
        Some(AudioWindow { tick, samples })
    }

    /// Yields every complete window currently buffered.
    pub fn windows(&mut self) -> impl Iterator<Item = AudioWindow> + '_ {
        std::iter::from_fn(move || self.pop_window())
    }

    /// Drops samples short of a full window. Frame numbering carries on.
    pub fn discard_partial(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        dropped
    }

    /// Drops buffered samples and restarts frame numbering.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.next_tick = Tick::new();
    }
}
