//! Offline speech timestamps for a fully classified file.
//!
//! Unlike the streaming machine this pass has hysteresis: speech opens at
//! `threshold`, only closes once the probability drops below a lower
//! `neg_threshold` for at least `min_silence_ms`, short bursts are dropped and
//! the survivors are padded.

use serde::{Deserialize, Serialize};

/// Silence needed before a long segment may be split there.
const MIN_SILENCE_AT_MAX_SPEECH_MS: u64 = 98;
const NEG_THRESHOLD_GAP: f32 = 0.15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimestampParams {
    pub min_speech_ms: u64,
    /// `None` means unbounded.
    pub max_speech_secs: Option<f32>,
    pub min_silence_ms: u64,
    pub speech_pad_ms: u64,
}

impl Default for TimestampParams {
    fn default() -> Self {
        Self {
            min_speech_ms: 250,
            max_speech_secs: None,
            min_silence_ms: 100,
            speech_pad_ms: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeechTimestamp {
    pub start_sample: usize,
    pub end_sample: usize,
    pub start_secs: f64,
    pub end_secs: f64,
}

impl SpeechTimestamp {
    fn from_samples(start: usize, end: usize, sample_rate: u32) -> Self {
        Self {
            start_sample: start,
            end_sample: end,
            start_secs: start as f64 / sample_rate as f64,
            end_secs: end as f64 / sample_rate as f64,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }
}

pub fn neg_threshold(threshold: f32) -> f32 {
    (threshold - NEG_THRESHOLD_GAP).max(0.01)
}

fn ms_to_samples(ms: u64, sample_rate: u32) -> usize {
    (sample_rate as u64 * ms / 1000) as usize
}

/// Turns per-window probabilities into padded speech spans.
///
/// `probabilities[i]` scores samples `[i * window_size, (i + 1) * window_size)`;
/// `audio_len` is the total sample count of the file.
pub fn speech_timestamps(
    probabilities: &[f32],
    threshold: f32,
    params: &TimestampParams,
    sample_rate: u32,
    window_size: usize,
    audio_len: usize,
) -> Vec<SpeechTimestamp> {
    let min_speech = ms_to_samples(params.min_speech_ms, sample_rate);
    let min_silence = ms_to_samples(params.min_silence_ms, sample_rate);
    let min_silence_at_max = ms_to_samples(MIN_SILENCE_AT_MAX_SPEECH_MS, sample_rate);
    let pad = ms_to_samples(params.speech_pad_ms, sample_rate);
    let max_speech = match params.max_speech_secs {
        Some(secs) if secs.is_finite() => {
            let raw = (sample_rate as f64 * secs as f64) as usize;
            raw.saturating_sub(window_size + 2 * pad)
        }
        _ => usize::MAX,
    };
    let neg = neg_threshold(threshold);

    // Raw spans as [start, end) sample ranges.
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut current_start: Option<usize> = None;
    let mut temp_end: Option<usize> = None;
    let mut prev_end: Option<usize> = None;
    let mut next_start: Option<usize> = None;

    for (i, &p) in probabilities.iter().enumerate() {
        let pos = i * window_size;

        // Speech resumed inside a tentative silence.
        if p >= threshold && temp_end.is_some() {
            temp_end = None;
            if next_start.unwrap_or(0) < prev_end.unwrap_or(0) {
                next_start = Some(pos);
            }
        }

        let Some(start) = current_start else {
            if p >= threshold {
                current_start = Some(pos);
            }
            continue;
        };

        // Too long: split at the last usable silence, or cut here.
        if pos - start > max_speech {
            if let Some(end) = prev_end {
                spans.push((start, end));
                current_start = match next_start {
                    Some(ns) if ns >= end => Some(ns),
                    _ => None,
                };
                prev_end = None;
                next_start = None;
                temp_end = None;
            } else {
                spans.push((start, pos));
                current_start = None;
                prev_end = None;
                next_start = None;
                temp_end = None;
                continue;
            }
        }

        let Some(start) = current_start else {
            continue;
        };

        if p < neg {
            let tentative = *temp_end.get_or_insert(pos);
            if pos - tentative > min_silence_at_max {
                prev_end = Some(tentative);
            }
            if pos - tentative < min_silence {
                continue;
            }
            if tentative - start > min_speech {
                spans.push((start, tentative));
            }
            current_start = None;
            prev_end = None;
            next_start = None;
            temp_end = None;
        }
    }

    if let Some(start) = current_start {
        if audio_len.saturating_sub(start) > min_speech {
            spans.push((start, audio_len));
        }
    }

    pad_spans(&mut spans, pad, audio_len);
    spans
        .into_iter()
        .map(|(s, e)| SpeechTimestamp::from_samples(s, e, sample_rate))
        .collect()
}

/// Pads each span by `pad` on both sides. Neighbours closer than `2 * pad`
/// split the gap between them instead of overlapping.
fn pad_spans(spans: &mut [(usize, usize)], pad: usize, audio_len: usize) {
    let count = spans.len();
    for i in 0..count {
        if i == 0 {
            spans[i].0 = spans[i].0.saturating_sub(pad);
        }
        if i + 1 < count {
            let gap = spans[i + 1].0.saturating_sub(spans[i].1);
            if gap < 2 * pad {
                spans[i].1 += gap / 2;
                spans[i + 1].0 = spans[i + 1].0.saturating_sub(gap / 2);
            } else {
                spans[i].1 = (spans[i].1 + pad).min(audio_len);
                spans[i + 1].0 = spans[i + 1].0.saturating_sub(pad);
            }
        } else {
            spans[i].1 = (spans[i].1 + pad).min(audio_len);
        }
    }
}
