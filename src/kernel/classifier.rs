use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClassifierError {
    #[error("probability {0} is outside [0, 1]")]
    OutOfRange(f32),

    #[error("classifier expects {expected} Hz, got {actual} Hz")]
    SampleRate { expected: u32, actual: u32 },

    #[error("window of {0} samples is too short to classify")]
    WindowTooShort(usize),

    #[error("classifier backend error: {0}")]
    Backend(String),
}

/// Scores one window with a speech probability in [0, 1].
///
/// Calls are synchronous and happen exactly once per window, in stream order.
/// Any model state lives inside the implementation.
pub trait Classifier {
    fn classify(&mut self, window: &[f32], sample_rate: u32) -> Result<f32, ClassifierError>;

    /// Clears internal model state, if any.
    fn reset(&mut self) {}

    fn name(&self) -> &'static str;
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn classify(&mut self, window: &[f32], sample_rate: u32) -> Result<f32, ClassifierError> {
        (**self).classify(window, sample_rate)
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Rejects NaN and values outside [0, 1] so a misbehaving model cannot reach the state machine.
pub fn checked_probability(probability: f32) -> Result<f32, ClassifierError> {
    if (0.0..=1.0).contains(&probability) {
        Ok(probability)
    } else {
        Err(ClassifierError::OutOfRange(probability))
    }
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sq_sum: f32 = samples.iter().map(|&x| x * x).sum();
    (sq_sum / samples.len() as f32).sqrt()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyParams {
    /// RMS at or below this maps to probability 0.
    pub floor_rms: f32,
    /// RMS at or above this maps to probability 1.
    pub ceiling_rms: f32,
}

impl Default for EnergyParams {
    fn default() -> Self {
        Self {
            floor_rms: 0.01,
            ceiling_rms: 0.1,
        }
    }
}

/// Energy detector: window RMS mapped onto [0, 1] on a decibel scale
/// between a noise floor and a ceiling.
#[derive(Debug, Clone)]
pub struct EnergyClassifier {
    floor_db: f32,
    ceiling_db: f32,
}

impl EnergyClassifier {
    pub fn new(params: EnergyParams) -> Self {
        Self {
            floor_db: to_db(params.floor_rms),
            ceiling_db: to_db(params.ceiling_rms),
        }
    }
}

impl Default for EnergyClassifier {
    fn default() -> Self {
        Self::new(EnergyParams::default())
    }
}

fn to_db(amplitude: f32) -> f32 {
    20.0 * amplitude.max(f32::MIN_POSITIVE).log10()
}

impl Classifier for EnergyClassifier {
    fn classify(&mut self, window: &[f32], _sample_rate: u32) -> Result<f32, ClassifierError> {
        if window.is_empty() {
            return Err(ClassifierError::WindowTooShort(0));
        }
        let level_db = to_db(rms(window));
        let span = self.ceiling_db - self.floor_db;
        if span <= 0.0 {
            return Ok(if level_db >= self.ceiling_db { 1.0 } else { 0.0 });
        }
        Ok(((level_db - self.floor_db) / span).clamp(0.0, 1.0))
    }

    fn name(&self) -> &'static str {
        "energy"
    }
}
