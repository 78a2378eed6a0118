#![allow(dead_code)]

use std::collections::VecDeque;

use vadgate::config::DetectorConfig;
use vadgate::kernel::classifier::{Classifier, ClassifierError};
use vadgate::kernel::time::Tick;

pub const WINDOW: usize = 512;

/// Replays a fixed verdict per window; silence once the script runs out.
#[derive(Debug, Default)]
pub struct ScriptedClassifier {
    script: VecDeque<Result<f32, ClassifierError>>,
    pub calls: usize,
    pub resets: usize,
}

impl ScriptedClassifier {
    pub fn new(probabilities: &[f32]) -> Self {
        Self {
            script: probabilities.iter().map(|&p| Ok(p)).collect(),
            ..Default::default()
        }
    }

    pub fn with_script(script: Vec<Result<f32, ClassifierError>>) -> Self {
        Self {
            script: script.into(),
            ..Default::default()
        }
    }

    pub fn load(&mut self, probabilities: &[f32]) {
        self.script = probabilities.iter().map(|&p| Ok(p)).collect();
    }
}

impl Classifier for ScriptedClassifier {
    fn classify(&mut self, _window: &[f32], _sample_rate: u32) -> Result<f32, ClassifierError> {
        self.calls += 1;
        self.script.pop_front().unwrap_or(Ok(0.0))
    }

    fn reset(&mut self) {
        self.resets += 1;
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

pub fn config() -> DetectorConfig {
    DetectorConfig::default()
}

/// `count` windows of a constant sample value.
pub fn windows(count: usize, value: f32) -> Vec<f32> {
    vec![value; count * WINDOW]
}

pub fn tick(frame: u64) -> Tick {
    Tick { frame }
}
