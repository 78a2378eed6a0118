use webrtc_vad::{SampleRate, Vad, VadMode};

use crate::config::WebRtcMode;
use crate::kernel::audio::convert;
use crate::kernel::classifier::{Classifier, ClassifierError};

/// 10 ms sub-frames; the shortest length webrtc-vad accepts.
const SUB_FRAME_MS: usize = 10;

/// Adapter over `webrtc-vad`. The detector only answers yes/no per 10 ms
/// frame, so a window's probability is the fraction of its complete
/// sub-frames voted voiced. Samples past the last full sub-frame are ignored.
///
/// Holds a raw handle to the native detector and is not `Send`; build it on
/// the thread that runs the detector.
pub struct WebRtcClassifier {
    vad: Vad,
    mode: WebRtcMode,
    sample_rate: u32,
    frame: Vec<i16>,
}

impl WebRtcClassifier {
    pub fn new(sample_rate: u32, mode: WebRtcMode) -> Result<Self, ClassifierError> {
        let rate = match sample_rate {
            8_000 => SampleRate::Rate8kHz,
            16_000 => SampleRate::Rate16kHz,
            32_000 => SampleRate::Rate32kHz,
            48_000 => SampleRate::Rate48kHz,
            other => {
                return Err(ClassifierError::SampleRate {
                    expected: 16_000,
                    actual: other,
                })
            }
        };
        let vad = Vad::new_with_rate_and_mode(rate, vad_mode(mode));
        let sub_frame = sample_rate as usize * SUB_FRAME_MS / 1000;

        Ok(Self {
            vad,
            mode,
            sample_rate,
            frame: vec![0; sub_frame],
        })
    }

    fn rebuild(&mut self) {
        if let Ok(fresh) = Self::new(self.sample_rate, self.mode) {
            self.vad = fresh.vad;
        }
    }
}

fn vad_mode(mode: WebRtcMode) -> VadMode {
    match mode {
        WebRtcMode::Quality => VadMode::Quality,
        WebRtcMode::LowBitrate => VadMode::LowBitrate,
        WebRtcMode::Aggressive => VadMode::Aggressive,
        WebRtcMode::VeryAggressive => VadMode::VeryAggressive,
    }
}

impl Classifier for WebRtcClassifier {
    fn classify(&mut self, window: &[f32], sample_rate: u32) -> Result<f32, ClassifierError> {
        if sample_rate != self.sample_rate {
            return Err(ClassifierError::SampleRate {
                expected: self.sample_rate,
                actual: sample_rate,
            });
        }

        let sub_frame = self.frame.len();
        let mut total = 0usize;
        let mut voiced = 0usize;

        for chunk in window.chunks_exact(sub_frame) {
            for (dst, &src) in self.frame.iter_mut().zip(chunk) {
                *dst = convert::f32_to_i16(src);
            }
            match self.vad.is_voice_segment(&self.frame) {
                Ok(true) => voiced += 1,
                Ok(false) => {}
                Err(()) => {
                    return Err(ClassifierError::Backend(format!(
                        "webrtc-vad rejected a {} sample frame",
                        sub_frame
                    )))
                }
            }
            total += 1;
        }

        if total == 0 {
            return Err(ClassifierError::WindowTooShort(window.len()));
        }
        Ok(voiced as f32 / total as f32)
    }

    fn reset(&mut self) {
        self.rebuild();
    }

    fn name(&self) -> &'static str {
        "webrtc"
    }
}
