//! Device, file and native-library adapters around the detector core.

pub mod capture;
pub mod file;
pub mod processing;
pub mod wav;
pub mod webrtc;

use crate::config::ClassifierKind;
use crate::error::VadError;
use crate::kernel::classifier::{Classifier, EnergyClassifier};
use crate::kernel::time::Tick;

/// Builds the classifier named by the configuration. Call it on the thread
/// that will use it; some backends are not `Send`.
pub fn build_classifier(kind: &ClassifierKind, sample_rate: u32) -> Result<Box<dyn Classifier>, VadError> {
    match kind {
        ClassifierKind::Energy(params) => Ok(Box::new(EnergyClassifier::new(*params))),
        ClassifierKind::WebRtc { mode } => {
            let classifier = webrtc::WebRtcClassifier::new(sample_rate, *mode)
                .map_err(|source| VadError::Classifier { tick: Tick::new(), source })?;
            Ok(Box::new(classifier))
        }
    }
}
