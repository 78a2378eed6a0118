pub mod audio;
pub mod config;
pub mod error;
pub mod kernel;

// Re-export specific items for convenient access
pub use config::DetectorConfig;
pub use error::VadError;
pub use kernel::detector::SpeechDetector;
