//! sightline-core provides face signatures, signature comparison and region detection.
//!
//! Face signatures come from SCRFD detection plus an aligned embedding
//! network, both running via ONNX Runtime. Region detection is classical
//! contour segmentation and needs no model.

pub mod alignment;
pub mod comparator;
pub mod decoder;
pub mod detector;
pub mod encoder;
pub mod recognizer;
pub mod regions;
pub mod service;
mod session;
pub mod types;

pub use comparator::{CompareError, DEFAULT_TOLERANCE};
pub use decoder::{DecodeError, PixelMatrix};
pub use detector::FaceDetector;
pub use encoder::{EncoderConfig, EncoderError, FaceEncoder, OnnxFaceEncoder};
pub use recognizer::{FaceRecognizer, RecognizerConfig};
pub use regions::RegionDetector;
pub use service::{AiService, ServiceError};
pub use types::{ComparisonResult, DetectedRegion, FaceBox, FaceSignature, RegionBox, RegionKind};

use std::path::PathBuf;

/// Default model directory: `$XDG_DATA_HOME/sightline/models`, falling back
/// to `~/.local/share/sightline/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("sightline")
        .join("models")
}
