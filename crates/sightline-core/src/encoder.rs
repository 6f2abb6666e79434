//! Face signature extraction.

use crate::decoder::PixelMatrix;
use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerConfig, RecognizerError};
use crate::types::FaceSignature;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Pluggable face signature backend.
///
/// Implementations are shared across worker threads, so `encode` takes
/// `&self` and must not depend on per-call mutable state.
pub trait FaceEncoder: Send + Sync {
    /// Signature of the first detected face, or `None` when no face is found.
    fn encode(&self, image: &PixelMatrix) -> Result<Option<FaceSignature>, EncoderError>;
}

/// Model locations and embedding shape for [`OnnxFaceEncoder`].
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    pub detector_model: PathBuf,
    pub embedding_model: PathBuf,
    pub recognizer: RecognizerConfig,
}

/// SCRFD detection followed by aligned embedding extraction.
pub struct OnnxFaceEncoder {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxFaceEncoder {
    /// Load both models. Fails fast if either is missing or malformed.
    pub fn load(config: &EncoderConfig) -> Result<Self, EncoderError> {
        let detector = FaceDetector::load(&config.detector_model)?;
        let recognizer = FaceRecognizer::load(&config.embedding_model, config.recognizer)?;
        Ok(Self { detector, recognizer })
    }
}

impl FaceEncoder for OnnxFaceEncoder {
    fn encode(&self, image: &PixelMatrix) -> Result<Option<FaceSignature>, EncoderError> {
        let rgb = image.to_rgb();
        let faces = self.detector.detect(&rgb)?;

        // Only the first face is encoded; the rest are ignored.
        let Some(face) = faces.first() else {
            tracing::debug!("no face detected");
            return Ok(None);
        };

        tracing::debug!(
            faces = faces.len(),
            confidence = face.confidence,
            "encoding first detected face"
        );

        let signature = self.recognizer.extract(&rgb, face)?;
        Ok(Some(signature))
    }
}
