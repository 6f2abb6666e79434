//! The three analysis operations behind one shared, immutable object.
//!
//! An [`AiService`] is built once at startup (loading models is the
//! expensive part) and then shared by reference across request handlers.

use crate::comparator::{self, CompareError};
use crate::decoder;
use crate::encoder::{EncoderError, FaceEncoder};
use crate::regions::RegionDetector;
use crate::types::{ComparisonResult, DetectedRegion, FaceSignature};
use thiserror::Error;

/// Unexpected failures inside an operation. Decode failures are not errors
/// here: they surface as an absent signature or an empty region list.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("face encoding failed: {0}")]
    Encode(#[from] EncoderError),
    #[error("face comparison failed: {0}")]
    Compare(#[from] CompareError),
}

pub struct AiService {
    encoder: Box<dyn FaceEncoder>,
    regions: RegionDetector,
}

impl AiService {
    pub fn new(encoder: Box<dyn FaceEncoder>) -> Self {
        Self {
            encoder,
            regions: RegionDetector::new(),
        }
    }

    /// Signature of the first face in a base64 image.
    ///
    /// Undecodable payloads and images without a face both yield `Ok(None)`.
    pub fn encode_image_from_base64(&self, payload: &str) -> Result<Option<FaceSignature>, ServiceError> {
        let image = match decoder::decode(payload) {
            Ok(image) => image,
            Err(err) => {
                tracing::warn!(error = %err, "encode: image payload could not be decoded");
                return Ok(None);
            }
        };

        let signature = self.encoder.encode(&image).map_err(|err| {
            tracing::error!(error = %err, "encode: face encoder failed");
            ServiceError::from(err)
        })?;

        if let Some(sig) = &signature {
            tracing::info!(dim = sig.len(), "encode: face signature extracted");
        }
        Ok(signature)
    }

    /// Compare two signatures at `tolerance`.
    pub fn compare_faces(
        &self,
        known: &FaceSignature,
        unknown: &FaceSignature,
        tolerance: f64,
    ) -> Result<ComparisonResult, ServiceError> {
        let result = comparator::compare(known, unknown, tolerance).map_err(|err| {
            tracing::error!(error = %err, "compare: signatures not comparable");
            ServiceError::from(err)
        })?;

        tracing::info!(
            matched = result.matched,
            distance = result.distance,
            tolerance,
            "compare: finished"
        );
        Ok(result)
    }

    /// Foreground regions of a base64 image. Fails open: any decode error
    /// gives an empty list.
    pub fn detect_objects(&self, payload: &str) -> Vec<DetectedRegion> {
        match decoder::decode(payload) {
            Ok(image) => {
                let regions = self.regions.detect(&image);
                tracing::info!(count = regions.len(), "detect: finished");
                regions
            }
            Err(err) => {
                tracing::warn!(error = %err, "detect: image payload could not be decoded");
                Vec::new()
            }
        }
    }
}
