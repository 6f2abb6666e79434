//! Face embedding network via ONNX Runtime.
//!
//! Aligns the detected face to a square RGB crop and runs the embedding
//! model over it. The signature is L2-normalized so Euclidean distances stay
//! on a fixed [0, 2] scale regardless of the model's raw output magnitude.

use crate::alignment;
use crate::session::lock_session;
use crate::types::{FaceBox, FaceSignature};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

const EMBEDDING_MEAN: f32 = 127.5;
const EMBEDDING_STD: f32 = 127.5;

/// Canonical signature length.
pub const DEFAULT_EMBEDDING_DIM: usize = 128;
/// Canonical square crop fed to the embedding network.
pub const DEFAULT_INPUT_SIZE: u32 = 112;

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("model file not found: {0}; place the face embedding model in the model dir")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("face has no landmarks; the detector must return landmarks for alignment")]
    NoLandmarks,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Shape of the embedding network's input and output.
#[derive(Debug, Clone, Copy)]
pub struct RecognizerConfig {
    pub input_size: u32,
    pub embedding_dim: usize,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            embedding_dim: DEFAULT_EMBEDDING_DIM,
        }
    }
}

/// Embedding extractor for aligned face crops.
pub struct FaceRecognizer {
    session: Mutex<Session>,
    config: RecognizerConfig,
}

impl FaceRecognizer {
    /// Load the embedding ONNX model from `model_path`.
    pub fn load(model_path: &Path, config: RecognizerConfig) -> Result<Self, RecognizerError> {
        if !model_path.exists() {
            return Err(RecognizerError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            input_size = config.input_size,
            embedding_dim = config.embedding_dim,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded face embedding model"
        );

        Ok(Self {
            session: Mutex::new(session),
            config,
        })
    }

    pub fn embedding_dim(&self) -> usize {
        self.config.embedding_dim
    }

    /// Extract the signature of `face` within `image`.
    pub fn extract(&self, image: &RgbImage, face: &FaceBox) -> Result<FaceSignature, RecognizerError> {
        let landmarks = face.landmarks.as_ref().ok_or(RecognizerError::NoLandmarks)?;
        let aligned = alignment::align_face(image, landmarks, self.config.input_size);
        let input = preprocess(&aligned);

        let raw: Vec<f32> = {
            let mut session = lock_session(&self.session);
            let outputs = session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
            let (_, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| RecognizerError::InferenceFailed(format!("embedding extraction: {e}")))?;
            data.to_vec()
        };

        if raw.len() != self.config.embedding_dim {
            return Err(RecognizerError::InferenceFailed(format!(
                "expected {}-dim embedding, got {}",
                self.config.embedding_dim,
                raw.len()
            )));
        }

        Ok(FaceSignature::new(l2_normalize(&raw)))
    }
}

/// Normalize an aligned RGB crop into a 1×3×N×N tensor.
fn preprocess(aligned: &RgbImage) -> Array4<f32> {
    let (w, h) = aligned.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 3, h as usize, w as usize));

    for (x, y, pixel) in aligned.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] =
                (pixel.0[c] as f32 - EMBEDDING_MEAN) / EMBEDDING_STD;
        }
    }

    tensor
}

/// Scale to unit length; an all-zero vector is passed through unchanged.
fn l2_normalize(raw: &[f32]) -> Vec<f64> {
    let norm = raw.iter().map(|&v| (v as f64).powi(2)).sum::<f64>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|&v| v as f64 / norm).collect()
    } else {
        raw.iter().map(|&v| v as f64).collect()
    }
}
