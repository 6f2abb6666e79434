//! SCRFD face detector via ONNX Runtime.
//!
//! Letterboxes the RGB input to 640×640, decodes the three anchor-free
//! stride heads (score, box, 5-point landmarks) and applies NMS. Results are
//! ordered by descending confidence, which is the order the encoder treats
//! as "first face".

use crate::session::lock_session;
use crate::types::FaceBox;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

const SCRFD_INPUT_SIZE: u32 = 640;
const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_CONFIDENCE_THRESHOLD: f32 = 0.5;
const SCRFD_NMS_THRESHOLD: f32 = 0.4;
const SCRFD_STRIDES: [usize; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;
const SCRFD_OUTPUTS: usize = 9;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0}; download det_10g.onnx from insightface and place it in the model dir")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Letterbox geometry used to map detections back to source pixels.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn for_image(width: u32, height: u32) -> Self {
        let target = SCRFD_INPUT_SIZE as f32;
        let scale = (target / width as f32).min(target / height as f32);
        let (new_w, new_h) = Self::scaled(width, height, scale);
        Self {
            scale,
            pad_x: ((SCRFD_INPUT_SIZE - new_w) / 2) as f32,
            pad_y: ((SCRFD_INPUT_SIZE - new_h) / 2) as f32,
        }
    }

    fn scaled(width: u32, height: u32, scale: f32) -> (u32, u32) {
        let w = ((width as f32 * scale).round() as u32).clamp(1, SCRFD_INPUT_SIZE);
        let h = ((height as f32 * scale).round() as u32).clamp(1, SCRFD_INPUT_SIZE);
        (w, h)
    }

    fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Output tensor positions for one stride level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StrideHeads {
    score: usize,
    bbox: usize,
    kps: usize,
}

/// Raw tensors of one stride level, borrowed from the session outputs.
struct StrideOutputs<'a> {
    stride: usize,
    scores: &'a [f32],
    bboxes: &'a [f32],
    kps: &'a [f32],
}

/// SCRFD-based face detector.
pub struct FaceDetector {
    session: Mutex<Session>,
    heads: [StrideHeads; 3],
}

impl FaceDetector {
    /// Load the SCRFD ONNX model from `model_path`.
    pub fn load(model_path: &Path) -> Result<Self, DetectorError> {
        if !model_path.exists() {
            return Err(DetectorError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();

        tracing::info!(
            path = %model_path.display(),
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?output_names,
            "loaded SCRFD model"
        );

        if output_names.len() < SCRFD_OUTPUTS {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD model requires {SCRFD_OUTPUTS} outputs (3 strides × score/bbox/kps), got {}",
                output_names.len()
            )));
        }

        let heads = map_output_heads(&output_names);
        tracing::debug!(?heads, "SCRFD output tensor mapping");

        Ok(Self {
            session: Mutex::new(session),
            heads,
        })
    }

    /// Detect faces, highest confidence first.
    pub fn detect(&self, image: &RgbImage) -> Result<Vec<FaceBox>, DetectorError> {
        let (input, letterbox) = preprocess(image);

        let mut session = lock_session(&self.session);
        let outputs = session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        for (heads, &stride) in self.heads.iter().zip(SCRFD_STRIDES.iter()) {
            let extract = |idx: usize, what: &str| {
                outputs[idx]
                    .try_extract_tensor::<f32>()
                    .map(|(_, data)| data)
                    .map_err(|e| DetectorError::InferenceFailed(format!("{what} stride {stride}: {e}")))
            };

            let level = StrideOutputs {
                stride,
                scores: extract(heads.score, "scores")?,
                bboxes: extract(heads.bbox, "bboxes")?,
                kps: extract(heads.kps, "kps")?,
            };
            candidates.extend(decode_stride(&level, &letterbox, SCRFD_CONFIDENCE_THRESHOLD));
        }

        let faces = nms(candidates, SCRFD_NMS_THRESHOLD);
        tracing::debug!(faces = faces.len(), "SCRFD detection finished");
        Ok(faces)
    }
}

/// Letterbox an RGB image into a normalized 1×3×640×640 tensor.
///
/// Padding stays at zero, which is where the mean maps after normalization.
fn preprocess(image: &RgbImage) -> (Array4<f32>, Letterbox) {
    let (width, height) = image.dimensions();
    let letterbox = Letterbox::for_image(width, height);
    let (new_w, new_h) = Letterbox::scaled(width, height, letterbox.scale);
    let resized = imageops::resize(image, new_w, new_h, FilterType::Triangle);

    let size = SCRFD_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    let (off_x, off_y) = (letterbox.pad_x as usize, letterbox.pad_y as usize);

    for (x, y, pixel) in resized.enumerate_pixels() {
        let (tx, ty) = (x as usize + off_x, y as usize + off_y);
        for c in 0..3 {
            tensor[[0, c, ty, tx]] = (pixel.0[c] as f32 - SCRFD_MEAN) / SCRFD_STD;
        }
    }

    (tensor, letterbox)
}

/// Locate score/bbox/kps tensors per stride.
///
/// Exports either name them `score_8`, `bbox_16`, `kps_32`, ... or use
/// opaque numeric names in the standard order
/// `[scores 8/16/32, bboxes 8/16/32, kps 8/16/32]`.
fn map_output_heads(names: &[String]) -> [StrideHeads; 3] {
    let position = |prefix: &str, stride: usize| {
        let wanted = format!("{prefix}_{stride}");
        names.iter().position(|n| *n == wanted)
    };

    let named: Option<Vec<StrideHeads>> = SCRFD_STRIDES
        .iter()
        .map(|&stride| {
            Some(StrideHeads {
                score: position("score", stride)?,
                bbox: position("bbox", stride)?,
                kps: position("kps", stride)?,
            })
        })
        .collect();

    match named {
        Some(heads) => {
            tracing::info!("SCRFD: using name-based output tensor mapping");
            [heads[0], heads[1], heads[2]]
        }
        None => {
            tracing::info!(?names, "SCRFD: output names not recognized, using positional mapping");
            std::array::from_fn(|i| StrideHeads { score: i, bbox: i + 3, kps: i + 6 })
        }
    }
}

/// Decode one stride level into source-space face boxes.
fn decode_stride(level: &StrideOutputs<'_>, letterbox: &Letterbox, threshold: f32) -> Vec<FaceBox> {
    let stride = level.stride as f32;
    let grid_w = SCRFD_INPUT_SIZE as usize / level.stride;
    let grid_h = grid_w;
    let anchors = grid_w * grid_h * SCRFD_ANCHORS_PER_CELL;

    (0..anchors)
        .filter(|&idx| level.scores.get(idx).is_some_and(|&s| s > threshold))
        .filter_map(|idx| {
            let cell = idx / SCRFD_ANCHORS_PER_CELL;
            let ax = (cell % grid_w) as f32 * stride;
            let ay = (cell / grid_w) as f32 * stride;

            let d = level.bboxes.get(idx * 4..idx * 4 + 4)?;
            let (x1, y1) = letterbox.to_source(ax - d[0] * stride, ay - d[1] * stride);
            let (x2, y2) = letterbox.to_source(ax + d[2] * stride, ay + d[3] * stride);

            let landmarks = level.kps.get(idx * 10..idx * 10 + 10).map(|k| {
                std::array::from_fn(|i| {
                    letterbox.to_source(ax + k[i * 2] * stride, ay + k[i * 2 + 1] * stride)
                })
            });

            Some(FaceBox {
                x: x1,
                y: y1,
                width: x2 - x1,
                height: y2 - y1,
                confidence: level.scores[idx],
                landmarks,
            })
        })
        .collect()
}

/// Greedy non-maximum suppression; output is sorted by confidence.
fn nms(mut candidates: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<FaceBox> = Vec::new();
    for candidate in candidates {
        if kept.iter().all(|k| k.iou(&candidate) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}
