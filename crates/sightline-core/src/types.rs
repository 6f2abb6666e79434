use serde::{Deserialize, Serialize};

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl FaceBox {
    /// Intersection-over-union with another box, 0.0 for disjoint or degenerate boxes.
    pub fn iou(&self, other: &FaceBox) -> f32 {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);

        let overlap = (right - left).max(0.0) * (bottom - top).max(0.0);
        let union = self.width * self.height + other.width * other.height - overlap;

        if union > 0.0 {
            overlap / union
        } else {
            0.0
        }
    }
}

/// Fixed-length face embedding.
///
/// Serialized as a bare array of numbers so it round-trips through JSON
/// clients unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceSignature {
    values: Vec<f64>,
}

impl FaceSignature {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// L2 distance over the paired components.
    ///
    /// Callers are expected to have checked that both signatures have the
    /// same length; extra trailing components are ignored.
    pub fn euclidean_distance(&self, other: &FaceSignature) -> f64 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

impl From<Vec<f64>> for FaceSignature {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

/// Outcome of comparing two face signatures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    #[serde(rename = "match")]
    pub matched: bool,
    /// Linear heuristic score in [0, 100], not a probability.
    pub similarity: f64,
    pub distance: f64,
}

/// Label attached to every detected region. Detection is unsupervised, so
/// there is only one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    Object,
}

/// Axis-aligned pixel rectangle, serialized as `[x, y, width, height]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "[u32; 4]", from = "[u32; 4]")]
pub struct RegionBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl From<RegionBox> for [u32; 4] {
    fn from(b: RegionBox) -> Self {
        [b.x, b.y, b.width, b.height]
    }
}

impl From<[u32; 4]> for RegionBox {
    fn from([x, y, width, height]: [u32; 4]) -> Self {
        Self { x, y, width, height }
    }
}

/// A foreground blob found by the region detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedRegion {
    #[serde(rename = "type")]
    pub kind: RegionKind,
    /// Area-derived heuristic in [0, 100], saturating at 10 000 px².
    pub confidence: f64,
    #[serde(rename = "bbox")]
    pub bounding_box: RegionBox,
    /// Enclosed contour area in px².
    pub area: f64,
}
