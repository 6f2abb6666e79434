//! Unsupervised foreground region detection.
//!
//! Grayscale → 5×5 Gaussian blur → binary threshold → outermost contours.
//! Each contour enclosing more than [`MIN_REGION_AREA`] px² becomes a
//! [`DetectedRegion`]; at most [`MAX_REGIONS`] are reported, in extraction
//! order.

use crate::decoder::PixelMatrix;
use crate::types::{DetectedRegion, RegionBox, RegionKind};
use image::imageops;
use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::filter::separable_filter_equal;
use imageproc::point::Point;

/// Luminance cutoff: `< 60` is background, `>= 60` is foreground.
pub const THRESHOLD_LEVEL: u8 = 60;
/// Contours enclosing this many px² or fewer are treated as noise.
pub const MIN_REGION_AREA: f64 = 1000.0;
/// Maximum number of regions reported per image.
pub const MAX_REGIONS: usize = 10;

const CONFIDENCE_FULL_AREA: f64 = 10_000.0;
const FOREGROUND: u8 = 255;
const BACKGROUND: u8 = 0;

// 5-tap binomial kernel, the Gaussian a 5×5 window gets with automatic sigma.
const BLUR_KERNEL: [f32; 5] = [0.0625, 0.25, 0.375, 0.25, 0.0625];

/// Contour-based region detector. Stateless; safe to share across threads.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegionDetector;

impl RegionDetector {
    pub fn new() -> Self {
        Self
    }

    /// Find foreground regions in `image`.
    pub fn detect(&self, image: &PixelMatrix) -> Vec<DetectedRegion> {
        if image.width() == 0 || image.height() == 0 {
            return Vec::new();
        }

        let gray = image.to_luma();
        let blurred = separable_filter_equal(&gray, &BLUR_KERNEL[..]);
        let binary = binarize(&blurred, THRESHOLD_LEVEL);

        let contours = external_contours(&binary);
        let total = contours.len();

        let regions: Vec<DetectedRegion> = contours
            .iter()
            .filter_map(|points| region_from_contour(points))
            .take(MAX_REGIONS)
            .collect();

        tracing::debug!(
            width = image.width(),
            height = image.height(),
            contours = total,
            regions = regions.len(),
            "region detection finished"
        );

        regions
    }
}

/// Binary threshold: pixels at or above `level` become foreground.
fn binarize(image: &GrayImage, level: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if image.get_pixel(x, y).0[0] >= level {
            Luma([FOREGROUND])
        } else {
            Luma([BACKGROUND])
        }
    })
}

/// Outermost outer borders only, each compressed to its direction changes.
///
/// Border following only sees an outer border when background surrounds it,
/// so the image is framed with one pixel of background first. Foreground
/// touching the image edge would otherwise come back as a hole.
fn external_contours(binary: &GrayImage) -> Vec<Vec<Point<i32>>> {
    let mut framed = GrayImage::from_pixel(
        binary.width() + 2,
        binary.height() + 2,
        Luma([BACKGROUND]),
    );
    imageops::replace(&mut framed, binary, 1, 1);

    find_contours::<i32>(&framed)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| {
            let points: Vec<Point<i32>> = c
                .points
                .iter()
                .map(|p| Point::new(p.x - 1, p.y - 1))
                .collect();
            compress_collinear(&points)
        })
        .collect()
}

/// Drop chain points lying on a straight run between their neighbours.
///
/// Contours from border following are 8-connected chains, so a point is
/// redundant exactly when the step into it equals the step out of it.
fn compress_collinear(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    let step = |from: Point<i32>, to: Point<i32>| (to.x - from.x, to.y - from.y);

    let kept: Vec<Point<i32>> = (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            step(prev, points[i]) != step(points[i], next)
        })
        .map(|i| points[i])
        .collect();

    if kept.len() < 2 {
        points.to_vec()
    } else {
        kept
    }
}

/// Area enclosed by a closed polygon (shoelace formula).
fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();

    twice.abs() as f64 / 2.0
}

/// Tight axis-aligned rectangle around the contour points.
fn bounding_rect(points: &[Point<i32>]) -> Option<RegionBox> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);

    for p in &points[1..] {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    Some(RegionBox {
        x: min_x.max(0) as u32,
        y: min_y.max(0) as u32,
        width: (max_x - min_x + 1) as u32,
        height: (max_y - min_y + 1) as u32,
    })
}

fn region_from_contour(points: &[Point<i32>]) -> Option<DetectedRegion> {
    let area = polygon_area(points);
    if area <= MIN_REGION_AREA {
        return None;
    }

    Some(DetectedRegion {
        kind: RegionKind::Object,
        confidence: (area / CONFIDENCE_FULL_AREA * 100.0).min(100.0),
        bounding_box: bounding_rect(points)?,
        area,
    })
}
