//! Face alignment via 4-DOF similarity transform.
//!
//! Maps the five detected landmarks onto the canonical InsightFace template
//! (defined for a 112×112 crop, scaled to the embedding input size) and
//! warps the face into a square RGB crop.

use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};

const TEMPLATE_SIZE: f32 = 112.0;

/// Canonical landmark template for a 112×112 crop.
const TEMPLATE_LANDMARKS: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

/// Template landmarks scaled to an `output_size`-pixel square crop.
fn template_for(output_size: u32) -> [(f32, f32); 5] {
    let s = output_size as f32 / TEMPLATE_SIZE;
    TEMPLATE_LANDMARKS.map(|(x, y)| (x * s, y * s))
}

/// Least-squares similarity transform taking `src` points onto `dst`.
///
/// Solves for `(a, b, tx, ty)` in
/// ```text
/// | a  -b  tx |
/// | b   a  ty |
/// ```
/// and returns the full 3×3 row-major matrix, or `None` when the normal
/// equations are singular (all landmarks coincide).
fn estimate_similarity(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> Option<[f32; 9]> {
    // Normal equations AᵀA·p = Aᵀy, two rows per point pair.
    let mut ata = [[0.0f64; 4]; 4];
    let mut aty = [0.0f64; 4];

    for (&(sx, sy), &(dx, dy)) in src.iter().zip(dst.iter()) {
        let (sx, sy, dx, dy) = (sx as f64, sy as f64, dx as f64, dy as f64);
        let rows = [([sx, -sy, 1.0, 0.0], dx), ([sy, sx, 0.0, 1.0], dy)];
        for (row, target) in rows {
            for j in 0..4 {
                for k in 0..4 {
                    ata[j][k] += row[j] * row[k];
                }
                aty[j] += row[j] * target;
            }
        }
    }

    let [a, b, tx, ty] = solve4(ata, aty)?;
    let (a, b, tx, ty) = (a as f32, b as f32, tx as f32, ty as f32);
    Some([a, -b, tx, b, a, ty, 0.0, 0.0, 1.0])
}

/// Gaussian elimination with partial pivoting on a 4×4 system.
#[allow(clippy::needless_range_loop)]
fn solve4(mut m: [[f64; 4]; 4], mut rhs: [f64; 4]) -> Option<[f64; 4]> {
    for col in 0..4 {
        let pivot_row = (col..4).max_by(|&i, &j| m[i][col].abs().total_cmp(&m[j][col].abs()))?;
        m.swap(col, pivot_row);
        rhs.swap(col, pivot_row);

        let pivot = m[col][col];
        if pivot.abs() < 1e-12 {
            return None;
        }

        for row in (col + 1)..4 {
            let factor = m[row][col] / pivot;
            for k in col..4 {
                m[row][k] -= factor * m[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = [0.0f64; 4];
    for i in (0..4).rev() {
        let tail: f64 = ((i + 1)..4).map(|j| m[i][j] * x[j]).sum();
        x[i] = (rhs[i] - tail) / m[i][i];
    }
    Some(x)
}

/// Warp the face described by `landmarks` into an `output_size`² RGB crop.
///
/// Pixels sampled from outside the source are black. Degenerate landmark
/// sets produce an all-black crop.
pub fn align_face(image: &RgbImage, landmarks: &[(f32, f32); 5], output_size: u32) -> RgbImage {
    let mut aligned = RgbImage::new(output_size, output_size);

    let projection = estimate_similarity(landmarks, &template_for(output_size))
        .and_then(Projection::from_matrix);

    match projection {
        Some(projection) => {
            warp_into(image, &projection, Interpolation::Bilinear, Rgb([0, 0, 0]), &mut aligned);
        }
        None => tracing::debug!("degenerate landmarks; alignment produced an empty crop"),
    }

    aligned
}
