//! Signature comparison by Euclidean distance.

use crate::types::{ComparisonResult, FaceSignature};
use serde_json::Value;
use thiserror::Error;

/// Distance below which two signatures are considered the same person.
pub const DEFAULT_TOLERANCE: f64 = 0.6;

#[derive(Error, Debug, PartialEq)]
pub enum CompareError {
    #[error("signature is empty")]
    Empty,
    #[error("signature lengths differ: {known} vs {unknown}")]
    LengthMismatch { known: usize, unknown: usize },
    #[error("signature entry {index} is not a finite number")]
    NonFinite { index: usize },
    #[error("signature entry {index} is not numeric")]
    NonNumeric { index: usize },
}

/// Compare `known` against `unknown`.
///
/// `match` is `distance < tolerance` (strict), so a negative tolerance never
/// matches. `similarity` is `100 - 100·distance`, clamped at 0.
pub fn compare(
    known: &FaceSignature,
    unknown: &FaceSignature,
    tolerance: f64,
) -> Result<ComparisonResult, CompareError> {
    if known.is_empty() || unknown.is_empty() {
        return Err(CompareError::Empty);
    }
    if known.len() != unknown.len() {
        return Err(CompareError::LengthMismatch {
            known: known.len(),
            unknown: unknown.len(),
        });
    }
    ensure_finite(known)?;
    ensure_finite(unknown)?;

    let distance = known.euclidean_distance(unknown);

    Ok(ComparisonResult {
        matched: distance < tolerance,
        similarity: (100.0 - distance * 100.0).max(0.0),
        distance,
    })
}

fn ensure_finite(signature: &FaceSignature) -> Result<(), CompareError> {
    match signature.values().iter().position(|v| !v.is_finite()) {
        Some(index) => Err(CompareError::NonFinite { index }),
        None => Ok(()),
    }
}

/// Build a signature from untyped JSON values, rejecting non-numbers.
pub fn signature_from_json(values: &[Value]) -> Result<FaceSignature, CompareError> {
    values
        .iter()
        .enumerate()
        .map(|(index, v)| v.as_f64().ok_or(CompareError::NonNumeric { index }))
        .collect::<Result<Vec<f64>, _>>()
        .map(FaceSignature::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sig(values: &[f64]) -> FaceSignature {
        FaceSignature::new(values.to_vec())
    }

    fn ramp(len: usize, offset: f64) -> FaceSignature {
        FaceSignature::new((0..len).map(|i| i as f64 / len as f64 + offset).collect())
    }

    #[test]
    fn test_identical_signatures() {
        let a = ramp(128, 0.0);
        let r = compare(&a, &a, DEFAULT_TOLERANCE).unwrap();
        assert!(r.matched);
        assert_eq!(r.distance, 0.0);
        assert_eq!(r.similarity, 100.0);
    }

    #[test]
    fn test_symmetry() {
        let a = ramp(128, 0.0);
        let b = ramp(128, 0.01);
        let ab = compare(&a, &b, 0.2).unwrap();
        let ba = compare(&b, &a, 0.2).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_similarity_scale_and_clamp() {
        let r = compare(&sig(&[0.0, 0.0]), &sig(&[0.3, 0.4]), DEFAULT_TOLERANCE).unwrap();
        assert!((r.distance - 0.5).abs() < 1e-12);
        assert!((r.similarity - 50.0).abs() < 1e-9);
        assert!(r.matched);

        let far = compare(&sig(&[0.0, 0.0]), &sig(&[3.0, 4.0]), DEFAULT_TOLERANCE).unwrap();
        assert_eq!(far.distance, 5.0);
        assert_eq!(far.similarity, 0.0);
        assert!(!far.matched);

        let unit = compare(&sig(&[0.0]), &sig(&[1.0]), 2.0).unwrap();
        assert_eq!(unit.similarity, 0.0);
        assert!(unit.matched);
    }

    #[test]
    fn test_strict_inequality() {
        let r = compare(&sig(&[0.0]), &sig(&[0.5]), 0.5).unwrap();
        assert!(!r.matched);
    }

    #[test]
    fn test_zero_and_negative_tolerance() {
        let a = sig(&[0.1, 0.2]);
        let b = sig(&[0.1, 0.2000001]);
        assert!(!compare(&a, &b, 0.0).unwrap().matched);
        assert!(!compare(&a, &a, 0.0).unwrap().matched);
        assert!(!compare(&a, &a, -1.0).unwrap().matched);
    }

    #[test]
    fn test_large_tolerance_accepted() {
        assert!(compare(&sig(&[0.0]), &sig(&[3.0]), 10.0).unwrap().matched);
    }

    #[test]
    fn test_length_mismatch() {
        let err = compare(&sig(&[1.0, 2.0]), &sig(&[1.0]), DEFAULT_TOLERANCE).unwrap_err();
        assert_eq!(err, CompareError::LengthMismatch { known: 2, unknown: 1 });
    }

    #[test]
    fn test_empty_rejected() {
        assert_eq!(compare(&sig(&[]), &sig(&[]), DEFAULT_TOLERANCE), Err(CompareError::Empty));
    }

    #[test]
    fn test_non_finite_rejected() {
        let err = compare(&sig(&[0.0, f64::NAN]), &sig(&[0.0, 0.0]), DEFAULT_TOLERANCE).unwrap_err();
        assert_eq!(err, CompareError::NonFinite { index: 1 });
    }

    #[test]
    fn test_signature_from_json() {
        let ok = signature_from_json(&[json!(1), json!(0.5), json!(-2.0)]).unwrap();
        assert_eq!(ok.values(), &[1.0, 0.5, -2.0]);

        let err = signature_from_json(&[json!(1.0), json!("x")]).unwrap_err();
        assert_eq!(err, CompareError::NonNumeric { index: 1 });
    }
}
