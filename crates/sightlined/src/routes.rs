//! HTTP handlers. Each one validates the request shape, hands the work to
//! the worker pool, and forwards the core's output unchanged.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sightline_core::comparator::signature_from_json;
use sightline_core::{ComparisonResult, DetectedRegion, FaceSignature};

const NO_IMAGE: &str = "No image data provided";
const TWO_ENCODINGS: &str = "Two face encodings required";
const INTERNAL: &str = "Internal server error";
const COMPARE_FAILED: &str = "Error comparing faces";

/// Body of the face-recognition and object-detection routes.
#[derive(Debug, Default, Deserialize)]
pub struct ImageRequest {
    #[serde(default)]
    pub image: Option<String>,
}

/// Body of the compare-faces route. Encodings and tolerance stay untyped
/// until the comparison so that non-numeric values count as a comparison
/// failure rather than a malformed body.
#[derive(Debug, Default, Deserialize)]
pub struct CompareRequest {
    #[serde(default)]
    pub encoding1: Option<Vec<Value>>,
    #[serde(default)]
    pub encoding2: Option<Vec<Value>>,
    #[serde(default)]
    pub tolerance: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct EncodeResponse {
    pub success: bool,
    pub face_encoding: FaceSignature,
    pub faces_detected: usize,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub success: bool,
    #[serde(flatten)]
    pub result: ComparisonResult,
}

#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub success: bool,
    pub objects: Vec<DetectedRegion>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        tracing::debug!(error = %rejection, "rejected request body");
        ApiError::InvalidBody
    })
}

fn required_image(request: ImageRequest) -> ApiResult<String> {
    request
        .image
        .filter(|image| !image.is_empty())
        .ok_or(ApiError::InputMissing(NO_IMAGE))
}

/// `POST /api/face-recognition`
pub async fn face_recognition(
    State(state): State<AppState>,
    payload: Result<Json<ImageRequest>, JsonRejection>,
) -> ApiResult<Json<EncodeResponse>> {
    let image = required_image(body(payload)?)?;

    let signature = state.workers.encode(image).await.map_err(|err| {
        tracing::error!(error = %err, "face recognition failed");
        ApiError::Internal(INTERNAL)
    })?;

    let face_encoding = signature.ok_or(ApiError::NoFaceDetected)?;

    Ok(Json(EncodeResponse {
        success: true,
        face_encoding,
        faces_detected: 1,
        message: "Face encoded successfully",
    }))
}

/// `POST /api/compare-faces`
pub async fn compare_faces(
    State(state): State<AppState>,
    payload: Result<Json<CompareRequest>, JsonRejection>,
) -> ApiResult<Json<CompareResponse>> {
    let request = body(payload)?;

    let (Some(first), Some(second)) = (
        request.encoding1.filter(|e| !e.is_empty()),
        request.encoding2.filter(|e| !e.is_empty()),
    ) else {
        return Err(ApiError::InputMissing(TWO_ENCODINGS));
    };

    let comparison_failed = |err: &dyn std::fmt::Display| {
        tracing::error!(error = %err, "face comparison failed");
        ApiError::Internal(COMPARE_FAILED)
    };

    let known = signature_from_json(&first).map_err(|e| comparison_failed(&e))?;
    let unknown = signature_from_json(&second).map_err(|e| comparison_failed(&e))?;
    let tolerance = match request.tolerance {
        None => state.default_tolerance,
        Some(value) => value
            .as_f64()
            .ok_or_else(|| comparison_failed(&format!("non-numeric tolerance {value}")))?,
    };

    let result = state
        .workers
        .compare(known, unknown, tolerance)
        .await
        .map_err(|e| comparison_failed(&e))?;

    Ok(Json(CompareResponse {
        success: true,
        result,
    }))
}

/// `POST /api/object-detection`
pub async fn object_detection(
    State(state): State<AppState>,
    payload: Result<Json<ImageRequest>, JsonRejection>,
) -> ApiResult<Json<DetectResponse>> {
    let image = required_image(body(payload)?)?;

    let objects = state.workers.detect(image).await.map_err(|err| {
        tracing::error!(error = %err, "object detection failed");
        ApiError::Internal(INTERNAL)
    })?;

    Ok(Json(DetectResponse {
        success: true,
        count: objects.len(),
        objects,
    }))
}

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "AI Service",
    })
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
