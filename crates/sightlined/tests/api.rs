//! HTTP contract tests: routes, status codes and bodies, driven through the
//! router with a stub face encoder.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};
use sightline_core::{AiService, EncoderError, FaceEncoder, FaceSignature, PixelMatrix};
use sightlined::Config;
use std::io::Cursor;
use std::sync::Arc;
use tower::ServiceExt;

/// Treats any image with a bright pixel as containing one face.
struct StubEncoder;

impl FaceEncoder for StubEncoder {
    fn encode(&self, image: &PixelMatrix) -> Result<Option<FaceSignature>, EncoderError> {
        let bright = image.to_luma().pixels().any(|p| p.0[0] > 200);
        Ok(bright.then(|| FaceSignature::new((0..128).map(|i| i as f64 / 1000.0).collect())))
    }
}

fn router() -> axum::Router {
    let config = Config {
        workers: 2,
        queue_depth: 8,
        ..Config::default()
    };
    let service = Arc::new(AiService::new(Box::new(StubEncoder)));
    sightlined::app(service, &config).expect("worker pool")
}

fn png_base64(img: RgbImage) -> String {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    STANDARD.encode(buf)
}

fn square_image() -> RgbImage {
    let mut img = RgbImage::new(160, 120);
    for y in 30..90 {
        for x in 50..110 {
            img.put_pixel(x, y, Rgb([255, 255, 255]));
        }
    }
    img
}

async fn post(uri: &str, body: Value) -> (StatusCode, Value) {
    send(
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

async fn send(request: Request<Body>) -> (StatusCode, Value) {
    let response = router().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "healthy", "service": "AI Service" }));
}

#[tokio::test]
async fn test_unknown_route() {
    let (status, body) = send(Request::get("/nope").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");
}

#[tokio::test]
async fn test_encode_success() {
    let image = format!("data:image/png;base64,{}", png_base64(square_image()));
    let (status, body) = post("/api/face-recognition", json!({ "image": image })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["faces_detected"], 1);
    assert_eq!(body["message"], "Face encoded successfully");
    assert_eq!(body["face_encoding"].as_array().unwrap().len(), 128);
}

#[tokio::test]
async fn test_encode_missing_image() {
    let (status, body) = post("/api/face-recognition", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No image data provided");

    let (status, _) = post("/api/face-recognition", json!({ "image": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_encode_no_face() {
    let image = png_base64(RgbImage::from_pixel(64, 64, Rgb([30, 30, 30])));
    let (status, body) = post("/api/face-recognition", json!({ "image": image })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No face detected in image");
}

#[tokio::test]
async fn test_encode_undecodable_reports_no_face() {
    let (status, body) = post("/api/face-recognition", json!({ "image": "!!not-base64!!" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No face detected in image");
}

#[tokio::test]
async fn test_encode_then_compare_round_trip() {
    let image = png_base64(square_image());
    let (_, encoded) = post("/api/face-recognition", json!({ "image": image })).await;
    let encoding = encoded["face_encoding"].clone();

    let (status, body) = post(
        "/api/compare-faces",
        json!({ "encoding1": encoding, "encoding2": encoding }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["match"], true);
    assert_eq!(body["distance"], 0.0);
    assert_eq!(body["similarity"], 100.0);
}

#[tokio::test]
async fn test_compare_with_tolerance() {
    let (status, body) = post(
        "/api/compare-faces",
        json!({ "encoding1": [0.0, 0.0], "encoding2": [0.3, 0.4], "tolerance": 0.4 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["match"], false);
    assert!((body["distance"].as_f64().unwrap() - 0.5).abs() < 1e-9);
    assert!((body["similarity"].as_f64().unwrap() - 50.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_compare_missing_or_empty_encoding() {
    let (status, body) = post("/api/compare-faces", json!({ "encoding1": [0.1] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Two face encodings required");

    let (status, _) = post("/api/compare-faces", json!({ "encoding1": [], "encoding2": [0.1] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_compare_failures_are_500() {
    let (status, body) = post(
        "/api/compare-faces",
        json!({ "encoding1": [0.1, 0.2], "encoding2": [0.1] }),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Error comparing faces");

    let (status, _) = post(
        "/api/compare-faces",
        json!({ "encoding1": [0.1, "x"], "encoding2": [0.1, 0.2] }),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_compare_tolerance_fallbacks() {
    let (status, body) = post(
        "/api/compare-faces",
        json!({ "encoding1": [0.0], "encoding2": [0.5], "tolerance": null }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["match"], true);

    let (status, body) = post(
        "/api/compare-faces",
        json!({ "encoding1": [0.0], "encoding2": [0.5], "tolerance": "loose" }),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Error comparing faces");
}

#[tokio::test]
async fn test_detect_single_square() {
    let image = png_base64(square_image());
    let (status, body) = post("/api/object-detection", json!({ "image": image })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 1);

    let object = &body["objects"][0];
    assert_eq!(object["type"], "object");
    let bbox: Vec<u64> = object["bbox"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_u64().unwrap())
        .collect();
    assert!(bbox[0].abs_diff(50) <= 1 && bbox[1].abs_diff(30) <= 1);
    assert!(bbox[2].abs_diff(60) <= 2 && bbox[3].abs_diff(60) <= 2);
    assert!(object["area"].as_f64().unwrap() > 1000.0);
}

#[tokio::test]
async fn test_detect_bad_payload_is_empty() {
    let (status, body) = post("/api/object-detection", json!({ "image": "garbage!" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
    assert_eq!(body["objects"], json!([]));
}

#[tokio::test]
async fn test_detect_missing_image() {
    let (status, body) = post("/api/object-detection", json!({ "img": "x" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No image data provided");
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let (status, body) = send(
        Request::post("/api/object-detection")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request body");
}

#[tokio::test]
async fn test_request_id_echoed() {
    let response = router()
        .oneshot(
            Request::get("/health")
                .header("x-request-id", "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "abc-123");
}
