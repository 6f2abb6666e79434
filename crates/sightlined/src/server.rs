//! Router construction and the serve loop.

use crate::config::Config;
use crate::middleware::{log_requests, request_id};
use crate::routes;
use crate::state::AppState;
use crate::worker;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use sightline_core::AiService;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the router for `state`.
///
/// Layers, outermost first: trace, request id, request log, CORS, timeout,
/// body limit.
pub fn build_router(state: AppState, config: &Config) -> Router {
    let cors = if config.cors_enabled {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/face-recognition", post(routes::face_recognition))
        .route("/api/compare-faces", post(routes::compare_faces))
        .route("/api/object-detection", post(routes::object_detection))
        .fallback(routes::not_found)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(cors)
        .layer(from_fn(log_requests))
        .layer(from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the worker pool over `service` and build the router for it.
pub fn app(service: Arc<AiService>, config: &Config) -> Result<Router, worker::WorkerError> {
    let workers = worker::spawn_workers(service, config.workers, config.queue_depth)?;
    let state = AppState {
        workers,
        default_tolerance: config.default_tolerance,
    };
    Ok(build_router(state, config))
}

/// Serve until Ctrl+C or SIGTERM.
pub async fn serve(service: Arc<AiService>, config: Config) -> anyhow::Result<()> {
    let router = app(service, &config)?;
    let addr = config.socket_addr();

    tracing::info!(
        %addr,
        workers = config.workers,
        timeout_secs = config.request_timeout_secs,
        max_body_bytes = config.max_body_bytes,
        cors = config.cors_enabled,
        "sightlined listening"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("sightlined shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
