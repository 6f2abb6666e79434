use anyhow::{Context, Result};
use sightline_core::{AiService, OnnxFaceEncoder};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = sightlined::Config::from_env();
    tracing::info!(model_dir = %config.model_dir.display(), "sightlined starting");

    // Load models before accepting traffic.
    let encoder_config = config.encoder_config();
    let encoder = OnnxFaceEncoder::load(&encoder_config).with_context(|| {
        format!(
            "loading face models from {}",
            config.model_dir.display()
        )
    })?;
    let service = Arc::new(AiService::new(Box::new(encoder)));

    tracing::info!("sightlined ready");
    sightlined::serve(service, config).await
}
