use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use sightline_core::comparator::{self, signature_from_json};
use sightline_core::decoder::decode_bytes;
use sightline_core::recognizer::{DEFAULT_EMBEDDING_DIM, DEFAULT_INPUT_SIZE};
use sightline_core::{
    EncoderConfig, FaceEncoder, FaceSignature, OnnxFaceEncoder, RecognizerConfig, RegionDetector,
    DEFAULT_TOLERANCE,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sightline", about = "Face signatures and region detection on local images")]
struct Cli {
    /// Directory containing the ONNX models
    #[arg(long, global = true, env = "SIGHTLINE_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    /// SCRFD detection model file name inside the model directory
    #[arg(long, global = true, env = "SIGHTLINE_DETECTOR_MODEL", default_value = "det_10g.onnx")]
    detector_model: String,

    /// Face embedding model file name inside the model directory
    #[arg(long, global = true, env = "SIGHTLINE_EMBEDDING_MODEL", default_value = "face_embedding.onnx")]
    embedding_model: String,

    /// Length of the signatures produced by the embedding model
    #[arg(long, global = true, env = "SIGHTLINE_EMBEDDING_DIM", default_value_t = DEFAULT_EMBEDDING_DIM)]
    embedding_dim: usize,

    /// Square crop size fed to the embedding model
    #[arg(long, global = true, env = "SIGHTLINE_EMBEDDING_INPUT_SIZE", default_value_t = DEFAULT_INPUT_SIZE)]
    embedding_input_size: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the face signature of the first face in an image
    Encode {
        /// Image file (any format the decoder understands)
        image: PathBuf,
    },
    /// Compare two signatures saved as JSON
    Compare {
        /// Known signature: a JSON array, or the output of `encode`
        first: PathBuf,
        /// Candidate signature
        second: PathBuf,
        /// Match threshold on Euclidean distance
        #[arg(short, long, default_value_t = DEFAULT_TOLERANCE)]
        tolerance: f64,
    },
    /// List bright foreground regions in an image
    Detect {
        image: PathBuf,
    },
}

impl Cli {
    fn encoder_config(&self) -> EncoderConfig {
        let model_dir = self
            .model_dir
            .clone()
            .unwrap_or_else(sightline_core::default_model_dir);
        EncoderConfig {
            detector_model: model_dir.join(&self.detector_model),
            embedding_model: model_dir.join(&self.embedding_model),
            recognizer: RecognizerConfig {
                input_size: self.embedding_input_size,
                embedding_dim: self.embedding_dim,
            },
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Encode { image } => {
            let config = cli.encoder_config();
            let encoder = OnnxFaceEncoder::load(&config).with_context(|| {
                format!(
                    "failed to load models {} and {}",
                    config.detector_model.display(),
                    config.embedding_model.display()
                )
            })?;

            let pixels = read_image(image)?;
            let Some(signature) = encoder.encode(&pixels)? else {
                bail!("no face detected in {}", image.display());
            };
            print_json(&serde_json::json!({
                "face_encoding": signature,
                "faces_detected": 1,
            }))?;
        }
        Commands::Compare {
            first,
            second,
            tolerance,
        } => {
            let known = read_signature(first)?;
            let unknown = read_signature(second)?;
            let result = comparator::compare(&known, &unknown, *tolerance)?;
            print_json(&result)?;
        }
        Commands::Detect { image } => {
            let objects = RegionDetector::new().detect(&read_image(image)?);
            print_json(&serde_json::json!({
                "count": objects.len(),
                "objects": objects,
            }))?;
        }
    }

    Ok(())
}

fn read_image(path: &Path) -> Result<sightline_core::PixelMatrix> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let pixels =
        decode_bytes(&bytes).with_context(|| format!("failed to decode {}", path.display()))?;
    tracing::debug!(
        path = %path.display(),
        width = pixels.width(),
        height = pixels.height(),
        channels = pixels.channels(),
        "image decoded"
    );
    Ok(pixels)
}

/// Accepts a bare JSON array or an object with a `face_encoding` field.
fn read_signature(path: &Path) -> Result<FaceSignature> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;

    let values = match &value {
        Value::Array(values) => values,
        Value::Object(map) => match map.get("face_encoding") {
            Some(Value::Array(values)) => values,
            _ => bail!("{} has no face_encoding array", path.display()),
        },
        _ => bail!("{} does not contain a signature", path.display()),
    };

    Ok(signature_from_json(values)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoder_config_defaults() {
        let cli =
            Cli::try_parse_from(["sightline", "--model-dir", "/models", "encode", "a.png"]).unwrap();
        let config = cli.encoder_config();
        assert_eq!(config.detector_model, PathBuf::from("/models/det_10g.onnx"));
        assert_eq!(config.embedding_model, PathBuf::from("/models/face_embedding.onnx"));
        assert_eq!(config.recognizer.embedding_dim, DEFAULT_EMBEDDING_DIM);
        assert_eq!(config.recognizer.input_size, DEFAULT_INPUT_SIZE);
    }

    #[test]
    fn test_encoder_config_overrides() {
        let cli = Cli::try_parse_from([
            "sightline",
            "encode",
            "a.png",
            "--model-dir",
            "/opt/m",
            "--detector-model",
            "scrfd_2.5g.onnx",
            "--embedding-model",
            "arcface.onnx",
            "--embedding-dim",
            "512",
        ])
        .unwrap();
        let config = cli.encoder_config();
        assert_eq!(config.detector_model, PathBuf::from("/opt/m/scrfd_2.5g.onnx"));
        assert_eq!(config.embedding_model, PathBuf::from("/opt/m/arcface.onnx"));
        assert_eq!(config.recognizer.embedding_dim, 512);
    }

    #[test]
    fn test_compare_tolerance_default() {
        let cli = Cli::try_parse_from(["sightline", "compare", "a.json", "b.json"]).unwrap();
        match cli.command {
            Commands::Compare { tolerance, .. } => assert_eq!(tolerance, DEFAULT_TOLERANCE),
            _ => panic!("expected compare"),
        }
    }
}
