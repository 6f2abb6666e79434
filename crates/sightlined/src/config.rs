use sightline_core::{EncoderConfig, RecognizerConfig};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address (default: 0.0.0.0).
    pub bind_addr: IpAddr,
    /// Listen port, from `PORT` (default: 5000).
    pub port: u16,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// SCRFD detection model file name inside `model_dir`.
    pub detector_model: String,
    /// Face embedding model file name inside `model_dir`.
    pub embedding_model: String,
    /// Length of the signatures produced by the embedding model.
    pub embedding_dim: usize,
    /// Square crop size fed to the embedding model.
    pub embedding_input_size: u32,
    /// Tolerance used when a compare request does not supply one.
    pub default_tolerance: f64,
    /// Number of analysis worker threads.
    pub workers: usize,
    /// Pending requests allowed before handlers wait for a free slot.
    pub queue_depth: usize,
    /// Per-request timeout in seconds, applied around the whole operation.
    pub request_timeout_secs: u64,
    /// Maximum accepted request body, in bytes.
    pub max_body_bytes: usize,
    /// Whether to answer cross-origin requests.
    pub cors_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        let workers = default_workers();
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 5000,
            model_dir: sightline_core::default_model_dir(),
            detector_model: "det_10g.onnx".to_string(),
            embedding_model: "face_embedding.onnx".to_string(),
            embedding_dim: sightline_core::recognizer::DEFAULT_EMBEDDING_DIM,
            embedding_input_size: sightline_core::recognizer::DEFAULT_INPUT_SIZE,
            default_tolerance: sightline_core::DEFAULT_TOLERANCE,
            workers,
            queue_depth: workers * 4,
            request_timeout_secs: 30,
            max_body_bytes: 20 * 1024 * 1024,
            cors_enabled: true,
        }
    }
}

impl Config {
    /// Load configuration from `PORT` and `SIGHTLINE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let workers = env_parse("SIGHTLINE_WORKERS", defaults.workers).max(1);

        Self {
            bind_addr: env_parse("SIGHTLINE_BIND_ADDR", defaults.bind_addr),
            port: env_parse("PORT", defaults.port),
            model_dir: std::env::var("SIGHTLINE_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_dir),
            detector_model: std::env::var("SIGHTLINE_DETECTOR_MODEL")
                .unwrap_or(defaults.detector_model),
            embedding_model: std::env::var("SIGHTLINE_EMBEDDING_MODEL")
                .unwrap_or(defaults.embedding_model),
            embedding_dim: env_parse("SIGHTLINE_EMBEDDING_DIM", defaults.embedding_dim),
            embedding_input_size: env_parse(
                "SIGHTLINE_EMBEDDING_INPUT_SIZE",
                defaults.embedding_input_size,
            ),
            default_tolerance: env_parse("SIGHTLINE_DEFAULT_TOLERANCE", defaults.default_tolerance),
            workers,
            queue_depth: env_parse("SIGHTLINE_QUEUE_DEPTH", workers * 4).max(1),
            request_timeout_secs: env_parse(
                "SIGHTLINE_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            ),
            max_body_bytes: env_parse("SIGHTLINE_MAX_BODY_BYTES", defaults.max_body_bytes),
            cors_enabled: env_flag("SIGHTLINE_CORS_ENABLED", defaults.cors_enabled),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    /// Model paths and embedding shape for the face encoder.
    pub fn encoder_config(&self) -> EncoderConfig {
        EncoderConfig {
            detector_model: self.model_dir.join(&self.detector_model),
            embedding_model: self.model_dir.join(&self.embedding_model),
            recognizer: RecognizerConfig {
                input_size: self.embedding_input_size,
                embedding_dim: self.embedding_dim,
            },
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Boolean switch: `1/true/yes/on` or `0/false/no/off`, case-insensitive.
/// Unset or unrecognised values keep the default.
fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| parse_flag(&v))
        .unwrap_or(default)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.embedding_dim, 128);
        assert_eq!(config.default_tolerance, 0.6);
        assert!(config.workers >= 1);
        assert_eq!(config.queue_depth, config.workers * 4);
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:5000");
    }

    #[test]
    fn test_encoder_paths() {
        let config = Config {
            model_dir: PathBuf::from("/models"),
            ..Config::default()
        };
        let enc = config.encoder_config();
        assert_eq!(enc.detector_model, PathBuf::from("/models/det_10g.onnx"));
        assert_eq!(enc.embedding_model, PathBuf::from("/models/face_embedding.onnx"));
        assert_eq!(enc.recognizer.embedding_dim, 128);
    }

    #[test]
    fn test_parse_flag() {
        for off in ["0", "false", "FALSE", "no", "off", " Off "] {
            assert_eq!(parse_flag(off), Some(false), "{off:?}");
        }
        for on in ["1", "true", "Yes", "on"] {
            assert_eq!(parse_flag(on), Some(true), "{on:?}");
        }
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_cors_can_be_disabled() {
        std::env::set_var("SIGHTLINE_TEST_CORS_OFF", "false");
        assert!(!env_flag("SIGHTLINE_TEST_CORS_OFF", true));

        std::env::set_var("SIGHTLINE_TEST_CORS_OFF", "garbage");
        assert!(env_flag("SIGHTLINE_TEST_CORS_OFF", true));
        std::env::remove_var("SIGHTLINE_TEST_CORS_OFF");
    }

    #[test]
    fn test_env_parse_fallback() {
        assert_eq!(env_parse("SIGHTLINE_TEST_UNSET_KEY", 7u64), 7);
    }
}
