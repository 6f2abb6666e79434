//! Base64 image payload decoding.
//!
//! Payloads may carry a data-URI prefix (`data:image/png;base64,`), which is
//! dropped before decoding. Color images are materialized as 8-bit RGB, the
//! channel order both the region detector and the ONNX face models consume.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{ColorType, DynamicImage, GrayImage, Luma, RgbImage};
use thiserror::Error;

// BT.601 luma weights in 14-bit fixed point (sum = 1 << 14).
const LUMA_R: u32 = 4899;
const LUMA_G: u32 = 9617;
const LUMA_B: u32 = 1868;
const LUMA_SHIFT: u32 = 14;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("empty image payload")]
    Empty,
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("unreadable image: {0}")]
    Image(#[from] image::ImageError),
    #[error("image dimensions are zero")]
    ZeroDimensions,
}

/// Decoded image, owned by the operation processing it.
#[derive(Debug, Clone)]
pub enum PixelMatrix {
    Gray(GrayImage),
    Rgb(RgbImage),
}

impl PixelMatrix {
    pub fn width(&self) -> u32 {
        match self {
            PixelMatrix::Gray(img) => img.width(),
            PixelMatrix::Rgb(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            PixelMatrix::Gray(img) => img.height(),
            PixelMatrix::Rgb(img) => img.height(),
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            PixelMatrix::Gray(_) => 1,
            PixelMatrix::Rgb(_) => 3,
        }
    }

    /// Single-channel luminance, BT.601 weighted and rounded.
    pub fn to_luma(&self) -> GrayImage {
        match self {
            PixelMatrix::Gray(img) => img.clone(),
            PixelMatrix::Rgb(img) => GrayImage::from_fn(img.width(), img.height(), |x, y| {
                let [r, g, b] = img.get_pixel(x, y).0;
                let weighted = r as u32 * LUMA_R + g as u32 * LUMA_G + b as u32 * LUMA_B;
                Luma([((weighted + (1 << (LUMA_SHIFT - 1))) >> LUMA_SHIFT) as u8])
            }),
        }
    }

    /// Three-channel RGB view; grayscale is replicated across channels.
    pub fn to_rgb(&self) -> RgbImage {
        match self {
            PixelMatrix::Gray(img) => DynamicImage::ImageLuma8(img.clone()).to_rgb8(),
            PixelMatrix::Rgb(img) => img.clone(),
        }
    }
}

impl From<DynamicImage> for PixelMatrix {
    fn from(image: DynamicImage) -> Self {
        match image.color() {
            ColorType::L8 | ColorType::L16 | ColorType::La8 | ColorType::La16 => {
                PixelMatrix::Gray(image.to_luma8())
            }
            _ => PixelMatrix::Rgb(image.to_rgb8()),
        }
    }
}

/// Drop a data-URI scheme tag: everything up to and including the first comma.
pub fn strip_data_uri(payload: &str) -> &str {
    match payload.split_once(',') {
        Some((_, data)) => data,
        None => payload,
    }
}

/// Decode a base64 (optionally data-URI prefixed) image payload.
pub fn decode(payload: &str) -> Result<PixelMatrix, DecodeError> {
    let data: String = strip_data_uri(payload)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if data.is_empty() {
        return Err(DecodeError::Empty);
    }

    let bytes = STANDARD.decode(data.as_bytes())?;
    decode_bytes(&bytes)
}

/// Decode raw container bytes (PNG, JPEG, ...). The format is sniffed.
pub fn decode_bytes(bytes: &[u8]) -> Result<PixelMatrix, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    let image = image::load_from_memory(bytes)?;
    if image.width() == 0 || image.height() == 0 {
        return Err(DecodeError::ZeroDimensions);
    }

    tracing::debug!(
        width = image.width(),
        height = image.height(),
        color = ?image.color(),
        "decoded image payload"
    );

    Ok(PixelMatrix::from(image))
}
