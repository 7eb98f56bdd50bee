//! Image encoding: raw upload bytes → base64 `ImageData` for the VLM.
//!
//! The photo is sent as uploaded, with no re-encode. Menu photos are
//! usually JPEGs from a phone camera; converting them to PNG would multiply
//! the request size without adding detail. `detail: "high"` lets GPT-4-class
//! models tile the image so small print such as prices stays legible.

use crate::error::PortError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::ImageFormat;
use tracing::debug;

/// Formats accepted for upload and OCR.
pub const SUPPORTED_FORMATS: &[ImageFormat] = &[
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::WebP,
    ImageFormat::Gif,
    ImageFormat::Bmp,
    ImageFormat::Tiff,
];

/// Detect the image format from magic bytes; `None` for anything unsupported.
pub fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes)
        .ok()
        .filter(|f| SUPPORTED_FORMATS.contains(f))
}

/// Base64-wrap an image for a multimodal chat message.
pub fn encode_image(bytes: &[u8]) -> Result<ImageData, PortError> {
    let format = sniff_format(bytes).ok_or_else(|| {
        PortError::InvalidResponse("image is not a supported format".to_string())
    })?;
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded {:?} image → {} bytes base64", format, b64.len());

    Ok(ImageData::new(b64, format.to_mime_type()).with_detail("high"))
}
