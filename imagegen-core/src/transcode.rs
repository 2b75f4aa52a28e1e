//! Re-encoding of backend images to JPEG

use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;

use crate::error::TranscodeError;

pub const JPEG_QUALITY: u8 = 85;

/// Decode `bytes` in any supported format and re-encode them as JPEG.
///
/// Transparency is dropped; JPEG has no alpha channel.
pub fn to_jpeg(bytes: &[u8], quality: u8) -> Result<Vec<u8>, TranscodeError> {
    let decoded = image::load_from_memory(bytes).map_err(TranscodeError::Decode)?;
    let rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());

    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
    encoder.encode_image(&rgb).map_err(TranscodeError::Encode)?;
    Ok(out)
}
