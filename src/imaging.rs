//! Page image normalization
//!
//! Downloaded pages arrive in whatever format the origin serves (WebP, PNG,
//! JPEG). Before hitting disk every page is decoded, flattened to RGB, and
//! re-encoded as JPEG at a fixed quality, so chapter directories are uniform
//! and the assembler never has to care about source formats.
//!
//! Decoding and re-encoding are CPU-bound; callers run this on the blocking
//! pool (`tokio::task::spawn_blocking`), where the global page semaphore
//! already bounds how many run at once.

use crate::error::Result;
use image::codecs::jpeg::JpegEncoder;

/// Decode image bytes and re-encode them as an RGB JPEG at `quality`
///
/// # Errors
///
/// Returns [`Error::Image`](crate::Error::Image) when the bytes are not a
/// decodable image (the usual symptom of a failed decryption or a truncated
/// body) or when encoding fails.
pub fn normalize_page(bytes: &[u8], quality: u8) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(bytes)?;
    let rgb = decoded.to_rgb8();
    let mut out = Vec::with_capacity(bytes.len());
    let encoder = JpegEncoder::new_with_quality(&mut out, quality);
    rgb.write_with_encoder(encoder)?;
    Ok(out)
}
