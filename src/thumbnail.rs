//! Label/macro thumbnail decode.
//!
//! A small JPEG decoder is an explicit external collaborator for this format (§1):
//! the label and macro sub-images are ordinary baseline JPEGs, base64-embedded in the
//! XML envelope and already extracted to raw bytes by [`crate::metadata`]. We delegate
//! the actual JPEG decode to the `image` crate rather than carrying one of our own.

use crate::error::{err, FormatError, Result};

/// A fully decoded BGRA thumbnail.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 4` BGRA bytes, row-major, no padding.
    pub bgra: Vec<u8>,
}

/// Decodes an already base64-decoded JPEG buffer to a BGRA thumbnail.
pub fn decode_jpeg_bgra(jpeg: &[u8]) -> Result<Thumbnail> {
    let image = image::load_from_memory_with_format(jpeg, image::ImageFormat::Jpeg)
        .map_err(|_| err!(FormatError::BadEmbeddedImage))?;
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut bgra = rgba.into_raw();
    for pixel in bgra.chunks_exact_mut(4) {
        pixel.swap(0, 2);
    }
    Ok(Thumbnail { width, height, bgra })
}
