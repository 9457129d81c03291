//! Lossy re-encoding: composited RGBA page → baseline JPEG.
//!
//! Alpha is dropped before compression; the composited page is already
//! opaque. The `image` JPEG encoder writes only the JFIF header, so no EXIF,
//! XMP or comment segments reach the output.

use crate::error::SealError;
use image::buffer::ConvertBuffer;
use image::codecs::jpeg::JpegEncoder;
use image::{RgbImage, RgbaImage};
use tracing::debug;

/// One compressed page, ready for assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPage {
    /// 0-based position in the source document.
    pub index: usize,
    /// Baseline JPEG bytes.
    pub data: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
}

/// Compress `image` as a JPEG at `quality` (1–100).
pub fn encode_page(index: usize, image: &RgbaImage, quality: u8) -> Result<EncodedPage, SealError> {
    if !(1..=100).contains(&quality) {
        return Err(SealError::Encoding {
            detail: format!("JPEG quality must be 1–100, got {quality}"),
        });
    }
    if image.width() == 0 || image.height() == 0 {
        return Err(SealError::Encoding {
            detail: format!("cannot encode an empty {}x{} image", image.width(), image.height()),
        });
    }

    let rgb: RgbImage = image.convert();
    let mut data = Vec::new();
    JpegEncoder::new_with_quality(&mut data, quality)
        .encode_image(&rgb)
        .map_err(|e| SealError::Encoding {
            detail: e.to_string(),
        })?;

    debug!(
        "Encoded page {} → {} bytes JPEG (q{})",
        index + 1,
        data.len(),
        quality
    );

    Ok(EncodedPage {
        index,
        data,
        width_px: rgb.width(),
        height_px: rgb.height(),
    })
}
