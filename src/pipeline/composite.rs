//! Blend a watermark layer onto a rendered page.

use crate::error::SealError;
use image::{Rgba, RgbImage, RgbaImage};

/// Porter-Duff "over": `layer` on top of the opaque `page`.
///
/// The page has no alpha channel, so the result is fully opaque and every
/// pixel untouched by the layer keeps its original color.
pub fn composite(page: &RgbImage, layer: &RgbaImage) -> Result<RgbaImage, SealError> {
    if page.dimensions() != layer.dimensions() {
        return Err(SealError::DimensionMismatch {
            page_width: page.width(),
            page_height: page.height(),
            layer_width: layer.width(),
            layer_height: layer.height(),
        });
    }

    let mut out = RgbaImage::new(page.width(), page.height());
    for ((dst, base), top) in out.pixels_mut().zip(page.pixels()).zip(layer.pixels()) {
        *dst = over(base.0, *top);
    }
    Ok(out)
}

fn over(base: [u8; 3], top: Rgba<u8>) -> Rgba<u8> {
    let a = u32::from(top[3]);
    if a == 0 {
        return Rgba([base[0], base[1], base[2], 255]);
    }
    let inv = 255 - a;
    let mix = |t: u8, b: u8| ((u32::from(t) * a + u32::from(b) * inv + 127) / 255) as u8;
    Rgba([
        mix(top[0], base[0]),
        mix(top[1], base[1]),
        mix(top[2], base[2]),
        255,
    ])
}
