//! Watermark tile generation.
//!
//! A page-sized transparent layer carrying the watermark text repeated on a
//! one-inch grid and turned diagonally:
//!
//! ```text
//! stamp (text → RGBA, once per run)
//!   └─▶ tile onto a square canvas as wide as the page diagonal
//!         └─▶ rotate with expansion (bicubic) ─▶ center-crop to page size
//! ```
//!
//! The canvas is as wide as the page diagonal so that every pixel of the
//! cropped window maps back inside it whatever the angle; a page-sized canvas
//! leaves bare triangles in the corners after a 45° turn.
//!
//! Interpolation runs on premultiplied RGBA so the semi-transparent glyph
//! edges do not pick up dark fringes from the transparent background.

use crate::config::WatermarkSpec;
use crate::error::SealError;
use ab_glyph::{point, Font, FontArc, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};
use once_cell::sync::Lazy;
use std::path::Path;
use tracing::debug;

/// DejaVu Sans, the face the watermark is drawn with unless overridden.
const EMBEDDED_FONT_DATA: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

static EMBEDDED_FONT: Lazy<Result<FontArc, String>> =
    Lazy::new(|| FontArc::try_from_slice(EMBEDDED_FONT_DATA).map_err(|e| e.to_string()));

/// Load the watermark font: the file at `path`, or the embedded face.
pub fn load_font(path: Option<&Path>) -> Result<FontArc, SealError> {
    match path {
        Some(path) => {
            let bytes = std::fs::read(path).map_err(|e| {
                SealError::InvalidConfig(format!("cannot read font '{}': {e}", path.display()))
            })?;
            FontArc::try_from_vec(bytes).map_err(|e| {
                SealError::InvalidConfig(format!("'{}' is not a usable font: {e}", path.display()))
            })
        }
        None => EMBEDDED_FONT
            .as_ref()
            .cloned()
            .map_err(|e| SealError::Internal(format!("embedded font: {e}"))),
    }
}

/// Everything needed to produce page layers for one run.
///
/// The text stamp depends only on the watermark settings and the DPI, so it is rendered
/// once and reused for every page; the layer itself is built per page.
#[derive(Debug, Clone)]
pub struct WatermarkGenerator {
    spec: WatermarkSpec,
    dpi: u32,
    stamp: RgbaImage,
}

impl WatermarkGenerator {
    pub fn new(spec: &WatermarkSpec, dpi: u32, font: &FontArc) -> Result<Self, SealError> {
        spec.validate()?;
        if dpi == 0 {
            return Err(SealError::InvalidConfig("DPI must be positive".into()));
        }
        let stamp = render_stamp(font, spec, dpi);
        debug!(
            "Watermark stamp '{}' → {}x{} px at {} dpi",
            spec.text,
            stamp.width(),
            stamp.height(),
            dpi
        );
        Ok(Self {
            spec: spec.clone(),
            dpi,
            stamp,
        })
    }

    pub fn stamp(&self) -> &RgbaImage {
        &self.stamp
    }

    /// Build the layer covering a `width` × `height` px page.
    pub fn layer(&self, width: u32, height: u32) -> Result<RgbaImage, SealError> {
        if width == 0 || height == 0 {
            return Err(SealError::InvalidGeometry {
                width: i64::from(width),
                height: i64::from(height),
            });
        }

        let side = diagonal(width, height);
        let mut canvas = RgbaImage::new(side, side);
        tile(&mut canvas, &self.stamp, self.spec.spacing_px(self.dpi));

        let mut layer = rotate_and_crop(&canvas, self.spec.angle_degrees, width, height);
        drop(canvas);

        // Catmull-Rom overshoots slightly at glyph edges.
        for px in layer.pixels_mut() {
            px[3] = px[3].min(self.spec.opacity);
        }
        Ok(layer)
    }
}

/// Convenience wrapper: layer for one page with the embedded font.
pub fn watermark_layer(
    width: u32,
    height: u32,
    spec: &WatermarkSpec,
    dpi: u32,
) -> Result<RgbaImage, SealError> {
    WatermarkGenerator::new(spec, dpi, &load_font(None)?)?.layer(width, height)
}

fn diagonal(width: u32, height: u32) -> u32 {
    let (w, h) = (f64::from(width), f64::from(height));
    ((w * w + h * h).sqrt().ceil() as u32).max(width).max(height)
}

// ── Stamp ────────────────────────────────────────────────────────────────

/// Render the watermark text once, top-left anchored at the ascender line.
fn render_stamp(font: &FontArc, spec: &WatermarkSpec, dpi: u32) -> RgbaImage {
    let scale = PxScale::from(spec.font_px(dpi) as f32);
    let scaled = font.as_scaled(scale);

    let mut advance = 0.0f32;
    let mut prev = None;
    for c in spec.text.chars() {
        let id = scaled.glyph_id(c);
        if let Some(p) = prev {
            advance += scaled.kern(p, id);
        }
        advance += scaled.h_advance(id);
        prev = Some(id);
    }

    let padding = 2;
    let width = advance.ceil() as u32 + padding;
    let height = (scaled.ascent() - scaled.descent()).ceil() as u32 + padding;
    let mut stamp = RgbaImage::new(width.max(1), height.max(1));

    let [r, g, b] = spec.fill;
    let mut cursor = 0.0f32;
    let mut prev = None;
    for c in spec.text.chars() {
        let id = scaled.glyph_id(c);
        if let Some(p) = prev {
            cursor += scaled.kern(p, id);
        }
        let glyph = id.with_scale_and_position(scale, point(cursor, scaled.ascent()));
        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let x = gx as i32 + bounds.min.x as i32;
                let y = gy as i32 + bounds.min.y as i32;
                if x < 0 || y < 0 || x >= stamp.width() as i32 || y >= stamp.height() as i32 {
                    return;
                }
                let alpha = (coverage.clamp(0.0, 1.0) * f32::from(spec.opacity)).round() as u8;
                let px = stamp.get_pixel_mut(x as u32, y as u32);
                if alpha > px[3] {
                    *px = Rgba([r, g, b, alpha]);
                }
            });
        }
        cursor += scaled.h_advance(id);
        prev = Some(id);
    }
    stamp
}

// ── Tiling ───────────────────────────────────────────────────────────────

/// Repeat `stamp` on a `spacing`-pixel grid from `-size` to `2 * size`.
fn tile(canvas: &mut RgbaImage, stamp: &RgbaImage, spacing: u32) {
    let (cw, ch) = (i64::from(canvas.width()), i64::from(canvas.height()));
    let (sw, sh) = (i64::from(stamp.width()), i64::from(stamp.height()));
    let step = spacing.max(1) as usize;

    for y in (-ch..2 * ch).step_by(step) {
        if y + sh <= 0 || y >= ch {
            continue;
        }
        for x in (-cw..2 * cw).step_by(step) {
            if x + sw <= 0 || x >= cw {
                continue;
            }
            put_stamp(canvas, stamp, x, y);
        }
    }
}

fn put_stamp(canvas: &mut RgbaImage, stamp: &RgbaImage, x: i64, y: i64) {
    let (cw, ch) = (i64::from(canvas.width()), i64::from(canvas.height()));
    for (sx, sy, src) in stamp.enumerate_pixels() {
        if src[3] == 0 {
            continue;
        }
        let tx = x + i64::from(sx);
        let ty = y + i64::from(sy);
        if tx < 0 || ty < 0 || tx >= cw || ty >= ch {
            continue;
        }
        let dst = canvas.get_pixel_mut(tx as u32, ty as u32);
        if src[3] > dst[3] {
            *dst = *src;
        }
    }
}

// ── Rotation ─────────────────────────────────────────────────────────────

/// Size of the canvas after rotating `width` × `height` by `degrees` with expansion.
pub fn expanded_size(width: u32, height: u32, degrees: f32) -> (u32, u32) {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let (w, h) = (width as f32, height as f32);
    // Trim float noise so 90° does not grow by a pixel.
    let ew = (w * cos.abs() + h * sin.abs() - 1e-3).ceil().max(1.0);
    let eh = (w * sin.abs() + h * cos.abs() - 1e-3).ceil().max(1.0);
    (ew as u32, eh as u32)
}

/// Rotate `src` counter-clockwise by `degrees` with expansion, then cut the
/// centered `out_w` × `out_h` window out of the expanded result.
///
/// Only the pixels inside the window are sampled; the expanded canvas is
/// never materialised.
pub fn rotate_and_crop(src: &RgbaImage, degrees: f32, out_w: u32, out_h: u32) -> RgbaImage {
    let (ew, eh) = expanded_size(src.width(), src.height(), degrees);
    let left = (i64::from(ew) - i64::from(out_w)) / 2;
    let top = (i64::from(eh) - i64::from(out_h)) / 2;

    let (sin, cos) = degrees.to_radians().sin_cos();
    let (ecx, ecy) = (ew as f32 / 2.0, eh as f32 / 2.0);
    let (scx, scy) = (src.width() as f32 / 2.0, src.height() as f32 / 2.0);

    let mut out = RgbaImage::new(out_w, out_h);
    for oy in 0..out_h {
        let ry = (i64::from(oy) + top) as f32 + 0.5 - ecy;
        for ox in 0..out_w {
            let rx = (i64::from(ox) + left) as f32 + 0.5 - ecx;
            // Inverse of the counter-clockwise turn (y axis points down).
            let sx = rx * cos - ry * sin + scx - 0.5;
            let sy = rx * sin + ry * cos + scy - 0.5;
            out.put_pixel(ox, oy, sample_bicubic(src, sx, sy));
        }
    }
    out
}

/// Catmull-Rom weights for the four taps around fractional offset `t`.
fn cubic_weights(t: f32) -> [f32; 4] {
    const A: f32 = -0.5;
    let near = |d: f32| ((A + 2.0) * d - (A + 3.0)) * d * d + 1.0;
    let far = |d: f32| ((A * d - 5.0 * A) * d + 8.0 * A) * d - 4.0 * A;
    [far(1.0 + t), near(t), near(1.0 - t), far(2.0 - t)]
}

fn sample_bicubic(src: &RgbaImage, x: f32, y: f32) -> Rgba<u8> {
    const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);
    let (w, h) = (src.width() as i64, src.height() as i64);
    if x < -2.0 || y < -2.0 || x > w as f32 + 1.0 || y > h as f32 + 1.0 {
        return CLEAR;
    }

    let (x0, y0) = (x.floor(), y.floor());
    let wx = cubic_weights(x - x0);
    let wy = cubic_weights(y - y0);
    let (x0, y0) = (x0 as i64 - 1, y0 as i64 - 1);

    let mut acc = [0.0f32; 4];
    for (j, wyj) in wy.iter().enumerate() {
        let sy = y0 + j as i64;
        if sy < 0 || sy >= h {
            continue;
        }
        for (i, wxi) in wx.iter().enumerate() {
            let sx = x0 + i as i64;
            if sx < 0 || sx >= w {
                continue;
            }
            let p = src.get_pixel(sx as u32, sy as u32);
            if p[3] == 0 {
                continue;
            }
            let weight = wxi * wyj;
            let a = f32::from(p[3]);
            let premul = a / 255.0 * weight;
            acc[0] += f32::from(p[0]) * premul;
            acc[1] += f32::from(p[1]) * premul;
            acc[2] += f32::from(p[2]) * premul;
            acc[3] += a * weight;
        }
    }

    let alpha = acc[3].clamp(0.0, 255.0);
    if alpha < 0.5 {
        return CLEAR;
    }
    let unpremul = |c: f32| (c * 255.0 / alpha).round().clamp(0.0, 255.0) as u8;
    Rgba([
        unpremul(acc[0]),
        unpremul(acc[1]),
        unpremul(acc[2]),
        alpha.round() as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(text: &str) -> WatermarkSpec {
        WatermarkSpec {
            text: text.to_string(),
            ..WatermarkSpec::default()
        }
    }

    fn has_ink(layer: &RgbaImage, x0: u32, y0: u32, size: u32) -> bool {
        let x1 = (x0 + size).min(layer.width());
        let y1 = (y0 + size).min(layer.height());
        (y0..y1).any(|y| (x0..x1).any(|x| layer.get_pixel(x, y)[3] > 0))
    }

    #[test]
    fn embedded_font_loads() {
        assert!(load_font(None).is_ok());
    }

    #[test]
    fn missing_font_file_is_config_error() {
        let err = load_font(Some(Path::new("/no/such/font.ttf"))).unwrap_err();
        assert!(matches!(err, SealError::InvalidConfig(_)));
    }

    #[test]
    fn stamp_has_ink_within_opacity() {
        let gen = WatermarkGenerator::new(&spec("TEST"), 120, &load_font(None).unwrap()).unwrap();
        let stamp = gen.stamp();
        assert!(stamp.width() > stamp.height());
        let max_alpha = stamp.pixels().map(|p| p[3]).max().unwrap();
        assert!(max_alpha > 0);
        assert!(max_alpha <= 60);
    }

    #[test]
    fn layer_matches_page_size() {
        let layer = watermark_layer(1020, 1320, &spec("TEST"), 120).unwrap();
        assert_eq!(layer.dimensions(), (1020, 1320));
    }

    #[test]
    fn layer_covers_corners_and_center() {
        let dpi = 120;
        let (w, h) = (1020, 1320);
        let layer = watermark_layer(w, h, &spec("TEST"), dpi).unwrap();
        let window = 2 * dpi;
        let probes = [
            (0, 0),
            (w - window, 0),
            (0, h - window),
            (w - window, h - window),
            ((w - window) / 2, (h - window) / 2),
        ];
        for (x, y) in probes {
            assert!(has_ink(&layer, x, y, window), "no watermark near ({x}, {y})");
        }
    }

    #[test]
    fn every_text_length_covers_corners() {
        let font = load_font(None).unwrap();
        let (w, h) = (850, 1100);
        for len in [1usize, 7, 15] {
            let text: String = "W".repeat(len);
            let gen = WatermarkGenerator::new(&spec(&text), 100, &font).unwrap();
            let layer = gen.layer(w, h).unwrap();
            for (x, y) in [(0, 0), (w - 200, 0), (0, h - 200), (w - 200, h - 200)] {
                assert!(has_ink(&layer, x, y, 200), "len {len}: bare corner at ({x}, {y})");
            }
        }
    }

    #[test]
    fn layer_alpha_never_exceeds_opacity() {
        let layer = watermark_layer(400, 300, &spec("SEALED"), 100).unwrap();
        assert!(layer.pixels().all(|p| p[3] <= 60));
        assert!(layer.pixels().any(|p| p[3] > 0));
    }

    #[test]
    fn layer_is_deterministic() {
        let a = watermark_layer(500, 700, &spec("SAME"), 100).unwrap();
        let b = watermark_layer(500, 700, &spec("SAME"), 100).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn zero_dimension_is_invalid_geometry() {
        let err = watermark_layer(0, 100, &spec("X"), 100).unwrap_err();
        assert!(matches!(err, SealError::InvalidGeometry { width: 0, .. }));
        let err = watermark_layer(100, 0, &spec("X"), 100).unwrap_err();
        assert!(matches!(err, SealError::InvalidGeometry { height: 0, .. }));
    }

    #[test]
    fn empty_text_rejected() {
        let err = watermark_layer(100, 100, &spec(""), 100).unwrap_err();
        assert!(matches!(err, SealError::InvalidWatermark(_)));
    }

    #[test]
    fn expanded_size_of_square_at_45_degrees() {
        assert_eq!(expanded_size(100, 100, 45.0), (142, 142));
        assert_eq!(expanded_size(100, 50, 0.0), (100, 50));
        assert_eq!(expanded_size(100, 50, 90.0), (50, 100));
    }

    #[test]
    fn cubic_weights_sum_to_one() {
        for t in [0.0, 0.25, 0.5, 0.9] {
            let sum: f32 = cubic_weights(t).iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "t={t}: {sum}");
        }
        assert_eq!(cubic_weights(0.0), [0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn zero_rotation_crop_is_identity_on_center() {
        let mut src = RgbaImage::new(8, 8);
        src.put_pixel(3, 4, Rgba([10, 20, 30, 200]));
        let out = rotate_and_crop(&src, 0.0, 8, 8);
        assert_eq!(out.get_pixel(3, 4), &Rgba([10, 20, 30, 200]));
        assert_eq!(out.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn premultiplied_sampling_keeps_color() {
        let src = RgbaImage::from_pixel(6, 6, Rgba([180, 180, 180, 60]));
        let p = sample_bicubic(&src, 2.3, 2.7);
        assert_eq!(p, Rgba([180, 180, 180, 60]));
    }

    #[test]
    fn diagonal_is_at_least_both_sides() {
        assert_eq!(diagonal(3, 4), 5);
        assert!(diagonal(1020, 1320) >= 1320);
    }
}
