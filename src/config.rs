//! Configuration types for document sealing.
//!
//! All sealing behaviour is controlled through [`SealConfig`], built via its
//! [`SealConfigBuilder`]. Resolution and JPEG quality are normally chosen
//! together through a [`QualityProfile`]; explicit overrides exist for
//! callers that need something in between.

use crate::error::SealError;
use crate::progress::ProgressBands;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Longest watermark accepted, in characters.
pub const MAX_WATERMARK_CHARS: usize = 15;

/// Light gray used for the watermark glyphs.
pub const WATERMARK_FILL: [u8; 3] = [180, 180, 180];

/// Configuration for one sealing run.
///
/// # Example
/// ```rust
/// use safeseal::{QualityProfile, SealConfig};
///
/// let config = SealConfig::builder()
///     .watermark_text("JOHN SMITH")
///     .profile(QualityProfile::HighQuality)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi(), 180);
/// ```
#[derive(Clone)]
pub struct SealConfig {
    /// Named pairing of render DPI and JPEG quality. Default: Balanced.
    pub profile: QualityProfile,

    /// Overrides the profile's DPI when set.
    pub dpi_override: Option<u32>,

    /// Overrides the profile's JPEG quality when set.
    pub quality_override: Option<u8>,

    /// What gets stamped across every page.
    pub watermark: WatermarkSpec,

    /// Custom TTF/OTF font for the watermark. None uses the embedded DejaVu Sans.
    pub font_path: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Path to a pdfium shared library (file or directory).
    ///
    /// When None, `PDFIUM_LIB_PATH`, the working directory, and the system
    /// library search path are tried in that order.
    pub pdfium_library_path: Option<PathBuf>,

    /// Path to the `soffice` binary. None searches the usual locations.
    pub converter_path: Option<PathBuf>,

    /// How often the converter subprocess is polled, in milliseconds. Default: 50.
    pub converter_poll_ms: u64,

    /// How the 0–100 progress range is split between phases.
    pub progress_bands: ProgressBands,
}

impl Default for SealConfig {
    fn default() -> Self {
        Self {
            profile: QualityProfile::default(),
            dpi_override: None,
            quality_override: None,
            watermark: WatermarkSpec::default(),
            font_path: None,
            password: None,
            pdfium_library_path: None,
            converter_path: None,
            converter_poll_ms: 50,
            progress_bands: ProgressBands::default(),
        }
    }
}

impl fmt::Debug for SealConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealConfig")
            .field("profile", &self.profile)
            .field("dpi", &self.dpi())
            .field("quality", &self.quality())
            .field("watermark", &self.watermark)
            .field("font_path", &self.font_path)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("converter_path", &self.converter_path)
            .field("converter_poll_ms", &self.converter_poll_ms)
            .field("progress_bands", &self.progress_bands)
            .finish()
    }
}

impl SealConfig {
    /// Create a new builder for `SealConfig`.
    pub fn builder() -> SealConfigBuilder {
        SealConfigBuilder {
            config: Self::default(),
        }
    }

    /// Effective render resolution.
    pub fn dpi(&self) -> u32 {
        self.dpi_override.unwrap_or_else(|| self.profile.dpi())
    }

    /// Effective JPEG quality.
    pub fn quality(&self) -> u8 {
        self.quality_override
            .unwrap_or_else(|| self.profile.quality())
    }
}

/// Builder for [`SealConfig`].
#[derive(Debug)]
pub struct SealConfigBuilder {
    config: SealConfig,
}

impl SealConfigBuilder {
    pub fn profile(mut self, profile: QualityProfile) -> Self {
        self.config.profile = profile;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi_override = Some(dpi);
        self
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.config.quality_override = Some(quality);
        self
    }

    pub fn watermark_text(mut self, text: impl Into<String>) -> Self {
        self.config.watermark.text = text.into();
        self
    }

    pub fn watermark(mut self, spec: WatermarkSpec) -> Self {
        self.config.watermark = spec;
        self
    }

    pub fn font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.font_path = Some(path.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn converter_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.converter_path = Some(path.into());
        self
    }

    pub fn converter_poll_ms(mut self, ms: u64) -> Self {
        self.config.converter_poll_ms = ms.max(1);
        self
    }

    pub fn progress_bands(mut self, bands: ProgressBands) -> Self {
        self.config.progress_bands = bands;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SealConfig, SealError> {
        let c = &self.config;
        let dpi = c.dpi();
        if !(MIN_DPI..=MAX_DPI).contains(&dpi) {
            return Err(SealError::InvalidConfig(format!(
                "DPI must be {MIN_DPI}–{MAX_DPI}, got {dpi}"
            )));
        }
        let quality = c.quality();
        if !(1..=100).contains(&quality) {
            return Err(SealError::InvalidConfig(format!(
                "JPEG quality must be 1–100, got {quality}"
            )));
        }
        if c.progress_bands.conversion_end >= 100 {
            return Err(SealError::InvalidConfig(
                "The conversion progress band must end below 100".into(),
            ));
        }
        c.watermark.validate()?;
        Ok(self.config)
    }
}

/// Lowest accepted render resolution.
pub const MIN_DPI: u32 = 36;
/// Highest accepted render resolution.
pub const MAX_DPI: u32 = 600;

// ── Enums ────────────────────────────────────────────────────────────────

/// Named pairing of render resolution and compression quality.
///
/// | Profile | DPI | JPEG quality |
/// |---------|-----|--------------|
/// | HighQuality | 180 | 90 |
/// | Balanced (default) | 120 | 75 |
/// | Smallest | 100 | 60 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityProfile {
    HighQuality,
    #[default]
    Balanced,
    Smallest,
}

impl QualityProfile {
    pub fn dpi(self) -> u32 {
        match self {
            QualityProfile::HighQuality => 180,
            QualityProfile::Balanced => 120,
            QualityProfile::Smallest => 100,
        }
    }

    pub fn quality(self) -> u8 {
        match self {
            QualityProfile::HighQuality => 90,
            QualityProfile::Balanced => 75,
            QualityProfile::Smallest => 60,
        }
    }
}

impl fmt::Display for QualityProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QualityProfile::HighQuality => "High quality",
            QualityProfile::Balanced => "Balanced",
            QualityProfile::Smallest => "Smallest",
        };
        write!(f, "{label} ({} dpi, q{})", self.dpi(), self.quality())
    }
}

/// The tiled text stamped over every page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkSpec {
    /// Watermark text, 1–15 printable characters.
    pub text: String,
    /// Counter-clockwise rotation of the tiled grid. Default: 45.
    pub angle_degrees: f32,
    /// Glyph alpha, 0–255. Default: 60 (≈ 23.5 %).
    pub opacity: u8,
    /// Nominal font size in points; scaled by the render DPI. Default: 8.
    pub font_size_pt: f32,
    /// RGB fill of the glyphs. Default: light gray.
    pub fill: [u8; 3],
}

impl Default for WatermarkSpec {
    fn default() -> Self {
        Self {
            text: String::new(),
            angle_degrees: 45.0,
            opacity: 60,
            font_size_pt: 8.0,
            fill: WATERMARK_FILL,
        }
    }
}

impl WatermarkSpec {
    /// Check the text is non-empty, short enough and printable.
    pub fn validate(&self) -> Result<(), SealError> {
        let count = self.text.chars().count();
        if count == 0 || self.text.trim().is_empty() {
            return Err(SealError::InvalidWatermark(
                "Please provide a name for the watermark".into(),
            ));
        }
        if count > MAX_WATERMARK_CHARS {
            return Err(SealError::InvalidWatermark(format!(
                "At most {MAX_WATERMARK_CHARS} characters allowed, got {count}"
            )));
        }
        if let Some(c) = self.text.chars().find(|c| c.is_control()) {
            return Err(SealError::InvalidWatermark(format!(
                "Non-printable character U+{:04X}",
                c as u32
            )));
        }
        if !(self.font_size_pt.is_finite() && self.font_size_pt > 0.0) {
            return Err(SealError::InvalidWatermark(format!(
                "Font size must be positive, got {}",
                self.font_size_pt
            )));
        }
        if !self.angle_degrees.is_finite() {
            return Err(SealError::InvalidWatermark("Angle must be finite".into()));
        }
        Ok(())
    }

    /// Glyph size in pixels at `dpi`, never below 6 px.
    pub fn font_px(&self, dpi: u32) -> u32 {
        ((self.font_size_pt * dpi as f32 / 72.0).round() as u32).max(6)
    }

    /// Distance between tile origins: one inch at `dpi`.
    pub fn spacing_px(&self, dpi: u32) -> u32 {
        dpi.max(1)
    }
}
