//! Output types returned by the sealing entry points.

use crate::config::QualityProfile;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Suffix appended to the input stem to name the sealed document.
pub const SEALED_SUFFIX: &str = "_sealed.pdf";

/// A sealed document held in memory.
#[derive(Debug, Clone)]
pub struct SealOutput {
    /// The image-only PDF.
    pub pdf: Vec<u8>,
    /// Suggested file name: `<stem>_sealed.pdf`.
    pub file_name: String,
    pub stats: SealStats,
}

/// Summary of a sealing run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SealStats {
    pub pages: usize,
    pub profile: QualityProfile,
    pub dpi: u32,
    pub quality: u8,
    /// Whether the input went through the office converter.
    pub converted: bool,
    pub input_bytes: usize,
    pub output_bytes: usize,
    pub conversion_ms: u64,
    pub render_ms: u64,
    pub watermark_ms: u64,
    pub encode_ms: u64,
    pub total_ms: u64,
}

/// `<stem>_sealed.pdf` for an input named `file_name`.
///
/// ```rust
/// assert_eq!(safeseal::sealed_file_name("Q3 deck.pptx"), "Q3 deck_sealed.pdf");
/// assert_eq!(safeseal::sealed_file_name("archive.tar.pdf"), "archive.tar_sealed.pdf");
/// ```
pub fn sealed_file_name(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string());
    format!("{stem}{SEALED_SUFFIX}")
}
