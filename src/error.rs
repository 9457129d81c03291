//! Error types for the safeseal library.
//!
//! Unlike a best-effort converter, sealing is all-or-nothing: a document that
//! is only partly flattened would leak extractable text on the pages that
//! were skipped. Every failure therefore surfaces as a single fatal
//! [`SealError`] and no output is produced.
//!
//! Failures that happen while a specific page is being processed are wrapped
//! in [`SealError::PageFailed`], which carries the 1-indexed page number and
//! the underlying cause. Use [`SealError::page`] to recover it.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the safeseal library.
#[derive(Debug, Error)]
pub enum SealError {
    // ── Tooling errors ────────────────────────────────────────────────────
    /// A required external tool (document converter, pdfium) is missing.
    ///
    /// Checked once before any processing starts.
    #[error("{tool} is not available on this host: {detail}")]
    UnavailableTool { tool: String, detail: String },

    /// The external office-to-PDF converter failed or produced no PDF.
    #[error("Document conversion failed: {detail}")]
    Conversion { detail: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input is neither a PDF nor a document type the converter accepts.
    #[error("Unsupported input '{name}': expected a PDF or an office document ({accepted})")]
    UnsupportedInput { name: String, accepted: String },

    /// The watermark text was rejected before the pipeline started.
    #[error("Invalid watermark text: {0}")]
    InvalidWatermark(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// The source PDF could not be parsed or a page could not be rasterised.
    #[error("Rendering failed: {detail}")]
    Render { detail: String },

    /// A page or layer would have a zero or negative dimension.
    #[error("Invalid page geometry: {width}x{height}")]
    InvalidGeometry { width: i64, height: i64 },

    /// The watermark layer does not match the rasterised page.
    #[error("Watermark layer is {layer_width}x{layer_height} px but the page is {page_width}x{page_height} px")]
    DimensionMismatch {
        page_width: u32,
        page_height: u32,
        layer_width: u32,
        layer_height: u32,
    },

    /// JPEG compression of a composited page failed.
    #[error("Image encoding failed: {detail}")]
    Encoding { detail: String },

    /// A page was handed to the output assembler out of source order.
    #[error("Page index {got} added out of order (expected {expected})")]
    PageOrder { expected: usize, got: usize },

    /// The source document has no pages to seal.
    #[error("The document contains no pages")]
    EmptyDocument,

    /// The output PDF could not be serialised.
    #[error("Failed to assemble output PDF: {detail}")]
    Assembly { detail: String },

    /// A step failed while processing a specific page.
    #[error("Page {page}: {source}")]
    PageFailed {
        page: usize,
        #[source]
        source: Box<SealError>,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SealError {
    /// Wrap `self` as a failure of the given 1-indexed page.
    pub fn on_page(self, page: usize) -> Self {
        match self {
            already @ SealError::PageFailed { .. } => already,
            other => SealError::PageFailed {
                page,
                source: Box::new(other),
            },
        }
    }

    /// The 1-indexed page that failed, when the error is page-specific.
    pub fn page(&self) -> Option<usize> {
        match self {
            SealError::PageFailed { page, .. } => Some(*page),
            _ => None,
        }
    }

    /// The underlying cause, unwrapping any page context.
    pub fn cause(&self) -> &SealError {
        match self {
            SealError::PageFailed { source, .. } => source.cause(),
            other => other,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = SealError> = std::result::Result<T, E>;
