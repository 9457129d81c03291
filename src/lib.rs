//! # safeseal
//!
//! Turn office documents and PDFs into watermarked, image-only PDFs.
//!
//! Every page is rasterised, stamped with a diagonal tiled text watermark,
//! re-encoded as a JPEG and placed alone on a page of the same physical
//! size. The result has no text layer, so nothing can be selected, copied or
//! extracted, and every page carries the recipient's name.
//!
//! ## Pipeline Overview
//!
//! ```text
//! document
//!  │
//!  ├─ 0. Convert    office → PDF via headless LibreOffice (skipped for PDFs)
//!  ├─ 1. Render     rasterise one page via pdfium (spawn_blocking)
//!  ├─ 2. Watermark  tile + rotate the text layer for that page
//!  ├─ 3. Composite  alpha-blend the layer over the page
//!  ├─ 4. Encode     drop alpha, JPEG at the profile's quality
//!  └─ 5. Assemble   append an image-only page; serialise at the end
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use safeseal::{seal_to_file, QualityProfile, SealConfig, SealEvents};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SealConfig::builder()
//!         .watermark_text("JOHN SMITH")
//!         .profile(QualityProfile::Balanced)
//!         .build()?;
//!     let (path, stats) = seal_to_file("contract.docx", None, &config, &SealEvents::default()).await?;
//!     eprintln!("{} pages → {}", stats.pages, path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `safeseal` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! safeseal = { version = "0.1", default-features = false }
//! ```
//!
//! ## Runtime requirements
//!
//! * a pdfium shared library (`PDFIUM_LIB_PATH`, the working directory, or
//!   the system library path)
//! * LibreOffice (`soffice`) for non-PDF inputs only

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod driver;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{QualityProfile, SealConfig, SealConfigBuilder, WatermarkSpec};
pub use convert::{seal_bytes, seal_bytes_with, seal_file, seal_sync, seal_to_file, SealEvents};
pub use driver::{PipelineState, Sealer};
pub use error::SealError;
pub use output::{sealed_file_name, SealOutput, SealStats};
pub use pipeline::input::{InputKind, SealInput};
pub use pipeline::office::{DocumentConverter, SofficeConverter};
pub use pipeline::render::{PdfiumRasterizer, Rasterizer};
pub use progress::{
    LogSink, NoopSink, PercentMeter, PercentSink, ProgressBands, ProgressSink,
};
