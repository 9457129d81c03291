//! Pipeline stages for document sealing.
//!
//! Each submodule implements one transformation step; the driver runs them
//! in order for every page.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ office ──▶ render ──▶ watermark ──▶ composite ──▶ encode ──▶ assemble
//! (path)   (soffice)  (pdfium)   (RGBA layer)   (over)       (JPEG)    (lopdf)
//! ```
//!
//! 1. [`input`]: read the file and decide PDF vs. office document
//! 2. [`office`]: supervised LibreOffice subprocess; the only async stage
//! 3. [`render`]: one page at a time to an opaque RGB buffer
//! 4. [`watermark`]: tiled, rotated text layer sized to the page
//! 5. [`composite`]: Porter-Duff "over" of the layer onto the page
//! 6. [`encode`]: baseline JPEG with no metadata segments
//! 7. [`assemble`]: image-only PDF, one XObject per page

pub mod assemble;
pub mod composite;
pub mod encode;
pub mod input;
pub mod office;
pub mod render;
pub mod watermark;
