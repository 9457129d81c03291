//! PDF rasterisation: render one page at a time to an opaque RGB buffer.
//!
//! Rendering sits behind the [`Rasterizer`] / [`SourceDocument`] pair so the
//! driver never touches pdfium directly. [`PdfiumRasterizer`] is the real
//! backend; tests substitute an in-memory document.
//!
//! ## Pixel size
//!
//! Each axis is rendered at `round(points * dpi / 72)` pixels and the page is
//! cleared to white first, so the buffer has no alpha channel and the output
//! page box maps back to the source size when divided by the same factor.

use crate::error::SealError;
use image::RgbImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Physical page size in PDF points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    pub fn new(width_pt: f32, height_pt: f32) -> Self {
        Self {
            width_pt,
            height_pt,
        }
    }

    /// Pixel dimensions of this page rendered at `dpi`.
    pub fn to_pixels(self, dpi: u32) -> Result<(u32, u32), SealError> {
        let scale = dpi as f32 / 72.0;
        let w = (self.width_pt * scale).round();
        let h = (self.height_pt * scale).round();
        if !(w.is_finite() && h.is_finite()) || w < 1.0 || h < 1.0 {
            return Err(SealError::InvalidGeometry {
                width: w as i64,
                height: h as i64,
            });
        }
        Ok((w as u32, h as u32))
    }
}

/// One rasterised source page.
#[derive(Debug, Clone)]
pub struct RasterPage {
    pub image: RgbImage,
    pub size: PageSize,
}

impl RasterPage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Opens source PDFs.
pub trait Rasterizer {
    /// Parse `pdf`, returning a document whose pages can be rendered one by one.
    fn open<'a>(
        &'a self,
        pdf: &'a [u8],
        password: Option<&'a str>,
    ) -> Result<Box<dyn SourceDocument + 'a>, SealError>;
}

/// A parsed source document.
pub trait SourceDocument {
    fn page_count(&self) -> usize;

    /// Size of the 0-indexed page in points.
    fn page_size(&self, index: usize) -> Result<PageSize, SealError>;

    /// Render the 0-indexed page at `dpi`.
    fn render_page(&self, index: usize, dpi: u32) -> Result<RasterPage, SealError>;
}

// ── pdfium backend ───────────────────────────────────────────────────────

/// Environment variable naming an existing pdfium library (file or directory).
pub const PDFIUM_LIB_ENV: &str = "PDFIUM_LIB_PATH";

/// Rasterizer backed by the pdfium C++ library.
pub struct PdfiumRasterizer {
    pdfium: Pdfium,
}

impl PdfiumRasterizer {
    /// Bind to pdfium.
    ///
    /// Resolution order: `library_path`, `$PDFIUM_LIB_PATH`, the working
    /// directory, then the system library search path. Failure is reported
    /// as [`SealError::UnavailableTool`].
    pub fn bind(library_path: Option<&Path>) -> Result<Self, SealError> {
        let explicit = library_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(PDFIUM_LIB_ENV).map(PathBuf::from));

        let bindings = match explicit {
            Some(path) => Pdfium::bind_to_library(library_file(&path)).map_err(|e| {
                SealError::UnavailableTool {
                    tool: "pdfium".into(),
                    detail: format!("{}: {:?}", path.display(), e),
                }
            })?,
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library())
                .map_err(|e| SealError::UnavailableTool {
                    tool: "pdfium".into(),
                    detail: format!(
                        "{:?}\nSet {PDFIUM_LIB_ENV}=/path/to/libpdfium or install pdfium system-wide.",
                        e
                    ),
                })?,
        };

        debug!("pdfium bound");
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }
}

/// Accept either the library file itself or the directory containing it.
fn library_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn open<'a>(
        &'a self,
        pdf: &'a [u8],
        password: Option<&'a str>,
    ) -> Result<Box<dyn SourceDocument + 'a>, SealError> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(pdf, password)
            .map_err(|e| SealError::Render {
                detail: format!("cannot parse PDF: {:?}", e),
            })?;
        info!("PDF loaded: {} pages", document.pages().len());
        Ok(Box::new(PdfiumDocument { document }))
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl<'a> PdfiumDocument<'a> {
    fn page(&self, index: usize) -> Result<PdfPage<'a>, SealError> {
        let index = u16::try_from(index).map_err(|_| SealError::Render {
            detail: format!("page index {index} exceeds pdfium's page limit"),
        })?;
        self.document
            .pages()
            .get(index)
            .map_err(|e| SealError::Render {
                detail: format!("{:?}", e),
            })
    }
}

impl SourceDocument for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_size(&self, index: usize) -> Result<PageSize, SealError> {
        let page = self.page(index)?;
        Ok(PageSize::new(page.width().value, page.height().value))
    }

    fn render_page(&self, index: usize, dpi: u32) -> Result<RasterPage, SealError> {
        let page = self.page(index)?;
        let size = PageSize::new(page.width().value, page.height().value);
        let (width, height) = size.to_pixels(dpi)?;

        let render_config = PdfRenderConfig::new()
            .set_target_size(width as i32, height as i32)
            .set_clear_color(PdfColor::WHITE);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| SealError::Render {
                detail: format!("{:?}", e),
            })?;

        let image = bitmap.as_image().to_rgb8();
        debug!(
            "Rendered page {} → {}x{} px",
            index + 1,
            image.width(),
            image.height()
        );

        Ok(RasterPage { image, size })
    }
}
