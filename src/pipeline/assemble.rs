//! Image-only PDF construction.
//!
//! Each sealed page becomes one PDF page whose only content is a single
//! DCTDecode image XObject painted over the full MediaBox. Pages are added
//! incrementally in source order so only one compressed page needs to be
//! held by the caller at a time.
//!
//! ```text
//! Catalog ─▶ Pages ─┬─▶ Page 1 ─┬─ MediaBox [0 0 w·72/dpi h·72/dpi]
//!                   │           ├─ Resources /XObject /Im0 ─▶ JPEG stream
//!                   │           └─ Contents  "q w 0 0 h 0 0 cm /Im0 Do Q"
//!                   └─▶ Page 2 …
//! ```

use crate::error::SealError;
use crate::pipeline::encode::EncodedPage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

const IMAGE_NAME: &str = "Im0";

/// Builds the output document one page at a time.
pub struct OutputAssembler {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
    dpi: u32,
}

impl OutputAssembler {
    pub fn new(dpi: u32) -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
            dpi: dpi.max(1),
        }
    }

    /// Pages added so far.
    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Append `page`. Its index must be exactly the number of pages already added.
    pub fn add_page(&mut self, page: EncodedPage) -> Result<(), SealError> {
        let expected = self.kids.len();
        if page.index != expected {
            return Err(SealError::PageOrder {
                expected,
                got: page.index,
            });
        }
        if page.width_px == 0 || page.height_px == 0 {
            return Err(SealError::InvalidGeometry {
                width: i64::from(page.width_px),
                height: i64::from(page.height_px),
            });
        }

        let width_pt = px_to_pt(page.width_px, self.dpi);
        let height_pt = px_to_pt(page.height_px, self.dpi);

        let image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(page.width_px),
                "Height" => i64::from(page.height_px),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            page.data,
        )
        .with_compression(false);
        let image_id = self.doc.add_object(image);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        width_pt.into(),
                        0.into(),
                        0.into(),
                        height_pt.into(),
                        0.into(),
                        0.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content = content.encode().map_err(|e| SealError::Assembly {
            detail: format!("page {} content stream: {e}", page.index + 1),
        })?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), width_pt.into(), height_pt.into()],
            "Resources" => dictionary! {
                "XObject" => dictionary! { IMAGE_NAME => image_id },
            },
            "Contents" => content_id,
        });
        self.kids.push(page_id.into());

        debug!(
            "Assembled page {} ({:.2} x {:.2} pt)",
            page.index + 1,
            width_pt,
            height_pt
        );
        Ok(())
    }

    /// Serialise the document. Consumes the assembler.
    pub fn finish(mut self) -> Result<Vec<u8>, SealError> {
        if self.kids.is_empty() {
            return Err(SealError::EmptyDocument);
        }

        let count = self.kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => self.kids,
            "Count" => count,
        };
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.compress();

        let mut out = Vec::new();
        self.doc
            .save_to(&mut out)
            .map_err(|e| SealError::Assembly {
                detail: e.to_string(),
            })?;
        debug!("Output PDF: {} pages, {} bytes", count, out.len());
        Ok(out)
    }
}

/// Pixel extent to PDF points at `dpi`, multiplied before dividing so
/// whole-point sizes come out exact.
fn px_to_pt(px: u32, dpi: u32) -> f32 {
    (f64::from(px) * 72.0 / f64::from(dpi)) as f32
}
