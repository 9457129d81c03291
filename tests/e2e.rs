//! End-to-end tests for safeseal.
//!
//! Most tests drive the public API with an in-memory rasterizer and
//! converter so they run anywhere. Tests that need a real pdfium library are
//! gated behind `SAFESEAL_E2E`:
//!
//!   SAFESEAL_E2E=1 PDFIUM_LIB_PATH=/opt/pdfium/lib cargo test --test e2e -- --nocapture

use async_trait::async_trait;
use lopdf::content::Content;
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use safeseal::pipeline::render::{PageSize, RasterPage, Rasterizer, SourceDocument};
use safeseal::{
    seal_bytes, seal_bytes_with, seal_to_file, DocumentConverter, LogSink, PercentMeter,
    QualityProfile, SealConfig, SealError, SealEvents, SealInput,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Route library tracing to the test harness; honours RUST_LOG.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Skip this test unless SAFESEAL_E2E is set (pdfium must be loadable).
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("SAFESEAL_E2E").is_err() {
            println!("SKIP: set SAFESEAL_E2E=1 to run pdfium-backed tests");
            return;
        }
    }};
}

const LETTER: PageSize = PageSize {
    width_pt: 612.0,
    height_pt: 792.0,
};
const A4: PageSize = PageSize {
    width_pt: 595.0,
    height_pt: 842.0,
};

/// Renders flat pages of the given sizes; anything not starting with `%PDF`
/// fails to open, like a corrupt file would.
struct FakeRasterizer {
    pages: Vec<PageSize>,
    opened: Arc<AtomicBool>,
}

impl FakeRasterizer {
    fn new(pages: Vec<PageSize>) -> Self {
        Self {
            pages,
            opened: Arc::new(AtomicBool::new(false)),
        }
    }
}

struct FakeDocument {
    pages: Vec<PageSize>,
}

impl Rasterizer for FakeRasterizer {
    fn open<'a>(
        &'a self,
        pdf: &'a [u8],
        _password: Option<&'a str>,
    ) -> Result<Box<dyn SourceDocument + 'a>, SealError> {
        self.opened.store(true, Ordering::SeqCst);
        if !pdf.starts_with(b"%PDF") {
            return Err(SealError::Render {
                detail: "no PDF header".into(),
            });
        }
        Ok(Box::new(FakeDocument {
            pages: self.pages.clone(),
        }))
    }
}

impl SourceDocument for FakeDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, index: usize) -> Result<PageSize, SealError> {
        Ok(self.pages[index])
    }

    fn render_page(&self, index: usize, dpi: u32) -> Result<RasterPage, SealError> {
        let size = self.pages[index];
        let (w, h) = size.to_pixels(dpi)?;
        let image = image::RgbImage::from_fn(w, h, |x, y| {
            // A dark bar per page index so page order is visible in pixels.
            if y < 20 && x < 20 * (index as u32 + 1) {
                image::Rgb([0, 0, 0])
            } else {
                image::Rgb([255, 255, 255])
            }
        });
        Ok(RasterPage { image, size })
    }
}

/// Stands in for LibreOffice: emits a couple of lines, ticks soft progress
/// and returns a fixed PDF.
struct FakeConverter;

#[async_trait]
impl DocumentConverter for FakeConverter {
    async fn convert_to_pdf(
        &self,
        _source: &[u8],
        file_name: &str,
        log: &dyn LogSink,
        progress: &PercentMeter,
    ) -> Result<Vec<u8>, SealError> {
        log.on_log(&format!("Converting '{file_name}' to PDF via LibreOffice…"));
        for soft in (2..=90).step_by(2) {
            progress.conversion(soft);
        }
        log.on_log("convert done");
        Ok(b"%PDF-1.7 converted".to_vec())
    }
}

#[derive(Default)]
struct Recorder {
    percents: Mutex<Vec<u8>>,
    lines: Mutex<Vec<String>>,
}

fn recording_events() -> (SealEvents, Arc<Recorder>) {
    let rec = Arc::new(Recorder::default());
    let (p, l) = (Arc::clone(&rec), Arc::clone(&rec));
    let events = SealEvents::new(
        Arc::new(move |pct: u8| p.percents.lock().unwrap().push(pct)),
        Arc::new(move |line: &str| l.lines.lock().unwrap().push(line.to_string())),
    );
    (events, rec)
}

fn config(text: &str, profile: QualityProfile) -> SealConfig {
    SealConfig::builder()
        .watermark_text(text)
        .profile(profile)
        .build()
        .expect("valid config")
}

fn pdf_input(name: &str) -> SealInput {
    SealInput::from_bytes(name, b"%PDF-1.7\n%fake".to_vec()).expect("pdf input")
}

fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let values: Vec<f32> = doc
        .get_dictionary(page_id)
        .unwrap()
        .get(b"MediaBox")
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o.as_float().unwrap())
        .collect();
    [values[0], values[1], values[2], values[3]]
}

/// Assert the page's only content is one full-page DCTDecode image.
fn assert_single_jpeg_page(doc: &Document, page_id: ObjectId) {
    let page = doc.get_dictionary(page_id).unwrap();
    let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
    assert!(resources.get(b"Font").is_err(), "page must carry no fonts");
    let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
    assert_eq!(xobjects.len(), 1);
    let (_, image_ref) = xobjects.iter().next().unwrap();
    let image = doc
        .get_object(image_ref.as_reference().unwrap())
        .unwrap()
        .as_stream()
        .unwrap();
    assert_eq!(
        image.dict.get(b"Filter").unwrap().as_name().unwrap(),
        b"DCTDecode"
    );

    let ops = Content::decode(&doc.get_page_content(page_id).unwrap())
        .unwrap()
        .operations;
    let cm = ops.iter().find(|op| op.operator == "cm").unwrap();
    let [_, _, w, h] = media_box(doc, page_id);
    let scale: Vec<f32> = cm.operands.iter().map(|o| o.as_float().unwrap()).collect();
    assert_eq!((scale[0], scale[3]), (w, h));
    assert_eq!((scale[4], scale[5]), (0.0, 0.0));
    assert_eq!(ops.iter().filter(|op| op.operator == "Do").count(), 1);
}

/// A real one-page PDF with a line of Helvetica text.
fn text_pdf(width: i64, height: i64, text: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let content = format!("BT\n/F1 24 Tf\n72 {} Td\n({}) Tj\nET\n", height - 100, text);
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

// ── Scenarios (in-memory collaborators) ──────────────────────────────────────

#[tokio::test]
async fn us_letter_balanced_is_one_full_page_jpeg() {
    let (events, rec) = recording_events();
    let output = seal_bytes_with(
        pdf_input("letter.pdf"),
        &config("TEST", QualityProfile::Balanced),
        &events,
        &FakeConverter,
        FakeRasterizer::new(vec![LETTER]),
    )
    .await
    .expect("sealing should succeed");

    assert_eq!(output.file_name, "letter_sealed.pdf");
    assert_eq!(output.stats.pages, 1);
    assert_eq!((output.stats.dpi, output.stats.quality), (120, 75));

    let doc = Document::load_mem(&output.pdf).unwrap();
    let pages = doc.get_pages();
    assert_eq!(pages.len(), 1);
    let [x0, y0, w, h] = media_box(&doc, pages[&1]);
    assert_eq!((x0, y0), (0.0, 0.0));
    assert_eq!((w, h), (612.0, 792.0));
    assert_single_jpeg_page(&doc, pages[&1]);

    let lines = rec.lines.lock().unwrap();
    assert_eq!(lines[0], "Input is PDF. Skipping LibreOffice conversion.");
    assert!(lines.contains(&"Watermarking page 1/1…".to_string()));
}

#[tokio::test]
async fn page_count_and_order_preserved() {
    let sizes = vec![LETTER, A4, PageSize::new(842.0, 595.0), LETTER, A4];
    let output = seal_bytes_with(
        pdf_input("mixed.pdf"),
        &config("ORDER", QualityProfile::Smallest),
        &SealEvents::default(),
        &FakeConverter,
        FakeRasterizer::new(sizes.clone()),
    )
    .await
    .unwrap();

    let doc = Document::load_mem(&output.pdf).unwrap();
    let pages = doc.get_pages();
    assert_eq!(pages.len(), sizes.len());
    for (n, size) in sizes.iter().enumerate() {
        let page_id = pages[&(n as u32 + 1)];
        let [_, _, w, h] = media_box(&doc, page_id);
        // Box is the rendered pixel size at 100 dpi mapped back to points.
        let (pw, ph) = size.to_pixels(100).unwrap();
        let to_pt = |px: u32| (f64::from(px) * 0.72) as f32;
        assert!((w - to_pt(pw)).abs() < 1e-3, "page {}: width {w}", n + 1);
        assert!((h - to_pt(ph)).abs() < 1e-3, "page {}: height {h}", n + 1);
    }
}

#[tokio::test]
async fn smallest_profile_keeps_physical_page_size() {
    let output = seal_bytes_with(
        pdf_input("a4.pdf"),
        &config("SMALL", QualityProfile::Smallest),
        &SealEvents::default(),
        &FakeConverter,
        FakeRasterizer::new(vec![A4, LETTER]),
    )
    .await
    .unwrap();
    assert_eq!((output.stats.dpi, output.stats.quality), (100, 60));

    let doc = Document::load_mem(&output.pdf).unwrap();
    let pages = doc.get_pages();
    // 595 pt at 100 dpi rounds to 826 px; 826 * 72 / 100 = 594.72 pt
    let [_, _, w, h] = media_box(&doc, pages[&1]);
    assert!((w - 595.0).abs() <= 72.0 / 100.0, "width {w}");
    assert!((h - 842.0).abs() <= 72.0 / 100.0, "height {h}");
    let [_, _, w, h] = media_box(&doc, pages[&2]);
    assert_eq!((w, h), (612.0, 792.0));
}

#[tokio::test]
async fn progress_is_monotonic_and_ends_at_100() {
    let (events, rec) = recording_events();
    let input = SealInput::from_bytes("deck.pptx", b"PK\x03\x04".to_vec()).unwrap();
    let output = seal_bytes_with(
        input,
        &config("PROGRESS", QualityProfile::Smallest),
        &events,
        &FakeConverter,
        FakeRasterizer::new(vec![PageSize::new(200.0, 200.0); 3]),
    )
    .await
    .unwrap();
    assert!(output.stats.converted);
    assert_eq!(output.file_name, "deck_sealed.pdf");

    let percents = rec.percents.lock().unwrap();
    assert!(
        percents.windows(2).all(|w| w[0] <= w[1]),
        "not monotonic: {percents:?}"
    );
    assert_eq!(percents.last(), Some(&100));
    assert!(percents.contains(&10), "conversion band end missing: {percents:?}");
    assert!(percents.contains(&40) && percents.contains(&70));
    assert!(percents.iter().all(|p| *p <= 100));

    let lines = rec.lines.lock().unwrap();
    assert_eq!(lines[0], "Converting 'deck.pptx' to PDF via LibreOffice…");
    assert!(lines.contains(&"convert done".to_string()));
    assert_eq!(lines.last().unwrap(), "Watermarking complete.");
}

#[tokio::test]
async fn corrupt_input_fails_on_page_one_with_log_line() {
    let (events, rec) = recording_events();
    let input = SealInput::from_bytes("broken.pdf", b"this is not a pdf".to_vec()).unwrap();
    let err = seal_bytes_with(
        input,
        &config("TEST", QualityProfile::Balanced),
        &events,
        &FakeConverter,
        FakeRasterizer::new(vec![LETTER]),
    )
    .await
    .unwrap_err();

    assert_eq!(err.page(), Some(1));
    assert!(matches!(err.cause(), SealError::Render { .. }));
    let lines = rec.lines.lock().unwrap();
    assert!(
        lines.iter().any(|l| l.contains("failed") && l.contains("page 1")),
        "no page-1 failure line in {lines:?}"
    );
    assert_ne!(rec.percents.lock().unwrap().last(), Some(&100));
}

#[tokio::test]
async fn empty_watermark_never_reaches_the_rasterizer() {
    let mut config = config("X", QualityProfile::Balanced);
    config.watermark.text = String::new();
    let rasterizer = FakeRasterizer::new(vec![LETTER]);
    let opened = Arc::clone(&rasterizer.opened);

    let err = seal_bytes_with(
        pdf_input("a.pdf"),
        &config,
        &SealEvents::default(),
        &FakeConverter,
        rasterizer,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, SealError::InvalidWatermark(_)));
    assert!(!opened.load(Ordering::SeqCst));
}

#[test]
fn empty_watermark_rejected_by_builder() {
    let err = SealConfig::builder().watermark_text("").build().unwrap_err();
    assert!(matches!(err, SealError::InvalidWatermark(_)));
}

#[tokio::test]
async fn identical_runs_give_identical_output() {
    let run = || async {
        seal_bytes_with(
            pdf_input("same.pdf"),
            &config("SAME", QualityProfile::Balanced),
            &SealEvents::default(),
            &FakeConverter,
            FakeRasterizer::new(vec![LETTER]),
        )
        .await
        .unwrap()
        .pdf
    };
    assert_eq!(run().await, run().await);
}

#[test]
fn unsupported_input_rejected_up_front() {
    let err = SealInput::from_bytes("photo.jpg", vec![0xFF, 0xD8]).unwrap_err();
    assert!(matches!(err, SealError::UnsupportedInput { .. }));
}

// ── pdfium-backed tests ──────────────────────────────────────────────────────

#[tokio::test]
async fn pdfium_letter_page_is_flattened() {
    e2e_skip_unless_ready!();
    init_tracing();

    let source = text_pdf(612, 792, "Confidential quarterly figures");
    let input = SealInput::from_bytes("figures.pdf", source).unwrap();
    let output = seal_bytes(
        input,
        &config("TEST", QualityProfile::Balanced),
        &SealEvents::default(),
    )
    .await
    .expect("sealing with pdfium should succeed");

    let doc = Document::load_mem(&output.pdf).unwrap();
    let pages = doc.get_pages();
    assert_eq!(pages.len(), 1);
    let [_, _, w, h] = media_box(&doc, pages[&1]);
    assert_eq!((w, h), (612.0, 792.0));
    assert_single_jpeg_page(&doc, pages[&1]);

    let text = doc.extract_text(&[1]).unwrap_or_default();
    assert!(!text.contains("Confidential"), "text survived: {text:?}");
}

#[tokio::test]
async fn pdfium_corrupt_pdf_fails_on_page_one() {
    e2e_skip_unless_ready!();
    init_tracing();

    let input = SealInput::from_bytes("corrupt.pdf", b"%PDF-1.7\n garbage".to_vec()).unwrap();
    let (events, rec) = recording_events();
    let err = seal_bytes(input, &config("TEST", QualityProfile::Balanced), &events)
        .await
        .unwrap_err();

    assert_eq!(err.page(), Some(1));
    assert!(matches!(err.cause(), SealError::Render { .. }));
    assert!(rec
        .lines
        .lock()
        .unwrap()
        .iter()
        .any(|l| l.contains("page 1")));
}

#[tokio::test]
async fn pdfium_seal_to_file_writes_sibling() {
    e2e_skip_unless_ready!();
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("memo.pdf");
    std::fs::write(&input_path, text_pdf(612, 792, "memo")).unwrap();

    let (path, stats) = seal_to_file(
        &input_path,
        None,
        &config("MEMO", QualityProfile::Smallest),
        &SealEvents::default(),
    )
    .await
    .unwrap();

    assert_eq!(path, dir.path().join("memo_sealed.pdf"));
    assert_eq!(stats.pages, 1);
    let written = std::fs::read(&path).unwrap();
    assert_eq!(written.len(), stats.output_bytes);
    assert!(written.starts_with(b"%PDF-"));
}
