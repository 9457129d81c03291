//! Top-level sealing entry points.
//!
//! These wire the pieces together for one request:
//!
//! ```text
//! SealInput ─┬─ PDF ──────────────────────────────┐
//!            └─ office ─▶ DocumentConverter ─▶ PDF ┴─▶ spawn_blocking(Sealer::seal) ─▶ SealOutput
//!                          (0..=10 %)                       (10..=100 %)
//! ```
//!
//! The converter is located before anything else runs so a host without
//! LibreOffice fails immediately. pdfium is bound inside the blocking task,
//! on the thread that uses it.

use crate::config::SealConfig;
use crate::driver::Sealer;
use crate::error::SealError;
use crate::output::{sealed_file_name, SealOutput, SealStats};
use crate::pipeline::input::{default_output_path, read_input, InputKind, SealInput};
use crate::pipeline::office::{DocumentConverter, SofficeConverter};
use crate::pipeline::render::{PdfiumRasterizer, Rasterizer};
use crate::progress::{LogSink, NoopSink, PercentMeter, PercentSink};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Where a run reports to. Both default to [`NoopSink`].
#[derive(Clone)]
pub struct SealEvents {
    /// Overall completion percentage, monotonic, 100 on success.
    pub percent: Arc<dyn PercentSink>,
    /// Human-readable phase, page and subprocess lines.
    pub log: Arc<dyn LogSink>,
}

impl SealEvents {
    pub fn new(percent: Arc<dyn PercentSink>, log: Arc<dyn LogSink>) -> Self {
        Self { percent, log }
    }
}

impl Default for SealEvents {
    fn default() -> Self {
        Self {
            percent: Arc::new(NoopSink),
            log: Arc::new(NoopSink),
        }
    }
}

/// Seal an in-memory document with LibreOffice and pdfium.
///
/// # Example
/// ```rust,no_run
/// use safeseal::{seal_bytes, SealConfig, SealEvents, SealInput};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = SealConfig::builder().watermark_text("JOHN SMITH").build()?;
/// let input = SealInput::from_bytes("contract.pdf", std::fs::read("contract.pdf")?)?;
/// let output = seal_bytes(input, &config, &SealEvents::default()).await?;
/// std::fs::write(&output.file_name, &output.pdf)?;
/// # Ok(())
/// # }
/// ```
pub async fn seal_bytes(
    input: SealInput,
    config: &SealConfig,
    events: &SealEvents,
) -> Result<SealOutput, SealError> {
    // Reject bad text before soffice is probed.
    config.watermark.validate().map_err(|e| failed(events, e))?;
    let converter = match input.kind {
        InputKind::Office => Some(
            SofficeConverter::locate(
                config.converter_path.as_deref(),
                Duration::from_millis(config.converter_poll_ms),
            )
            .await
            .map_err(|e| failed(events, e))?,
        ),
        InputKind::Pdf => None,
    };
    let library = config.pdfium_library_path.clone();

    run(
        input,
        config,
        events,
        converter.as_ref().map(|c| c as &dyn DocumentConverter),
        move || PdfiumRasterizer::bind(library.as_deref()),
    )
    .await
}

/// Seal with caller-supplied collaborators instead of LibreOffice and pdfium.
pub async fn seal_bytes_with<R>(
    input: SealInput,
    config: &SealConfig,
    events: &SealEvents,
    converter: &dyn DocumentConverter,
    rasterizer: R,
) -> Result<SealOutput, SealError>
where
    R: Rasterizer + Send + 'static,
{
    run(input, config, events, Some(converter), move || Ok(rasterizer)).await
}

/// Read `path` and seal it.
pub async fn seal_file(
    path: impl AsRef<Path>,
    config: &SealConfig,
    events: &SealEvents,
) -> Result<SealOutput, SealError> {
    let input = read_input(path.as_ref())
        .await
        .map_err(|e| failed(events, e))?;
    seal_bytes(input, config, events).await
}

/// Seal `input_path` and write the result.
///
/// With no `output_path` the document lands next to the input as
/// `<stem>_sealed.pdf`. The file is written to a temporary sibling and
/// renamed, so a failed run never leaves a partial PDF behind.
pub async fn seal_to_file(
    input_path: impl AsRef<Path>,
    output_path: Option<&Path>,
    config: &SealConfig,
    events: &SealEvents,
) -> Result<(PathBuf, SealStats), SealError> {
    let input_path = input_path.as_ref();
    let output = seal_file(input_path, config, events).await?;
    let path = output_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(input_path));

    write_atomic(&path, &output.pdf).await?;
    info!("Wrote {} ({} bytes)", path.display(), output.pdf.len());
    Ok((path, output.stats))
}

/// Synchronous wrapper around [`seal_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn seal_sync(
    path: impl AsRef<Path>,
    config: &SealConfig,
    events: &SealEvents,
) -> Result<SealOutput, SealError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| SealError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(seal_file(path, config, events))
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn failed(events: &SealEvents, error: SealError) -> SealError {
    events.log.on_log(&format!("Sealing failed: {error}"));
    error
}

async fn run<R, F>(
    input: SealInput,
    config: &SealConfig,
    events: &SealEvents,
    converter: Option<&dyn DocumentConverter>,
    make_rasterizer: F,
) -> Result<SealOutput, SealError>
where
    R: Rasterizer,
    F: FnOnce() -> Result<R, SealError> + Send + 'static,
{
    let started = Instant::now();
    config.watermark.validate().map_err(|e| failed(events, e))?;

    let meter = Arc::new(PercentMeter::new(
        config.progress_bands,
        Arc::clone(&events.percent),
    ));

    // ── Conversion ───────────────────────────────────────────────────────
    let conversion_started = Instant::now();
    let SealInput {
        file_name,
        bytes,
        kind,
    } = input;
    let pdf = match kind {
        InputKind::Pdf => {
            events
                .log
                .on_log("Input is PDF. Skipping LibreOffice conversion.");
            bytes
        }
        InputKind::Office => {
            let converter = converter.ok_or_else(|| {
                failed(
                    events,
                    SealError::Internal("office input but no converter configured".into()),
                )
            })?;
            converter
                .convert_to_pdf(&bytes, &file_name, events.log.as_ref(), &meter)
                .await
                .map_err(|e| failed(events, e))?
        }
    };
    meter.conversion_done();
    let conversion_ms = conversion_started.elapsed().as_millis() as u64;

    // ── Sealing ──────────────────────────────────────────────────────────
    let blocking_config = config.clone();
    let blocking_meter = Arc::clone(&meter);
    let blocking_log = Arc::clone(&events.log);
    let sealed = tokio::task::spawn_blocking(move || {
        let rasterizer = make_rasterizer().map_err(|e| {
            blocking_log.on_log(&format!("Sealing failed: {e}"));
            e
        })?;
        Sealer::new(rasterizer, blocking_config).seal_with_stats(
            &pdf,
            blocking_meter.as_ref(),
            blocking_log.as_ref(),
        )
    })
    .await
    .map_err(|e| SealError::Internal(format!("Sealing task panicked: {}", e)))??;

    meter.finish();

    let mut stats = sealed.stats;
    stats.converted = kind == InputKind::Office;
    stats.conversion_ms = conversion_ms;
    stats.total_ms = started.elapsed().as_millis() as u64;
    info!(
        "Sealed {} pages in {}ms ({} bytes)",
        stats.pages, stats.total_ms, stats.output_bytes
    );

    Ok(SealOutput {
        pdf: sealed.pdf,
        file_name: sealed_file_name(&file_name),
        stats,
    })
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SealError> {
    let write_err = |source| SealError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }
    Ok(())
}
