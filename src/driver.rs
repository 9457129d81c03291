//! The per-page sealing state machine.
//!
//! ```text
//! Idle ─▶ Rasterizing(i) ─▶ Watermarking(i) ─▶ Encoding(i) ─▶ Assembling(i) ─┐
//!              ▲                                                              │
//!              └──────────────────────── next page ◀──────────────────────────┤
//!                                                                             ▼
//!                                                          Finalizing ─▶ Done
//! any state ─▶ Failed
//! ```
//!
//! Pages are processed strictly in order and one at a time: the raster,
//! layer and composite of page `i` are dropped before page `i + 1` is
//! rendered. The first error aborts the run; nothing is retried and no
//! partial document is returned.

use crate::config::SealConfig;
use crate::error::SealError;
use crate::output::SealStats;
use crate::pipeline::assemble::OutputAssembler;
use crate::pipeline::composite::composite;
use crate::pipeline::encode::encode_page;
use crate::pipeline::render::Rasterizer;
use crate::pipeline::watermark::{load_font, WatermarkGenerator};
use crate::progress::{LogSink, ProgressSink};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Where a sealing run currently is. Page numbers are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Rasterizing(usize),
    Watermarking(usize),
    Encoding(usize),
    Assembling(usize),
    Finalizing,
    Done,
    Failed,
}

impl PipelineState {
    /// The page being worked on, if any.
    pub fn page(self) -> Option<usize> {
        match self {
            PipelineState::Rasterizing(p)
            | PipelineState::Watermarking(p)
            | PipelineState::Encoding(p)
            | PipelineState::Assembling(p) => Some(p),
            _ => None,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => f.write_str("idle"),
            PipelineState::Rasterizing(p) => write!(f, "rasterizing page {p}"),
            PipelineState::Watermarking(p) => write!(f, "watermarking page {p}"),
            PipelineState::Encoding(p) => write!(f, "encoding page {p}"),
            PipelineState::Assembling(p) => write!(f, "assembling page {p}"),
            PipelineState::Finalizing => f.write_str("finalizing"),
            PipelineState::Done => f.write_str("done"),
            PipelineState::Failed => f.write_str("failed"),
        }
    }
}

/// A sealed document plus the driver's share of the run statistics.
#[derive(Debug, Clone)]
pub struct Sealed {
    pub pdf: Vec<u8>,
    pub stats: SealStats,
}

/// Runs the rasterize → watermark → composite → encode → assemble pipeline.
pub struct Sealer<R> {
    rasterizer: R,
    config: SealConfig,
}

impl<R: Rasterizer> Sealer<R> {
    pub fn new(rasterizer: R, config: SealConfig) -> Self {
        Self { rasterizer, config }
    }

    /// Seal `pdf`, returning the image-only document.
    ///
    /// `progress` receives `(pages_done, pages_total)` after every page and
    /// `log` one line per page transition plus a failure line if the run
    /// aborts.
    pub fn seal(
        &self,
        pdf: &[u8],
        progress: &dyn ProgressSink,
        log: &dyn LogSink,
    ) -> Result<Vec<u8>, SealError> {
        self.seal_with_stats(pdf, progress, log).map(|sealed| sealed.pdf)
    }

    /// Like [`Sealer::seal`], also returning page count and stage timings.
    pub fn seal_with_stats(
        &self,
        pdf: &[u8],
        progress: &dyn ProgressSink,
        log: &dyn LogSink,
    ) -> Result<Sealed, SealError> {
        let mut state = PipelineState::Idle;
        let result = self.run(pdf, progress, log, &mut state);
        match &result {
            Ok(sealed) => {
                state = PipelineState::Done;
                debug!("Pipeline {state}: {} pages", sealed.stats.pages);
            }
            Err(e) => {
                let line = match e.page() {
                    Some(page) => format!(
                        "Sealing failed on page {page} while {state}: {}",
                        e.cause()
                    ),
                    None => format!("Sealing failed: {e}"),
                };
                warn!("{line}");
                log.on_log(&line);
                state = PipelineState::Failed;
                debug!("Pipeline {state}");
            }
        }
        result
    }

    fn run(
        &self,
        pdf: &[u8],
        progress: &dyn ProgressSink,
        log: &dyn LogSink,
        state: &mut PipelineState,
    ) -> Result<Sealed, SealError> {
        let config = &self.config;
        let (dpi, quality) = (config.dpi(), config.quality());

        // Nothing touches the rasterizer until the text is known good.
        config.watermark.validate()?;
        let font = load_font(config.font_path.as_deref())?;
        let generator = WatermarkGenerator::new(&config.watermark, dpi, &font)?;

        log.on_log(&format!(
            "Applying watermark '{}' and rebuilding PDF (dpi={dpi}, q={quality})…",
            config.watermark.text
        ));

        *state = PipelineState::Rasterizing(1);
        let document = self
            .rasterizer
            .open(pdf, config.password.as_deref())
            .map_err(|e| e.on_page(1))?;
        let total = document.page_count();
        if total == 0 {
            return Err(SealError::EmptyDocument);
        }
        info!("Sealing {total} pages at {dpi} dpi, q{quality}");

        let mut assembler = OutputAssembler::new(dpi);
        let mut stats = SealStats {
            pages: total,
            profile: config.profile,
            dpi,
            quality,
            input_bytes: pdf.len(),
            ..SealStats::default()
        };

        for index in 0..total {
            let page = index + 1;
            log.on_log(&format!("Watermarking page {page}/{total}…"));

            *state = PipelineState::Rasterizing(page);
            let started = Instant::now();
            let size = document.page_size(index).map_err(|e| e.on_page(page))?;
            let expected = size.to_pixels(dpi).map_err(|e| e.on_page(page))?;
            let raster = document
                .render_page(index, dpi)
                .map_err(|e| e.on_page(page))?;
            // The page box is derived from the pixel size, so it must match the source.
            if raster.size != size || (raster.width(), raster.height()) != expected {
                return Err(SealError::Render {
                    detail: format!(
                        "rasterizer produced {}x{} px, expected {}x{} px for {}x{} pt at {dpi} dpi",
                        raster.width(),
                        raster.height(),
                        expected.0,
                        expected.1,
                        size.width_pt,
                        size.height_pt
                    ),
                }
                .on_page(page));
            }
            stats.render_ms += started.elapsed().as_millis() as u64;

            *state = PipelineState::Watermarking(page);
            let started = Instant::now();
            let layer = generator
                .layer(raster.width(), raster.height())
                .map_err(|e| e.on_page(page))?;
            let flattened = composite(&raster.image, &layer).map_err(|e| e.on_page(page))?;
            drop(layer);
            drop(raster);
            stats.watermark_ms += started.elapsed().as_millis() as u64;

            *state = PipelineState::Encoding(page);
            let started = Instant::now();
            let encoded = encode_page(index, &flattened, quality).map_err(|e| e.on_page(page))?;
            drop(flattened);
            stats.encode_ms += started.elapsed().as_millis() as u64;

            *state = PipelineState::Assembling(page);
            assembler.add_page(encoded).map_err(|e| e.on_page(page))?;

            progress.on_progress(page, total);
        }

        *state = PipelineState::Finalizing;
        let pdf = assembler.finish()?;
        stats.output_bytes = pdf.len();
        log.on_log("Watermarking complete.");
        Ok(Sealed { pdf, stats })
    }
}
