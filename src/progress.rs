//! Progress and log sinks for sealing runs.
//!
//! The pipeline reports two independent streams to its caller:
//!
//! * **Progress**: after each page, `(pages_completed, pages_total)` via
//!   [`ProgressSink`]. [`PercentMeter`] folds those page counts and the
//!   converter's soft progress into a single 0–100 percentage split by
//!   [`ProgressBands`].
//! * **Log**: human-readable lines for an operator via [`LogSink`]. Purely
//!   observational; nothing in the pipeline reads them back.
//!
//! Sinks are passed explicitly to every run. Closures implement all three
//! traits, so most callers never name a type:
//!
//! ```rust
//! use safeseal::{LogSink, ProgressSink};
//! use std::sync::Mutex;
//!
//! let lines = Mutex::new(Vec::new());
//! let log = |line: &str| lines.lock().unwrap().push(line.to_string());
//! log.on_log("Watermarking page 1/3…");
//!
//! let progress = |done: usize, total: usize| assert!(done <= total);
//! progress.on_progress(1, 3);
//! ```

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Receives `(pages_completed, pages_total)` after every sealed page.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, pages_done: usize, pages_total: usize);
}

/// Receives ordered, human-readable log lines.
pub trait LogSink: Send + Sync {
    fn on_log(&self, line: &str);
}

/// Receives an overall completion percentage in `0..=100`.
pub trait PercentSink: Send + Sync {
    fn on_percent(&self, percent: u8);
}

impl<F: Fn(usize, usize) + Send + Sync> ProgressSink for F {
    fn on_progress(&self, pages_done: usize, pages_total: usize) {
        self(pages_done, pages_total)
    }
}

impl<F: Fn(&str) + Send + Sync> LogSink for F {
    fn on_log(&self, line: &str) {
        self(line)
    }
}

impl<F: Fn(u8) + Send + Sync> PercentSink for F {
    fn on_percent(&self, percent: u8) {
        self(percent)
    }
}

/// Discards everything. The default when the caller wants no events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn on_progress(&self, _pages_done: usize, _pages_total: usize) {}
}

impl LogSink for NoopSink {
    fn on_log(&self, _line: &str) {}
}

impl PercentSink for NoopSink {
    fn on_percent(&self, _percent: u8) {}
}

/// How the overall percentage is divided between the two phases.
///
/// The converter gives no real completion signal, so its share is a fixed
/// heuristic band `0..=conversion_end`; the remaining band is spread evenly
/// over the pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressBands {
    /// Percentage reached when document conversion finishes. Default: 10.
    pub conversion_end: u8,
}

impl Default for ProgressBands {
    fn default() -> Self {
        Self { conversion_end: 10 }
    }
}

impl ProgressBands {
    /// Map the converter's soft progress (`0..=100`) into the conversion band.
    pub fn conversion_percent(&self, soft: u8) -> u8 {
        let soft = u32::from(soft.min(100));
        (soft * u32::from(self.conversion_end) / 100) as u8
    }

    /// `conversion_end + floor((100 - conversion_end) * done / total)`.
    pub fn page_percent(&self, pages_done: usize, pages_total: usize) -> u8 {
        let start = usize::from(self.conversion_end.min(100));
        let span = 100 - start;
        let total = pages_total.max(1);
        let done = pages_done.min(total);
        (start + span * done / total) as u8
    }
}

/// Folds both phases into one monotonically non-decreasing percentage.
///
/// Values lower than the last one emitted are swallowed, so a late soft tick
/// from the converter can never move a progress bar backwards.
pub struct PercentMeter {
    bands: ProgressBands,
    last: AtomicU8,
    sink: Arc<dyn PercentSink>,
}

impl PercentMeter {
    pub fn new(bands: ProgressBands, sink: Arc<dyn PercentSink>) -> Self {
        Self {
            bands,
            last: AtomicU8::new(0),
            sink,
        }
    }

    /// Highest percentage emitted so far.
    pub fn current(&self) -> u8 {
        self.last.load(Ordering::SeqCst)
    }

    /// Emit `percent` if it moves the meter forward.
    pub fn advance(&self, percent: u8) {
        let percent = percent.min(100);
        let previous = self.last.fetch_max(percent, Ordering::SeqCst);
        if percent > previous {
            self.sink.on_percent(percent);
        }
    }

    /// Report converter soft progress (`0..=100` of the conversion phase).
    pub fn conversion(&self, soft: u8) {
        self.advance(self.bands.conversion_percent(soft));
    }

    /// Jump to the end of the conversion band (used when no conversion runs).
    pub fn conversion_done(&self) {
        self.advance(self.bands.conversion_end);
    }

    /// Force the meter to 100.
    pub fn finish(&self) {
        self.advance(100);
    }
}

impl ProgressSink for PercentMeter {
    fn on_progress(&self, pages_done: usize, pages_total: usize) {
        self.advance(self.bands.page_percent(pages_done, pages_total));
    }
}
