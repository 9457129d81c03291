//! CLI binary for safeseal.
//!
//! A thin shim over the library crate that maps CLI flags to `SealConfig`,
//! shows a progress bar and writes the sealed PDF.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use safeseal::{
    seal_to_file, LogSink, NoopSink, PercentSink, QualityProfile, SealConfig, SealEvents,
    SealStats,
};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress using indicatif ─────────────────────────────────────────────

/// Percentage bar anchored at the bottom of the terminal, with the run's log
/// lines printed above it.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        let bar = ProgressBar::new(100);
        bar.set_style(style);
        bar.set_prefix("Sealing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl PercentSink for CliProgress {
    fn on_percent(&self, percent: u8) {
        self.bar.set_position(u64::from(percent));
    }
}

impl LogSink for CliProgress {
    fn on_log(&self, line: &str) {
        let marker = if line.starts_with("Sealing failed") {
            red("✗")
        } else {
            cyan("◆")
        };
        self.bar.println(format!("{marker} {}", dim(line)));
    }
}

/// Log lines straight to stderr when no bar is shown.
struct StderrLog;

impl LogSink for StderrLog {
    fn on_log(&self, line: &str) {
        eprintln!("{line}");
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Seal a PDF (writes contract_sealed.pdf next to it)
  safeseal contract.pdf --text "JOHN SMITH"

  # Office documents go through LibreOffice first
  safeseal deck.pptx --text "ACME LEGAL" -o /tmp/deck_for_acme.pdf

  # Smallest output
  safeseal --profile smallest report.docx --text "REVIEW COPY"

  # Explicit resolution and quality
  safeseal --dpi 150 --quality 80 scan.pdf --text "J. DOE"

  # Machine-readable summary
  safeseal --json --no-progress contract.pdf --text "JOHN SMITH"

PROFILES:
  Profile     DPI   JPEG quality
  ─────────   ───   ────────────
  high        180   90
  balanced    120   75   (default)
  smallest    100   60

ACCEPTED INPUT:
  pdf, pptx, docx, doc, ppt, xls, xlsx, odt, odp, ods, rtf, txt

ENVIRONMENT VARIABLES:
  SAFESEAL_TEXT       Watermark text
  SAFESEAL_PROFILE    high, balanced or smallest
  SAFESEAL_SOFFICE    Path to the LibreOffice soffice binary
  PDFIUM_LIB_PATH     Path to libpdfium (file or directory)
  RUST_LOG            Tracing filter, overrides --verbose/--quiet

SETUP:
  pdfium must be loadable: put libpdfium next to the binary, install it
  system-wide, or point PDFIUM_LIB_PATH at it. LibreOffice is only needed
  for non-PDF input.
"#;

/// Flatten documents into watermarked, image-only PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "safeseal",
    version,
    about = "Flatten documents into watermarked, image-only PDFs",
    long_about = "Rasterise every page of a PDF or office document, stamp a diagonal tiled \
watermark across it, and rebuild an image-only PDF with no extractable text. Office formats \
are converted with headless LibreOffice first.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF or office document to seal.
    input: PathBuf,

    /// Write the sealed PDF here instead of <stem>_sealed.pdf next to the input.
    #[arg(short, long, env = "SAFESEAL_OUTPUT")]
    output: Option<PathBuf>,

    /// Watermark text, 1–15 printable characters (e.g. the recipient's name).
    #[arg(short, long, env = "SAFESEAL_TEXT")]
    text: String,

    /// Quality profile: high, balanced, smallest.
    #[arg(long, env = "SAFESEAL_PROFILE", value_enum, default_value = "balanced")]
    profile: ProfileArg,

    /// Render DPI, overriding the profile (36–600).
    #[arg(long, env = "SAFESEAL_DPI",
          value_parser = clap::value_parser!(u32).range(36..=600))]
    dpi: Option<u32>,

    /// JPEG quality, overriding the profile (1–100).
    #[arg(long, env = "SAFESEAL_QUALITY",
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,

    /// TTF/OTF font for the watermark instead of the embedded DejaVu Sans.
    #[arg(long, env = "SAFESEAL_FONT")]
    font: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "SAFESEAL_PASSWORD")]
    password: Option<String>,

    /// Path to libpdfium (file or containing directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium: Option<PathBuf>,

    /// Path to the LibreOffice `soffice` binary.
    #[arg(long, env = "SAFESEAL_SOFFICE")]
    soffice: Option<PathBuf>,

    /// Print a JSON summary on stdout.
    #[arg(long, env = "SAFESEAL_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SAFESEAL_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SAFESEAL_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SAFESEAL_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ProfileArg {
    High,
    Balanced,
    Smallest,
}

impl From<ProfileArg> for QualityProfile {
    fn from(v: ProfileArg) -> Self {
        match v {
            ProfileArg::High => QualityProfile::HighQuality,
            ProfileArg::Balanced => QualityProfile::Balanced,
            ProfileArg::Smallest => QualityProfile::Smallest,
        }
    }
}

#[derive(Serialize)]
struct JsonSummary<'a> {
    input: &'a PathBuf,
    output: &'a PathBuf,
    #[serde(flatten)]
    stats: &'a SealStats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let config = build_config(&cli)?;

    let progress = show_progress.then(CliProgress::new);
    let events = match &progress {
        Some(p) => SealEvents::new(
            Arc::clone(p) as Arc<dyn PercentSink>,
            Arc::clone(p) as Arc<dyn LogSink>,
        ),
        None if cli.quiet || cli.json => SealEvents::default(),
        None => SealEvents::new(Arc::new(NoopSink), Arc::new(StderrLog)),
    };

    // ── Run ──────────────────────────────────────────────────────────────
    let result = seal_to_file(&cli.input, cli.output.as_deref(), &config, &events).await;
    if let Some(p) = &progress {
        p.finish();
    }
    let (path, stats) =
        result.with_context(|| format!("Failed to seal '{}'", cli.input.display()))?;

    if cli.json {
        let summary = JsonSummary {
            input: &cli.input,
            output: &path,
            stats: &stats,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        eprintln!(
            "{}  {} pages  {}  {}ms  →  {}",
            green("✔"),
            stats.pages,
            dim(&format!("{} dpi, q{}", stats.dpi, stats.quality)),
            stats.total_ms,
            bold(&path.display().to_string()),
        );
        eprintln!(
            "   {} in  /  {} out",
            dim(&format_bytes(stats.input_bytes)),
            dim(&format_bytes(stats.output_bytes)),
        );
    }

    Ok(())
}

/// Map CLI args to `SealConfig`.
fn build_config(cli: &Cli) -> Result<SealConfig> {
    let mut builder = SealConfig::builder()
        .profile(cli.profile.into())
        .watermark_text(cli.text.clone());

    if let Some(dpi) = cli.dpi {
        builder = builder.dpi(dpi);
    }
    if let Some(quality) = cli.quality {
        builder = builder.quality(quality);
    }
    if let Some(ref font) = cli.font {
        builder = builder.font_path(font);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(ref pdfium) = cli.pdfium {
        builder = builder.pdfium_library_path(pdfium);
    }
    if let Some(ref soffice) = cli.soffice {
        builder = builder.converter_path(soffice);
    }

    builder.build().context("Invalid configuration")
}

fn format_bytes(n: usize) -> String {
    const KIB: f64 = 1024.0;
    let n = n as f64;
    if n >= KIB * KIB {
        format!("{:.1} MiB", n / (KIB * KIB))
    } else if n >= KIB {
        format!("{:.1} KiB", n / KIB)
    } else {
        format!("{n} B")
    }
}
