//! Office → PDF conversion through a headless LibreOffice subprocess.
//!
//! The converter is an injected collaborator: the sealing pipeline only sees
//! [`DocumentConverter`], and [`SofficeConverter`] is the production backend.
//!
//! LibreOffice reports no progress of its own, so while the subprocess runs a
//! fixed-interval tick nudges a soft percentage forward (+2 per tick, capped
//! at 90) and every line it prints is forwarded to the log sink.

use crate::error::SealError;
use crate::progress::{LogSink, PercentMeter};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Extensions handed to the converter. PDFs skip conversion entirely.
pub const OFFICE_EXTENSIONS: &[&str] = &[
    "pptx", "docx", "doc", "ppt", "xls", "xlsx", "odt", "odp", "ods", "rtf", "txt",
];

/// Binaries tried, in order, when no explicit converter path is configured.
pub const SOFFICE_CANDIDATES: &[&str] = &[
    "soffice",
    "libreoffice",
    "/usr/bin/soffice",
    "/usr/bin/libreoffice",
];

const SOFT_STEP: u8 = 2;
const SOFT_CAP: u8 = 90;
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// True when `ext` (without the dot, any case) names a convertible document.
pub fn is_office_extension(ext: &str) -> bool {
    OFFICE_EXTENSIONS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(ext))
}

/// Converts a non-PDF document to PDF bytes.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Convert `source` (named `file_name`, used for its extension) to PDF.
    ///
    /// Subprocess output goes to `log`; soft progress goes to `progress`.
    async fn convert_to_pdf(
        &self,
        source: &[u8],
        file_name: &str,
        log: &dyn LogSink,
        progress: &PercentMeter,
    ) -> Result<Vec<u8>, SealError>;
}

/// LibreOffice `soffice --headless --convert-to pdf`.
#[derive(Debug, Clone)]
pub struct SofficeConverter {
    binary: PathBuf,
    poll: Duration,
}

impl SofficeConverter {
    /// Find a working LibreOffice binary.
    ///
    /// With `explicit` set only that binary is tried; otherwise each of
    /// [`SOFFICE_CANDIDATES`] is probed with `--version`.
    pub async fn locate(explicit: Option<&Path>, poll: Duration) -> Result<Self, SealError> {
        let candidates: Vec<PathBuf> = match explicit {
            Some(path) => vec![path.to_path_buf()],
            None => SOFFICE_CANDIDATES.iter().map(PathBuf::from).collect(),
        };

        for candidate in &candidates {
            if probe(candidate).await {
                info!("Using LibreOffice at {}", candidate.display());
                return Ok(Self {
                    binary: candidate.clone(),
                    poll: poll.max(Duration::from_millis(1)),
                });
            }
            debug!("No working LibreOffice at {}", candidate.display());
        }

        let tried: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
        Err(SealError::UnavailableTool {
            tool: "LibreOffice".into(),
            detail: format!(
                "tried {}. Install LibreOffice or pass --soffice /path/to/soffice.",
                tried.join(", ")
            ),
        })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

async fn probe(binary: &Path) -> bool {
    let status = Command::new(binary)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();
    matches!(
        tokio::time::timeout(PROBE_TIMEOUT, status).await,
        Ok(Ok(s)) if s.success()
    )
}

/// Keep only the final path component so a caller-supplied name cannot
/// escape the scratch directory.
fn scratch_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("document")
        .to_string()
}

#[async_trait]
impl DocumentConverter for SofficeConverter {
    async fn convert_to_pdf(
        &self,
        source: &[u8],
        file_name: &str,
        log: &dyn LogSink,
        progress: &PercentMeter,
    ) -> Result<Vec<u8>, SealError> {
        let scratch = tempfile::tempdir().map_err(|e| SealError::Conversion {
            detail: format!("cannot create scratch directory: {e}"),
        })?;
        let name = scratch_name(file_name);
        let input_path = scratch.path().join(&name);
        let out_dir = scratch.path().join("out");
        let profile_dir = scratch.path().join("profile");
        for dir in [&out_dir, &profile_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| SealError::Conversion {
                    detail: format!("cannot prepare {}: {e}", dir.display()),
                })?;
        }
        tokio::fs::write(&input_path, source)
            .await
            .map_err(|e| SealError::Conversion {
                detail: format!("cannot stage input: {e}"),
            })?;

        log.on_log(&format!("Converting '{name}' to PDF via LibreOffice…"));

        let mut child = Command::new(&self.binary)
            .arg(format!(
                "-env:UserInstallation=file://{}",
                profile_dir.display()
            ))
            .args([
                "--headless",
                "--nologo",
                "--nodefault",
                "--nolockcheck",
                "--norestore",
                "--nofirststartwizard",
                "--convert-to",
                "pdf",
                "--outdir",
            ])
            .arg(&out_dir)
            .arg(&input_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SealError::UnavailableTool {
                tool: "LibreOffice".into(),
                detail: format!("cannot start {}: {e}", self.binary.display()),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            SealError::Internal("converter stdout was not captured".into())
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            SealError::Internal("converter stderr was not captured".into())
        })?;
        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();
        let (mut out_open, mut err_open) = (true, true);
        let mut last_error_line = None;

        let mut ticker = tokio::time::interval(self.poll);
        let mut soft = 0u8;

        let status = loop {
            tokio::select! {
                line = out_lines.next_line(), if out_open => match line {
                    Ok(Some(line)) => forward(log, &line),
                    _ => out_open = false,
                },
                line = err_lines.next_line(), if err_open => match line {
                    Ok(Some(line)) => {
                        forward(log, &line);
                        if !line.trim().is_empty() {
                            last_error_line = Some(line);
                        }
                    }
                    _ => err_open = false,
                },
                status = child.wait() => break status,
                _ = ticker.tick() => {
                    soft = soft.saturating_add(SOFT_STEP).min(SOFT_CAP);
                    progress.conversion(soft);
                }
            }
        };

        // Lines still buffered after exit.
        while out_open {
            match out_lines.next_line().await {
                Ok(Some(line)) => forward(log, &line),
                _ => out_open = false,
            }
        }
        while err_open {
            match err_lines.next_line().await {
                Ok(Some(line)) => {
                    forward(log, &line);
                    if !line.trim().is_empty() {
                        last_error_line = Some(line);
                    }
                }
                _ => err_open = false,
            }
        }

        let status = status.map_err(|e| SealError::Conversion {
            detail: format!("waiting for LibreOffice failed: {e}"),
        })?;
        if !status.success() {
            let mut detail = format!("LibreOffice exited with {status}");
            if let Some(line) = last_error_line {
                detail.push_str(": ");
                detail.push_str(line.trim());
            }
            warn!("{detail}");
            return Err(SealError::Conversion { detail });
        }

        let pdf_path = single_pdf(&out_dir).await?;
        let bytes = tokio::fs::read(&pdf_path)
            .await
            .map_err(|e| SealError::Conversion {
                detail: format!("cannot read {}: {e}", pdf_path.display()),
            })?;
        info!("LibreOffice produced {} bytes of PDF", bytes.len());
        Ok(bytes)
    }
}

fn forward(log: &dyn LogSink, line: &str) {
    let line = line.trim_end();
    if !line.is_empty() {
        log.on_log(line);
    }
}

/// The one `.pdf` in `dir`; zero or several is a conversion failure.
async fn single_pdf(dir: &Path) -> Result<PathBuf, SealError> {
    let list_failed = |e: std::io::Error| SealError::Conversion {
        detail: format!("cannot list {}: {e}", dir.display()),
    };
    let mut entries = tokio::fs::read_dir(dir).await.map_err(list_failed)?;
    let mut pdfs: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(list_failed)? {
        let path = entry.path();
        if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
        {
            pdfs.push(path);
        }
    }

    match pdfs.as_slice() {
        [one] => Ok(one.clone()),
        [] => Err(SealError::Conversion {
            detail: "LibreOffice finished but produced no PDF".into(),
        }),
        many => Err(SealError::Conversion {
            detail: format!("LibreOffice produced {} PDFs, expected one", many.len()),
        }),
    }
}
