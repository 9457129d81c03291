//! Input resolution: read a user-supplied file and decide how it enters the
//! pipeline.
//!
//! PDFs go straight to the rasterizer; office documents take a detour
//! through the converter first. The decision uses the file extension and,
//! failing that, the `%PDF` magic bytes, so an extension-less PDF still
//! skips conversion.

use crate::error::SealError;
use crate::pipeline::office::{is_office_extension, OFFICE_EXTENSIONS};
use std::path::{Path, PathBuf};
use tracing::debug;

/// How a document enters the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Already a PDF; rasterised directly.
    Pdf,
    /// Converted to PDF by the external converter first.
    Office,
}

/// A document read into memory.
#[derive(Debug, Clone)]
pub struct SealInput {
    /// Name used for logging, conversion and the default output name.
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub kind: InputKind,
}

impl SealInput {
    /// Classify in-memory `bytes` named `file_name`.
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, SealError> {
        let file_name = file_name.into();
        let kind = detect_kind(&file_name, &bytes)?;
        Ok(Self {
            file_name,
            bytes,
            kind,
        })
    }
}

/// Lower-cased extension of `file_name`, if any.
fn extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Decide whether `bytes` is a PDF or a convertible office document.
pub fn detect_kind(file_name: &str, bytes: &[u8]) -> Result<InputKind, SealError> {
    match extension(file_name).as_deref() {
        Some("pdf") => return Ok(InputKind::Pdf),
        Some(ext) if is_office_extension(ext) => return Ok(InputKind::Office),
        _ => {}
    }
    if bytes.starts_with(b"%PDF") {
        return Ok(InputKind::Pdf);
    }
    Err(SealError::UnsupportedInput {
        name: file_name.to_string(),
        accepted: format!("pdf, {}", OFFICE_EXTENSIONS.join(", ")),
    })
}

/// Read a local file, mapping I/O failures to actionable errors.
pub async fn read_input(path: &Path) -> Result<SealInput, SealError> {
    if !path.exists() {
        return Err(SealError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => SealError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => SealError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());

    let input = SealInput::from_bytes(file_name, bytes)?;
    debug!(
        "Resolved {} input: {} ({} bytes)",
        match input.kind {
            InputKind::Pdf => "PDF",
            InputKind::Office => "office",
        },
        path.display(),
        input.bytes.len()
    );
    Ok(input)
}

/// `<stem>_sealed.pdf` next to `input`.
pub fn default_output_path(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(crate::output::sealed_file_name(&name))
}
