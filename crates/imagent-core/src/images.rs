//! Path normalization + MIME helpers for image files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

/// An input image ready to be attached to an agent submission.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// File name sent in the multipart part.
    pub file_name: String,
    /// MIME type inferred from the file extension.
    pub mime: String,
    /// Raw file bytes.
    pub bytes: Vec<u8>,
}

impl ImageInput {
    /// Reads an image file from disk.
    ///
    /// # Errors
    /// Returns an error if the extension is not a supported image format or
    /// the file cannot be read.
    pub fn from_path(path: &Path) -> Result<Self> {
        let mime = mime_for_path(path)
            .ok_or_else(|| anyhow!("unsupported image type: {}", path.display()))?;
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read image {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image")
            .to_string();

        Ok(Self {
            file_name,
            mime: mime.to_string(),
            bytes,
        })
    }
}

/// Normalizes user-provided file paths.
///
/// Handles common drag-and-drop shell escaping (`\ `, `\(`, `\)`) and
/// expands `~/` to the HOME directory when available.
#[must_use]
pub fn normalize_input_path(path: &str) -> PathBuf {
    // Unescape shell-escaped characters (e.g., "\ " → " ").
    let unescaped = path
        .replace("\\ ", " ")
        .replace("\\(", "(")
        .replace("\\)", ")");

    let path = Path::new(&unescaped);
    if let Some(rest) = path.to_str().and_then(|s| s.strip_prefix("~/"))
        && let Ok(home) = std::env::var("HOME")
    {
        return PathBuf::from(home).join(rest);
    }

    path.to_path_buf()
}

/// Returns MIME type inferred from file extension for supported image formats.
#[must_use]
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension().and_then(|e| e.to_str())?;

    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Returns the file extension to use when saving bytes of the given MIME type.
#[must_use]
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    match mime {
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}
