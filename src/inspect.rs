// File inspection: make sure the path points at an existing regular file and
// that both its extension and its content type are on the media allow-list.

use crate::error::UploadError;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "mp4", "mov", "avi", "mkv"];

pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "video/mp4",
    "video/quicktime",
    "video/x-msvideo",
    "video/x-matroska",
];

/// Number of leading bytes looked at when the extension has no known MIME type.
const SNIFF_LEN: u64 = 512;

/// A validated upload candidate.
#[derive(Debug, Clone)]
pub struct InspectedFile {
    pub path: PathBuf,
    pub size: u64,
    pub content_type: String,
}

impl InspectedFile {
    /// Base name of the file, used as the upload name when none is given.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Validate `path` and classify its content.
pub fn inspect(path: &Path) -> Result<InspectedFile, UploadError> {
    let invalid = |reason: String| UploadError::InvalidPath {
        path: path.to_path_buf(),
        reason,
    };

    let abs = std::fs::canonicalize(path).map_err(|e| invalid(e.to_string()))?;
    let meta = std::fs::metadata(&abs).map_err(|e| invalid(e.to_string()))?;
    if !meta.is_file() {
        return Err(invalid("not a regular file".into()));
    }

    let ext = abs
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(UploadError::DisallowedExtension(format!(".{ext}")));
    }

    // Dropped right after sniffing; workers open their own handles later.
    let mut head = Vec::with_capacity(SNIFF_LEN as usize);
    File::open(&abs)
        .and_then(|f| f.take(SNIFF_LEN).read_to_end(&mut head))
        .map_err(|e| invalid(format!("unable to read file: {e}")))?;

    let mapped = mime_guess::from_ext(&ext).first();
    let content_type = resolve_content_type(mapped.as_ref().map(|m| m.essence_str()), &head);
    ensure_allowed_content_type(&content_type)?;

    tracing::debug!(path = %abs.display(), size = meta.len(), %content_type, "file inspected");
    Ok(InspectedFile {
        path: abs,
        size: meta.len(),
        content_type,
    })
}

/// Prefer the extension mapping; fall back to sniffing the leading bytes.
pub fn resolve_content_type(mapped: Option<&str>, head: &[u8]) -> String {
    match mapped {
        Some(m) => m.to_string(),
        None => sniff_content_type(head).to_string(),
    }
}

pub fn ensure_allowed_content_type(content_type: &str) -> Result<(), UploadError> {
    if ALLOWED_MIME_TYPES.contains(&content_type) {
        Ok(())
    } else {
        Err(UploadError::DisallowedContentType(content_type.to_string()))
    }
}

/// Infer a MIME type from well-known media signatures.
pub fn sniff_content_type(head: &[u8]) -> &'static str {
    if head.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return "image/jpeg";
    }
    if head.starts_with(b"\x89PNG\r\n\x1a\n") {
        return "image/png";
    }
    if head.starts_with(b"GIF87a") || head.starts_with(b"GIF89a") {
        return "image/gif";
    }
    if head.len() >= 12 && &head[4..8] == b"ftyp" {
        return if &head[8..12] == b"qt  " {
            "video/quicktime"
        } else {
            "video/mp4"
        };
    }
    if head.len() >= 12 && head.starts_with(b"RIFF") && &head[8..12] == b"AVI " {
        return "video/x-msvideo";
    }
    if head.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        // EBML container; WebM shares the header and names itself in the doc type.
        return if head.windows(4).any(|w| w == b"webm") {
            "video/webm"
        } else {
            "video/x-matroska"
        };
    }
    "application/octet-stream"
}
