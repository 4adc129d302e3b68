// Error types shared by the library. The HTTP client and command layer use
// `anyhow`; everything the upload pipeline can fail with is typed here so the
// caller can tell which stage broke.

use std::path::PathBuf;
use thiserror::Error;

/// Terminal failure of an upload. There is no partial success: any of these
/// aborts the whole operation.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid file path {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("file type not allowed: {0}")]
    DisallowedExtension(String),

    #[error("MIME type not allowed: {0}")]
    DisallowedContentType(String),

    #[error("failed to open upload session: {0:#}")]
    NegotiationFailed(anyhow::Error),

    #[error("failed to upload part {part_number} ({failed} part(s) failed)")]
    PartTransferFailed {
        part_number: usize,
        failed: usize,
        #[source]
        source: TransferError,
    },

    #[error("no result recorded for part {part_number}")]
    MissingPart { part_number: usize },

    #[error("failed to complete multipart upload: {0:#}")]
    FinalizationFailed(anyhow::Error),
}

/// Why a single part could not be transferred.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("failed to read source file: {0}")]
    Io(#[from] std::io::Error),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("received non-success status code {0}")]
    Status(u16),

    #[error("response carried no ETag header")]
    MissingEtag,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API key must be provided via --api-key flag or REELTUBE_API_KEY environment variable")]
    MissingApiKey,

    #[error("invalid base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}
