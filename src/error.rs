//! Error types for the medbill-extract library.
//!
//! Every pipeline stage returns `Result<_, BillExtractError>` and the stages
//! are chained with `?` inside [`crate::extract::BillExtractor::try_extract`].
//! The orchestrator is the only place errors stop travelling: it turns them
//! into a failed [`crate::output::ExtractionResponse`] so the caller always
//! receives data, never a fault.
//!
//! Callers that need to branch on the failure (metrics, HTTP status mapping)
//! should match on [`BillExtractError::kind`] rather than on message text.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse failure taxonomy, one value per pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request itself was unusable (empty document URL).
    InvalidRequest,
    /// Document unreachable, non-2xx status, or local scratch write failure.
    Download,
    /// Upload or inference call against the model service failed.
    ModelService,
    /// The model answered, but its text is not the JSON we asked for.
    InvalidModelOutput,
    /// Configuration or runtime problem inside this crate.
    Internal,
}

impl ErrorKind {
    /// Stable lower-case label, suitable for log fields and metrics tags.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Download => "download",
            ErrorKind::ModelService => "model_service",
            ErrorKind::InvalidModelOutput => "invalid_model_output",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All errors produced by the extraction pipeline.
#[derive(Debug, Error)]
pub enum BillExtractError {
    // ── Request errors ────────────────────────────────────────────────────
    /// The document URL was missing or blank.
    #[error("Document URL is mandatory")]
    EmptyDocumentUrl,

    // ── Download errors ───────────────────────────────────────────────────
    /// Transport failure or non-success HTTP status while fetching the document.
    #[error("Download failed for '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download failed for '{url}': timed out after {secs}s")]
    DownloadTimeout { url: String, secs: u64 },

    /// The document could not be written to local scratch storage.
    #[error("Download failed: could not write scratch file '{path}': {source}")]
    ScratchWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Model service errors ──────────────────────────────────────────────
    /// No model client could be constructed (missing API key, unknown provider).
    #[error("Model provider '{provider}' is not configured.\n{hint}")]
    ModelNotConfigured { provider: String, hint: String },

    /// The document upload to the model service failed.
    #[error("Model service upload failed: {reason}")]
    ModelUploadFailed { reason: String },

    /// The inference call failed or returned an unusable envelope.
    #[error("Model service error: {message}")]
    ModelApiError { message: String },

    // ── Model output errors ───────────────────────────────────────────────
    /// The response text is not syntactically valid JSON.
    #[error("AI model returned invalid JSON: {detail}")]
    InvalidModelJson { detail: String },

    /// The response is JSON but does not have the extraction shape.
    #[error("AI model output does not match the bill schema: {detail}")]
    SchemaViolation { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BillExtractError {
    /// The taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BillExtractError::EmptyDocumentUrl => ErrorKind::InvalidRequest,
            BillExtractError::DownloadFailed { .. }
            | BillExtractError::DownloadTimeout { .. }
            | BillExtractError::ScratchWriteFailed { .. } => ErrorKind::Download,
            BillExtractError::ModelNotConfigured { .. }
            | BillExtractError::ModelUploadFailed { .. }
            | BillExtractError::ModelApiError { .. } => ErrorKind::ModelService,
            BillExtractError::InvalidModelJson { .. } | BillExtractError::SchemaViolation { .. } => {
                ErrorKind::InvalidModelOutput
            }
            BillExtractError::InvalidConfig(_) | BillExtractError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }
}
