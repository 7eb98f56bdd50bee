//! Error types for the menu-digitizer library.
//!
//! Three error types reflect three distinct failure surfaces:
//!
//! * [`DigitizerError`] — **Job-level**: the operation or the pipeline run
//!   cannot complete (bad upload, OCR failure, LLM gave up, menu could not be
//!   saved, unknown job). Pipeline failures are recorded on the job; service
//!   failures are returned to the caller.
//!
//! * [`PortError`] — a collaborator (OCR, LLM, image search, storage,
//!   repositories) reported a failure. The orchestrator decides whether it is
//!   fatal; image-search failures never are.
//!
//! * [`ParseError`] — the LLM answered but the text could not be turned into
//!   a `menuItems` list. Carries only a bounded prefix of the offending text so
//!   a runaway response cannot flood logs or the job record.

use crate::job::{JobId, JobStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All job-level errors returned by the menu-digitizer library.
#[derive(Debug, Clone, Error)]
pub enum DigitizerError {
    // ── Upload errors ─────────────────────────────────────────────────────
    /// The uploaded file is missing, empty, too large or not an image.
    #[error("Invalid menu image: {reason}\nUpload a PNG, JPEG, WebP, GIF, BMP or TIFF photo of the menu.")]
    InvalidFile { reason: String },

    /// The storage collaborator refused the upload.
    #[error("Failed to store uploaded image: {detail}")]
    StorageFailed { detail: String },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// The OCR provider failed. Terminal; retry the whole job to try again.
    #[error("Text extraction failed for '{image_url}': {detail}")]
    ExtractionFailed { image_url: String, detail: String },

    /// The LLM kept returning transient errors until attempts ran out.
    #[error("LLM still unavailable after {attempts} attempts: {detail}")]
    StructuringTransient { attempts: u32, detail: String },

    /// Non-retryable LLM error, or the response could not be parsed even
    /// after the parse retry.
    #[error("Menu structuring failed: {detail}")]
    StructuringTerminal { detail: String },

    /// The assembled menu could not be saved or linked to its job.
    #[error("Failed to persist menu: {detail}")]
    PersistenceFailed { detail: String },

    // ── Job-control errors ────────────────────────────────────────────────
    /// Retry requested while the job is not in the `failed` state, or while
    /// another run of the same job is already in flight.
    #[error("Job {job_id} cannot be retried while {status}; only failed jobs can be retried")]
    RetryNotAllowed { job_id: JobId, status: JobStatus },

    /// No job with this id exists.
    #[error("Job not found: {job_id}")]
    NotFound { job_id: JobId },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configured LLM provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (repository failure outside a pipeline run).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Machine-readable error kind, serialised into error bodies and job records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidFile,
    StorageFailed,
    ExtractionFailed,
    StructuringTransient,
    StructuringTerminal,
    PersistenceFailed,
    RetryNotAllowed,
    NotFound,
    InvalidConfig,
    ProviderNotConfigured,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidFile => "invalid_file",
            ErrorKind::StorageFailed => "storage_failed",
            ErrorKind::ExtractionFailed => "extraction_failed",
            ErrorKind::StructuringTransient => "structuring_transient",
            ErrorKind::StructuringTerminal => "structuring_terminal",
            ErrorKind::PersistenceFailed => "persistence_failed",
            ErrorKind::RetryNotAllowed => "retry_not_allowed",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidConfig => "invalid_config",
            ErrorKind::ProviderNotConfigured => "provider_not_configured",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DigitizerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DigitizerError::InvalidFile { .. } => ErrorKind::InvalidFile,
            DigitizerError::StorageFailed { .. } => ErrorKind::StorageFailed,
            DigitizerError::ExtractionFailed { .. } => ErrorKind::ExtractionFailed,
            DigitizerError::StructuringTransient { .. } => ErrorKind::StructuringTransient,
            DigitizerError::StructuringTerminal { .. } => ErrorKind::StructuringTerminal,
            DigitizerError::PersistenceFailed { .. } => ErrorKind::PersistenceFailed,
            DigitizerError::RetryNotAllowed { .. } => ErrorKind::RetryNotAllowed,
            DigitizerError::NotFound { .. } => ErrorKind::NotFound,
            DigitizerError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            DigitizerError::ProviderNotConfigured { .. } => ErrorKind::ProviderNotConfigured,
            DigitizerError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status a router should answer with for this error.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::InvalidFile | ErrorKind::RetryNotAllowed | ErrorKind::InvalidConfig => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::StorageFailed
            | ErrorKind::ExtractionFailed
            | ErrorKind::StructuringTransient
            | ErrorKind::StructuringTerminal => 502,
            ErrorKind::PersistenceFailed
            | ErrorKind::ProviderNotConfigured
            | ErrorKind::Internal => 500,
        }
    }
}

/// Error body returned by the external interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorKind,
    pub message: String,
}

impl From<&DigitizerError> for ErrorBody {
    fn from(e: &DigitizerError) -> Self {
        Self {
            error: e.kind(),
            message: e.to_string(),
        }
    }
}

/// A failure reported by an external collaborator.
#[derive(Debug, Clone, Error)]
pub enum PortError {
    /// The remote call failed (transport error or non-success status).
    #[error("request failed: {0}")]
    Request(String),

    /// The call did not answer within the allotted time.
    #[error("timed out after {0}ms")]
    Timeout(u64),

    /// The collaborator answered with something unusable.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The addressed record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A storage or repository write/read failed.
    #[error("storage failure: {0}")]
    Storage(String),
}

/// Longest prefix of an unparseable response kept in a [`ParseError`].
pub const PARSE_ERROR_SNIPPET_CHARS: usize = 200;

/// The LLM response could not be decoded into a `menuItems` list.
#[derive(Debug, Clone, Error)]
#[error("could not decode menuItems JSON ({reason}); response began with: {snippet:?}")]
pub struct ParseError {
    pub reason: String,
    pub snippet: String,
}

impl ParseError {
    pub fn new(reason: impl Into<String>, text: &str) -> Self {
        Self {
            reason: reason.into(),
            snippet: text.chars().take(PARSE_ERROR_SNIPPET_CHARS).collect(),
        }
    }
}
