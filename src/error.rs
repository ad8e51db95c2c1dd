//! Pipeline error taxonomy.
//!
//! Collaborator errors are folded into `PipelineError` at the stage that
//! raised them. Transport failures from any collaborator become `Network`.

use thiserror::Error;

use crate::detection::DetectorError;
use crate::hashing::FingerprintError;
use crate::ledger::{LedgerError, LedgerErrorKind};
use crate::records::RecordError;
use crate::storage::{FetchError, PinningError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Duplicate media: {detail}")]
    DuplicateMedia { fingerprint: String, detail: String },

    #[error("Media rejected as likely synthetic (natural probability {natural_probability}%)")]
    SyntheticContent { natural_probability: u8 },

    #[error("Could not determine whether this media is registered: {0}")]
    LookupIndeterminate(String),

    #[error("Storage upload failed: {0}")]
    StorageUpload(String),

    #[error("A record for this media already exists ({0})")]
    RecordConflict(String),

    #[error("Record rejected: {}", .0.join("; "))]
    RecordValidation(Vec<String>),

    #[error("Record store error: {0}")]
    RecordStore(String),

    #[error("Ledger transaction failed: {message}")]
    LedgerTransaction {
        kind: Option<LedgerErrorKind>,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid detector response: {0}")]
    DetectorResponse(String),

    #[error(transparent)]
    InvalidFingerprint(#[from] FingerprintError),
}

impl PipelineError {
    /// Failures a caller may resolve by re-running the pipeline unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::LookupIndeterminate(_) | PipelineError::Network(_)
        )
    }
}

impl From<DetectorError> for PipelineError {
    fn from(err: DetectorError) -> Self {
        match err {
            DetectorError::Transport(msg) => PipelineError::Network(msg),
            other => PipelineError::DetectorResponse(other.to_string()),
        }
    }
}

impl From<PinningError> for PipelineError {
    fn from(err: PinningError) -> Self {
        match err {
            PinningError::Transport(msg) => PipelineError::Network(msg),
            other => PipelineError::StorageUpload(other.to_string()),
        }
    }
}

impl From<FetchError> for PipelineError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Transport(msg) => PipelineError::Network(msg),
            other => PipelineError::StorageUpload(other.to_string()),
        }
    }
}

impl From<RecordError> for PipelineError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::Conflict { field } => PipelineError::RecordConflict(field),
            RecordError::Validation(errors) => PipelineError::RecordValidation(errors),
            RecordError::Transport(msg) => PipelineError::Network(msg),
            other => PipelineError::RecordStore(other.to_string()),
        }
    }
}

impl From<LedgerError> for PipelineError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Transport(msg) => PipelineError::Network(msg),
            LedgerError::InvalidFingerprint(e) => PipelineError::InvalidFingerprint(e),
            LedgerError::Rejected { kind } => PipelineError::LedgerTransaction {
                message: kind.message(),
                kind: Some(kind),
            },
            LedgerError::Malformed(msg) => PipelineError::LedgerTransaction {
                kind: None,
                message: msg,
            },
        }
    }
}
