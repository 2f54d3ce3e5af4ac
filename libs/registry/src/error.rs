//! Error types for registry capabilities.

use convoy_model::SourceId;
use thiserror::Error;

/// Errors from artifact lookup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No artifact is registered for the source id.
    #[error("no artifact registered for {0}")]
    NotFound(SourceId),

    /// The registry could not be consulted.
    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound(_))
    }
}

/// Errors from image label lookup.
#[derive(Debug, Error)]
pub enum LabelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid image reference: {0:?}")]
    InvalidReference(String),

    #[error("image not found: {0}")]
    NotFound(String),

    #[error("authentication required")]
    AuthRequired,

    #[error("unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },
}
