//! Error types for scheduler access and actual-state building.

use std::fmt;

use thiserror::Error;

/// Errors from the scheduler API.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to decode scheduler response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("scheduler returned {status} for {url}: {body}")]
    UnexpectedStatus { status: u16, url: String, body: String },
}

/// Identity of the scheduler request a build was attempted for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub source_url: String,
    pub request_id: String,
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_url, self.request_id)
    }
}

/// Failure to build a deploy state from a scheduler request.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Required fields were absent from the scheduler's response. Never retried.
    #[error("malformed scheduler response: {message}")]
    Malformed { message: String },

    /// The request has a type this crate does not handle.
    #[error("unrecognized request type returned by scheduler for {request_id}: {request_type}")]
    UnsupportedRequestType {
        request_id: String,
        request_type: String,
    },

    #[error("scheduler call failed: {0}")]
    Scheduler(#[from] SchedulerError),

    /// A failure against a well-identified request; the caller may rebuild.
    #[error("{cause}: {context}")]
    Retryable {
        context: RequestContext,
        #[source]
        cause: Box<BuildError>,
    },
}

impl BuildError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }

    /// The request a retryable failure belongs to.
    pub fn request_context(&self) -> Option<&RequestContext> {
        match self {
            Self::Retryable { context, .. } => Some(context),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_display_names_request() {
        let err = BuildError::Retryable {
            context: RequestContext {
                source_url: "http://sing-a".to_string(),
                request_id: "r1".to_string(),
            },
            cause: Box::new(SchedulerError::NotFound("r1".to_string()).into()),
        };

        assert!(err.is_retryable());
        assert!(!err.is_malformed());
        assert_eq!(
            err.to_string(),
            "scheduler call failed: not found: r1: http://sing-a:r1"
        );
        assert_eq!(err.request_context().unwrap().request_id, "r1");
    }

    #[test]
    fn test_malformed_has_no_context() {
        let err = BuildError::malformed("Blank container info");
        assert!(err.is_malformed());
        assert!(err.request_context().is_none());
    }
}
