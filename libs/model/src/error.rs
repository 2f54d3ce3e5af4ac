//! Error types for the data model.

use thiserror::Error;

use crate::deployment::DeploymentId;

/// Errors raised while decoding or folding model values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A required image label is absent or empty.
    #[error("missing image label {0:?}")]
    MissingLabel(&'static str),

    /// A deployment carries no cluster nickname.
    #[error("invalid deployment {0}: no cluster name")]
    MissingClusterName(DeploymentId),

    /// A deployment names a cluster that is not defined.
    #[error("deployment {deployment} names undefined cluster {cluster:?}")]
    UnknownCluster {
        deployment: DeploymentId,
        cluster: String,
    },

    /// More than one manifest where exactly zero or one was expected.
    #[error("expected at most one manifest, found {0}")]
    AmbiguousManifests(usize),
}
