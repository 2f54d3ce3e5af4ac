//! Error types for the reconciliation pipeline.

use convoy_model::{DeploymentId, ManifestId, ModelError, SourceId};
use convoy_registry::RegistryError;
use thiserror::Error;

/// Artifact-policy violations for a single deployment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardError {
    /// The registry has no artifact for the deployment's source.
    #[error("missing image for {source_id}: {cause}")]
    MissingImage {
        source_id: SourceId,
        #[source]
        cause: RegistryError,
    },

    /// The artifact carries an advisory the target cluster does not accept.
    #[error("advisory {advisory:?} on {source_id} is not accepted by cluster {cluster:?}")]
    UnacceptableAdvisory {
        advisory: String,
        source_id: SourceId,
        cluster: String,
    },

    /// The deployment carries no cluster definition to check advisories against.
    #[error("nil cluster on deployment {0}")]
    NilCluster(DeploymentId),
}

/// Errors reported on the pipeline's error queues.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// A contribution arrived for a bundle that was already flushed.
    #[error("attempted to add a new pair to the consumed bundle for {0}")]
    AddToConsumedBundle(ManifestId),

    /// A bundle was flushed a second time.
    #[error("invariant violated: bundle for {0} flushed twice")]
    BundleConsumed(ManifestId),

    /// Prior and post of one pair name different clusters.
    #[error("invariant violated: two clusters named in deploy pair: {prior:?} vs {post:?}")]
    ClusterMismatch { prior: String, post: String },

    /// Neither side of a pair names a cluster.
    #[error("invariant violated: no cluster name given in deploy pair for {0}")]
    MissingClusterName(ManifestId),

    /// A cluster contributed the same deployment twice to one bundle side.
    #[error("deployment collision for cluster's {side} {cluster:?}: {existing} vs {incoming}")]
    Collision {
        cluster: String,
        side: &'static str,
        existing: String,
        incoming: String,
    },

    /// A pair lacks the side its queue requires.
    #[error("blank pair on the {0} queue")]
    BlankPair(&'static str),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Guard(#[from] GuardError),
}
