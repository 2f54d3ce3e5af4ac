//! # convoy-model
//!
//! Data model shared by the convoy reconciliation pipeline.
//!
//! ## Design Principles
//!
//! - A `Manifest` is the cluster-independent declaration of a deployable unit
//! - A `Deployment` is one cluster's realization of a manifest
//! - A `Deployable` is a deployment enriched with its build artifact and live status
//! - Values are built once per reconciliation pass and never mutated afterwards
//!
//! ## Identity
//!
//! - `ManifestId` = source location + flavor
//! - `DeploymentId` = manifest id + cluster nickname

mod artifact;
mod cluster;
mod deployment;
mod error;
mod manifest;
mod pair;
mod source;

pub use artifact::{BuildArtifact, Quality, ADVISORY_QUALITY};
pub use cluster::{Cluster, Clusters, Defs};
pub use deployment::{
    DeployConfig, DeployState, DeployStatus, Deployable, DeployablePair, Deployment,
    DeploymentId, Deployments, Env, ManifestKind, OwnerSet, Resources, Volume, VolumeMode,
};
pub use error::ModelError;
pub use manifest::{DeploySpec, Manifest, ManifestId, Manifests};
pub use pair::{DeploymentPair, ManifestPair, PairKind};
pub use source::{
    SourceId, SourceLocation, REPO_OFFSET_LABEL, REPO_URL_LABEL, VERSION_LABEL,
};
