//! Deployments: one cluster's realization of a manifest.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::artifact::BuildArtifact;
use crate::cluster::{Cluster, Defs};
use crate::error::ModelError;
use crate::manifest::{DeploySpec, Manifest, ManifestId, Manifests};
use crate::source::SourceId;

/// Resource requests, string-encoded ("cpus", "memory", "ports").
pub type Resources = BTreeMap<String, String>;

/// Environment variables.
pub type Env = BTreeMap<String, String>;

/// Owners of a deployment.
pub type OwnerSet = BTreeSet<String>;

/// How a manifest is scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManifestKind {
    #[default]
    Service,
    Worker,
    OnDemand,
    Scheduled,
    Once,
}

/// Mount mode of a volume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolumeMode {
    #[default]
    #[serde(rename = "RO")]
    ReadOnly,
    #[serde(rename = "RW")]
    ReadWrite,
}

/// A host path mounted into the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub host: String,
    pub container: String,
    pub mode: VolumeMode,
}

/// Per-cluster runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    #[serde(default)]
    pub resources: Resources,
    #[serde(default)]
    pub env: Env,
    pub num_instances: u32,
    #[serde(default)]
    pub volumes: Vec<Volume>,
}

/// Identity of a deployment: its manifest plus the cluster it runs in.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeploymentId {
    pub manifest_id: ManifestId,
    pub cluster: String,
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.cluster, self.manifest_id)
    }
}

/// One cluster's concrete instantiation of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub deploy_config: DeployConfig,

    /// Nickname of the cluster this deployment belongs to.
    pub cluster_name: String,

    /// Full cluster definition, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<Cluster>,

    pub source_id: SourceId,

    #[serde(default)]
    pub flavor: String,

    #[serde(default)]
    pub owners: OwnerSet,

    #[serde(default)]
    pub kind: ManifestKind,
}

impl Deployment {
    pub fn manifest_id(&self) -> ManifestId {
        ManifestId {
            source: self.source_id.location.clone(),
            flavor: self.flavor.clone(),
        }
    }

    pub fn id(&self) -> DeploymentId {
        DeploymentId {
            manifest_id: self.manifest_id(),
            cluster: self.cluster_name.clone(),
        }
    }

    pub fn num_instances(&self) -> u32 {
        self.deploy_config.num_instances
    }

    /// Compare against another deployment, listing human-readable differences.
    pub fn diff(&self, other: &Deployment) -> (bool, Vec<String>) {
        let mut diffs = Vec::new();
        let mut check = |field: &str, this: String, that: String| {
            if this != that {
                diffs.push(format!("{field}; this: {this}; other: {that}"));
            }
        };

        check("cluster name", self.cluster_name.clone(), other.cluster_name.clone());
        check("source id", self.source_id.to_string(), other.source_id.to_string());
        check("flavor", self.flavor.clone(), other.flavor.clone());
        check("kind", format!("{:?}", self.kind), format!("{:?}", other.kind));
        check("owners", format!("{:?}", self.owners), format!("{:?}", other.owners));
        check(
            "number of instances",
            self.num_instances().to_string(),
            other.num_instances().to_string(),
        );
        check(
            "resources",
            format!("{:?}", self.deploy_config.resources),
            format!("{:?}", other.deploy_config.resources),
        );
        check(
            "env",
            format!("{:?}", self.deploy_config.env),
            format!("{:?}", other.deploy_config.env),
        );
        check(
            "volumes",
            format!("{:?}", self.deploy_config.volumes),
            format!("{:?}", other.deploy_config.volumes),
        );

        (!diffs.is_empty(), diffs)
    }
}

impl fmt::Display for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.id(), self.source_id.version)
    }
}

/// Deploy status as observed at the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStatus {
    /// No live deploy has been observed (e.g. a deployment yet to be created).
    #[default]
    Unknown,
    Pending,
    Active,
    Failed,
}

impl fmt::Display for DeployStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Actual state of one deployment as reconstructed from the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployState {
    pub deployment: Deployment,
    pub status: DeployStatus,
}

/// A deployment with its resolved build artifact, ready for the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployable {
    pub deployment: Deployment,
    pub status: DeployStatus,
    pub build_artifact: Option<BuildArtifact>,
}

impl Deployable {
    pub fn new(deployment: Deployment, status: DeployStatus) -> Self {
        Self {
            deployment,
            status,
            build_artifact: None,
        }
    }

    pub fn id(&self) -> DeploymentId {
        self.deployment.id()
    }
}

/// Known (prior) and desired (post) deployables for an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployablePair {
    pub id: DeploymentId,
    pub prior: Deployable,
    pub post: Deployable,
}

/// Deployments indexed by `DeploymentId`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deployments(BTreeMap<DeploymentId, Deployment>);

impl Deployments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a deployment, rejecting it if its id is already present.
    ///
    /// On collision the already-indexed deployment is returned.
    pub fn add(&mut self, deployment: Deployment) -> Result<(), &Deployment> {
        match self.0.entry(deployment.id()) {
            Entry::Occupied(existing) => Err(existing.into_mut()),
            Entry::Vacant(slot) => {
                slot.insert(deployment);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &DeploymentId) -> Option<&Deployment> {
        self.0.get(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Deployment> {
        self.0.values()
    }

    /// Cluster nicknames named by the indexed deployments.
    pub fn cluster_names(&self) -> BTreeSet<&str> {
        self.0.values().map(|d| d.cluster_name.as_str()).collect()
    }

    /// Fold per-cluster deployments into manifests.
    pub fn manifests(&self, defs: &Defs) -> Result<Manifests, ModelError> {
        let mut manifests = Manifests::new();
        for deployment in self.0.values() {
            if deployment.cluster_name.is_empty() {
                return Err(ModelError::MissingClusterName(deployment.id()));
            }
            if !defs.clusters.contains_key(&deployment.cluster_name) {
                return Err(ModelError::UnknownCluster {
                    deployment: deployment.id(),
                    cluster: deployment.cluster_name.clone(),
                });
            }

            let manifest = manifests.entry(deployment.manifest_id()).or_insert_with(|| Manifest {
                source: deployment.source_id.location.clone(),
                flavor: deployment.flavor.clone(),
                owners: deployment.owners.clone(),
                kind: deployment.kind,
                deployments: BTreeMap::new(),
            });
            manifest.deployments.insert(
                deployment.cluster_name.clone(),
                DeploySpec {
                    version: deployment.source_id.version.clone(),
                    deploy_config: deployment.deploy_config.clone(),
                },
            );
        }
        Ok(manifests)
    }
}
