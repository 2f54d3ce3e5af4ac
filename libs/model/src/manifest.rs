//! Manifests: cluster-independent declarations of deployable units.

use std::collections::btree_map::{self, Entry};
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::deployment::{DeployConfig, ManifestKind, OwnerSet};
use crate::error::ModelError;
use crate::source::SourceLocation;

/// Identity of a manifest: its source location plus flavor.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ManifestId {
    pub source: SourceLocation,
    #[serde(default)]
    pub flavor: String,
}

impl fmt::Display for ManifestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)?;
        if !self.flavor.is_empty() {
            write!(f, "~{}", self.flavor)?;
        }
        Ok(())
    }
}

/// What a manifest asks of one cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploySpec {
    pub version: String,
    #[serde(flatten)]
    pub deploy_config: DeployConfig,
}

/// Declared desired state for one source location and flavor, across clusters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub source: SourceLocation,
    #[serde(default)]
    pub flavor: String,
    #[serde(default)]
    pub owners: OwnerSet,
    #[serde(default)]
    pub kind: ManifestKind,
    /// Deploy specs keyed by cluster nickname.
    #[serde(default)]
    pub deployments: BTreeMap<String, DeploySpec>,
}

impl Manifest {
    pub fn id(&self) -> ManifestId {
        ManifestId {
            source: self.source.clone(),
            flavor: self.flavor.clone(),
        }
    }
}

/// Manifests indexed by `ManifestId`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifests(BTreeMap<ManifestId, Manifest>);

impl Manifests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a manifest under its own id.
    pub fn add(&mut self, manifest: Manifest) {
        self.0.insert(manifest.id(), manifest);
    }

    pub fn entry(&mut self, id: ManifestId) -> Entry<'_, ManifestId, Manifest> {
        self.0.entry(id)
    }

    pub fn get(&self, id: &ManifestId) -> Option<&Manifest> {
        self.0.get(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The single manifest in this set, if any; more than one is an error.
    pub fn only(self) -> Result<Option<Manifest>, ModelError> {
        match self.0.len() {
            0 => Ok(None),
            1 => Ok(self.0.into_values().next()),
            n => Err(ModelError::AmbiguousManifests(n)),
        }
    }
}

impl IntoIterator for Manifests {
    type Item = Manifest;
    type IntoIter = btree_map::IntoValues<ManifestId, Manifest>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_values()
    }
}
