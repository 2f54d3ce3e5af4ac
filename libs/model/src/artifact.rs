//! Build artifacts and their qualities.

use serde::{Deserialize, Serialize};

/// Quality kind marking an artifact with a caveat a cluster must accept.
pub const ADVISORY_QUALITY: &str = "advisory";

/// The built image a deployment runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArtifact {
    /// Image reference.
    pub name: String,

    /// Artifact technology (e.g. "docker").
    #[serde(rename = "type")]
    pub artifact_type: String,

    #[serde(default)]
    pub qualities: Vec<Quality>,
}

impl BuildArtifact {
    pub fn docker(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            artifact_type: "docker".to_string(),
            qualities: Vec::new(),
        }
    }

    /// Names of the advisories attached to this artifact.
    pub fn advisories(&self) -> impl Iterator<Item = &str> {
        self.qualities
            .iter()
            .filter(|q| q.is_advisory() && !q.name.is_empty())
            .map(|q| q.name.as_str())
    }
}

/// A recorded characteristic of a build artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quality {
    pub name: String,
    pub kind: String,
}

impl Quality {
    pub fn advisory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ADVISORY_QUALITY.to_string(),
        }
    }

    pub fn is_advisory(&self) -> bool {
        self.kind == ADVISORY_QUALITY
    }
}
