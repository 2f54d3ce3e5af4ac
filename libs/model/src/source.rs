//! Source identity of deployable code.
//!
//! Built images carry their source identity as image labels; the scheduler
//! only knows the image reference, so decoding labels is how an observed
//! deployment gets tied back to the code it runs.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Label holding the source repository URL.
pub const REPO_URL_LABEL: &str = "io.convoy.repo_url";

/// Label holding the subdirectory of the repository (optional).
pub const REPO_OFFSET_LABEL: &str = "io.convoy.repo_offset";

/// Label holding the built version.
pub const VERSION_LABEL: &str = "io.convoy.version";

/// Where a deployable unit's source lives: repository plus subdirectory.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub repo: String,
    #[serde(default)]
    pub dir: String,
}

impl SourceLocation {
    pub fn new(repo: impl Into<String>, dir: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            dir: dir.into(),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dir.is_empty() {
            write!(f, "{}", self.repo)
        } else {
            write!(f, "{},{}", self.repo, self.dir)
        }
    }
}

/// A specific version of a source location.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceId {
    pub location: SourceLocation,
    pub version: String,
}

impl SourceId {
    pub fn new(location: SourceLocation, version: impl Into<String>) -> Self {
        Self {
            location,
            version: version.into(),
        }
    }

    /// Decode a source identity from image labels.
    ///
    /// The repository URL and version are required; the offset defaults to
    /// the repository root.
    pub fn from_labels(labels: &HashMap<String, String>) -> Result<Self, ModelError> {
        let required = |key: &'static str| {
            labels
                .get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or(ModelError::MissingLabel(key))
        };

        let repo = required(REPO_URL_LABEL)?;
        let version = required(VERSION_LABEL)?;
        let dir = labels.get(REPO_OFFSET_LABEL).cloned().unwrap_or_default();

        Ok(Self::new(SourceLocation::new(repo, dir), version))
    }

    /// Encode this identity as image labels (inverse of `from_labels`).
    pub fn to_labels(&self) -> HashMap<String, String> {
        let mut labels = HashMap::new();
        labels.insert(REPO_URL_LABEL.to_string(), self.location.repo.clone());
        labels.insert(VERSION_LABEL.to_string(), self.version.clone());
        if !self.location.dir.is_empty() {
            labels.insert(REPO_OFFSET_LABEL.to_string(), self.location.dir.clone());
        }
        labels
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.location.repo, self.version)?;
        if !self.location.dir.is_empty() {
            write!(f, ",{}", self.location.dir)?;
        }
        Ok(())
    }
}
