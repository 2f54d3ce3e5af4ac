//! Artifact registry capability.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use convoy_model::{BuildArtifact, SourceId};
use tokio::sync::RwLock;
use tracing::trace;

use crate::error::RegistryError;

/// Resolves a source identity to the artifact built from it.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Fetch the artifact for `sid`; a miss is `RegistryError::NotFound`.
    async fn get_artifact(&self, sid: &SourceId) -> Result<BuildArtifact, RegistryError>;
}

/// In-memory registry for testing and development.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    artifacts: RwLock<HashMap<SourceId, BuildArtifact>>,

    /// Number of lookups served (hits and misses).
    lookups: AtomicU64,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with artifacts.
    pub fn with_artifacts<I>(artifacts: I) -> Self
    where
        I: IntoIterator<Item = (SourceId, BuildArtifact)>,
    {
        Self {
            artifacts: RwLock::new(artifacts.into_iter().collect()),
            lookups: AtomicU64::new(0),
        }
    }

    pub async fn insert(&self, sid: SourceId, artifact: BuildArtifact) {
        self.artifacts.write().await.insert(sid, artifact);
    }

    pub async fn remove(&self, sid: &SourceId) -> Option<BuildArtifact> {
        self.artifacts.write().await.remove(sid)
    }

    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn get_artifact(&self, sid: &SourceId) -> Result<BuildArtifact, RegistryError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let found = self.artifacts.read().await.get(sid).cloned();
        trace!(source_id = %sid, hit = found.is_some(), "Registry lookup");
        found.ok_or_else(|| RegistryError::NotFound(sid.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoy_model::SourceLocation;

    fn sid(version: &str) -> SourceId {
        SourceId::new(SourceLocation::new("github.com/acme/shop", ""), version)
    }

    #[tokio::test]
    async fn test_memory_registry_hit_and_miss() {
        let registry =
            MemoryRegistry::with_artifacts([(sid("1.0"), BuildArtifact::docker("shop:1.0"))]);

        let art = registry.get_artifact(&sid("1.0")).await.unwrap();
        assert_eq!(art.name, "shop:1.0");

        let err = registry.get_artifact(&sid("2.0")).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(registry.lookups(), 2);
    }

    #[tokio::test]
    async fn test_memory_registry_insert_remove() {
        let registry = MemoryRegistry::new();
        registry.insert(sid("1.0"), BuildArtifact::docker("shop:1.0")).await;
        assert!(registry.get_artifact(&sid("1.0")).await.is_ok());

        registry.remove(&sid("1.0")).await;
        assert!(registry.get_artifact(&sid("1.0")).await.is_err());
    }
}
