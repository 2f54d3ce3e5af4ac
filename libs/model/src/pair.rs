//! Before/after pairs produced by diffing actual against desired state.

use serde::{Deserialize, Serialize};

use crate::deployment::{DeployStatus, Deployment, DeploymentId};
use crate::manifest::{Manifest, ManifestId};

/// Classification of a before/after pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairKind {
    /// No prior; the post side is new.
    Created,
    /// No post; the prior side goes away.
    Deleted,
    /// Both sides present and equal.
    Retained,
    /// Both sides present and different.
    Modified,
}

/// Prior (actual) and post (desired) deployments for one cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentPair {
    pub prior: Option<Deployment>,
    pub post: Option<Deployment>,
    /// Live status of the prior deployment, if one was observed.
    pub status: DeployStatus,
}

impl DeploymentPair {
    pub fn created(post: Deployment) -> Self {
        Self {
            prior: None,
            post: Some(post),
            status: DeployStatus::Unknown,
        }
    }

    pub fn deleted(prior: Deployment, status: DeployStatus) -> Self {
        Self {
            prior: Some(prior),
            post: None,
            status,
        }
    }

    /// A pair with both sides present; retained or modified depending on equality.
    pub fn both(prior: Deployment, post: Deployment, status: DeployStatus) -> Self {
        Self {
            prior: Some(prior),
            post: Some(post),
            status,
        }
    }

    pub fn kind(&self) -> PairKind {
        match (&self.prior, &self.post) {
            (None, _) => PairKind::Created,
            (Some(_), None) => PairKind::Deleted,
            (Some(prior), Some(post)) if prior == post => PairKind::Retained,
            _ => PairKind::Modified,
        }
    }

    /// Id of the pair, taken from the post side when present.
    pub fn id(&self) -> Option<DeploymentId> {
        self.post.as_ref().or(self.prior.as_ref()).map(Deployment::id)
    }

    pub fn manifest_id(&self) -> Option<ManifestId> {
        self.post
            .as_ref()
            .or(self.prior.as_ref())
            .map(Deployment::manifest_id)
    }
}

/// Prior and post manifests, assembled once every cluster has reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestPair {
    pub id: ManifestId,
    pub prior: Option<Manifest>,
    pub post: Option<Manifest>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deployment::DeployConfig;

    fn deployment(instances: u32) -> Deployment {
        Deployment {
            cluster_name: "left".to_string(),
            deploy_config: DeployConfig {
                num_instances: instances,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_pair_kind() {
        assert_eq!(DeploymentPair::created(deployment(1)).kind(), PairKind::Created);
        assert_eq!(
            DeploymentPair::deleted(deployment(1), DeployStatus::Active).kind(),
            PairKind::Deleted
        );
        assert_eq!(
            DeploymentPair::both(deployment(1), deployment(1), DeployStatus::Active).kind(),
            PairKind::Retained
        );
        assert_eq!(
            DeploymentPair::both(deployment(1), deployment(2), DeployStatus::Active).kind(),
            PairKind::Modified
        );
    }

    #[test]
    fn test_pair_id_prefers_post() {
        let mut post = deployment(1);
        post.cluster_name = "right".to_string();
        let pair = DeploymentPair::both(deployment(1), post, DeployStatus::Active);
        assert_eq!(pair.id().unwrap().cluster, "right");
    }
}
