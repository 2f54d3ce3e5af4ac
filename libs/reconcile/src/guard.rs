//! Artifact acceptance policy.

use convoy_model::{BuildArtifact, Deployment};
use convoy_registry::Registry;
use tracing::info;

use crate::error::GuardError;

/// Check that a deployment's artifact exists and is acceptable to its cluster.
///
/// A deployment with zero instances never needs an artifact and yields
/// `Ok(None)` without consulting the registry. Every named advisory on the
/// artifact must appear in the cluster's allow-list.
pub async fn guard_image(
    registry: &dyn Registry,
    deployment: &Deployment,
) -> Result<Option<BuildArtifact>, GuardError> {
    if deployment.num_instances() == 0 {
        info!(
            deployment_id = %deployment.id(),
            "Deployment has 0 instances, skipping artifact check"
        );
        return Ok(None);
    }

    let artifact = registry
        .get_artifact(&deployment.source_id)
        .await
        .map_err(|cause| GuardError::MissingImage {
            source_id: deployment.source_id.clone(),
            cause,
        })?;

    for advisory in artifact.advisories() {
        let cluster = deployment
            .cluster
            .as_ref()
            .ok_or_else(|| GuardError::NilCluster(deployment.id()))?;
        if !cluster.allows_advisory(advisory) {
            return Err(GuardError::UnacceptableAdvisory {
                advisory: advisory.to_string(),
                source_id: deployment.source_id.clone(),
                cluster: cluster.name.clone(),
            });
        }
    }

    Ok(Some(artifact))
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoy_model::{Cluster, DeployConfig, Quality, SourceId, SourceLocation};
    use convoy_registry::MemoryRegistry;
    use proptest::prelude::*;

    fn sid() -> SourceId {
        SourceId::new(SourceLocation::new("github.com/acme/shop", ""), "1.0.0")
    }

    fn deployment(instances: u32, allowed: &[&str]) -> Deployment {
        Deployment {
            cluster_name: "left".to_string(),
            cluster: Some(Cluster {
                name: "left".to_string(),
                base_url: "http://left".to_string(),
                allowed_advisories: allowed.iter().map(|a| a.to_string()).collect(),
            }),
            source_id: sid(),
            deploy_config: DeployConfig {
                num_instances: instances,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn registry_with(advisories: &[&str]) -> MemoryRegistry {
        let mut art = BuildArtifact::docker("docker.example.com/shop:1.0.0");
        art.qualities = advisories.iter().map(|a| Quality::advisory(*a)).collect();
        MemoryRegistry::with_artifacts([(sid(), art)])
    }

    #[tokio::test]
    async fn test_missing_image() {
        let registry = MemoryRegistry::new();
        let err = guard_image(&registry, &deployment(1, &[])).await.unwrap_err();
        assert!(matches!(err, GuardError::MissingImage { .. }));
    }

    #[tokio::test]
    async fn test_allowed_advisory_passes() {
        let registry = registry_with(&["dirty_workspace"]);
        let art = guard_image(&registry, &deployment(2, &["dirty_workspace"]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(art.name, "docker.example.com/shop:1.0.0");
    }

    #[tokio::test]
    async fn test_unlisted_advisory_rejected() {
        let registry = registry_with(&["dirty_workspace", "unit_tests_failed"]);
        let err = guard_image(&registry, &deployment(2, &["dirty_workspace"]))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GuardError::UnacceptableAdvisory {
                advisory: "unit_tests_failed".to_string(),
                source_id: sid(),
                cluster: "left".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_no_allow_list_rejects_any_advisory() {
        let registry = registry_with(&["dirty_workspace"]);
        let err = guard_image(&registry, &deployment(1, &[])).await.unwrap_err();
        assert!(matches!(err, GuardError::UnacceptableAdvisory { .. }));
    }

    #[tokio::test]
    async fn test_nil_cluster_with_advisory() {
        let registry = registry_with(&["dirty_workspace"]);
        let mut dep = deployment(1, &[]);
        dep.cluster = None;
        let err = guard_image(&registry, &dep).await.unwrap_err();
        assert!(matches!(err, GuardError::NilCluster(_)));
    }

    #[tokio::test]
    async fn test_nil_cluster_without_advisories_is_fine() {
        let registry = registry_with(&[]);
        let mut dep = deployment(1, &[]);
        dep.cluster = None;
        assert!(guard_image(&registry, &dep).await.unwrap().is_some());
    }

    proptest! {
        #[test]
        fn zero_instances_never_need_an_artifact(
            advisories in proptest::collection::vec("[a-z_]{0,12}", 0..4),
            registered in any::<bool>(),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let refs: Vec<&str> = advisories.iter().map(String::as_str).collect();
            let registry = if registered { registry_with(&refs) } else { MemoryRegistry::new() };

            let result = rt.block_on(guard_image(&registry, &deployment(0, &[])));
            prop_assert_eq!(result, Ok(None));
            prop_assert_eq!(registry.lookups(), 0);
        }
    }
}
