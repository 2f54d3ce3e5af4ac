//! Reconstruction of a `DeployState` from one scheduler request.
//!
//! The builder walks a fixed sequence of steps, each of which can fail:
//!
//! 1. Pick the deploy marker (a pending deploy is treated as live)
//! 2. Fetch the deploy record, through history when there is no marker
//! 3. Extract the deploy from the record and derive its status
//! 4. Find the image and decode its labels into a source id
//! 5. Work out which configured cluster the request belongs to
//! 6. Unpack the deploy config and map the request type to a manifest kind
//!
//! Non-malformed failures for well-identified requests are wrapped in
//! [`BuildError::Retryable`]; the caller decides whether to rebuild.

use std::sync::Arc;

use convoy_model::{
    Cluster, Clusters, DeployState, DeployStatus, Deployment, ManifestKind, Resources, SourceId,
    Volume,
};
use convoy_registry::ImageLabeller;
use tracing::{debug, trace};

use crate::client::SchedulerClient;
use crate::dtos::{
    ContainerType, DeployResultState, RequestType, SingularityDeploy, SingularityDeployHistory,
    SingularityDeployMarker, SingularityRequest, SingularityRequestDeployState,
    SingularityRequestParent,
};
use crate::error::{BuildError, RequestContext};
use crate::request_id::make_request_id;

/// One request to build, with the scheduler it came from.
#[derive(Clone)]
pub struct SingReq {
    /// Base URL of the originating scheduler.
    pub source_url: String,
    pub scheduler: Arc<dyn SchedulerClient>,
    pub req_parent: Option<SingularityRequestParent>,
}

impl SingReq {
    fn request_id(&self) -> &str {
        self.req_parent
            .as_ref()
            .and_then(SingularityRequestParent::request_id)
            .unwrap_or("<null request>")
    }

    /// Context for a retry, if the request is well-identified enough to retry.
    fn retry_context(&self) -> Option<RequestContext> {
        let request_id = self.req_parent.as_ref()?.request.as_ref()?.id.as_str();
        if self.source_url.is_empty() || request_id.is_empty() {
            return None;
        }
        Some(RequestContext {
            source_url: self.source_url.clone(),
            request_id: request_id.to_string(),
        })
    }
}

impl std::fmt::Debug for SingReq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingReq")
            .field("source_url", &self.source_url)
            .field("req_parent", &self.req_parent)
            .finish_non_exhaustive()
    }
}

/// Chooses which marker, if any, names the live deploy ahead of history.
pub type MarkerPolicy = fn(&SingularityRequestDeployState) -> Option<&SingularityDeployMarker>;

/// Treat a pending deploy as live; it is assumed to succeed.
pub fn prefer_pending(rds: &SingularityRequestDeployState) -> Option<&SingularityDeployMarker> {
    rds.pending_deploy.as_ref()
}

/// Build the deploy state for a request using [`prefer_pending`].
pub async fn build_deployment(
    labeller: &dyn ImageLabeller,
    clusters: &Clusters,
    req: &SingReq,
) -> Result<DeployState, BuildError> {
    build_deployment_with_policy(labeller, clusters, req, prefer_pending).await
}

/// Build the deploy state for a request with an explicit marker policy.
pub async fn build_deployment_with_policy(
    labeller: &dyn ImageLabeller,
    clusters: &Clusters,
    req: &SingReq,
    policy: MarkerPolicy,
) -> Result<DeployState, BuildError> {
    trace!(req = ?req.req_parent, "Building deployment");
    let mut builder = DeploymentBuilder::new(labeller, clusters, req);

    match builder.complete_construction(policy).await {
        Ok(()) => Ok(builder.target),
        Err(err) => Err(can_retry(req, err)),
    }
}

fn can_retry(req: &SingReq, err: BuildError) -> BuildError {
    if err.is_malformed() || matches!(err, BuildError::UnsupportedRequestType { .. }) {
        return err;
    }
    match req.retry_context() {
        Some(context) => BuildError::Retryable {
            context,
            cause: Box::new(err),
        },
        None => err,
    }
}

struct DeploymentBuilder<'a> {
    labeller: &'a dyn ImageLabeller,
    clusters: &'a Clusters,
    req: &'a SingReq,
    target: DeployState,
}

impl<'a> DeploymentBuilder<'a> {
    fn new(labeller: &'a dyn ImageLabeller, clusters: &'a Clusters, req: &'a SingReq) -> Self {
        let target = DeployState {
            deployment: Deployment {
                cluster: Some(Cluster {
                    base_url: req.source_url.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            },
            status: DeployStatus::Unknown,
        };
        Self {
            labeller,
            clusters,
            req,
            target,
        }
    }

    async fn complete_construction(&mut self, policy: MarkerPolicy) -> Result<(), BuildError> {
        let marker = self.determine_deploy_status(policy)?;
        let history = self.retrieve_deploy(marker).await?;
        let deploy = extract_deploy_from_history(&history)?;
        self.determine_status(&history);
        let image = extract_artifact_name(deploy)?;
        self.retrieve_image_labels(image).await?;
        self.assign_cluster_name(image)?;
        self.unpack_deploy_config(deploy)?;
        self.determine_manifest_kind()
    }

    fn request(&self) -> Result<&'a SingularityRequest, BuildError> {
        let request = self
            .req
            .req_parent
            .as_ref()
            .and_then(|rp| rp.request.as_ref())
            .ok_or_else(|| BuildError::malformed("Singularity request parent had no request."))?;
        if request.id.is_empty() {
            return Err(BuildError::malformed(format!(
                "Singularity request had no id. source: {}",
                self.req.source_url
            )));
        }
        Ok(request)
    }

    fn determine_deploy_status(
        &mut self,
        policy: MarkerPolicy,
    ) -> Result<Option<SingularityDeployMarker>, BuildError> {
        let rp = self.req.req_parent.as_ref().ok_or_else(|| {
            BuildError::malformed(format!(
                "Singularity response didn't include a request parent. source: {}",
                self.req.source_url
            ))
        })?;

        let rds = rp.request_deploy_state.as_ref().ok_or_else(|| {
            BuildError::malformed(format!(
                "Singularity response didn't include a deploy state. request id: {}",
                self.req.request_id()
            ))
        })?;

        let marker = policy(rds).cloned();
        if marker.is_some() {
            self.target.status = DeployStatus::Pending;
        }
        Ok(marker)
    }

    async fn retrieve_deploy(
        &self,
        marker: Option<SingularityDeployMarker>,
    ) -> Result<SingularityDeployHistory, BuildError> {
        let marker = match marker {
            Some(marker) => {
                trace!("Getting deploy based on pending marker");
                marker
            }
            None => self.retrieve_history_marker().await?,
        };
        check_marker(&marker)?;
        self.retrieve_live_deploy(&marker).await
    }

    async fn retrieve_history_marker(&self) -> Result<SingularityDeployMarker, BuildError> {
        trace!("Getting deploy from history");
        let request = self.request()?;

        let history = self.req.scheduler.get_deploys(&request.id, 1, 1).await?;
        trace!(count = history.len(), "Got deploy history from scheduler");

        let partial = history
            .into_iter()
            .next()
            .ok_or_else(|| BuildError::malformed("Singularity deploy history list was empty."))?;

        partial.deploy_marker.ok_or_else(|| {
            BuildError::malformed("Singularity deploy history had no deploy marker.")
        })
    }

    async fn retrieve_live_deploy(
        &self,
        marker: &SingularityDeployMarker,
    ) -> Result<SingularityDeployHistory, BuildError> {
        let history = self
            .req
            .scheduler
            .get_deploy(&marker.request_id, &marker.deploy_id)
            .await?;
        trace!(deploy_id = %marker.deploy_id, "Deploy history entry retrieved");
        Ok(history)
    }

    fn determine_status(&mut self, history: &SingularityDeployHistory) {
        self.target.status = match &history.deploy_result {
            None => DeployStatus::Pending,
            Some(result) if result.deploy_state == DeployResultState::Succeeded => {
                DeployStatus::Active
            }
            Some(_) => DeployStatus::Failed,
        };
    }

    async fn retrieve_image_labels(&mut self, image: &str) -> Result<(), BuildError> {
        let labels = self
            .labeller
            .image_labels(image)
            .await
            .map_err(|e| BuildError::malformed(e.to_string()))?;
        trace!(labels = ?labels, "Image labels");

        self.target.deployment.source_id = SourceId::from_labels(&labels).map_err(|e| {
            BuildError::malformed(format!("{e}; for request id: {}", self.req.request_id()))
        })?;
        Ok(())
    }

    fn assign_cluster_name(&mut self, image: &str) -> Result<(), BuildError> {
        let request = self.request()?;
        let mut candidate = None;
        let mut match_count = 0;

        for (nick, cluster) in self.clusters {
            if cluster.base_url != self.req.source_url {
                continue;
            }
            candidate = Some((nick, cluster));
            match_count += 1;

            let mut id = self.target.deployment.id();
            id.cluster = nick.clone();
            let check_id = make_request_id(&id);
            trace!(check_id = %check_id, "Trying hypothetical request id");

            if check_id == request.id {
                debug!(cluster = %nick, "Found cluster");
                self.set_cluster(nick, cluster);
                return Ok(());
            }
        }

        match candidate {
            Some((nick, cluster)) if match_count == 1 => {
                debug!(
                    cluster = %nick,
                    "No request id matched, using the only plausible cluster"
                );
                self.set_cluster(nick, cluster);
                Ok(())
            }
            _ => {
                let nicks: Vec<&str> = self.clusters.keys().map(String::as_str).collect();
                debug!(
                    clusters = ?nicks,
                    request_id = %request.id,
                    image = %image,
                    "No cluster nickname matched request id"
                );
                Err(BuildError::malformed(format!(
                    "No cluster nickname ({nicks:?}) matched request id {} at {}",
                    request.id, self.req.source_url
                )))
            }
        }
    }

    fn set_cluster(&mut self, nick: &str, cluster: &Cluster) {
        let mut cluster = cluster.clone();
        cluster.name = nick.to_string();
        self.target.deployment.cluster_name = nick.to_string();
        self.target.deployment.cluster = Some(cluster);
    }

    fn unpack_deploy_config(&mut self, deploy: &SingularityDeploy) -> Result<(), BuildError> {
        let request = self.request()?;
        let config = &mut self.target.deployment.deploy_config;

        config.env = deploy.env.clone().unwrap_or_default();
        trace!(env = ?config.env, "Env");

        let rez = deploy
            .resources
            .as_ref()
            .ok_or_else(|| BuildError::malformed("Deploy object lacks resources field"))?;
        config.resources = Resources::from([
            ("cpus".to_string(), format!("{:.6}", rez.cpus)),
            ("memory".to_string(), format!("{:.6}", rez.memory_mb)),
            ("ports".to_string(), rez.num_ports.to_string()),
        ]);

        config.num_instances = request.instances.unwrap_or_default();
        self.target.deployment.owners = request.owners.iter().cloned().collect();

        config.volumes = deploy
            .container_info
            .iter()
            .flat_map(|ci| ci.volumes.iter())
            .map(|v| {
                if v.container_path.is_empty() {
                    return Err(BuildError::malformed(format!(
                        "Volume for host path {:?} has no container path",
                        v.host_path
                    )));
                }
                Ok(Volume {
                    host: v.host_path.clone(),
                    container: v.container_path.clone(),
                    mode: v.mode,
                })
            })
            .collect::<Result<_, _>>()?;
        trace!(volumes = ?config.volumes, "Volumes");

        Ok(())
    }

    fn determine_manifest_kind(&mut self) -> Result<(), BuildError> {
        let request = self.request()?;
        self.target.deployment.kind = match &request.request_type {
            RequestType::Service => ManifestKind::Service,
            RequestType::Worker => ManifestKind::Worker,
            RequestType::OnDemand => ManifestKind::OnDemand,
            RequestType::Scheduled => ManifestKind::Scheduled,
            RequestType::RunOnce => ManifestKind::Once,
            RequestType::Other(other) => {
                return Err(BuildError::UnsupportedRequestType {
                    request_id: request.id.clone(),
                    request_type: other.clone(),
                });
            }
        };
        Ok(())
    }
}

fn check_marker(marker: &SingularityDeployMarker) -> Result<(), BuildError> {
    if marker.request_id.is_empty() || marker.deploy_id.is_empty() {
        return Err(BuildError::malformed(format!(
            "Singularity deploy marker is incomplete: request id {:?}, deploy id {:?}",
            marker.request_id, marker.deploy_id
        )));
    }
    Ok(())
}

fn extract_deploy_from_history(
    history: &SingularityDeployHistory,
) -> Result<&SingularityDeploy, BuildError> {
    history
        .deploy
        .as_ref()
        .ok_or_else(|| BuildError::malformed("Singularity deploy history included no deploy"))
}

fn extract_artifact_name(deploy: &SingularityDeploy) -> Result<&str, BuildError> {
    let ci = deploy
        .container_info
        .as_ref()
        .ok_or_else(|| BuildError::malformed("Blank container info"))?;

    if ci.container_type != ContainerType::Docker {
        return Err(BuildError::malformed(
            "Singularity container isn't a docker container",
        ));
    }

    let docker = ci.docker.as_ref().ok_or_else(|| {
        BuildError::malformed("Singularity deploy didn't include a docker info")
    })?;

    if docker.image.is_empty() {
        return Err(BuildError::malformed(
            "Singularity deploy's docker info has no image",
        ));
    }
    Ok(&docker.image)
}
