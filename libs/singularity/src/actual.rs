//! One actual-state pass over every configured scheduler.

use std::collections::BTreeMap;
use std::sync::Arc;

use convoy_model::{Clusters, Defs, DeployState, DeployStatus};
use convoy_registry::ImageLabeller;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::builder::SingReq;
use crate::client::SchedulerClient;
use crate::error::{BuildError, SchedulerError};
use crate::retry::{build_with_retry, RetryPolicy};

/// A request that could not be turned into a deploy state.
#[derive(Debug)]
pub struct RequestFailure {
    pub source_url: String,
    /// `None` when the scheduler's request listing itself failed.
    pub request_id: Option<String>,
    pub error: BuildError,
}

/// Result of an actual-state pass.
#[derive(Debug, Default)]
pub struct ActualState {
    pub states: Vec<DeployState>,
    pub failures: Vec<RequestFailure>,
}

impl ActualState {
    pub fn count(&self, status: DeployStatus) -> usize {
        self.states.iter().filter(|s| s.status == status).count()
    }
}

/// Collect the deploy state of every request at every configured scheduler.
///
/// Clusters sharing a base URL share one request listing. Requests are built
/// concurrently; a failure for one request never affects the others.
pub async fn collect_actual_state<F>(
    labeller: Arc<dyn ImageLabeller>,
    defs: &Defs,
    connect: F,
    policy: &RetryPolicy,
) -> ActualState
where
    F: Fn(&str) -> Result<Arc<dyn SchedulerClient>, SchedulerError>,
{
    let clusters: Arc<Clusters> = Arc::new(defs.clusters.clone());
    let mut actual = ActualState::default();
    let mut builds = JoinSet::new();

    for (base_url, nicks) in defs.by_base_url() {
        debug!(base_url = %base_url, clusters = ?nicks, "Listing scheduler requests");

        let scheduler = match connect(base_url) {
            Ok(scheduler) => scheduler,
            Err(e) => {
                actual.failures.push(listing_failure(base_url, e));
                continue;
            }
        };
        let requests = match scheduler.get_requests().await {
            Ok(requests) => requests,
            Err(e) => {
                actual.failures.push(listing_failure(base_url, e));
                continue;
            }
        };
        info!(base_url = %base_url, count = requests.len(), "Listed scheduler requests");

        for parent in requests {
            let request_id = parent.request_id().map(str::to_string);
            let req = SingReq {
                source_url: base_url.to_string(),
                scheduler: Arc::clone(&scheduler),
                req_parent: Some(parent),
            };
            let labeller = Arc::clone(&labeller);
            let clusters = Arc::clone(&clusters);
            let policy = policy.clone();

            builds.spawn(async move {
                let source_url = req.source_url.clone();
                let result = build_with_retry(labeller.as_ref(), &clusters, req, &policy).await;
                (source_url, request_id, result)
            });
        }
    }

    while let Some(joined) = builds.join_next().await {
        match joined {
            Ok((_, _, Ok(state))) => actual.states.push(state),
            Ok((source_url, request_id, Err(error))) => {
                warn!(
                    source_url = %source_url,
                    request_id = request_id.as_deref().unwrap_or_default(),
                    error = %error,
                    "Failed to build deploy state"
                );
                actual.failures.push(RequestFailure {
                    source_url,
                    request_id,
                    error,
                });
            }
            Err(e) => error!(error = %e, "Build task failed"),
        }
    }

    actual.states.sort_by_key(|s| s.deployment.id());
    actual
}

fn listing_failure(base_url: &str, error: SchedulerError) -> RequestFailure {
    error!(base_url = %base_url, error = %error, "Failed to list scheduler requests");
    RequestFailure {
        source_url: base_url.to_string(),
        request_id: None,
        error: error.into(),
    }
}

/// Count failures per kind, for pass summaries.
pub fn failure_summary(failures: &[RequestFailure]) -> BTreeMap<&'static str, usize> {
    let mut summary = BTreeMap::new();
    for failure in failures {
        let kind = match &failure.error {
            BuildError::Malformed { .. } => "malformed",
            BuildError::UnsupportedRequestType { .. } => "unsupported",
            BuildError::Retryable { .. } => "retries_exhausted",
            BuildError::Scheduler(_) => "scheduler",
        };
        *summary.entry(kind).or_insert(0) += 1;
    }
    summary
}
