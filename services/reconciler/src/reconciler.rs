//! Actual-state polling loop.
//!
//! The reconciler:
//! - Lists requests at every configured scheduler on each tick
//! - Rebuilds each request's deploy state, retrying transient failures
//! - Logs a per-status summary and every request it could not build

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use convoy_model::{Defs, DeployStatus};
use convoy_registry::{DockerConfig, DockerLabeller, ImageLabeller};
use convoy_singularity::{
    collect_actual_state, failure_summary, ActualState, BackoffPolicy, BuildError,
    HttpSchedulerClient, RetryPolicy, SchedulerClient,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::Config;

/// Deploy states per status for one pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatusCounts {
    pub active: usize,
    pub pending: usize,
    pub failed: usize,
    pub unknown: usize,
}

impl StatusCounts {
    pub fn of(actual: &ActualState) -> Self {
        let mut counts = Self::default();
        for state in &actual.states {
            match state.status {
                DeployStatus::Active => counts.active += 1,
                DeployStatus::Pending => counts.pending += 1,
                DeployStatus::Failed => counts.failed += 1,
                DeployStatus::Unknown => counts.unknown += 1,
            }
        }
        counts
    }
}

/// Reconciler for observing actual deploy state.
pub struct Reconciler {
    defs: Arc<Defs>,
    labeller: Arc<dyn ImageLabeller>,
    retry: RetryPolicy,
    http_timeout: Duration,
    poll_interval: Duration,
}

impl Reconciler {
    /// Create a reconciler talking to real schedulers and registries.
    pub fn new(config: &Config, defs: Defs) -> Result<Self> {
        let labeller = DockerLabeller::new(DockerConfig {
            default_registry_url: config.docker_registry_url.clone(),
            auth_token: None,
            timeout: config.http_timeout,
        })
        .context("Failed to build registry client")?;

        Ok(Self::with_labeller(config, defs, Arc::new(labeller)))
    }

    /// Create a reconciler with an explicit label source.
    pub fn with_labeller(config: &Config, defs: Defs, labeller: Arc<dyn ImageLabeller>) -> Self {
        Self {
            defs: Arc::new(defs),
            labeller,
            retry: RetryPolicy {
                max_retries: config.max_retries,
                backoff: BackoffPolicy::default(),
            },
            http_timeout: config.http_timeout,
            poll_interval: config.poll_interval,
        }
    }

    /// Run passes until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            clusters = self.defs.clusters.len(),
            "Starting reconciliation loop"
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.reconcile().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Reconciler shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Perform a single pass.
    pub async fn reconcile(&self) -> ActualState {
        debug!("Starting actual-state pass");
        let timeout = self.http_timeout;

        let actual = collect_actual_state(
            Arc::clone(&self.labeller),
            &self.defs,
            |url| {
                let client = HttpSchedulerClient::new(url, timeout)?;
                Ok(Arc::new(client) as Arc<dyn SchedulerClient>)
            },
            &self.retry,
        )
        .await;

        log_summary(&actual);
        actual
    }
}

fn log_summary(actual: &ActualState) {
    for failure in &actual.failures {
        let request_id = failure.request_id.as_deref().unwrap_or("<listing>");
        match &failure.error {
            BuildError::Malformed { .. } => warn!(
                source_url = %failure.source_url,
                request_id,
                error = %failure.error,
                "Malformed scheduler response"
            ),
            BuildError::UnsupportedRequestType { .. } => warn!(
                source_url = %failure.source_url,
                request_id,
                error = %failure.error,
                "Unsupported request type"
            ),
            BuildError::Retryable { .. } => warn!(
                source_url = %failure.source_url,
                request_id,
                error = %failure.error,
                "Retries exhausted"
            ),
            BuildError::Scheduler(_) => warn!(
                source_url = %failure.source_url,
                request_id,
                error = %failure.error,
                "Scheduler unavailable"
            ),
        }
    }

    let failures = failure_summary(&actual.failures);
    let counts = StatusCounts::of(actual);
    info!(
        deployments = actual.states.len(),
        active = counts.active,
        pending = counts.pending,
        failed = counts.failed,
        unknown = counts.unknown,
        failures = ?failures,
        "Actual-state pass complete"
    );
}
