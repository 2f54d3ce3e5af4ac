//! Resolution of per-cluster diffs into deployables.
//!
//! One worker per diff category drains its input queue, resolves build
//! artifacts through [`guard_image`], and feeds one output queue. Every worker
//! holds a clone of the error sender, so the error queue closes only after
//! the last worker exits.

use std::sync::Arc;

use convoy_model::{Deployable, DeployablePair, DeployStatus, Deployment, DeploymentPair};
use convoy_registry::Registry;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::diff::DiffChans;
use crate::error::ReconcileError;
use crate::guard::guard_image;
use crate::{capacity, ERROR_BUFFER_HEADROOM};

/// Categorized deployable queues produced by [`DeployableChans::resolve_names`].
#[derive(Debug)]
pub struct DeployableChans {
    pub start: mpsc::Receiver<Deployable>,
    pub stop: mpsc::Receiver<Deployable>,
    pub stable: mpsc::Receiver<Deployable>,
    pub update: mpsc::Receiver<DeployablePair>,
    pub errors: mpsc::Receiver<ReconcileError>,
    pub done: ResolveHandle,
}

/// Completion handle for the resolution workers.
#[derive(Debug)]
pub struct ResolveHandle {
    workers: JoinSet<()>,
}

impl ResolveHandle {
    /// Wait until every worker has finished.
    pub async fn wait(mut self) {
        while let Some(result) = self.workers.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Resolution worker failed");
            }
        }
    }
}

/// Shared state for one worker.
#[derive(Clone)]
struct Worker {
    registry: Arc<dyn Registry>,
    errors: mpsc::Sender<ReconcileError>,
}

impl Worker {
    async fn report(&self, err: ReconcileError) {
        if self.errors.send(err).await.is_err() {
            debug!("Error receiver dropped");
        }
    }

    /// Resolve strictly: failures are reported and yield `None`.
    async fn resolve_strict(
        &self,
        deployment: Deployment,
        status: DeployStatus,
    ) -> Option<Deployable> {
        match guard_image(self.registry.as_ref(), &deployment).await {
            Ok(Some(artifact)) => {
                let mut deployable = Deployable::new(deployment, status);
                deployable.build_artifact = Some(artifact);
                Some(deployable)
            }
            Ok(None) => {
                info!(
                    deployment_id = %deployment.id(),
                    "No artifact resolved, dropping deployable"
                );
                None
            }
            Err(e) => {
                warn!(deployment_id = %deployment.id(), error = %e, "Artifact resolution failed");
                self.report(e.into()).await;
                None
            }
        }
    }

    /// Resolve best-effort: the deployable is returned whatever the outcome.
    async fn resolve_lenient(&self, deployment: Deployment, status: DeployStatus) -> Deployable {
        let artifact = match guard_image(self.registry.as_ref(), &deployment).await {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!(
                    deployment_id = %deployment.id(),
                    error = %e,
                    "Artifact resolution failed, continuing without artifact"
                );
                None
            }
        };
        let mut deployable = Deployable::new(deployment, status);
        deployable.build_artifact = artifact;
        deployable
    }

    async fn create(self, mut rx: mpsc::Receiver<DeploymentPair>, tx: mpsc::Sender<Deployable>) {
        while let Some(pair) = rx.recv().await {
            let Some(post) = pair.post else {
                self.report(ReconcileError::BlankPair("created")).await;
                continue;
            };
            let Some(deployable) = self.resolve_strict(post, pair.status).await else {
                continue;
            };
            if tx.send(deployable).await.is_err() {
                debug!("Start receiver dropped");
                break;
            }
        }
    }

    async fn delete(self, mut rx: mpsc::Receiver<DeploymentPair>, tx: mpsc::Sender<Deployable>) {
        while let Some(pair) = rx.recv().await {
            let Some(prior) = pair.prior else {
                self.report(ReconcileError::BlankPair("deleted")).await;
                continue;
            };
            let deployable = self.resolve_lenient(prior, pair.status).await;
            if tx.send(deployable).await.is_err() {
                debug!("Stop receiver dropped");
                break;
            }
        }
    }

    async fn retain(self, mut rx: mpsc::Receiver<DeploymentPair>, tx: mpsc::Sender<Deployable>) {
        while let Some(pair) = rx.recv().await {
            let Some(post) = pair.post else {
                self.report(ReconcileError::BlankPair("retained")).await;
                continue;
            };
            let deployable = self.resolve_lenient(post, pair.status).await;
            if tx.send(deployable).await.is_err() {
                debug!("Stable receiver dropped");
                break;
            }
        }
    }

    async fn update(
        self,
        mut rx: mpsc::Receiver<DeploymentPair>,
        tx: mpsc::Sender<DeployablePair>,
    ) {
        while let Some(pair) = rx.recv().await {
            let (Some(prior), Some(post)) = (pair.prior, pair.post) else {
                self.report(ReconcileError::BlankPair("modified")).await;
                continue;
            };
            let id = post.id();
            let prior = self.resolve_lenient(prior, pair.status).await;
            let Some(post) = self.resolve_strict(post, pair.status).await else {
                continue;
            };
            if tx.send(DeployablePair { id, prior, post }).await.is_err() {
                debug!("Update receiver dropped");
                break;
            }
        }
    }
}

impl DeployableChans {
    /// Start resolving artifacts for every pair on `diff`.
    ///
    /// Must be called within a tokio runtime.
    pub fn resolve_names(registry: Arc<dyn Registry>, diff: DiffChans, size: usize) -> Self {
        let cap = capacity(size);
        let (start_tx, start) = mpsc::channel(cap);
        let (stop_tx, stop) = mpsc::channel(cap);
        let (stable_tx, stable) = mpsc::channel(cap);
        let (update_tx, update) = mpsc::channel(cap);
        let (errors_tx, errors) = mpsc::channel(cap + ERROR_BUFFER_HEADROOM);

        let worker = Worker {
            registry,
            errors: errors_tx,
        };

        let mut workers = JoinSet::new();
        workers.spawn(worker.clone().create(diff.created, start_tx));
        workers.spawn(worker.clone().delete(diff.deleted, stop_tx));
        workers.spawn(worker.clone().retain(diff.retained, stable_tx));
        workers.spawn(worker.update(diff.modified, update_tx));

        Self {
            start,
            stop,
            stable,
            update,
            errors,
            done: ResolveHandle { workers },
        }
    }
}
