//! Concentration of per-cluster deployment diffs into per-manifest diffs.
//!
//! Each manifest gets a bundle that accumulates the prior and post
//! deployments contributed by every cluster. A bundle is flushed as soon as
//! every configured cluster has contributed; bundles still open once all four
//! input queues close are flushed anyway, since a manifest may exist in fewer
//! clusters than are configured.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use convoy_model::{
    Defs, Deployment, DeploymentPair, Deployments, Manifest, ManifestId, ManifestPair, Manifests,
};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::diff::DiffChans;
use crate::error::ReconcileError;
use crate::{capacity, ERROR_BUFFER_HEADROOM};

/// Per-manifest diff queues fed by a running concentration.
#[derive(Debug)]
pub struct DiffConcentrator {
    pub created: mpsc::Receiver<Manifest>,
    pub deleted: mpsc::Receiver<Manifest>,
    pub retained: mpsc::Receiver<Manifest>,
    pub modified: mpsc::Receiver<ManifestPair>,
    pub errors: mpsc::Receiver<ReconcileError>,
}

/// Fully drained output of a concentration.
#[derive(Debug, Default)]
pub struct ConcentratedDiffSet {
    pub new: Manifests,
    pub gone: Manifests,
    pub same: Manifests,
    pub changed: Vec<ManifestPair>,
}

/// Sending side of a concentration; dropping it closes every output queue.
struct Outputs {
    defs: Arc<Defs>,
    created: mpsc::Sender<Manifest>,
    deleted: mpsc::Sender<Manifest>,
    retained: mpsc::Sender<Manifest>,
    modified: mpsc::Sender<ManifestPair>,
    errors: mpsc::Sender<ReconcileError>,
}

impl DiffChans {
    /// Start concentrating these per-cluster diffs into manifest diffs.
    ///
    /// Must be called within a tokio runtime.
    pub fn concentrate(self, defs: Arc<Defs>, size: usize) -> DiffConcentrator {
        let (outputs, concentrator) = DiffConcentrator::channels(defs, size);
        tokio::spawn(concentrate(self, outputs));
        concentrator
    }
}

impl DiffConcentrator {
    fn channels(defs: Arc<Defs>, size: usize) -> (Outputs, DiffConcentrator) {
        let cap = capacity(size);
        let (created_tx, created) = mpsc::channel(cap);
        let (deleted_tx, deleted) = mpsc::channel(cap);
        let (retained_tx, retained) = mpsc::channel(cap);
        let (modified_tx, modified) = mpsc::channel(cap);
        let (errors_tx, errors) = mpsc::channel(cap + ERROR_BUFFER_HEADROOM);

        (
            Outputs {
                defs,
                created: created_tx,
                deleted: deleted_tx,
                retained: retained_tx,
                modified: modified_tx,
                errors: errors_tx,
            },
            DiffConcentrator {
                created,
                deleted,
                retained,
                modified,
                errors,
            },
        )
    }

    /// Drain every output queue, returning the first reported error if any.
    pub async fn collect(mut self) -> Result<ConcentratedDiffSet, ReconcileError> {
        let mut set = ConcentratedDiffSet::default();
        let mut first_error = None;

        loop {
            tokio::select! {
                Some(m) = self.created.recv() => set.new.add(m),
                Some(m) = self.deleted.recv() => set.gone.add(m),
                Some(m) = self.retained.recv() => set.same.add(m),
                Some(mp) = self.modified.recv() => set.changed.push(mp),
                Some(err) = self.errors.recv() => {
                    first_error.get_or_insert(err);
                }
                else => break,
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(set),
        }
    }
}

/// In-progress accumulation of one manifest's deployments across clusters.
#[derive(Debug, Default)]
pub(crate) struct DeploymentBundle {
    consumed: bool,
    before: Deployments,
    after: Deployments,
}

impl DeploymentBundle {
    pub(crate) fn add(
        &mut self,
        mid: &ManifestId,
        prior: Option<Deployment>,
        post: Option<Deployment>,
    ) -> Result<(), ReconcileError> {
        match (&prior, &post) {
            (None, Some(post)) => debug!(deployment_id = %post.id(), "Added deployment"),
            (Some(prior), None) => debug!(deployment_id = %prior.id(), "Depleted deployment"),
            (Some(prior), Some(post)) => {
                let (different, diffs) = post.diff(prior);
                if different {
                    debug!(
                        deployment_id = %prior.id(),
                        diffs = ?diffs,
                        "Adding modification to deployment bundle"
                    );
                }
            }
            (None, None) => {}
        }

        if self.consumed {
            return Err(ReconcileError::AddToConsumedBundle(mid.clone()));
        }

        let cluster = match (&prior, &post) {
            (Some(prior), Some(post)) if prior.cluster_name != post.cluster_name => {
                return Err(ReconcileError::ClusterMismatch {
                    prior: prior.cluster_name.clone(),
                    post: post.cluster_name.clone(),
                });
            }
            (Some(d), _) | (None, Some(d)) => d.cluster_name.clone(),
            (None, None) => String::new(),
        };
        if cluster.is_empty() {
            return Err(ReconcileError::MissingClusterName(mid.clone()));
        }

        if let Some(prior) = prior {
            insert(&mut self.before, prior, &cluster, "prior")?;
        }
        if let Some(post) = post {
            insert(&mut self.after, post, &cluster, "post")?;
        }
        Ok(())
    }

    /// Clusters that have contributed to either side.
    pub(crate) fn clusters(&self) -> BTreeSet<&str> {
        let mut clusters = self.before.cluster_names();
        clusters.extend(self.after.cluster_names());
        clusters
    }

    pub(crate) fn is_consumed(&self) -> bool {
        self.consumed
    }

    /// Fold the bundle into a manifest pair. A bundle can be flushed once.
    pub(crate) fn manifest_pair(
        &mut self,
        mid: &ManifestId,
        defs: &Defs,
    ) -> Result<ManifestPair, ReconcileError> {
        if self.consumed {
            return Err(ReconcileError::BundleConsumed(mid.clone()));
        }
        self.consumed = true;

        let prior = self.before.manifests(defs)?.only()?;
        let post = self.after.manifests(defs)?.only()?;

        Ok(ManifestPair {
            id: mid.clone(),
            prior,
            post,
        })
    }
}

fn insert(
    side: &mut Deployments,
    deployment: Deployment,
    cluster: &str,
    side_name: &'static str,
) -> Result<(), ReconcileError> {
    let incoming = deployment.to_string();
    side.add(deployment).map_err(|existing| ReconcileError::Collision {
        cluster: cluster.to_string(),
        side: side_name,
        existing: existing.to_string(),
        incoming,
    })
}

impl Outputs {
    async fn report(&self, err: ReconcileError) {
        warn!(error = %err, "Diff concentration error");
        if self.errors.send(err).await.is_err() {
            debug!("Error receiver dropped");
        }
    }

    async fn add_pair(
        &self,
        bundles: &mut BTreeMap<ManifestId, DeploymentBundle>,
        mid: ManifestId,
        pair: DeploymentPair,
    ) {
        let bundle = bundles.entry(mid.clone()).or_default();
        if let Err(err) = bundle.add(&mid, pair.prior, pair.post) {
            self.report(err).await;
            return;
        }

        let have = bundle.clusters().len();
        let want = self.defs.clusters.len();
        debug!(manifest_id = %mid, have, want, "Bundle contribution added");
        if have == want {
            self.resolve(&mid, bundle).await;
        }
    }

    async fn resolve(&self, mid: &ManifestId, bundle: &mut DeploymentBundle) {
        let result = match bundle.manifest_pair(mid, &self.defs) {
            Ok(mp) => self.dispatch(mp).await,
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            self.report(err).await;
        }
    }

    async fn dispatch(&self, mp: ManifestPair) -> Result<(), ReconcileError> {
        trace!(manifest_id = %mp.id, "Dispatching manifest pair");
        let delivered = match (mp.prior, mp.post) {
            (None, None) => return Err(ReconcileError::BlankPair("manifest")),
            (None, Some(post)) => self.created.send(post).await.is_ok(),
            (Some(prior), None) => self.deleted.send(prior).await.is_ok(),
            (Some(prior), Some(post)) if prior == post => self.retained.send(post).await.is_ok(),
            (prior, post) => self
                .modified
                .send(ManifestPair {
                    id: mp.id,
                    prior,
                    post,
                })
                .await
                .is_ok(),
        };
        if !delivered {
            debug!("Manifest receiver dropped");
        }
        Ok(())
    }
}

async fn next_pair(rx: &mut Option<mpsc::Receiver<DeploymentPair>>) -> Option<DeploymentPair> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Key a pair by the manifest of the side its queue guarantees.
fn keyed(
    pair: Option<&Deployment>,
    queue: &'static str,
) -> Result<ManifestId, ReconcileError> {
    pair.map(Deployment::manifest_id)
        .ok_or(ReconcileError::BlankPair(queue))
}

async fn concentrate(diff: DiffChans, out: Outputs) {
    let mut created = Some(diff.created);
    let mut deleted = Some(diff.deleted);
    let mut retained = Some(diff.retained);
    let mut modified = Some(diff.modified);
    let mut bundles: BTreeMap<ManifestId, DeploymentBundle> = BTreeMap::new();

    loop {
        if created.is_none() && deleted.is_none() && retained.is_none() && modified.is_none() {
            break;
        }

        let (pair, key) = tokio::select! {
            pair = next_pair(&mut created), if created.is_some() => match pair {
                Some(p) => {
                    let key = keyed(p.post.as_ref(), "created");
                    (p, key)
                }
                None => {
                    created = None;
                    continue;
                }
            },
            pair = next_pair(&mut deleted), if deleted.is_some() => match pair {
                Some(p) => {
                    let key = keyed(p.prior.as_ref(), "deleted");
                    (p, key)
                }
                None => {
                    deleted = None;
                    continue;
                }
            },
            pair = next_pair(&mut retained), if retained.is_some() => match pair {
                Some(p) => {
                    let key = keyed(p.post.as_ref(), "retained");
                    (p, key)
                }
                None => {
                    retained = None;
                    continue;
                }
            },
            pair = next_pair(&mut modified), if modified.is_some() => match pair {
                Some(p) => {
                    trace!(deployment_id = ?p.id(), "Concentrating modification");
                    let key = keyed(p.prior.as_ref(), "modified");
                    (p, key)
                }
                None => {
                    modified = None;
                    continue;
                }
            },
        };

        match key {
            Ok(mid) => out.add_pair(&mut bundles, mid, pair).await,
            Err(err) => out.report(err).await,
        }
    }

    for (mid, bundle) in bundles.iter_mut() {
        if !bundle.is_consumed() {
            debug!(
                manifest_id = %mid,
                clusters = bundle.clusters().len(),
                "Flushing bundle with partial cluster coverage"
            );
            out.resolve(mid, bundle).await;
        }
    }
    // `out` drops here, closing each output queue exactly once.
}
