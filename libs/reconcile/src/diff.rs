//! Per-cluster diff queues.

use convoy_model::{DeploymentPair, PairKind};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendError;

use crate::capacity;

/// Receiving ends of the four per-cluster diff queues.
#[derive(Debug)]
pub struct DiffChans {
    pub created: mpsc::Receiver<DeploymentPair>,
    pub deleted: mpsc::Receiver<DeploymentPair>,
    pub retained: mpsc::Receiver<DeploymentPair>,
    pub modified: mpsc::Receiver<DeploymentPair>,
}

/// Sending ends of the four per-cluster diff queues.
///
/// Dropping the senders is how a comparator signals it is done.
#[derive(Debug, Clone)]
pub struct DiffSenders {
    pub created: mpsc::Sender<DeploymentPair>,
    pub deleted: mpsc::Sender<DeploymentPair>,
    pub retained: mpsc::Sender<DeploymentPair>,
    pub modified: mpsc::Sender<DeploymentPair>,
}

impl DiffChans {
    /// Create the four queues, each bounded to `size`.
    pub fn new(size: usize) -> (DiffSenders, DiffChans) {
        let cap = capacity(size);
        let (created_tx, created) = mpsc::channel(cap);
        let (deleted_tx, deleted) = mpsc::channel(cap);
        let (retained_tx, retained) = mpsc::channel(cap);
        let (modified_tx, modified) = mpsc::channel(cap);

        (
            DiffSenders {
                created: created_tx,
                deleted: deleted_tx,
                retained: retained_tx,
                modified: modified_tx,
            },
            DiffChans {
                created,
                deleted,
                retained,
                modified,
            },
        )
    }
}

impl DiffSenders {
    /// Route a pair to the queue matching its kind.
    pub async fn send(&self, pair: DeploymentPair) -> Result<(), SendError<DeploymentPair>> {
        match pair.kind() {
            PairKind::Created => self.created.send(pair).await,
            PairKind::Deleted => self.deleted.send(pair).await,
            PairKind::Retained => self.retained.send(pair).await,
            PairKind::Modified => self.modified.send(pair).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoy_model::{DeployConfig, DeployStatus, Deployment};

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

    #[tokio::test]
    async fn test_send_routes_by_kind() {
        let (tx, mut rx) = DiffChans::new(4);

        tx.send(DeploymentPair::created(deployment(1))).await.unwrap();
        tx.send(DeploymentPair::deleted(deployment(1), DeployStatus::Active))
            .await
            .unwrap();
        tx.send(DeploymentPair::both(deployment(1), deployment(1), DeployStatus::Active))
            .await
            .unwrap();
        tx.send(DeploymentPair::both(deployment(1), deployment(2), DeployStatus::Active))
            .await
            .unwrap();
        drop(tx);

        assert_eq!(rx.created.recv().await.unwrap().kind(), PairKind::Created);
        assert_eq!(rx.deleted.recv().await.unwrap().kind(), PairKind::Deleted);
        assert_eq!(rx.retained.recv().await.unwrap().kind(), PairKind::Retained);
        assert_eq!(rx.modified.recv().await.unwrap().kind(), PairKind::Modified);
        assert!(rx.created.recv().await.is_none());
    }

    #[test]
    fn test_zero_size_still_has_capacity() {
        let (tx, _rx) = DiffChans::new(0);
        assert_eq!(tx.created.max_capacity(), 1);
    }
}
