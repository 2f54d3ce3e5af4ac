//! In-memory scheduler for tests and dry runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::client::SchedulerClient;
use crate::dtos::{SingularityDeployHistory, SingularityRequestParent};
use crate::error::SchedulerError;

/// Mock scheduler holding requests and deploy histories in memory.
#[derive(Default)]
pub struct MockScheduler {
    requests: RwLock<BTreeMap<String, SingularityRequestParent>>,
    /// Newest first, per request id.
    histories: RwLock<HashMap<String, Vec<SingularityDeployHistory>>>,
    deploys: RwLock<HashMap<(String, String), SingularityDeployHistory>>,
    /// Remaining injected `get_deploys` failures, per request id.
    failures: RwLock<HashMap<String, u32>>,
    calls: AtomicU64,
}

impl MockScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request, keyed by its id.
    pub async fn add_request(&self, parent: SingularityRequestParent) {
        let id = parent.request_id().unwrap_or_default().to_string();
        self.requests.write().await.insert(id, parent);
    }

    /// Record a deploy. It becomes the newest history entry of its request
    /// and is fetchable by its marker.
    pub async fn add_deploy(&self, record: SingularityDeployHistory) {
        let (request_id, deploy_id) = match (&record.deploy_marker, &record.deploy) {
            (Some(m), _) => (m.request_id.clone(), m.deploy_id.clone()),
            (None, Some(d)) => (d.request_id.clone(), d.id.clone()),
            (None, None) => return,
        };

        self.histories
            .write()
            .await
            .entry(request_id.clone())
            .or_default()
            .insert(0, record.clone());
        self.deploys
            .write()
            .await
            .insert((request_id, deploy_id), record);
    }

    /// Replace the history listing of a request without touching deploy records.
    pub async fn set_history(&self, request_id: &str, history: Vec<SingularityDeployHistory>) {
        self.histories
            .write()
            .await
            .insert(request_id.to_string(), history);
    }

    /// Make the next `times` history listings for a request fail.
    pub async fn fail_deploys(&self, request_id: &str, times: u32) {
        self.failures
            .write()
            .await
            .insert(request_id.to_string(), times);
    }

    /// Number of scheduler calls served.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn count(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl SchedulerClient for MockScheduler {
    async fn get_requests(&self) -> Result<Vec<SingularityRequestParent>, SchedulerError> {
        self.count();
        Ok(self.requests.read().await.values().cloned().collect())
    }

    async fn get_request(
        &self,
        request_id: &str,
    ) -> Result<SingularityRequestParent, SchedulerError> {
        self.count();
        self.requests
            .read()
            .await
            .get(request_id)
            .cloned()
            .ok_or_else(|| SchedulerError::NotFound(request_id.to_string()))
    }

    async fn get_deploys(
        &self,
        request_id: &str,
        page: u32,
        count: u32,
    ) -> Result<Vec<SingularityDeployHistory>, SchedulerError> {
        self.count();

        if let Some(remaining) = self.failures.write().await.get_mut(request_id) {
            if *remaining > 0 {
                *remaining -= 1;
                debug!(request_id, "[MOCK] Failing deploy history listing");
                return Err(SchedulerError::UnexpectedStatus {
                    status: 503,
                    url: format!("mock://history/{request_id}"),
                    body: "injected failure".to_string(),
                });
            }
        }

        let histories = self.histories.read().await;
        let history = histories.get(request_id).map(Vec::as_slice).unwrap_or(&[]);
        let page = page.max(1) as usize;
        let count = count as usize;
        Ok(history
            .iter()
            .skip((page - 1) * count)
            .take(count)
            .cloned()
            .collect())
    }

    async fn get_deploy(
        &self,
        request_id: &str,
        deploy_id: &str,
    ) -> Result<SingularityDeployHistory, SchedulerError> {
        self.count();
        self.deploys
            .read()
            .await
            .get(&(request_id.to_string(), deploy_id.to_string()))
            .cloned()
            .ok_or_else(|| SchedulerError::NotFound(format!("{request_id}/{deploy_id}")))
    }
}
