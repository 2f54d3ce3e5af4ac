//! Singularity API client.
//!
//! Provides the calls the actual-state builder needs:
//! - Listing and refreshing requests
//! - Reading a request's deploy history
//! - Fetching one deploy by marker

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::dtos::{SingularityDeployHistory, SingularityRequestParent};
use crate::error::SchedulerError;

/// Scheduler operations used to reconstruct actual state.
#[async_trait]
pub trait SchedulerClient: Send + Sync {
    /// All requests known to the scheduler.
    async fn get_requests(&self) -> Result<Vec<SingularityRequestParent>, SchedulerError>;

    /// Current state of one request.
    async fn get_request(&self, request_id: &str)
        -> Result<SingularityRequestParent, SchedulerError>;

    /// A page of a request's deploy history, newest first.
    async fn get_deploys(
        &self,
        request_id: &str,
        page: u32,
        count: u32,
    ) -> Result<Vec<SingularityDeployHistory>, SchedulerError>;

    /// The full history record of one deploy.
    async fn get_deploy(
        &self,
        request_id: &str,
        deploy_id: &str,
    ) -> Result<SingularityDeployHistory, SchedulerError>;
}

/// Scheduler client over the Singularity REST API.
pub struct HttpSchedulerClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSchedulerClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SchedulerError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, SchedulerError> {
        debug!(url = %url, "Querying scheduler");
        let response = self.client.get(url).send().await?;

        match response.status() {
            status if status.is_success() => {
                let body = response.bytes().await?;
                Ok(serde_json::from_slice(&body)?)
            }
            StatusCode::NOT_FOUND => Err(SchedulerError::NotFound(url.to_string())),
            status => {
                let body = response.text().await.unwrap_or_default();
                error!(status = %status, body = %body, "Scheduler request failed");
                Err(SchedulerError::UnexpectedStatus {
                    status: status.as_u16(),
                    url: url.to_string(),
                    body,
                })
            }
        }
    }
}

#[async_trait]
impl SchedulerClient for HttpSchedulerClient {
    async fn get_requests(&self) -> Result<Vec<SingularityRequestParent>, SchedulerError> {
        let url = format!("{}/api/requests", self.base_url);
        let requests: Vec<SingularityRequestParent> = self.get_json(&url).await?;
        debug!(count = requests.len(), "Fetched scheduler requests");
        Ok(requests)
    }

    async fn get_request(
        &self,
        request_id: &str,
    ) -> Result<SingularityRequestParent, SchedulerError> {
        let url = format!("{}/api/requests/request/{}", self.base_url, request_id);
        self.get_json(&url).await
    }

    async fn get_deploys(
        &self,
        request_id: &str,
        page: u32,
        count: u32,
    ) -> Result<Vec<SingularityDeployHistory>, SchedulerError> {
        let url = format!(
            "{}/api/history/request/{}/deploys?page={}&count={}",
            self.base_url, request_id, page, count
        );
        self.get_json(&url).await
    }

    async fn get_deploy(
        &self,
        request_id: &str,
        deploy_id: &str,
    ) -> Result<SingularityDeployHistory, SchedulerError> {
        let url = format!(
            "{}/api/history/request/{}/deploy/{}",
            self.base_url, request_id, deploy_id
        );
        self.get_json(&url).await
    }
}
