//! Actual-state collection from Singularity schedulers.
//!
//! A scheduler request is turned into a [`convoy_model::DeployState`] by
//! reading its live (or pending) deploy, resolving the image's labels back to
//! a source id, and matching the request to a configured cluster.

mod actual;
mod builder;
mod client;
pub mod dtos;
mod error;
mod mock;
mod request_id;
mod retry;

pub use actual::{collect_actual_state, failure_summary, ActualState, RequestFailure};
pub use builder::{
    build_deployment, build_deployment_with_policy, prefer_pending, MarkerPolicy, SingReq,
};
pub use client::{HttpSchedulerClient, SchedulerClient};
pub use error::{BuildError, RequestContext, SchedulerError};
pub use mock::MockScheduler;
pub use request_id::{make_request_id, MAX_REQUEST_ID_LEN};
pub use retry::{build_with_retry, BackoffPolicy, RetryPolicy, DEFAULT_MAX_RETRIES};
