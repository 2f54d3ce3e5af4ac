//! Caller-side retries for retryable build failures.

use std::time::Duration;

use convoy_model::{Clusters, DeployState};
use convoy_registry::ImageLabeller;
use rand::Rng;
use tracing::{debug, warn};

use crate::builder::{build_deployment, SingReq};
use crate::error::BuildError;

/// Default number of rebuilds after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Exponential backoff with jitter.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub base: Duration,

    /// Upper bound on any delay.
    pub max: Duration,

    /// Jitter factor (0.0 to 1.0).
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(250),
            max: Duration::from_secs(10),
            jitter: 0.25,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let delay = self.base.as_millis() as f64 * 2.0_f64.powi(attempt.min(30) as i32);
        let delay = delay.min(self.max.as_millis() as f64);

        let jitter_range = delay * self.jitter.clamp(0.0, 1.0);
        let jitter = if jitter_range > 0.0 {
            rand::rng().random_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };

        Duration::from_millis((delay + jitter).max(0.0) as u64)
    }
}

/// How hard to try a single request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: BackoffPolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Build a deploy state, rebuilding while the failure is retryable.
///
/// Before each rebuild the request parent is refreshed from the scheduler,
/// since the usual cause is the request changing between calls. A failed
/// refresh ends the attempt with that error.
pub async fn build_with_retry(
    labeller: &dyn ImageLabeller,
    clusters: &Clusters,
    mut req: SingReq,
    policy: &RetryPolicy,
) -> Result<DeployState, BuildError> {
    let mut attempt = 0;
    loop {
        let err = match build_deployment(labeller, clusters, &req).await {
            Ok(state) => return Ok(state),
            Err(err) => err,
        };

        let Some(context) = err.request_context() else {
            return Err(err);
        };
        if attempt >= policy.max_retries {
            warn!(
                request = %context,
                attempts = attempt + 1,
                error = %err,
                "Retries exhausted"
            );
            return Err(err);
        }

        let delay = policy.backoff.delay(attempt);
        debug!(
            request = %context,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Retrying build"
        );
        tokio::time::sleep(delay).await;

        let parent = req.scheduler.get_request(&context.request_id).await?;
        req.req_parent = Some(parent);
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let backoff = BackoffPolicy {
            base: Duration::from_millis(100),
            max: Duration::from_secs(1),
            jitter: 0.0,
        };

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(800));
        assert_eq!(backoff.delay(4), Duration::from_secs(1));
        assert_eq!(backoff.delay(100), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let backoff = BackoffPolicy {
            base: Duration::from_millis(1000),
            max: Duration::from_secs(10),
            jitter: 0.5,
        };

        for _ in 0..100 {
            let delay = backoff.delay(0);
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_millis(1500));
        }
    }
}
