//! Reconciliation pipeline primitives.
//!
//! This library turns per-cluster deployment diffs into actions an executor
//! can carry out. Key stages:
//!
//! - **Concentration**: per-cluster `DeploymentPair`s are bundled per
//!   manifest and flushed as manifest-level diffs once every configured
//!   cluster has reported (or the inputs are exhausted).
//! - **Resolution**: each diffed deployment gets its build artifact from the
//!   registry, subject to the cluster's advisory policy, and is routed to one
//!   of start / stop / stable / update.
//!
//! # Invariants
//!
//! - Every output queue is closed exactly once, after all inputs are drained
//! - A manifest bundle is flushed at most once
//! - Per-item failures are reported on the error queue and never stop sibling items
//!
//! Queues are bounded tokio channels. A requested size of 0 is served with
//! capacity 1, the smallest tokio allows.

mod concentrator;
mod deployable;
mod diff;
mod error;
mod guard;

pub use concentrator::{ConcentratedDiffSet, DiffConcentrator};
pub use deployable::{DeployableChans, ResolveHandle};
pub use diff::{DiffChans, DiffSenders};
pub use error::{GuardError, ReconcileError};
pub use guard::guard_image;

/// Extra error-queue capacity beyond the requested queue size.
pub const ERROR_BUFFER_HEADROOM: usize = 10;

/// Channel capacity for a requested queue size.
pub(crate) fn capacity(size: usize) -> usize {
    size.max(1)
}
