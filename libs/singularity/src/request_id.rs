//! Scheduler request id construction.

use convoy_model::DeploymentId;
use sha2::{Digest, Sha256};

/// Longest request id the scheduler accepts.
pub const MAX_REQUEST_ID_LEN: usize = 100;

/// Hex characters of the hash appended to truncated ids.
const DISCRIMINATOR_LEN: usize = 8;

/// The request id a deployment is given at its scheduler.
///
/// Repo, offset, flavor and cluster are joined with `-`; every character
/// outside `[A-Za-z0-9_-]` becomes `_`. Ids over [`MAX_REQUEST_ID_LEN`] are
/// truncated and suffixed with a hash of the untruncated form so distinct
/// deployments stay distinct.
pub fn make_request_id(id: &DeploymentId) -> String {
    let raw = format!(
        "{}-{}-{}-{}",
        id.manifest_id.source.repo, id.manifest_id.source.dir, id.manifest_id.flavor, id.cluster
    );

    let sanitized: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.len() <= MAX_REQUEST_ID_LEN {
        return sanitized;
    }

    let digest = hex::encode(Sha256::digest(raw.as_bytes()));
    let keep = MAX_REQUEST_ID_LEN - DISCRIMINATOR_LEN - 1;
    format!("{}-{}", &sanitized[..keep], &digest[..DISCRIMINATOR_LEN])
}
