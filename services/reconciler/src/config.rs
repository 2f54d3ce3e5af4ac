//! Reconciler configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use convoy_model::{Clusters, Defs};
use convoy_registry::DOCKER_HUB;
use serde::Deserialize;

/// Reconciler configuration (env-driven).
#[derive(Debug, Clone)]
pub struct Config {
    /// TOML file declaring the cluster table.
    pub clusters_file: PathBuf,

    /// Registry used for image refs that name none.
    pub docker_registry_url: String,

    /// Interval between actual-state passes.
    pub poll_interval: Duration,

    /// Per-request timeout for scheduler and registry calls.
    pub http_timeout: Duration,

    /// Rebuilds allowed per request after a retryable failure.
    pub max_retries: u32,

    /// Run a single pass and exit.
    pub once: bool,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let clusters_file = var("CONVOY_CLUSTERS_FILE")
            .map(PathBuf::from)
            .context("Missing cluster table. Set CONVOY_CLUSTERS_FILE.")?;

        let docker_registry_url = var("CONVOY_DOCKER_REGISTRY_URL")
            .unwrap_or_else(|| format!("https://{DOCKER_HUB}"));

        let poll_interval_secs: u64 = var("CONVOY_POLL_INTERVAL_SECS")
            .map(|v| v.parse())
            .transpose()
            .context("CONVOY_POLL_INTERVAL_SECS must be an integer (seconds).")?
            .unwrap_or(30);
        let poll_interval = Duration::from_secs(poll_interval_secs.max(1));

        let http_timeout_secs: u64 = var("CONVOY_HTTP_TIMEOUT_SECS")
            .map(|v| v.parse())
            .transpose()
            .context("CONVOY_HTTP_TIMEOUT_SECS must be an integer (seconds).")?
            .unwrap_or(30);
        let http_timeout = Duration::from_secs(http_timeout_secs.max(1));

        let max_retries: u32 = var("CONVOY_MAX_RETRIES")
            .map(|v| v.parse())
            .transpose()
            .context("CONVOY_MAX_RETRIES must be a non-negative integer.")?
            .unwrap_or(convoy_singularity::DEFAULT_MAX_RETRIES);

        let once = var("CONVOY_ONCE")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        let log_level = var("CONVOY_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            clusters_file,
            docker_registry_url,
            poll_interval,
            http_timeout,
            max_retries,
            once,
            log_level,
        })
    }

    /// Read the cluster table named by `clusters_file`.
    pub fn load_defs(&self) -> Result<Defs> {
        load_defs(&self.clusters_file)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClustersFile {
    #[serde(default)]
    clusters: Clusters,
}

/// Parse a cluster table file.
pub fn load_defs(path: &Path) -> Result<Defs> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read cluster table {}", path.display()))?;
    parse_defs(&content).with_context(|| format!("Invalid cluster table {}", path.display()))
}

/// Parse cluster table TOML.
pub fn parse_defs(content: &str) -> Result<Defs> {
    let file: ClustersFile = toml::from_str(content).context("Failed to parse TOML")?;
    if file.clusters.is_empty() {
        anyhow::bail!("no clusters declared");
    }
    for (nick, cluster) in &file.clusters {
        if cluster.base_url.trim().is_empty() {
            anyhow::bail!("cluster {nick:?} has an empty base_url");
        }
    }
    Ok(Defs::new(file.clusters))
}
