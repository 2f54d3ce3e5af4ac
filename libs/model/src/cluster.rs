//! Cluster definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A scheduler cluster a manifest can be deployed to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    /// Nickname; filled from the table key by `Defs::new`.
    #[serde(default)]
    pub name: String,

    /// Base URL of the cluster's scheduler API.
    pub base_url: String,

    /// Advisory names this cluster accepts on build artifacts.
    #[serde(default)]
    pub allowed_advisories: Vec<String>,
}

impl Cluster {
    pub fn allows_advisory(&self, advisory: &str) -> bool {
        self.allowed_advisories.iter().any(|a| a == advisory)
    }
}

/// Cluster table keyed by nickname.
pub type Clusters = BTreeMap<String, Cluster>;

/// Global definitions shared by every manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defs {
    #[serde(default)]
    pub clusters: Clusters,
}

impl Defs {
    /// Build definitions, normalizing each cluster's name to its table key.
    pub fn new(mut clusters: Clusters) -> Self {
        for (nick, cluster) in clusters.iter_mut() {
            cluster.name = nick.clone();
        }
        Self { clusters }
    }

    /// Cluster nicknames grouped by scheduler base URL.
    pub fn by_base_url(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut out: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (nick, cluster) in &self.clusters {
            out.entry(cluster.base_url.as_str()).or_default().push(nick.as_str());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defs_normalizes_names() {
        let mut clusters = Clusters::new();
        clusters.insert(
            "left".to_string(),
            Cluster {
                base_url: "http://a".to_string(),
                ..Default::default()
            },
        );
        let defs = Defs::new(clusters);
        assert_eq!(defs.clusters["left"].name, "left");
    }

    #[test]
    fn test_by_base_url_groups_shared_schedulers() {
        let mut clusters = Clusters::new();
        for (nick, url) in [("a", "http://one"), ("b", "http://one"), ("c", "http://two")] {
            clusters.insert(
                nick.to_string(),
                Cluster {
                    base_url: url.to_string(),
                    ..Default::default()
                },
            );
        }
        let defs = Defs::new(clusters);
        let grouped = defs.by_base_url();
        assert_eq!(grouped["http://one"], vec!["a", "b"]);
        assert_eq!(grouped["http://two"], vec!["c"]);
    }
}
