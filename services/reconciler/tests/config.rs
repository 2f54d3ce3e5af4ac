//! Configuration loading tests.

use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use convoy_reconciler::config::{load_defs, parse_defs, Config};
use rstest::rstest;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| vars.get(key).cloned()
}

#[test]
fn test_defaults() {
    let config = Config::from_lookup(lookup(&[("CONVOY_CLUSTERS_FILE", "/etc/convoy/clusters.toml")]))
        .unwrap();

    assert_eq!(config.clusters_file.to_str(), Some("/etc/convoy/clusters.toml"));
    assert_eq!(config.docker_registry_url, "https://registry-1.docker.io");
    assert_eq!(config.poll_interval, Duration::from_secs(30));
    assert_eq!(config.http_timeout, Duration::from_secs(30));
    assert_eq!(config.max_retries, 3);
    assert!(!config.once);
    assert_eq!(config.log_level, "info");
}

#[test]
fn test_overrides() {
    let config = Config::from_lookup(lookup(&[
        ("CONVOY_CLUSTERS_FILE", "clusters.toml"),
        ("CONVOY_DOCKER_REGISTRY_URL", "http://localhost:5000"),
        ("CONVOY_POLL_INTERVAL_SECS", "0"),
        ("CONVOY_HTTP_TIMEOUT_SECS", "5"),
        ("CONVOY_MAX_RETRIES", "0"),
        ("CONVOY_ONCE", "TRUE"),
        ("CONVOY_LOG_LEVEL", "debug"),
    ]))
    .unwrap();

    assert_eq!(config.docker_registry_url, "http://localhost:5000");
    assert_eq!(config.poll_interval, Duration::from_secs(1));
    assert_eq!(config.http_timeout, Duration::from_secs(5));
    assert_eq!(config.max_retries, 0);
    assert!(config.once);
    assert_eq!(config.log_level, "debug");
}

#[test]
fn test_missing_clusters_file() {
    let err = Config::from_lookup(lookup(&[])).unwrap_err();
    assert!(err.to_string().contains("CONVOY_CLUSTERS_FILE"));
}

#[rstest]
#[case("CONVOY_POLL_INTERVAL_SECS")]
#[case("CONVOY_HTTP_TIMEOUT_SECS")]
#[case("CONVOY_MAX_RETRIES")]
fn test_invalid_integer(#[case] var: &str) {
    let err = Config::from_lookup(lookup(&[
        ("CONVOY_CLUSTERS_FILE", "clusters.toml"),
        (var, "soon"),
    ]))
    .unwrap_err();
    assert!(err.to_string().contains(var));
}

#[test]
fn test_parse_defs() {
    let defs = parse_defs(
        r#"
        [clusters.left]
        base_url = "http://sing-a.example.com"
        allowed_advisories = ["ephemeral_tag"]

        [clusters.right]
        base_url = "http://sing-b.example.com"
        "#,
    )
    .unwrap();

    assert_eq!(defs.clusters.len(), 2);
    let left = &defs.clusters["left"];
    assert_eq!(left.name, "left");
    assert!(left.allows_advisory("ephemeral_tag"));
    assert!(defs.clusters["right"].allowed_advisories.is_empty());
}

#[rstest]
#[case::empty("")]
#[case::blank_url("[clusters.left]\nbase_url = \"\"\n")]
#[case::missing_url("[clusters.left]\nallowed_advisories = []\n")]
#[case::unknown_table("[scheduler]\nurl = \"x\"\n")]
fn test_parse_defs_rejects(#[case] content: &str) {
    assert!(parse_defs(content).is_err());
}

#[test]
fn test_load_defs_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[clusters.left]\nbase_url = \"http://sing-a\"").unwrap();

    let defs = load_defs(file.path()).unwrap();
    assert_eq!(defs.clusters["left"].base_url, "http://sing-a");
}

#[test]
fn test_load_defs_missing_file() {
    let err = load_defs(std::path::Path::new("/nonexistent/clusters.toml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read cluster table"));
}
