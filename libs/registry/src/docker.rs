//! Image label lookup against a Docker registry.
//!
//! Labels live in the image config blob, so a lookup is two requests:
//! resolve the manifest for the reference, then fetch and verify the config
//! blob it points at.
//!
//! Reference: https://github.com/opencontainers/distribution-spec

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::LabelError;
use crate::labels::ImageLabeller;

/// Registry host implied by image references that name none.
pub const DOCKER_HUB: &str = "registry-1.docker.io";

const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.manifest.v1+json, application/vnd.docker.distribution.manifest.v2+json";

/// Configuration for the Docker label client.
#[derive(Debug, Clone)]
pub struct DockerConfig {
    /// Base URL used for references that resolve to Docker Hub.
    pub default_registry_url: String,
    /// Optional bearer token.
    pub auth_token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            default_registry_url: format!("https://{DOCKER_HUB}"),
            auth_token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// A parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub registry: String,
    pub repo: String,
    /// Tag or digest.
    pub reference: String,
}

/// Parse an image reference into registry, repository and tag/digest.
pub fn parse_image_ref(image_ref: &str) -> Result<ImageRef, LabelError> {
    if image_ref.trim().is_empty() {
        return Err(LabelError::InvalidReference(image_ref.to_string()));
    }

    let (name_part, reference) = if let Some((name, digest)) = image_ref.rsplit_once('@') {
        (name, digest.to_string())
    } else if let Some((name, tag)) = image_ref.rsplit_once(':') {
        // A colon before the last slash is a registry port, not a tag
        if tag.contains('/') {
            (image_ref, "latest".to_string())
        } else {
            (name, tag.to_string())
        }
    } else {
        (image_ref, "latest".to_string())
    };

    let (registry, repo) = match name_part.split_once('/') {
        None => (DOCKER_HUB.to_string(), format!("library/{name_part}")),
        Some((host, rest))
            if host.contains('.') || host.contains(':') || host == "localhost" =>
        {
            (host.to_string(), rest.to_string())
        }
        Some(_) => (DOCKER_HUB.to_string(), name_part.to_string()),
    };

    if repo.is_empty() || reference.is_empty() {
        return Err(LabelError::InvalidReference(image_ref.to_string()));
    }

    Ok(ImageRef {
        registry,
        repo,
        reference,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    config: Descriptor,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Descriptor {
    digest: String,
}

#[derive(Debug, Deserialize)]
struct ImageConfig {
    #[serde(default)]
    config: Option<ContainerConfig>,
}

#[derive(Debug, Deserialize)]
struct ContainerConfig {
    #[serde(rename = "Labels", default)]
    labels: Option<HashMap<String, String>>,
}

/// Label lookup over the registry HTTP API.
pub struct DockerLabeller {
    config: DockerConfig,
    client: Client,
}

impl DockerLabeller {
    pub fn new(config: DockerConfig) -> Result<Self, LabelError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn base_url(&self, registry: &str) -> String {
        if registry == DOCKER_HUB {
            self.config.default_registry_url.trim_end_matches('/').to_string()
        } else if registry.starts_with("localhost") || registry.starts_with("127.0.0.1") {
            format!("http://{registry}")
        } else {
            format!("https://{registry}")
        }
    }

    async fn get(&self, url: &str, accept: Option<&str>) -> Result<Vec<u8>, LabelError> {
        let mut request = self.client.get(url);
        if let Some(accept) = accept {
            request = request.header("Accept", accept);
        }
        if let Some(token) = &self.config.auth_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::OK => Ok(response.bytes().await?.to_vec()),
            StatusCode::NOT_FOUND => Err(LabelError::NotFound(url.to_string())),
            StatusCode::UNAUTHORIZED => Err(LabelError::AuthRequired),
            status => Err(LabelError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            }),
        }
    }
}

#[async_trait]
impl ImageLabeller for DockerLabeller {
    async fn image_labels(&self, image_ref: &str) -> Result<HashMap<String, String>, LabelError> {
        let image = parse_image_ref(image_ref)?;
        let base = self.base_url(&image.registry);

        let manifest_url = format!("{}/v2/{}/manifests/{}", base, image.repo, image.reference);
        debug!(url = %manifest_url, "Fetching image manifest");
        let body = self.get(&manifest_url, Some(MANIFEST_ACCEPT)).await?;
        let manifest: Manifest = serde_json::from_slice(&body)?;

        let blob_url = format!("{}/v2/{}/blobs/{}", base, image.repo, manifest.config.digest);
        debug!(url = %blob_url, "Fetching image config");
        let body = self.get(&blob_url, None).await?;

        let computed = format!("sha256:{}", hex::encode(Sha256::digest(&body)));
        if computed != manifest.config.digest {
            return Err(LabelError::DigestMismatch {
                expected: manifest.config.digest,
                actual: computed,
            });
        }

        let config: ImageConfig = serde_json::from_slice(&body)?;
        Ok(config
            .config
            .and_then(|c| c.labels)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_image_ref_simple() {
        let image = parse_image_ref("alpine:3.20").unwrap();
        assert_eq!(image.registry, DOCKER_HUB);
        assert_eq!(image.repo, "library/alpine");
        assert_eq!(image.reference, "3.20");
    }

    #[test]
    fn test_parse_image_ref_no_tag() {
        let image = parse_image_ref("acme/shop").unwrap();
        assert_eq!(image.registry, DOCKER_HUB);
        assert_eq!(image.repo, "acme/shop");
        assert_eq!(image.reference, "latest");
    }

    #[test]
    fn test_parse_image_ref_registry_with_port() {
        let image = parse_image_ref("docker.example.com:5000/acme/shop").unwrap();
        assert_eq!(image.registry, "docker.example.com:5000");
        assert_eq!(image.repo, "acme/shop");
        assert_eq!(image.reference, "latest");
    }

    #[test]
    fn test_parse_image_ref_digest() {
        let image = parse_image_ref("docker.example.com/acme/shop@sha256:abc").unwrap();
        assert_eq!(image.registry, "docker.example.com");
        assert_eq!(image.reference, "sha256:abc");
    }

    #[test]
    fn test_parse_image_ref_empty() {
        assert!(matches!(
            parse_image_ref(""),
            Err(LabelError::InvalidReference(_))
        ));
    }
}
