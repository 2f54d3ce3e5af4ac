//! # convoy-registry
//!
//! Capabilities the reconciliation pipeline consumes from image registries:
//!
//! - [`Registry`]: source identity → build artifact (with advisory qualities)
//! - [`ImageLabeller`]: image reference → image labels
//!
//! Implementations must be safe to call concurrently; every resolver worker
//! shares one instance.
//!
//! ## Modules
//!
//! - `artifacts`: the `Registry` trait and an in-memory implementation
//! - `labels`: the `ImageLabeller` trait and a static implementation
//! - `docker`: HTTP label lookup against a Docker registry

mod artifacts;
mod docker;
mod error;
mod labels;

pub use artifacts::{MemoryRegistry, Registry};
pub use docker::{parse_image_ref, DockerConfig, DockerLabeller, ImageRef, DOCKER_HUB};
pub use error::{LabelError, RegistryError};
pub use labels::{ImageLabeller, StaticLabeller};
