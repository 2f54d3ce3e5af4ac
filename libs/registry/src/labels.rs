//! Image label lookup capability.

use std::collections::HashMap;

use async_trait::async_trait;
use convoy_model::SourceId;

use crate::error::LabelError;

/// Looks up the labels attached to an image.
#[async_trait]
pub trait ImageLabeller: Send + Sync {
    async fn image_labels(&self, image_ref: &str) -> Result<HashMap<String, String>, LabelError>;
}

/// Fixed image → labels table for testing and development.
#[derive(Debug, Clone, Default)]
pub struct StaticLabeller {
    images: HashMap<String, HashMap<String, String>>,
}

impl StaticLabeller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register raw labels for an image.
    pub fn with_labels(mut self, image_ref: &str, labels: HashMap<String, String>) -> Self {
        self.images.insert(image_ref.to_string(), labels);
        self
    }

    /// Register an image built from `sid`.
    pub fn with_source(self, image_ref: &str, sid: &SourceId) -> Self {
        self.with_labels(image_ref, sid.to_labels())
    }
}

#[async_trait]
impl ImageLabeller for StaticLabeller {
    async fn image_labels(&self, image_ref: &str) -> Result<HashMap<String, String>, LabelError> {
        self.images
            .get(image_ref)
            .cloned()
            .ok_or_else(|| LabelError::NotFound(image_ref.to_string()))
    }
}
