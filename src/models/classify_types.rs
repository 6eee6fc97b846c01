use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Category substituted when an image cannot be fetched, decoded or classified.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

#[derive(Debug, Serialize, Clone)]
pub struct ModelStatus {
    pub downloaded: bool,
    pub model_path: PathBuf,
    pub config_path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub url: String,
    pub category: String,
}

impl ClassificationResult {
    pub fn unknown(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            category: UNKNOWN_CATEGORY.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Prediction {
    pub class_name: String,
    pub confidence: f32,
}
