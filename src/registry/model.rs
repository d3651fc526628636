//! Normalised model metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Platform-specific model details, normalised across backends.
///
/// Every field is optional; each platform profile fills in what its API
/// exposes (Ollama is the richest, plain OpenAI listings the sparsest).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDetails {
    /// Parameter count label, e.g. "23.6B"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter_size: Option<String>,
    /// Quantisation label, e.g. "Q4_K_M"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantization_level: Option<String>,
    /// Model family / architecture, e.g. "llama"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub families: Option<Vec<String>>,
    /// On-disk format, e.g. "gguf"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Parent model, publisher, or owner depending on platform
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    /// Load state reported by the backend, e.g. "loaded"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_context_length: Option<u64>,
}

/// A model advertised by one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model name, never empty; nameless entries are dropped during parsing
    pub name: String,
    /// Size in bytes, when the platform reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Platform type tag, e.g. "llm", "vlm", "embeddings"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// When this model was last seen by discovery
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub details: ModelDetails,
}

impl ModelInfo {
    /// Create a model record stamped with the current discovery time.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
            model_type: None,
            description: None,
            last_seen: Utc::now(),
            details: ModelDetails::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_info_new_stamps_last_seen() {
        let before = Utc::now();
        let model = ModelInfo::new("llama3:70b");
        assert_eq!(model.name, "llama3:70b");
        assert!(model.last_seen >= before);
        assert_eq!(model.details, ModelDetails::default());
    }

    #[test]
    fn test_details_serialization_skips_empty_fields() {
        let model = ModelInfo::new("m");
        let json = serde_json::to_value(&model).unwrap();
        assert!(json.get("size").is_none());
        assert_eq!(json["details"], serde_json::json!({}));
    }
}
