//! Response parsing for the platform profiles.
//!
//! Each profile's listing is a top-level JSON object with a named array
//! field (`models` for Ollama, `data` for the OpenAI-shaped platforms). A
//! missing array field yields an empty list; a present-but-non-array field
//! is a parse error. Malformed single elements are logged and skipped, as
//! are elements without a name.

use super::error::ParseError;
use super::profile::Profile;
use crate::registry::{ModelDetails, ModelInfo};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

/// Parse a profile's discovery response body into model records.
pub fn parse_response(profile: Profile, body: &[u8]) -> Result<Vec<ModelInfo>, ParseError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ParseError::new(profile.as_str(), body, e.to_string()))?;

    let object = value.as_object().ok_or_else(|| {
        ParseError::new(profile.as_str(), body, "expected a top-level JSON object")
    })?;

    let items = match object.get(profile.array_field()) {
        None => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ParseError::new(
                profile.as_str(),
                body,
                format!("field {:?} is not an array", profile.array_field()),
            ))
        }
    };

    let now = Utc::now();
    let mut models = Vec::with_capacity(items.len());
    for item in items {
        match parse_element(profile, item, now) {
            Ok(Some(model)) => models.push(model),
            Ok(None) => {} // nameless entry, dropped
            Err(error) => {
                tracing::warn!(
                    profile = %profile,
                    error = %error,
                    "Skipping malformed model entry"
                );
            }
        }
    }

    Ok(models)
}

fn parse_element(
    profile: Profile,
    item: &Value,
    now: DateTime<Utc>,
) -> Result<Option<ModelInfo>, serde_json::Error> {
    match profile {
        Profile::Ollama => parse_ollama_element(item, now),
        Profile::LmStudio => parse_lmstudio_element(item, now),
        Profile::Vllm => parse_openai_element(item, now, true),
        Profile::OpenaiCompatible => parse_openai_element(item, now, false),
    }
}

/// Ollama `/api/tags` element.
#[derive(Deserialize)]
struct OllamaEntry {
    #[serde(default)]
    name: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    digest: Option<String>,
    #[serde(default)]
    modified_at: Option<String>,
    #[serde(default)]
    details: Option<OllamaEntryDetails>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct OllamaEntryDetails {
    parameter_size: Option<String>,
    quantization_level: Option<String>,
    family: Option<String>,
    families: Option<Vec<String>>,
    format: Option<String>,
    parent_model: Option<String>,
}

fn parse_ollama_element(
    item: &Value,
    now: DateTime<Utc>,
) -> Result<Option<ModelInfo>, serde_json::Error> {
    let entry: OllamaEntry = serde_json::from_value(item.clone())?;
    if entry.name.is_empty() {
        return Ok(None);
    }

    let entry_details = entry.details.unwrap_or_default();
    let details = ModelDetails {
        parameter_size: entry_details.parameter_size,
        quantization_level: entry_details.quantization_level,
        family: entry_details.family,
        families: entry_details.families,
        format: entry_details.format,
        parent_model: entry_details.parent_model.filter(|p| !p.is_empty()),
        digest: entry.digest,
        modified_at: entry.modified_at.as_deref().and_then(parse_rfc3339),
        ..Default::default()
    };

    Ok(Some(ModelInfo {
        name: entry.name,
        size: entry.size,
        model_type: None,
        description: None,
        last_seen: now,
        details,
    }))
}

/// LM Studio `/api/v0/models` element.
#[derive(Deserialize)]
struct LmStudioEntry {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default)]
    model_type: Option<String>,
    #[serde(default)]
    publisher: Option<String>,
    #[serde(default)]
    arch: Option<String>,
    #[serde(default)]
    compatibility_type: Option<String>,
    #[serde(default)]
    quantization: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    max_context_length: Option<u64>,
}

fn parse_lmstudio_element(
    item: &Value,
    now: DateTime<Utc>,
) -> Result<Option<ModelInfo>, serde_json::Error> {
    let entry: LmStudioEntry = serde_json::from_value(item.clone())?;
    if entry.id.is_empty() {
        return Ok(None);
    }

    let details = ModelDetails {
        family: entry.arch,
        quantization_level: entry.quantization,
        format: entry.compatibility_type,
        parent_model: entry.publisher,
        state: entry.state,
        max_context_length: entry.max_context_length,
        ..Default::default()
    };

    Ok(Some(ModelInfo {
        name: entry.id,
        size: None,
        model_type: entry.model_type,
        description: None,
        last_seen: now,
        details,
    }))
}

/// OpenAI-shaped `/v1/models` element; vLLM adds `max_model_len` and a
/// meaningful `owned_by`.
#[derive(Deserialize)]
struct OpenAiEntry {
    #[serde(default)]
    id: String,
    #[serde(default)]
    created: Option<i64>,
    #[serde(default)]
    owned_by: Option<String>,
    #[serde(default)]
    max_model_len: Option<u64>,
}

fn parse_openai_element(
    item: &Value,
    now: DateTime<Utc>,
    vllm: bool,
) -> Result<Option<ModelInfo>, serde_json::Error> {
    let entry: OpenAiEntry = serde_json::from_value(item.clone())?;
    if entry.id.is_empty() {
        return Ok(None);
    }

    let mut details = ModelDetails {
        modified_at: entry
            .created
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        ..Default::default()
    };
    if vllm {
        details.max_context_length = entry.max_model_len;
        details.parent_model = entry.owned_by.filter(|o| !o.is_empty());
    }

    Ok(Some(ModelInfo {
        name: entry.id,
        size: None,
        model_type: None,
        description: None,
        last_seen: now,
        details,
    }))
}

fn parse_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
