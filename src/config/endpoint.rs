//! Endpoint declarations
//!
//! Serde shape of a single backend entry in the fleet configuration.
//! Validation and URL resolution live here; runtime state lives in
//! `repository::Endpoint`.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Platform type tag declared for an endpoint.
///
/// `Auto` (the default, also produced by an empty tag) means the discovery
/// client probes the known profiles in order until one responds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlatformKind {
    /// Ollama backend (<https://ollama.ai>)
    Ollama,
    /// LM Studio backend (<https://lmstudio.ai>)
    LmStudio,
    /// vLLM backend (<https://vllm.ai>)
    Vllm,
    /// Any OpenAI-compatible API
    OpenaiCompatible,
    /// Detect the platform by probing
    #[default]
    Auto,
}

impl PlatformKind {
    /// Parse a declared type tag. Empty means `Auto`.
    pub fn parse(tag: &str) -> Result<Self, String> {
        match tag {
            "" | "auto" => Ok(Self::Auto),
            "ollama" => Ok(Self::Ollama),
            "lm-studio" | "lmstudio" => Ok(Self::LmStudio),
            "vllm" => Ok(Self::Vllm),
            "openai-compatible" | "openai" => Ok(Self::OpenaiCompatible),
            other => Err(format!("unknown platform type: {other:?}")),
        }
    }

    /// Default health-check path for this platform.
    pub fn default_health_path(&self) -> &'static str {
        match self {
            Self::Ollama => "/",
            Self::LmStudio => "/v1/models",
            Self::Vllm => "/health",
            Self::OpenaiCompatible | Self::Auto => "/",
        }
    }

    /// Default model-discovery path for this platform.
    pub fn default_model_path(&self) -> &'static str {
        match self {
            Self::Ollama => "/api/tags",
            Self::LmStudio => "/api/v0/models",
            Self::Vllm | Self::OpenaiCompatible | Self::Auto => "/v1/models",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::LmStudio => "lm-studio",
            Self::Vllm => "vllm",
            Self::OpenaiCompatible => "openai-compatible",
            Self::Auto => "auto",
        }
    }
}

impl<'de> Deserialize<'de> for PlatformKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        Self::parse(&tag).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-endpoint model filter: include/exclude glob lists applied to model
/// names after discovery. Empty lists pass everything.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

/// Declared configuration for a single backend endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Human-readable name; defaults to the URL when omitted
    #[serde(default)]
    pub name: String,
    /// Absolute base URL; its canonical form is the endpoint's identity
    pub url: String,
    #[serde(rename = "type", default)]
    pub kind: PlatformKind,
    /// Routing priority, higher = preferred
    #[serde(default = "default_priority")]
    pub priority: u32,
    /// Health-check path or absolute URL; defaults from the platform profile
    #[serde(default)]
    pub health_check_url: Option<String>,
    /// Model-discovery path or absolute URL; defaults from the platform profile
    #[serde(default)]
    pub model_url: Option<String>,
    /// Probe cadence, must be at least 1s
    #[serde(with = "humantime_serde", default = "default_check_interval")]
    pub check_interval: Duration,
    /// Probe timeout, must be below the interval and at most 30s
    #[serde(with = "humantime_serde", default = "default_check_timeout")]
    pub check_timeout: Duration,
    #[serde(default)]
    pub model_filter: Option<FilterConfig>,
}

fn default_priority() -> u32 {
    100
}

fn default_check_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_check_timeout() -> Duration {
    Duration::from_secs(2)
}

pub(crate) const MAX_CHECK_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(1);

impl EndpointConfig {
    /// Effective display name: the declared name, or the URL when omitted.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.url
        } else {
            &self.name
        }
    }

    /// Validate declared fields without resolving URLs.
    pub fn validate(&self) -> Result<(), String> {
        Url::parse(&self.url).map_err(|e| format!("invalid url {:?}: {e}", self.url))?;

        if self.check_interval < MIN_CHECK_INTERVAL {
            return Err(format!(
                "check_interval must be at least 1s, got {:?}",
                self.check_interval
            ));
        }
        if self.check_timeout >= self.check_interval {
            return Err(format!(
                "check_timeout {:?} must be below check_interval {:?}",
                self.check_timeout, self.check_interval
            ));
        }
        if self.check_timeout > MAX_CHECK_TIMEOUT {
            return Err(format!(
                "check_timeout must be at most 30s, got {:?}",
                self.check_timeout
            ));
        }

        Ok(())
    }
}

/// Join a base URL with a path, preserving any base-path prefix.
///
/// `http://host/engines/x/` + `/api/tags` → `http://host/engines/x/api/tags`.
/// Absolute `http(s)` inputs pass through unchanged.
pub fn resolve_url(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    if path.starts_with("http://") || path.starts_with("https://") {
        return Url::parse(path);
    }

    let mut base = base.clone();
    if !base.path().ends_with('/') {
        base.set_path(&format!("{}/", base.path()));
    }
    base.join(path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal(url: &str) -> EndpointConfig {
        EndpointConfig {
            name: String::new(),
            url: url.to_string(),
            kind: PlatformKind::Auto,
            priority: 100,
            health_check_url: None,
            model_url: None,
            check_interval: Duration::from_secs(5),
            check_timeout: Duration::from_secs(2),
            model_filter: None,
        }
    }

    #[test]
    fn test_platform_kind_parse() {
        assert_eq!(PlatformKind::parse("").unwrap(), PlatformKind::Auto);
        assert_eq!(PlatformKind::parse("auto").unwrap(), PlatformKind::Auto);
        assert_eq!(PlatformKind::parse("ollama").unwrap(), PlatformKind::Ollama);
        assert_eq!(
            PlatformKind::parse("lm-studio").unwrap(),
            PlatformKind::LmStudio
        );
        assert_eq!(PlatformKind::parse("vllm").unwrap(), PlatformKind::Vllm);
        assert_eq!(
            PlatformKind::parse("openai-compatible").unwrap(),
            PlatformKind::OpenaiCompatible
        );
        assert!(PlatformKind::parse("exo").is_err());
    }

    #[test]
    fn test_validate_rejects_short_interval() {
        let mut cfg = minimal("http://localhost:11434");
        cfg.check_interval = Duration::from_millis(500);
        cfg.check_timeout = Duration::from_millis(100);
        assert!(cfg.validate().unwrap_err().contains("check_interval"));
    }

    #[test]
    fn test_validate_rejects_timeout_at_or_above_interval() {
        let mut cfg = minimal("http://localhost:11434");
        cfg.check_timeout = cfg.check_interval;
        assert!(cfg.validate().is_err());

        cfg.check_timeout = cfg.check_interval + Duration::from_secs(1);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_timeout_above_cap() {
        let mut cfg = minimal("http://localhost:11434");
        cfg.check_interval = Duration::from_secs(120);
        cfg.check_timeout = Duration::from_secs(31);
        assert!(cfg.validate().unwrap_err().contains("30s"));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let cfg = minimal("not a url");
        assert!(cfg.validate().unwrap_err().contains("invalid url"));
    }

    #[test]
    fn test_resolve_url_plain_base() {
        let base = Url::parse("http://localhost:11434").unwrap();
        let resolved = resolve_url(&base, "/api/tags").unwrap();
        assert_eq!(resolved.as_str(), "http://localhost:11434/api/tags");
    }

    #[test]
    fn test_resolve_url_preserves_base_path() {
        let base = Url::parse("http://host/engines/x/").unwrap();
        let resolved = resolve_url(&base, "/api/tags").unwrap();
        assert_eq!(resolved.as_str(), "http://host/engines/x/api/tags");

        let base = Url::parse("http://host/engines/x").unwrap();
        let resolved = resolve_url(&base, "v1/models").unwrap();
        assert_eq!(resolved.as_str(), "http://host/engines/x/v1/models");
    }

    #[test]
    fn test_resolve_url_absolute_passthrough() {
        let base = Url::parse("http://localhost:11434").unwrap();
        let resolved = resolve_url(&base, "http://other:9000/api/tags").unwrap();
        assert_eq!(resolved.as_str(), "http://other:9000/api/tags");
    }

    #[test]
    fn test_display_name_falls_back_to_url() {
        let cfg = minimal("http://localhost:11434");
        assert_eq!(cfg.display_name(), "http://localhost:11434");
    }

    #[test]
    fn test_kind_deserializes_empty_as_auto() {
        let cfg: EndpointConfig =
            serde_yaml::from_str("url: \"http://localhost:11434\"\ntype: \"\"\n").unwrap();
        assert_eq!(cfg.kind, PlatformKind::Auto);
    }
}
