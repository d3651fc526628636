//! Platform profiles and auto-detection cache.
//!
//! A profile bundles the rules specific to one backend family: the
//! discovery path it serves, the top-level array field of its response,
//! and (in `parser`) how each array element maps to a `ModelInfo`.

use crate::config::PlatformKind;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// A concrete backend family the discovery client knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    Ollama,
    LmStudio,
    Vllm,
    OpenaiCompatible,
}

impl Profile {
    /// Probe order for auto-detection. Fixed and append-only: later
    /// platform additions go at the end so cached detections stay stable.
    pub const DETECTION_ORDER: [Profile; 4] = [
        Profile::Ollama,
        Profile::LmStudio,
        Profile::Vllm,
        Profile::OpenaiCompatible,
    ];

    /// Model-discovery path this profile serves.
    pub fn model_path(&self) -> &'static str {
        match self {
            Self::Ollama => "/api/tags",
            Self::LmStudio => "/api/v0/models",
            Self::Vllm | Self::OpenaiCompatible => "/v1/models",
        }
    }

    /// Top-level field holding the model array in this profile's response.
    pub fn array_field(&self) -> &'static str {
        match self {
            Self::Ollama => "models",
            Self::LmStudio | Self::Vllm | Self::OpenaiCompatible => "data",
        }
    }

    /// Map a declared platform tag to its profile; `Auto` has none.
    pub fn from_kind(kind: PlatformKind) -> Option<Profile> {
        match kind {
            PlatformKind::Ollama => Some(Self::Ollama),
            PlatformKind::LmStudio => Some(Self::LmStudio),
            PlatformKind::Vllm => Some(Self::Vllm),
            PlatformKind::OpenaiCompatible => Some(Self::OpenaiCompatible),
            PlatformKind::Auto => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::LmStudio => "lm-studio",
            Self::Vllm => "vllm",
            Self::OpenaiCompatible => "openai-compatible",
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default TTL for cached auto-detections.
pub const DEFAULT_PROFILE_TTL: Duration = Duration::from_secs(30 * 60);

struct CachedProfile {
    profile: Profile,
    expires_at: Instant,
}

/// Per-endpoint cache of winning auto-detection results.
///
/// Keyed by endpoint URL. Entries expire after the TTL so a backend swap at
/// the same address is eventually re-detected; a failed discovery evicts
/// immediately.
pub struct ProfileCache {
    entries: DashMap<String, CachedProfile>,
    ttl: Duration,
}

impl ProfileCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Cached profile for an endpoint, evicting it first if expired.
    pub fn get(&self, endpoint_url: &str) -> Option<Profile> {
        let expired = match self.entries.get(endpoint_url) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.profile),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(endpoint_url);
        }
        None
    }

    pub fn insert(&self, endpoint_url: &str, profile: Profile) {
        self.entries.insert(
            endpoint_url.to_string(),
            CachedProfile {
                profile,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn evict(&self, endpoint_url: &str) {
        self.entries.remove(endpoint_url);
    }
}

impl Default for ProfileCache {
    fn default() -> Self {
        Self::new(DEFAULT_PROFILE_TTL)
    }
}
