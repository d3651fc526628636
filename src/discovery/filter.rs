//! Per-endpoint model filtering.
//!
//! Glob include/exclude lists applied to model names after discovery.
//! Exclude is applied after include; an empty filter passes everything.

use crate::config::FilterConfig;
use crate::registry::ModelInfo;
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Compiled model-name filter.
#[derive(Debug, Clone, Default)]
pub struct ModelFilter {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl ModelFilter {
    /// Compile a filter from its config form.
    pub fn from_config(config: &FilterConfig) -> Result<Self, globset::Error> {
        Ok(Self {
            include: build_set(&config.include)?,
            exclude: build_set(&config.exclude)?,
        })
    }

    /// A filter that passes every model.
    pub fn pass_through() -> Self {
        Self::default()
    }

    pub fn is_pass_through(&self) -> bool {
        self.include.is_none() && self.exclude.is_none()
    }

    /// Whether a model name survives this filter.
    pub fn matches(&self, name: &str) -> bool {
        if let Some(include) = &self.include {
            if !include.is_match(name) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(name) {
                return false;
            }
        }
        true
    }

    /// Apply the filter to a discovered model list.
    pub fn apply(&self, models: Vec<ModelInfo>) -> Vec<ModelInfo> {
        if self.is_pass_through() {
            return models;
        }
        models
            .into_iter()
            .filter(|m| self.matches(&m.name))
            .collect()
    }
}

fn build_set(patterns: &[String]) -> Result<Option<GlobSet>, globset::Error> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(Some(builder.build()?))
}
