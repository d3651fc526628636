//! Reconciliation diff types
//!
//! A config reload produces an `EndpointChangeResult` describing exactly
//! which endpoints were added, removed, or modified, with per-field change
//! descriptors for the modified set.

use super::endpoint::Endpoint;
use serde::Serialize;

/// A single changed field on a modified endpoint: `field: old -> new`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub field: &'static str,
    pub old: String,
    pub new: String,
}

impl std::fmt::Display for FieldChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} -> {}", self.field, self.old, self.new)
    }
}

/// An endpoint whose declaration changed across a reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModifiedEndpoint {
    pub url: String,
    pub changes: Vec<FieldChange>,
}

/// Result of reconciling a new configuration against the live repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EndpointChangeResult {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub modified: Vec<ModifiedEndpoint>,
    pub old_count: usize,
    pub new_count: usize,
}

impl EndpointChangeResult {
    /// Whether the reload changed anything at all.
    pub fn changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty() || !self.modified.is_empty()
    }
}

/// Compute the semantic field changes between two declarations of the same
/// endpoint. An empty result means the probe semantics are unchanged and
/// live health state may be carried forward; any change resets it.
///
/// The predicate covers name, priority, resolved URLs, and probe timing.
/// Filter changes are deliberately excluded: they alter what discovery
/// publishes, not how the endpoint is probed.
pub fn field_changes(old: &Endpoint, new: &Endpoint) -> Vec<FieldChange> {
    let mut changes = Vec::new();

    if old.name != new.name {
        changes.push(FieldChange {
            field: "name",
            old: old.name.clone(),
            new: new.name.clone(),
        });
    }
    if old.priority != new.priority {
        changes.push(FieldChange {
            field: "priority",
            old: old.priority.to_string(),
            new: new.priority.to_string(),
        });
    }
    if old.health_check_url != new.health_check_url {
        changes.push(FieldChange {
            field: "health_check_url",
            old: old.health_check_url.to_string(),
            new: new.health_check_url.to_string(),
        });
    }
    if old.model_url != new.model_url {
        changes.push(FieldChange {
            field: "model_url",
            old: old.model_url.to_string(),
            new: new.model_url.to_string(),
        });
    }
    if old.check_interval != new.check_interval {
        changes.push(FieldChange {
            field: "check_interval",
            old: format!("{:?}", old.check_interval),
            new: format!("{:?}", new.check_interval),
        });
    }
    if old.check_timeout != new.check_timeout {
        changes.push(FieldChange {
            field: "check_timeout",
            old: format!("{:?}", old.check_timeout),
            new: format!("{:?}", new.check_timeout),
        });
    }

    changes
}
