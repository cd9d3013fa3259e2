//! Drift detection for resources
//!
//! Checks each resource's configured action against live state without
//! changing anything.

use crate::resource::Resource;
use crate::types::Action;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A resource whose configured action is not yet satisfied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDrift {
    pub kind: String,
    pub name: String,
    pub action: Action,
    /// Set when the state could not be checked
    pub error: Option<String>,
}

impl ResourceDrift {
    /// Check one resource, returning None if it is up to date
    pub fn from_resource(resource: &Resource) -> Option<Self> {
        let action = resource.action();
        let error = match resource.uptodate(action) {
            Ok(true) => return None,
            Ok(false) => None,
            Err(err) => Some(err.to_string()),
        };

        Some(Self {
            kind: resource.kind().to_string(),
            name: resource.name().to_string(),
            action,
            error,
        })
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Check a list of resources, keeping only those out of date
pub fn compute_drift(resources: &[Resource]) -> Vec<ResourceDrift> {
    resources
        .iter()
        .filter_map(ResourceDrift::from_resource)
        .collect()
}

/// Drift summary statistics
#[derive(Debug, Clone, Default)]
pub struct DriftSummary {
    /// Entities that would be created or installed
    pub pending: usize,
    /// Entities that would be removed
    pub removals: usize,
    /// Resources whose state could not be determined
    pub errors: usize,
}

impl DriftSummary {
    pub fn from_drift(drift: &[ResourceDrift]) -> Self {
        let mut summary = Self::default();
        for item in drift {
            if item.is_error() {
                summary.errors += 1;
            } else if item.action == Action::Remove {
                summary.removals += 1;
            } else {
                summary.pending += 1;
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.pending + self.removals + self.errors
    }

    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group drift by resource kind, in kind order
pub fn group_by_kind(drift: &[ResourceDrift]) -> BTreeMap<&str, Vec<&ResourceDrift>> {
    let mut groups: BTreeMap<&str, Vec<&ResourceDrift>> = BTreeMap::new();
    for item in drift {
        groups.entry(item.kind.as_str()).or_default().push(item);
    }
    groups
}
