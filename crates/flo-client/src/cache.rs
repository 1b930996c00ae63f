//! Workflow name to alias cache
//!
//! The cache is either unpopulated or holds exactly the result of the last
//! successful list call. A refresh builds the new mapping off to the side and
//! swaps it in under one write lock, so readers never observe a partial merge.
//!
//! Concurrent refreshes are not serialised: two in-flight list calls race and
//! whichever finishes last wins. Both outcomes are complete snapshots.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use crate::error::FloResult;

/// One entry of the account's workflow listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub name: String,
    pub alias: String,
    /// Fields the listing carries beyond name and alias
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkflowSummary {
    pub fn new(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: alias.into(),
            extra: Map::new(),
        }
    }
}

/// Source of the authoritative workflow listing
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WorkflowDirectory: Send + Sync {
    async fn list_workflows(&self) -> FloResult<Vec<WorkflowSummary>>;
}

/// Process-local name to alias mapping
#[derive(Debug, Default)]
pub struct AliasCache {
    entries: RwLock<Option<HashMap<String, String>>>,
}

impl AliasCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves a workflow name, or accepts a known alias as-is.
    ///
    /// Name lookup is a map access (O(1)); the alias fallback scans every
    /// value (O(n)), which is fine for per-account workflow counts.
    pub fn lookup(&self, name_or_alias: &str) -> Option<String> {
        let guard = self.entries.read();
        let entries = guard.as_ref()?;

        entries
            .get(name_or_alias)
            .or_else(|| entries.values().find(|alias| alias.as_str() == name_or_alias))
            .cloned()
    }

    /// True once any refresh has completed, even one that returned no workflows
    pub fn has(&self) -> bool {
        self.entries.read().is_some()
    }

    /// Cached workflow names, sorted
    pub fn names(&self) -> Vec<String> {
        let guard = self.entries.read();
        let mut names: Vec<String> = guard
            .as_ref()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.read().as_ref().map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replaces the whole mapping and returns the new names, sorted
    pub fn replace(&self, workflows: &[WorkflowSummary]) -> Vec<String> {
        let mapping: HashMap<String, String> = workflows
            .iter()
            .map(|wf| (wf.name.clone(), wf.alias.clone()))
            .collect();

        let mut names: Vec<String> = mapping.keys().cloned().collect();
        names.sort();

        *self.entries.write() = Some(mapping);
        debug!(count = names.len(), "Alias cache replaced");
        names
    }

    /// Fetches the full listing and replaces the mapping, even if already populated
    pub async fn refresh(&self, directory: &dyn WorkflowDirectory) -> FloResult<Vec<String>> {
        let workflows = directory.list_workflows().await?;
        let names = self.replace(&workflows);
        info!(count = names.len(), "Refreshed workflow aliases");
        Ok(names)
    }
}
