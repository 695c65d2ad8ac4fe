//! Merged view of station and price records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Everything known about one forecourt.
///
/// Holds the union of the fields of every record merged into it. The
/// `node_id` itself is the registry key and is not stored here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FuelStationNode(Map<String, Value>);

impl FuelStationNode {
    /// Look up one field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Apply `fields` over this node. Fields already present are replaced.
    pub fn merge(&mut self, fields: Map<String, Value>) {
        self.0.extend(fields);
    }
}

impl From<Map<String, Value>> for FuelStationNode {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// One upstream record, exactly as sent, split into its id and the rest.
///
/// Records are kept untyped so that fields a source omits are never filled
/// in with defaults that would overwrite another source's values.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NodeUpdate {
    pub node_id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Nodes by id, plus the time the last successful refresh started.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    pub nodes: BTreeMap<String, FuelStationNode>,
    pub last_refresh: Option<DateTime<Utc>>,
}

impl Registry {
    /// Merge one record into its node, creating the node if needed.
    pub fn merge(&mut self, update: NodeUpdate) {
        self.nodes
            .entry(update.node_id)
            .or_default()
            .merge(update.fields);
    }

    /// Merge a page of records in order. Returns how many were merged.
    pub fn merge_page(&mut self, page: Vec<NodeUpdate>) -> usize {
        let count = page.len();
        for update in page {
            self.merge(update);
        }
        count
    }
}
