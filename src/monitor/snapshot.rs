//! Per-cycle view of every node's metrics and state dump

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

/// One complete polling cycle. Replaced wholesale, never merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Cycle number; 0 is the empty snapshot published before the first poll
    pub cycle: u64,
    pub taken_at: Option<DateTime<Utc>>,
    pub metrics: BTreeMap<u16, Value>,
    pub dumps: BTreeMap<u16, Value>,
    /// Derived from `metrics`, see [`derive_leader`]
    pub leader: Option<u16>,
    /// Ports whose metrics could not be fetched this cycle
    pub unreachable: BTreeSet<u16>,
}

impl MetricsSnapshot {
    pub fn ports(&self) -> Vec<u16> {
        self.metrics.keys().copied().collect()
    }

    pub fn is_leader(&self, port: u16) -> bool {
        self.leader == Some(port)
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

/// Document substituted for a node that did not answer
pub fn placeholder(reason: impl std::fmt::Display) -> Value {
    json!({
        "status": "unreachable",
        "error": reason.to_string(),
    })
}

pub fn is_placeholder(doc: &Value) -> bool {
    doc.get("status").and_then(Value::as_str) == Some("unreachable") && doc.get("error").is_some()
}

/// Role a node reports for itself under `node.role`
pub fn reported_role(metrics: &Value) -> Option<&str> {
    metrics.pointer("/node/role").and_then(Value::as_str)
}

/// Scan metrics in port order for nodes reporting `node.role == "leader"`.
/// With several claimants the last one wins.
pub fn derive_leader(metrics: &BTreeMap<u16, Value>) -> Option<u16> {
    metrics
        .iter()
        .filter(|(_, doc)| reported_role(doc) == Some("leader"))
        .map(|(port, _)| *port)
        .last()
}
