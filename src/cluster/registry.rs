//! In-memory set of known nodes
//!
//! The registry is the single source for "which nodes exist". Iteration is
//! ordered by port so rendering and leader tie-breaks are deterministic.

use crate::cluster::node::{Node, NodeStatus};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Registry shared between components. Writers take the lock briefly and
/// never across an await point.
pub type SharedRegistry = Arc<RwLock<Registry>>;

#[derive(Debug, Default, Clone)]
pub struct Registry {
    nodes: BTreeMap<u16, Node>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRegistry {
        Arc::new(RwLock::new(Self::new()))
    }

    pub fn list(&self) -> Vec<Node> {
        self.nodes.values().cloned().collect()
    }

    pub fn ports(&self) -> Vec<u16> {
        self.nodes.keys().copied().collect()
    }

    pub fn get(&self, port: u16) -> Option<Node> {
        self.nodes.get(&port).cloned()
    }

    pub fn contains(&self, port: u16) -> bool {
        self.nodes.contains_key(&port)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Insert or replace the node stored under `node.port`
    pub fn upsert(&mut self, node: Node) {
        self.nodes.insert(node.port, node);
    }

    /// Remove a node; absent ports are a no-op
    pub fn remove(&mut self, port: u16) -> Option<Node> {
        self.nodes.remove(&port)
    }

    /// Record an observed status for an existing node. Never adds members.
    /// Returns true if the status changed.
    pub fn observe(&mut self, port: u16, status: NodeStatus) -> bool {
        match self.nodes.get_mut(&port) {
            Some(node) if node.status != status => {
                node.status = status;
                true
            }
            _ => false,
        }
    }
}
