//! Lifecycle controller: adds and removes nodes through the control plane
//!
//! These are the only operations that change registry membership. Input is
//! validated before any network call, and the registry is only touched once
//! the control plane has confirmed the change.

use crate::client::{ControlPlane, NodeRecord, StartRequest};
use crate::cluster::{Node, NodeRole, NodeStatus, SharedRegistry};
use crate::common::{Error, Result, MAX_NODE_PORT, MIN_NODE_PORT};
use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct LifecycleController {
    registry: SharedRegistry,
    control: Arc<dyn ControlPlane>,
    ports: RangeInclusive<u16>,
    /// Serializes membership changes across their control-plane round trip
    ops: Mutex<()>,
}

impl LifecycleController {
    pub fn new(registry: SharedRegistry, control: Arc<dyn ControlPlane>) -> Self {
        Self {
            registry,
            control,
            ports: MIN_NODE_PORT..=MAX_NODE_PORT,
            ops: Mutex::new(()),
        }
    }

    /// Override the accepted new-node port range
    pub fn with_port_range(mut self, ports: RangeInclusive<u16>) -> Self {
        self.ports = ports;
        self
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Start a node on `port`, peered with every registered node.
    ///
    /// The first node of an empty cluster is started as leader.
    pub async fn add_node(&self, port: u16) -> Result<Node> {
        if !self.ports.contains(&port) {
            return Err(Error::PortOutOfRange {
                port,
                min: *self.ports.start(),
                max: *self.ports.end(),
            });
        }

        let _ops = self.ops.lock().await;
        let request = {
            let registry = self.registry.read()?;
            if registry.contains(port) {
                return Err(Error::DuplicatePort(port));
            }
            StartRequest {
                role: if registry.is_empty() {
                    NodeRole::Leader
                } else {
                    NodeRole::Follower
                },
                port,
                peers: registry.ports(),
            }
        };

        tracing::info!(
            "Starting node {} as {} with peers {:?}",
            port,
            request.role,
            request.peers
        );
        let record = self.control.start_node(&request).await.map_err(|e| {
            tracing::warn!("Failed to start node {}: {}", port, e);
            lifecycle_error(e)
        })?;

        // the control plane's response is authoritative for pid/status
        let node = Node {
            port,
            role: request.role,
            status: NodeStatus::from_control_plane(record.status.as_deref()),
            pid: record.pid,
        };
        self.registry.write()?.upsert(node.clone());
        tracing::info!("Node {} started (pid: {:?})", port, node.pid);
        Ok(node)
    }

    /// Stop the node on `port`. On failure the node stays registered as it was.
    pub async fn remove_node(&self, port: u16) -> Result<Node> {
        let _ops = self.ops.lock().await;
        tracing::info!("Stopping node {}", port);
        let response = self.control.kill_node(port).await.map_err(|e| {
            tracing::warn!("Failed to stop node {}: {}", port, e);
            lifecycle_error(e)
        })?;

        if response.is_failure() {
            let reason = response
                .msg
                .unwrap_or_else(|| format!("control plane refused to stop {}", port));
            tracing::warn!("Failed to stop node {}: {}", port, reason);
            return Err(Error::LifecycleUnavailable(reason));
        }

        let removed = self.registry.write()?.remove(port);
        tracing::info!("Node {} stopped (pid: {:?})", port, response.pid);
        Ok(removed.unwrap_or(Node {
            port,
            role: NodeRole::Follower,
            status: NodeStatus::Stopped,
            pid: response.pid,
        }))
    }

    /// Reconcile the registry with the control plane's list of live nodes.
    pub async fn sync(&self) -> Result<Vec<Node>> {
        let _ops = self.ops.lock().await;
        let records = self.control.list_nodes().await.map_err(|e| {
            tracing::warn!("Failed to list nodes: {}", e);
            lifecycle_error(e)
        })?;

        let mut registry = self.registry.write()?;
        let listed: BTreeSet<u16> = records.iter().map(|r| r.port).collect();
        for stale in registry.ports().into_iter().filter(|p| !listed.contains(p)) {
            tracing::info!("Node {} no longer listed by control plane", stale);
            registry.remove(stale);
        }

        for NodeRecord { port, pid, status } in records {
            let reported = status.as_deref().map(|s| NodeStatus::from_control_plane(Some(s)));
            let node = match registry.get(port) {
                // a listed process is running, but keep what polling observed
                Some(existing) => Node {
                    status: reported.unwrap_or(match existing.status {
                        NodeStatus::Unreachable => NodeStatus::Unreachable,
                        _ => NodeStatus::Running,
                    }),
                    pid: pid.or(existing.pid),
                    ..existing
                },
                None => Node {
                    port,
                    role: if registry.is_empty() {
                        NodeRole::Leader
                    } else {
                        NodeRole::Follower
                    },
                    status: reported.unwrap_or(NodeStatus::Running),
                    pid,
                },
            };
            registry.upsert(node);
        }

        tracing::debug!("Registry synced: {:?}", registry.ports());
        Ok(registry.list())
    }
}

fn lifecycle_error(err: Error) -> Error {
    match err {
        Error::LifecycleUnavailable(_) => err,
        other => Error::LifecycleUnavailable(other.to_string()),
    }
}
