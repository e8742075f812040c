//! Node identity and runtime status

use serde::{Deserialize, Serialize};

/// Role a node was started with. Only a hint: the authoritative role comes
/// from the node's own metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Leader,
    Follower,
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeRole::Leader => write!(f, "leader"),
            NodeRole::Follower => write!(f, "follower"),
        }
    }
}

/// Runtime status as last known to the console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Starting,
    Running,
    Stopped,
    Unreachable,
}

impl NodeStatus {
    /// Map a control-plane status string. A node listed without a status is
    /// a live process.
    pub fn from_control_plane(status: Option<&str>) -> Self {
        match status {
            None | Some("running") => NodeStatus::Running,
            Some("stopped") | Some("killed") => NodeStatus::Stopped,
            Some("unreachable") => NodeStatus::Unreachable,
            Some(_) => NodeStatus::Starting,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, NodeStatus::Starting | NodeStatus::Running)
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeStatus::Starting => write!(f, "starting"),
            NodeStatus::Running => write!(f, "running"),
            NodeStatus::Stopped => write!(f, "stopped"),
            NodeStatus::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// One cluster member, addressed by port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub port: u16,
    pub role: NodeRole,
    pub status: NodeStatus,
    /// Owned by the control plane, kept for display
    pub pid: Option<u32>,
}

impl Node {
    pub fn new(port: u16, role: NodeRole) -> Self {
        Self {
            port,
            role,
            status: NodeStatus::Starting,
            pid: None,
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Port: {} | Status: {} | Role: {}", self.port, self.status, self.role)?;
        match self.pid {
            Some(pid) => write!(f, " | PID: {}", pid),
            None => write!(f, " | PID: -"),
        }
    }
}
