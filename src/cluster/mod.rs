//! Cluster membership as seen by the console

pub mod node;
pub mod registry;

pub use node::{Node, NodeRole, NodeStatus};
pub use registry::{Registry, SharedRegistry};
