//! # kvconsole
//!
//! Operator console for a small self-hosted key-value cluster:
//! - Start and stop node processes through the control plane
//! - Poll every node's metrics and state dump, and find the leader
//! - Broadcast writes and read with randomized first-success fan-out
//! - Tail one node's log at a time
//!
//! ## Architecture
//!
//! ```text
//!   operator ──► LifecycleController ──► control plane (:8080)
//!      │               │
//!      │               ▼
//!      │           Registry ◄────────── MetricsAggregator ──► /metrics, /dump
//!      │               │                      │
//!      ├──► FanoutClient ──► /write, /read    └──► MetricsSnapshot (watch)
//!      │
//!      └──► LogStreamManager ──► /ws/logs/{port}
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start a three-node cluster
//! kvconsole add 8000
//! kvconsole add 8001
//! kvconsole add 8002
//!
//! # Write everywhere, read from a random node
//! kvconsole write color blue
//! kvconsole read color
//!
//! # Watch metrics (leader marked) and tail a node
//! kvconsole watch --dump
//! kvconsole logs 8001
//! ```

pub mod client;
pub mod cluster;
pub mod common;
pub mod console;
pub mod fanout;
pub mod lifecycle;
pub mod logs;
pub mod monitor;

// Re-export commonly used types
pub use cluster::{Node, NodeRole, NodeStatus, Registry, SharedRegistry};
pub use common::{ConsoleConfig, Error, Result};
pub use console::Console;
pub use fanout::{FanoutClient, ReadOutcome, WriteReport};
pub use lifecycle::LifecycleController;
pub use logs::{LogStreamManager, StreamState};
pub use monitor::{MetricsAggregator, MetricsSnapshot};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
