//! Cluster health monitoring
//!
//! The aggregator is the source of truth for "what each node reports" and
//! "who is leader" consumed by rendering.

pub mod aggregator;
pub mod snapshot;

pub use aggregator::{MetricsAggregator, PollerHandle};
pub use snapshot::{derive_leader, is_placeholder, placeholder, MetricsSnapshot};
