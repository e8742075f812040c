//! Key-value operations fanned out across the node set
//!
//! Writes are a best-effort broadcast: every registered node gets the write,
//! failures are recorded per node and never stop the others. There is no
//! quorum and no conflict detection.
//!
//! Reads walk a fresh uniform permutation of the nodes one at a time and stop
//! at the first definitive answer: a value, or the node's `false` sentinel
//! meaning "not found". Unreachable nodes are skipped.

use crate::client::NodeApi;
use crate::cluster::SharedRegistry;
use crate::common::{Error, Result};
use futures_util::future::join_all;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Result of a single-key read
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// A node returned a value
    Found { port: u16, value: Value },
    /// A node answered that the key does not exist (authoritative)
    NotFound { port: u16 },
    /// No node answered; nothing is known about the key
    Exhausted { attempted: Vec<u16> },
}

impl ReadOutcome {
    pub fn value(&self) -> Option<&Value> {
        match self {
            ReadOutcome::Found { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn into_result(self, key: &str) -> Result<Value> {
        match self {
            ReadOutcome::Found { value, .. } => Ok(value),
            ReadOutcome::NotFound { .. } => Err(Error::ReadNotFound(key.to_string())),
            ReadOutcome::Exhausted { .. } => Err(Error::ReadExhausted(key.to_string())),
        }
    }
}

/// Outcome of sending a write to one node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeWrite {
    /// The node answered; `applied` is false when it declined (e.g. a follower)
    Acknowledged { applied: bool },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteReport {
    pub outcomes: BTreeMap<u16, NodeWrite>,
}

impl WriteReport {
    /// At least one node acknowledged the write
    pub fn is_success(&self) -> bool {
        self.acknowledged().next().is_some()
    }

    pub fn acknowledged(&self) -> impl Iterator<Item = u16> + '_ {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, NodeWrite::Acknowledged { .. }))
            .map(|(port, _)| *port)
    }

    pub fn applied(&self) -> impl Iterator<Item = u16> + '_ {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, NodeWrite::Acknowledged { applied: true }))
            .map(|(port, _)| *port)
    }

    pub fn failed(&self) -> impl Iterator<Item = u16> + '_ {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, NodeWrite::Failed { .. }))
            .map(|(port, _)| *port)
    }
}

pub struct FanoutClient {
    registry: SharedRegistry,
    nodes: Arc<dyn NodeApi>,
}

impl FanoutClient {
    pub fn new(registry: SharedRegistry, nodes: Arc<dyn NodeApi>) -> Self {
        Self { registry, nodes }
    }

    /// Send the write to every registered node concurrently.
    pub async fn write(&self, key: &str, value: &str) -> Result<WriteReport> {
        let ports = self.registry.read()?.ports();
        if ports.is_empty() {
            tracing::warn!("Write of {} skipped: no registered nodes", key);
        }

        let sends = ports.iter().map(|&port| async move {
            let outcome = match self.nodes.write(port, key, value).await {
                Ok(ack) => NodeWrite::Acknowledged {
                    applied: ack != Value::Bool(false),
                },
                Err(e) => {
                    tracing::warn!("Failed to write {} to node {}: {}", key, port, e);
                    NodeWrite::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            (port, outcome)
        });

        let report = WriteReport {
            outcomes: join_all(sends).await.into_iter().collect(),
        };
        tracing::info!(
            "Write {}: {}/{} nodes acknowledged",
            key,
            report.acknowledged().count(),
            report.outcomes.len()
        );
        Ok(report)
    }

    /// Fresh uniformly shuffled read order over the registered nodes
    pub fn read_order<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<u16>> {
        let mut ports = self.registry.read()?.ports();
        ports.shuffle(rng);
        Ok(ports)
    }

    /// Read `key` from the first node, in random order, that answers.
    pub async fn read(&self, key: &str) -> Result<ReadOutcome> {
        let order = self.read_order(&mut rand::thread_rng())?;
        Ok(self.read_in_order(key, &order).await)
    }

    /// Query `order` strictly one node at a time.
    pub async fn read_in_order(&self, key: &str, order: &[u16]) -> ReadOutcome {
        let mut attempted = Vec::with_capacity(order.len());
        for &port in order {
            attempted.push(port);
            match self.nodes.read(port, key).await {
                Ok(Value::Bool(false)) => {
                    tracing::debug!("Node {} reports {} does not exist", port, key);
                    return ReadOutcome::NotFound { port };
                }
                Ok(value) => {
                    tracing::debug!("Read {} from node {}", key, port);
                    return ReadOutcome::Found { port, value };
                }
                Err(e) => tracing::warn!("Failed to read {} from node {}: {}", key, port, e),
            }
        }
        ReadOutcome::Exhausted { attempted }
    }
}
