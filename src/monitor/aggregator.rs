//! Periodic metrics aggregation
//!
//! Every cycle polls the registry's current node list for `/metrics` and
//! `/dump`, substitutes placeholders for nodes that fail, derives the leader,
//! and only then publishes the whole snapshot through a watch channel.

use crate::client::NodeApi;
use crate::cluster::{NodeStatus, SharedRegistry};
use crate::common::Result;
use crate::monitor::snapshot::{derive_leader, placeholder, MetricsSnapshot};
use chrono::Utc;
use futures_util::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub struct MetricsAggregator {
    registry: SharedRegistry,
    nodes: Arc<dyn NodeApi>,
    period: Duration,
    cycles: AtomicU64,
    tx: watch::Sender<Arc<MetricsSnapshot>>,
}

impl MetricsAggregator {
    pub fn new(registry: SharedRegistry, nodes: Arc<dyn NodeApi>, period: Duration) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(MetricsSnapshot::default()));
        Self {
            registry,
            nodes,
            // a zero period would spin
            period: period.max(Duration::from_millis(1)),
            cycles: AtomicU64::new(0),
            tx,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Receiver that sees every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<MetricsSnapshot>> {
        self.tx.subscribe()
    }

    /// Last published snapshot
    pub fn latest(&self) -> Arc<MetricsSnapshot> {
        self.tx.borrow().clone()
    }

    /// Run one polling cycle without publishing it.
    pub async fn collect(&self) -> Result<MetricsSnapshot> {
        let ports = self.registry.read()?.ports();
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!("Polling cycle {} over {:?}", cycle, ports);

        let polls = ports.iter().map(|&port| async move {
            let (metrics, dump) = tokio::join!(self.nodes.metrics(port), self.nodes.dump(port));
            (port, metrics, dump)
        });
        let results = join_all(polls).await;

        let mut snapshot = MetricsSnapshot {
            cycle,
            taken_at: Some(Utc::now()),
            ..Default::default()
        };
        for (port, metrics, dump) in results {
            let metrics = match metrics {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!("Metrics poll failed for node {}: {}", port, e);
                    snapshot.unreachable.insert(port);
                    placeholder(&e)
                }
            };
            let dump = dump.unwrap_or_else(|e| {
                tracing::warn!("Dump poll failed for node {}: {}", port, e);
                placeholder(&e)
            });
            snapshot.metrics.insert(port, metrics);
            snapshot.dumps.insert(port, dump);
        }
        snapshot.leader = derive_leader(&snapshot.metrics);

        Ok(snapshot)
    }

    /// Swap in a completed snapshot and record observed reachability.
    pub fn publish(&self, snapshot: MetricsSnapshot) -> Result<Arc<MetricsSnapshot>> {
        {
            let mut registry = self.registry.write()?;
            for port in snapshot.ports() {
                let status = if snapshot.unreachable.contains(&port) {
                    NodeStatus::Unreachable
                } else {
                    NodeStatus::Running
                };
                if registry.observe(port, status) {
                    tracing::info!("Node {} is now {}", port, status);
                }
            }
        }

        let previous = self.tx.borrow().leader;
        if previous != snapshot.leader {
            match snapshot.leader {
                Some(port) => tracing::info!("Leader is now node {}", port),
                None => tracing::warn!("No node reports leader role"),
            }
        }

        let snapshot = Arc::new(snapshot);
        self.tx.send_replace(snapshot.clone());
        Ok(snapshot)
    }

    /// Poll and publish one cycle on demand
    pub async fn poll_once(&self) -> Result<Arc<MetricsSnapshot>> {
        let snapshot = self.collect().await?;
        self.publish(snapshot)
    }

    /// Poll immediately and then every period until `token` is cancelled.
    pub fn spawn(self: Arc<Self>, token: CancellationToken) -> PollerHandle {
        let cancelled = token.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {}
                }

                match self.collect().await {
                    Ok(snapshot) if cancelled.is_cancelled() => {
                        tracing::debug!("Discarding cycle {} after cancellation", snapshot.cycle);
                        break;
                    }
                    Ok(snapshot) => {
                        if let Err(e) = self.publish(snapshot) {
                            tracing::error!("Failed to publish snapshot: {}", e);
                        }
                    }
                    Err(e) => tracing::error!("Polling cycle failed: {}", e),
                }
            }

            tracing::info!("Metrics polling stopped");
        });

        PollerHandle {
            token,
            task: Some(task),
        }
    }
}

/// Handle to the polling task. Dropping it cancels future cycles.
pub struct PollerHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Cancel and wait for the task (and its timer) to be gone
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!("Polling task failed: {}", e);
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
