//! Console: one of each component over a shared registry

use crate::client::{build_http_client, ControlPlane, HttpControlPlane, HttpNodeClient, NodeApi};
use crate::cluster::{Registry, SharedRegistry};
use crate::common::{ConsoleConfig, Result};
use crate::fanout::FanoutClient;
use crate::lifecycle::LifecycleController;
use crate::logs::{LogSource, LogStreamManager, WsLogSource};
use crate::monitor::{MetricsAggregator, PollerHandle};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct Console {
    config: ConsoleConfig,
    registry: SharedRegistry,
    lifecycle: LifecycleController,
    fanout: FanoutClient,
    aggregator: Arc<MetricsAggregator>,
    logs: LogStreamManager,
    poller: Option<PollerHandle>,
    shutdown: CancellationToken,
}

impl Console {
    /// Build a console talking HTTP/WebSocket to the configured endpoints
    pub fn new(config: ConsoleConfig) -> Result<Self> {
        config.validate()?;
        let http = build_http_client(config.timeout()?)?;
        let control = Arc::new(HttpControlPlane::new(http.clone(), &config.controller_url));
        let nodes = Arc::new(HttpNodeClient::new(http, &config.node_host));
        let logs = Arc::new(WsLogSource::new(&config.node_host));
        Self::with_transports(config, control, nodes, logs)
    }

    pub fn with_transports(
        config: ConsoleConfig,
        control: Arc<dyn ControlPlane>,
        nodes: Arc<dyn NodeApi>,
        logs: Arc<dyn LogSource>,
    ) -> Result<Self> {
        let registry = Registry::shared();
        let lifecycle = LifecycleController::new(registry.clone(), control)
            .with_port_range(config.min_port..=config.max_port);
        let fanout = FanoutClient::new(registry.clone(), nodes.clone());
        let aggregator = Arc::new(MetricsAggregator::new(
            registry.clone(),
            nodes,
            config.poll_period()?,
        ));
        let logs = LogStreamManager::new(logs, config.log_capacity);

        Ok(Self {
            config,
            registry,
            lifecycle,
            fanout,
            aggregator,
            logs,
            poller: None,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn lifecycle(&self) -> &LifecycleController {
        &self.lifecycle
    }

    pub fn fanout(&self) -> &FanoutClient {
        &self.fanout
    }

    pub fn aggregator(&self) -> &Arc<MetricsAggregator> {
        &self.aggregator
    }

    pub fn logs(&self) -> &LogStreamManager {
        &self.logs
    }

    pub fn logs_mut(&mut self) -> &mut LogStreamManager {
        &mut self.logs
    }

    /// Token cancelled by [`Console::shutdown`]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(|p| !p.is_finished())
    }

    /// Start periodic polling; a no-op if already running
    pub fn start_polling(&mut self) {
        if self.is_polling() {
            return;
        }
        tracing::info!(
            "Polling {} node(s) every {:?}",
            self.registry.read().map(|r| r.len()).unwrap_or(0),
            self.aggregator.period()
        );
        let token = self.shutdown.child_token();
        self.poller = Some(self.aggregator.clone().spawn(token));
    }

    /// Stop polling and close the log stream
    pub async fn shutdown(&mut self) {
        self.shutdown.cancel();
        if let Some(poller) = self.poller.take() {
            poller.shutdown().await;
        }
        self.logs.clear().await;
        tracing::info!("Console shut down");
    }
}
