//! Configuration for the kvconsole components

use crate::common::utils::parse_duration;
use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "kvconsole";

/// Environment variable prefix (e.g. `KVCONSOLE_CONTROLLER_URL`)
pub const ENV_PREFIX: &str = "KVCONSOLE";

/// Lowest port an operator may assign to a new node
pub const MIN_NODE_PORT: u16 = 8000;

/// Highest port an operator may assign to a new node
pub const MAX_NODE_PORT: u16 = 8079;

/// Global console configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Control-plane base URL
    pub controller_url: String,

    /// Host part of every node URL
    pub node_host: String,

    /// Metrics polling period (freshness vs. load)
    pub poll_interval: String,

    /// Per-request HTTP timeout
    pub request_timeout: String,

    /// Log buffer capacity in lines (memory vs. history depth)
    pub log_capacity: usize,

    pub min_port: u16,
    pub max_port: u16,

    /// Logging level
    pub log_level: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            controller_url: "http://localhost:8080".to_string(),
            node_host: "localhost".to_string(),
            poll_interval: "10s".to_string(),
            request_timeout: "5s".to_string(),
            log_capacity: 1000,
            min_port: MIN_NODE_PORT,
            max_port: MAX_NODE_PORT,
            log_level: "info".to_string(),
        }
    }
}

impl ConsoleConfig {
    /// Load defaults, then the config file, then `KVCONSOLE_*` environment variables.
    ///
    /// An explicit `path` must exist; the default `kvconsole.{toml,json,..}` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let builder = config::Config::builder();
        let builder = match path {
            Some(path) => builder.add_source(config::File::from(path)),
            None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let config: ConsoleConfig = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.log_capacity == 0 {
            return Err(Error::InvalidConfig("log_capacity must be positive".into()));
        }
        if self.poll_period()?.is_zero() {
            return Err(Error::InvalidConfig("poll_interval must be positive".into()));
        }
        self.timeout()?;
        if self.min_port > self.max_port {
            return Err(Error::InvalidConfig(format!(
                "min_port {} is above max_port {}",
                self.min_port, self.max_port
            )));
        }
        if !self.controller_url.starts_with("http://") && !self.controller_url.starts_with("https://")
        {
            return Err(Error::InvalidConfig(format!(
                "controller_url must be an http(s) URL: {}",
                self.controller_url
            )));
        }
        Ok(())
    }

    pub fn poll_period(&self) -> Result<Duration> {
        parse_duration(&self.poll_interval)
    }

    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(&self.request_timeout)
    }
}
