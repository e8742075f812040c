//! Client for a single node's HTTP surface

use crate::common::{encode_key, Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// Per-node operations. Every failure (connection, status, body) is reported
/// as [`Error::NodeUnreachable`] for that port.
#[async_trait]
pub trait NodeApi: Send + Sync {
    /// `GET /metrics`
    async fn metrics(&self, port: u16) -> Result<Value>;

    /// `GET /dump`
    async fn dump(&self, port: u16) -> Result<Value>;

    /// `POST /write`; returns the node's acknowledgement body
    async fn write(&self, port: u16, key: &str, value: &str) -> Result<Value>;

    /// `GET /read/{key}`; a literal `false` means the key does not exist
    async fn read(&self, port: u16, key: &str) -> Result<Value>;
}

#[derive(Debug, Serialize)]
struct WriteRequest<'a> {
    key: &'a str,
    value: &'a str,
}

/// reqwest-backed [`NodeApi`] addressing nodes as `http://{host}:{port}`
#[derive(Debug, Clone)]
pub struct HttpNodeClient {
    http: reqwest::Client,
    host: String,
}

impl HttpNodeClient {
    pub fn new(http: reqwest::Client, host: impl Into<String>) -> Self {
        Self {
            http,
            host: host.into(),
        }
    }

    pub fn base_url(&self, port: u16) -> String {
        format!("http://{}:{}", self.host, port)
    }

    async fn get_json(&self, port: u16, path: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url(port), path);
        tracing::debug!("GET {}", url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| unreachable(port, e))?;
        response.json::<Value>().await.map_err(|e| unreachable(port, e))
    }
}

fn unreachable(port: u16, err: impl std::fmt::Display) -> Error {
    Error::NodeUnreachable {
        port,
        reason: err.to_string(),
    }
}

#[async_trait]
impl NodeApi for HttpNodeClient {
    async fn metrics(&self, port: u16) -> Result<Value> {
        self.get_json(port, "/metrics").await
    }

    async fn dump(&self, port: u16) -> Result<Value> {
        self.get_json(port, "/dump").await
    }

    async fn write(&self, port: u16, key: &str, value: &str) -> Result<Value> {
        let url = format!("{}/write", self.base_url(port));
        tracing::debug!("POST {} (key: {})", url, key);
        let response = self
            .http
            .post(&url)
            .json(&WriteRequest { key, value })
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| unreachable(port, e))?;
        response.json::<Value>().await.map_err(|e| unreachable(port, e))
    }

    async fn read(&self, port: u16, key: &str) -> Result<Value> {
        self.get_json(port, &format!("/read/{}", encode_key(key))).await
    }
}
