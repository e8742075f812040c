//! Client for the control-plane service that owns node processes

use crate::cluster::NodeRole;
use crate::common::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Body of `POST /nodes/start`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    pub role: NodeRole,
    pub port: u16,
    pub peers: Vec<u16>,
}

/// A node as reported by the control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub port: u16,
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Body returned by `POST /nodes/kill`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillResponse {
    pub status: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub msg: Option<String>,
}

impl KillResponse {
    /// The control plane answers 200 with `status: "failed"` for unknown ports
    pub fn is_failure(&self) -> bool {
        self.status == "failed"
    }
}

#[derive(Debug, Deserialize)]
struct NodeList {
    nodes: Vec<NodeRecord>,
}

#[derive(Debug, Serialize)]
struct KillRequest {
    port: u16,
}

/// Control-plane operations. Failures surface as [`Error::LifecycleUnavailable`].
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// `GET /nodes`
    async fn list_nodes(&self) -> Result<Vec<NodeRecord>>;

    /// `POST /nodes/start`
    async fn start_node(&self, request: &StartRequest) -> Result<NodeRecord>;

    /// `POST /nodes/kill`
    async fn kill_node(&self, port: u16) -> Result<KillResponse>;
}

/// reqwest-backed [`ControlPlane`]
#[derive(Debug, Clone)]
pub struct HttpControlPlane {
    http: reqwest::Client,
    base_url: String,
}

impl HttpControlPlane {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn unavailable(err: impl std::fmt::Display) -> Error {
    Error::LifecycleUnavailable(err.to_string())
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn list_nodes(&self) -> Result<Vec<NodeRecord>> {
        let list: NodeList = self
            .http
            .get(self.url("/nodes"))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(unavailable)?
            .json()
            .await
            .map_err(unavailable)?;
        Ok(list.nodes)
    }

    async fn start_node(&self, request: &StartRequest) -> Result<NodeRecord> {
        self.http
            .post(self.url("/nodes/start"))
            .json(request)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(unavailable)?
            .json()
            .await
            .map_err(unavailable)
    }

    async fn kill_node(&self, port: u16) -> Result<KillResponse> {
        self.http
            .post(self.url("/nodes/kill"))
            .json(&KillRequest { port })
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(unavailable)?
            .json()
            .await
            .map_err(unavailable)
    }
}
