//! HTTP clients for the external collaborators
//!
//! - [`NodeApi`]: the per-node surface (`/metrics`, `/dump`, `/read`, `/write`)
//! - [`ControlPlane`]: the service that starts and kills node processes
//!
//! Both are traits so the coordination logic can run against in-memory
//! fakes in tests.

pub mod control;
pub mod node;

pub use control::{ControlPlane, HttpControlPlane, KillResponse, NodeRecord, StartRequest};
pub use node::{HttpNodeClient, NodeApi};

use crate::common::Result;
use std::time::Duration;

/// Build the shared reqwest client used by every HTTP transport
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()?;
    Ok(client)
}
