//! Where log lines come from

use crate::common::{Error, Result};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::{future, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Live sequence of log lines; ends when the node closes the stream
pub type LineStream = BoxStream<'static, Result<String>>;

#[async_trait]
pub trait LogSource: Send + Sync {
    /// Complete the stream handshake for `port`
    async fn open(&self, port: u16) -> Result<LineStream>;
}

/// Node log streams over WebSocket at `ws://{host}:{port}/ws/logs/{port}`
#[derive(Debug, Clone)]
pub struct WsLogSource {
    host: String,
}

impl WsLogSource {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    pub fn url(&self, port: u16) -> String {
        format!("ws://{}:{}/ws/logs/{}", self.host, port, port)
    }
}

#[async_trait]
impl LogSource for WsLogSource {
    async fn open(&self, port: u16) -> Result<LineStream> {
        let url = self.url(port);
        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::NodeUnreachable {
                port,
                reason: format!("WebSocket connect failed: {e}"),
            })?;
        tracing::debug!("Log stream opened on {}", url);

        let lines = ws_stream.filter_map(move |msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(Ok(trim_line(text.as_str()))),
                Ok(Message::Binary(data)) => Some(Ok(trim_line(&String::from_utf8_lossy(&data)))),
                // close frames end the stream; ping/pong are handled by tungstenite
                Ok(_) => None,
                Err(e) => {
                    tracing::debug!("Log stream {} error: {}", port, e);
                    Some(Err(Error::StreamClosed(port)))
                }
            })
        });

        Ok(lines.boxed())
    }
}

/// Nodes send lines with their trailing newline
fn trim_line(line: &str) -> String {
    line.trim_end_matches(['\r', '\n']).to_string()
}
