//! Single live log subscription tied to the operator's node selection
//!
//! The manager exclusively owns at most one stream. Switching nodes cancels
//! the old pump task and waits for it to exit before the buffer is cleared and
//! the new stream is opened, so lines never leak across selections.

use crate::common::{Error, Result};
use crate::logs::buffer::{LogBuffer, LogLine};
use crate::logs::source::{LineStream, LogSource};
use futures_util::StreamExt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const LIVE_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Nothing selected
    Idle,
    /// Selected, handshake in flight
    Connecting(u16),
    /// Receiving lines
    Streaming(u16),
    /// The stream ended on its own; selection and buffer are kept, no reconnect
    Closed(u16),
}

impl StreamState {
    pub fn port(&self) -> Option<u16> {
        match *self {
            StreamState::Idle => None,
            StreamState::Connecting(port)
            | StreamState::Streaming(port)
            | StreamState::Closed(port) => Some(port),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: StreamState,
    buffer: LogBuffer,
}

struct Subscription {
    port: u16,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct LogStreamManager {
    source: Arc<dyn LogSource>,
    inner: Arc<Mutex<Inner>>,
    live: broadcast::Sender<LogLine>,
    current: Option<Subscription>,
}

impl LogStreamManager {
    pub fn new(source: Arc<dyn LogSource>, capacity: usize) -> Self {
        let (live, _) = broadcast::channel(LIVE_CHANNEL_CAPACITY);
        Self {
            source,
            inner: Arc::new(Mutex::new(Inner {
                state: StreamState::Idle,
                buffer: LogBuffer::new(capacity),
            })),
            live,
            current: None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> StreamState {
        self.lock().state
    }

    pub fn selected(&self) -> Option<u16> {
        self.state().port()
    }

    /// Buffered lines, oldest first
    pub fn snapshot(&self) -> Vec<LogLine> {
        self.lock().buffer.to_vec()
    }

    pub fn len(&self) -> usize {
        self.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().buffer.capacity()
    }

    /// Lines as they arrive, for incremental rendering
    pub fn lines(&self) -> broadcast::Receiver<LogLine> {
        self.live.subscribe()
    }

    /// Subscribe to `port`'s log, replacing any current subscription.
    ///
    /// Selecting the node that is already connecting or streaming is a no-op;
    /// selecting a node whose stream closed opens it again.
    pub async fn select(&mut self, port: u16) -> Result<StreamState> {
        match self.state() {
            state @ (StreamState::Connecting(p) | StreamState::Streaming(p)) if p == port => {
                return Ok(state)
            }
            _ => {}
        }

        self.teardown().await;
        self.lock().state = StreamState::Connecting(port);
        tracing::debug!("Opening log stream for node {}", port);

        let stream = match self.source.open(port).await {
            Ok(stream) => stream,
            Err(e) => {
                self.lock().state = StreamState::Idle;
                tracing::warn!("Failed to open log stream for node {}: {}", port, e);
                return Err(match e {
                    Error::NodeUnreachable { .. } => e,
                    other => Error::NodeUnreachable {
                        port,
                        reason: other.to_string(),
                    },
                });
            }
        };

        self.lock().state = StreamState::Streaming(port);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(pump(
            port,
            stream,
            cancel.clone(),
            self.inner.clone(),
            self.live.clone(),
        ));
        self.current = Some(Subscription { port, cancel, task });
        tracing::info!("Streaming logs from node {}", port);

        Ok(StreamState::Streaming(port))
    }

    /// Click-to-toggle: deselect `port` if it is selected, otherwise select it
    pub async fn toggle(&mut self, port: u16) -> Result<StreamState> {
        if self.selected() == Some(port) {
            self.clear().await;
            Ok(StreamState::Idle)
        } else {
            self.select(port).await
        }
    }

    /// Drop the selection: close the stream and empty the buffer
    pub async fn clear(&mut self) {
        self.teardown().await;
    }

    async fn teardown(&mut self) {
        if let Some(subscription) = self.current.take() {
            subscription.cancel.cancel();
            if let Err(e) = subscription.task.await {
                tracing::error!("Log pump for node {} failed: {}", subscription.port, e);
            }
            tracing::debug!("Closed log stream for node {}", subscription.port);
        }

        let mut inner = self.lock();
        inner.buffer.clear();
        inner.state = StreamState::Idle;
    }
}

impl Drop for LogStreamManager {
    fn drop(&mut self) {
        if let Some(subscription) = &self.current {
            subscription.cancel.cancel();
        }
    }
}

async fn pump(
    port: u16,
    mut stream: LineStream,
    cancel: CancellationToken,
    inner: Arc<Mutex<Inner>>,
    live: broadcast::Sender<LogLine>,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            next = stream.next() => match next {
                Some(Ok(text)) => {
                    let line = LogLine::new(port, text);
                    inner
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .buffer
                        .push(line.clone());
                    // no live listeners is fine
                    let _ = live.send(line);
                }
                Some(Err(e)) => {
                    tracing::warn!("Log stream for node {} failed: {}", port, e);
                    break;
                }
                None => {
                    tracing::info!("Log stream for node {} ended", port);
                    break;
                }
            }
        }
    }

    let mut guard = inner.lock().unwrap_or_else(PoisonError::into_inner);
    if guard.state == StreamState::Streaming(port) {
        guard.state = StreamState::Closed(port);
    }
}
