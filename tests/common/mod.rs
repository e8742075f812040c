//! In-memory fakes of the node surface, control plane and log streams

#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::StreamExt;
use kvconsole::client::{ControlPlane, KillResponse, NodeApi, NodeRecord, StartRequest};
use kvconsole::logs::{LineStream, LogSource};
use kvconsole::{Error, Result};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

fn unreachable(port: u16) -> Error {
    Error::NodeUnreachable {
        port,
        reason: "connection refused".into(),
    }
}

/// Metrics document as a node reports it
pub fn metrics_doc(port: u16, role: &str) -> Value {
    json!({
        "node": {"id": port, "role": role, "uptime_seconds": 1, "status": "healthy"},
        "writes": {"total": 0},
        "reads": {"total": 0},
    })
}

/// Control plane that assigns increasing pids
#[derive(Default)]
pub struct FakeControlPlane {
    pub calls: AtomicU32,
    pub down: AtomicBool,
    pub started: Mutex<Vec<StartRequest>>,
    pub killed: Mutex<Vec<u16>>,
    pub listed: Mutex<Vec<NodeRecord>>,
    /// How long `start_node` takes to answer
    pub start_delay: Mutex<Option<Duration>>,
    next_pid: AtomicU32,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self {
            next_pid: AtomicU32::new(1000),
            ..Default::default()
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(Error::LifecycleUnavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn list_nodes(&self) -> Result<Vec<NodeRecord>> {
        self.check()?;
        Ok(self.listed.lock().unwrap().clone())
    }

    async fn start_node(&self, request: &StartRequest) -> Result<NodeRecord> {
        self.check()?;
        let delay = *self.start_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.started.lock().unwrap().push(request.clone());
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let record = NodeRecord {
            port: request.port,
            pid: Some(pid),
            status: Some("started".into()),
        };
        self.listed.lock().unwrap().push(NodeRecord {
            status: None,
            ..record.clone()
        });
        Ok(record)
    }

    async fn kill_node(&self, port: u16) -> Result<KillResponse> {
        self.check()?;
        let mut listed = self.listed.lock().unwrap();
        let Some(index) = listed.iter().position(|r| r.port == port) else {
            return Ok(KillResponse {
                status: "failed".into(),
                port: None,
                pid: None,
                msg: Some(format!("Port {} does not exist", port)),
            });
        };
        let record = listed.remove(index);
        self.killed.lock().unwrap().push(port);
        Ok(KillResponse {
            status: "killed".into(),
            port: Some(port),
            pid: record.pid,
            msg: None,
        })
    }
}

/// Per-port node behaviour. Ports without metrics are unreachable.
#[derive(Default)]
pub struct FakeNodes {
    pub metrics: Mutex<HashMap<u16, Value>>,
    pub dumps: Mutex<HashMap<u16, Value>>,
    /// Values returned by `/read/{key}`; missing ports are unreachable
    pub reads: Mutex<HashMap<u16, Value>>,
    /// Ports whose `/write` fails
    pub broken_writes: Mutex<Vec<u16>>,
    /// Ports whose polls take this long
    pub slow: Mutex<HashMap<u16, Duration>>,
    /// Every call as (operation, port), in order
    pub calls: Mutex<Vec<(&'static str, u16)>>,
    pub writes: Mutex<BTreeMap<u16, (String, String)>>,
}

impl FakeNodes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn up(&self, port: u16, role: &str) {
        self.metrics
            .lock()
            .unwrap()
            .insert(port, metrics_doc(port, role));
        self.dumps
            .lock()
            .unwrap()
            .insert(port, json!({"port": port.to_string()}));
    }

    pub fn down(&self, port: u16) {
        self.metrics.lock().unwrap().remove(&port);
        self.dumps.lock().unwrap().remove(&port);
    }

    pub fn answer_read(&self, port: u16, value: Value) {
        self.reads.lock().unwrap().insert(port, value);
    }

    pub fn calls_for(&self, op: &str) -> Vec<u16> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(o, _)| *o == op)
            .map(|(_, p)| *p)
            .collect()
    }

    fn record(&self, op: &'static str, port: u16) {
        self.calls.lock().unwrap().push((op, port));
    }

    async fn delay(&self, port: u16) {
        let delay = self.slow.lock().unwrap().get(&port).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl NodeApi for FakeNodes {
    async fn metrics(&self, port: u16) -> Result<Value> {
        self.record("metrics", port);
        self.delay(port).await;
        let doc = self.metrics.lock().unwrap().get(&port).cloned();
        doc.ok_or_else(|| unreachable(port))
    }

    async fn dump(&self, port: u16) -> Result<Value> {
        self.record("dump", port);
        self.delay(port).await;
        let doc = self.dumps.lock().unwrap().get(&port).cloned();
        doc.ok_or_else(|| unreachable(port))
    }

    async fn write(&self, port: u16, key: &str, value: &str) -> Result<Value> {
        self.record("write", port);
        if self.broken_writes.lock().unwrap().contains(&port) {
            return Err(unreachable(port));
        }
        self.writes
            .lock()
            .unwrap()
            .insert(port, (key.to_string(), value.to_string()));
        Ok(Value::Bool(true))
    }

    async fn read(&self, port: u16, _key: &str) -> Result<Value> {
        self.record("read", port);
        let value = self.reads.lock().unwrap().get(&port).cloned();
        value.ok_or_else(|| unreachable(port))
    }
}

/// Log source handing out channel-backed streams
#[derive(Default)]
pub struct FakeLogSource {
    senders: Mutex<HashMap<u16, mpsc::UnboundedSender<Result<String>>>>,
    pub refused: Mutex<Vec<u16>>,
    pub opened: Mutex<Vec<u16>>,
}

impl FakeLogSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sender(&self, port: u16) -> mpsc::UnboundedSender<Result<String>> {
        self.senders
            .lock()
            .unwrap()
            .get(&port)
            .cloned()
            .expect("stream not opened")
    }

    /// Push a line; returns false once the console closed the stream
    pub fn emit(&self, port: u16, line: &str) -> bool {
        self.sender(port).send(Ok(line.to_string())).is_ok()
    }

    /// Node-side close
    pub fn hang_up(&self, port: u16) {
        self.senders.lock().unwrap().remove(&port);
    }
}

#[async_trait]
impl LogSource for FakeLogSource {
    async fn open(&self, port: u16) -> Result<LineStream> {
        if self.refused.lock().unwrap().contains(&port) {
            return Err(unreachable(port));
        }
        self.opened.lock().unwrap().push(port);
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().unwrap().insert(port, tx);
        let stream = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|line| (line, rx))
        });
        Ok(stream.boxed())
    }
}

/// Poll `cond` until it holds or a second passes
pub async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}
