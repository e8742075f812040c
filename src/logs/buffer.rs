//! Bounded rolling buffer of classified log lines

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Display severity, picked by substring match in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warn,
    Info,
    Plain,
}

impl Severity {
    pub fn classify(line: &str) -> Self {
        if line.contains("ERROR") {
            Severity::Error
        } else if line.contains("WARN") {
            Severity::Warn
        } else if line.contains("INFO") {
            Severity::Info
        } else {
            Severity::Plain
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warn => write!(f, "warn"),
            Severity::Info => write!(f, "info"),
            Severity::Plain => write!(f, "-"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogLine {
    /// Node the line came from
    pub port: u16,
    pub text: String,
    pub severity: Severity,
    pub received_at: DateTime<Utc>,
}

impl LogLine {
    pub fn new(port: u16, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            port,
            severity: Severity::classify(&text),
            text,
            received_at: Utc::now(),
        }
    }
}

/// Most recent `capacity` lines, oldest first
#[derive(Debug, Clone)]
pub struct LogBuffer {
    lines: VecDeque<LogLine>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append, then evict the oldest lines beyond capacity
    pub fn push(&mut self, line: LogLine) {
        self.lines.push_back(line);
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogLine> {
        self.lines.iter()
    }

    pub fn to_vec(&self) -> Vec<LogLine> {
        self.lines.iter().cloned().collect()
    }
}
