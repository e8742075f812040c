//! Live node log tailing

pub mod buffer;
pub mod manager;
pub mod source;

pub use buffer::{LogBuffer, LogLine, Severity};
pub use manager::{LogStreamManager, StreamState};
pub use source::{LineStream, LogSource, WsLogSource};
