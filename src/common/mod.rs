//! Common utilities and types shared across kvconsole

pub mod config;
pub mod error;
pub mod utils;

pub use config::{ConsoleConfig, MAX_NODE_PORT, MIN_NODE_PORT};
pub use error::{Error, Result};
pub use utils::{encode_key, parse_duration};
