pub mod control;
pub mod data_stream;
pub mod pasv;

pub use control::ControlChannel;
pub use data_stream::DataStream;

use crate::constants::{DEFAULT_PORT, DEFAULT_TIMEOUT_SECS};
use std::time::Duration;

/// Where and how to reach the server. Held by the disconnected session until
/// the next login and carried over by the connected one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub server: String,
    pub port: u16,
    pub timeout: Duration,
}

impl Endpoint {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            port: DEFAULT_PORT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
