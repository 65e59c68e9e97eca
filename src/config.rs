use std::time::Duration;

use crate::codec::DEFAULT_MAX_FRAME_SIZE;

pub const DEFAULT_LISTEN: &str = ":6379";
pub const DEFAULT_MAX_CONNECTIONS: usize = 10_000;

/// Server settings, handed to `server::run` by the caller.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Address to listen on. A missing host, as in `:6379`, means every interface.
    pub listen: String,
    /// Largest incomplete request a connection may buffer.
    pub max_frame_size: usize,
    /// Connections served at once. Further clients wait in the listen backlog.
    pub max_connections: usize,
    /// Connections silent for this long are closed.
    pub idle_timeout: Option<Duration>,
}

impl Config {
    pub fn bind_address(&self) -> String {
        if self.listen.starts_with(':') {
            format!("0.0.0.0{}", self.listen)
        } else {
            self.listen.clone()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen: DEFAULT_LISTEN.to_string(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            idle_timeout: None,
        }
    }
}
