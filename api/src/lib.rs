mod error;
mod handlers;
mod queue;
mod server;

pub use error::{ApiError, ApiResult};
pub use queue::{Activate, ActivationOutcome, ActivationQueue, ActivationReport};
pub use server::{router, Server};

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bind_ip: IpAddr,
    pub port: u16,
    /// Triggers allowed to wait for the activation worker before senders
    /// are held back.
    pub queue_depth: usize,
}

impl Config {
    pub fn new(port: u16) -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port,
            queue_depth: 64,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_ip, self.port)
    }
}
