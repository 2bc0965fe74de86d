mod command;
mod identity;
mod service;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use command::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
pub use identity::{interface_ipv4, local_hostname, NodeIdentity};
pub use service::ServiceManager;

use std::time::Duration;

pub type Result<T> = std::result::Result<T, SystemError>;

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {after:?}")]
    Timeout { command: String, after: Duration },

    #[error("`{command}` exited with status {status:?}: {output}")]
    CommandFailed {
        command: String,
        status: Option<i32>,
        output: String,
    },

    #[error("No IPv4 address found on interface {0}")]
    InterfaceNotFound(String),
}
