pub mod activator;
pub mod config;
pub mod error;
pub mod node;

pub use activator::ConfigActivator;
pub use config::Config;
pub use error::{CoordinatorError, Result};
pub use node::{Node, NodeState, StartupReport};

// Re-export key types from workspace crates
pub use api;
pub use consensus;
pub use network;
pub use storage;
pub use system;
