use thiserror::Error;

/// Errors that stop the coordinator. Everything else is logged where it
/// happens and the startup sequence carries on.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Cannot resolve node identity: {0}")]
    Identity(#[from] system::SystemError),

    #[error("Shared storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Network error: {0}")]
    Network(#[from] network::NetworkError),

    #[error("Trigger server error: {0}")]
    Api(#[from] api::ApiError),

    #[error("Node is {0:?}, expected {1:?}")]
    InvalidState(crate::NodeState, crate::NodeState),

    #[error("Activation worker stopped unexpectedly")]
    WorkerStopped,

    #[error("Trigger server stopped unexpectedly")]
    ServerStopped,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
