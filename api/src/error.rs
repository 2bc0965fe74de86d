use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Failed to bind to {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(std::io::Error),

    #[error("Activation worker has stopped")]
    WorkerStopped,
}
