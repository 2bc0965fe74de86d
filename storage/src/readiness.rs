use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs::OpenOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    Created,
    AlreadyPresent,
    Failed,
}

/// Empty sentinel file the bootstrap installer waits for.
#[derive(Debug, Clone)]
pub struct ReadinessMarker {
    path: PathBuf,
}

impl ReadinessMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Idempotent. Errors are logged only: the installer has its own timeout.
    pub async fn mark(&self) -> MarkOutcome {
        let created = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .await;

        match created {
            Ok(_) => {
                tracing::info!("Created readiness marker {:?}", self.path);
                MarkOutcome::Created
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::debug!("Readiness marker {:?} already present", self.path);
                MarkOutcome::AlreadyPresent
            }
            Err(e) => {
                tracing::error!("Failed to create readiness marker {:?}: {}", self.path, e);
                MarkOutcome::Failed
            }
        }
    }
}
