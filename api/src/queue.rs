use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{ApiError, ApiResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    Activated,
    /// The rendered config could not be installed; the service was left alone.
    CopyFailed(String),
    RestartFailed(String),
}

#[derive(Debug, Clone)]
pub struct ActivationReport {
    pub outcome: ActivationOutcome,
    pub completed_at: DateTime<Utc>,
}

impl ActivationReport {
    pub fn now(outcome: ActivationOutcome) -> Self {
        Self {
            outcome,
            completed_at: Utc::now(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == ActivationOutcome::Activated
    }
}

/// Installs the latest rendered config and restarts the load balancer.
/// Failures are reported in the returned report, never raised.
#[async_trait]
pub trait Activate: Send + Sync + 'static {
    async fn activate(&self) -> ActivationReport;
}

struct Job {
    id: Uuid,
    reply: oneshot::Sender<ActivationReport>,
}

/// Serialises activations through one worker task: at most one activation
/// runs at a time and queued requests are served in arrival order, one
/// activation each.
#[derive(Clone)]
pub struct ActivationQueue {
    sender: mpsc::Sender<Job>,
}

impl ActivationQueue {
    pub fn spawn(activator: Arc<dyn Activate>, depth: usize) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(depth.max(1));
        let worker = tokio::spawn(run_worker(activator, receiver));
        (Self { sender }, worker)
    }

    /// Queues one activation under a fresh id and waits for it.
    pub async fn run(&self) -> ApiResult<ActivationReport> {
        self.submit(Uuid::new_v4()).await
    }

    /// Queues one activation and waits for it to finish. If the caller stops
    /// waiting, the queued activation still runs.
    pub async fn submit(&self, id: Uuid) -> ApiResult<ActivationReport> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Job { id, reply })
            .await
            .map_err(|_| ApiError::WorkerStopped)?;
        response.await.map_err(|_| ApiError::WorkerStopped)
    }
}

async fn run_worker(activator: Arc<dyn Activate>, mut receiver: mpsc::Receiver<Job>) {
    while let Some(job) = receiver.recv().await {
        tracing::debug!("Activation {} started", job.id);
        let report = activator.activate().await;

        match &report.outcome {
            ActivationOutcome::Activated => tracing::info!("Activation {} completed", job.id),
            failed => tracing::warn!("Activation {} failed: {:?}", job.id, failed),
        }

        if job.reply.send(report).is_err() {
            tracing::debug!("Requester of activation {} went away", job.id);
        }
    }

    tracing::info!("Activation worker stopped");
}
