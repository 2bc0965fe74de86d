mod etcd;
mod orchestrator;
mod reconciler;

pub use etcd::{EtcdMember, EtcdRepair, EtcdRepairer, ETCD_CLIENT_PORT};
pub use orchestrator::{NodeListing, OrchestratorRepair, OrchestratorRepairer};
pub use reconciler::{MembershipReconciler, RepairReport};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// etcd client credentials. The certificate doubles as the "cluster has been
/// bootstrapped" gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtcdConfig {
    pub etcdctl: String,
    pub cert: PathBuf,
    pub key: PathBuf,
    pub ca: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubeConfig {
    pub kubectl: String,
    /// Also the "cluster is ready" gate.
    pub kubeconfig: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub etcd: EtcdConfig,
    pub kube: KubeConfig,
}

pub type Result<T> = std::result::Result<T, ConsensusError>;

#[derive(Debug, thiserror::Error)]
pub enum ConsensusError {
    #[error("Command error: {0}")]
    Command(#[from] system::SystemError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Credential files gate the repairs; an unreadable path counts as absent.
pub(crate) async fn credential_present(path: &std::path::Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
