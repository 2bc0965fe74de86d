use serde::Deserialize;
use std::sync::Arc;
use system::{CommandRunner, CommandSpec, NodeIdentity};

use crate::{credential_present, KubeConfig, Result};

#[derive(Debug, Deserialize)]
struct NodeList {
    #[serde(default)]
    items: Vec<NodeItem>,
}

#[derive(Debug, Deserialize)]
struct NodeItem {
    metadata: NodeMetadata,
}

#[derive(Debug, Deserialize)]
struct NodeMetadata {
    name: String,
}

pub fn parse_node_names(json: &str) -> Result<Vec<String>> {
    let list: NodeList = serde_json::from_str(json)?;
    Ok(list.items.into_iter().map(|item| item.metadata.name).collect())
}

/// Result of asking the orchestrator for its node registry. `Unavailable`
/// means the registry could not be read and nothing may be inferred from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeListing {
    Listed(Vec<String>),
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorRepair {
    /// No kubeconfig yet: the cluster is not up.
    NotReady,
    ListUnavailable,
    NotRegistered,
    Evicted { drained: bool, deleted: bool },
}

/// Drains and deletes a node record left behind by this host's previous life.
#[derive(Clone)]
pub struct OrchestratorRepairer {
    config: KubeConfig,
    runner: Arc<dyn CommandRunner>,
}

impl OrchestratorRepairer {
    pub fn new(config: KubeConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }

    fn kubectl(&self) -> CommandSpec {
        CommandSpec::new(&self.config.kubectl)
            .arg("--kubeconfig")
            .arg(self.config.kubeconfig.display().to_string())
    }

    pub async fn list_nodes(&self) -> NodeListing {
        let command = self.kubectl().args(["get", "nodes", "-o", "json"]);

        let names = match self.runner.run_checked(&command).await {
            Ok(output) => parse_node_names(&output.stdout),
            Err(e) => Err(e.into()),
        };

        match names {
            Ok(names) => {
                tracing::debug!("Orchestrator nodes: {:?}", names);
                NodeListing::Listed(names)
            }
            Err(e) => {
                tracing::error!("Failed to get nodes via kubectl: {}", e);
                NodeListing::Unavailable
            }
        }
    }

    pub async fn drain(&self, hostname: &str) -> Result<()> {
        let command = self.kubectl().args([
            "drain",
            hostname,
            "--delete-emptydir-data",
            "--force",
            "--ignore-daemonsets",
        ]);
        self.runner.run_checked(&command).await?;
        Ok(())
    }

    pub async fn delete(&self, hostname: &str) -> Result<()> {
        let command = self.kubectl().args(["delete", "node", hostname]);
        self.runner.run_checked(&command).await?;
        Ok(())
    }

    pub async fn repair(&self, identity: &NodeIdentity) -> OrchestratorRepair {
        if !credential_present(&self.config.kubeconfig).await {
            tracing::info!("No kubeconfig at {:?}, cluster must not be ready; skipping node check", self.config.kubeconfig);
            return OrchestratorRepair::NotReady;
        }

        let names = match self.list_nodes().await {
            NodeListing::Listed(names) => names,
            NodeListing::Unavailable => {
                tracing::warn!("Node registry unavailable; skipping orchestrator repair");
                return OrchestratorRepair::ListUnavailable;
            }
        };

        let hostname = identity.hostname.as_str();
        if !names.iter().any(|name| name == hostname) {
            tracing::info!("{} is not registered with the orchestrator", hostname);
            return OrchestratorRepair::NotRegistered;
        }

        tracing::info!("Removing {} from the orchestrator before rejoining", hostname);

        let drained = match self.drain(hostname).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to drain node {}: {}", hostname, e);
                false
            }
        };

        let deleted = match self.delete(hostname).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to delete node {}: {}", hostname, e);
                false
            }
        };

        OrchestratorRepair::Evicted { drained, deleted }
    }
}
