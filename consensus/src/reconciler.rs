use std::sync::Arc;
use storage::PeerSet;
use system::{CommandRunner, NodeIdentity};

use crate::{Config, EtcdRepair, EtcdRepairer, OrchestratorRepair, OrchestratorRepairer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairReport {
    pub etcd: EtcdRepair,
    pub orchestrator: OrchestratorRepair,
}

/// Clears records left by a previous incarnation of this node in etcd and in
/// the orchestrator's node registry. The two repairs are independent; neither
/// outcome affects whether the other runs.
#[derive(Clone)]
pub struct MembershipReconciler {
    etcd: EtcdRepairer,
    orchestrator: OrchestratorRepairer,
}

impl MembershipReconciler {
    pub fn new(config: Config, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            etcd: EtcdRepairer::new(config.etcd, runner.clone()),
            orchestrator: OrchestratorRepairer::new(config.kube, runner),
        }
    }

    pub async fn repair(&self, identity: &NodeIdentity, peers: &PeerSet) -> RepairReport {
        let etcd = self.etcd.repair(identity, peers).await;
        let orchestrator = self.orchestrator.repair(identity).await;

        let report = RepairReport { etcd, orchestrator };
        tracing::info!("Membership repair finished: {:?}", report);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EtcdConfig, KubeConfig};
    use std::net::Ipv4Addr;
    use std::path::Path;
    use storage::Announcement;
    use system::testing::ScriptedRunner;
    use system::CommandOutput;

    fn config(dir: &Path) -> Config {
        Config {
            etcd: EtcdConfig {
                etcdctl: "etcdctl".to_string(),
                cert: dir.join("server.crt"),
                key: dir.join("server.key"),
                ca: dir.join("ca.crt"),
            },
            kube: KubeConfig {
                kubectl: "kubectl".to_string(),
                kubeconfig: dir.join("kube.config"),
            },
        }
    }

    #[tokio::test]
    async fn fresh_cluster_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let reconciler = MembershipReconciler::new(config(dir.path()), runner.clone());
        let me = NodeIdentity::new("node1", Ipv4Addr::new(10, 0, 0, 1));
        let peers = PeerSet::new(vec![Announcement::from(&me)]);

        let report = reconciler.repair(&me, &peers).await;

        assert_eq!(
            report,
            RepairReport {
                etcd: EtcdRepair::NotBootstrapped,
                orchestrator: OrchestratorRepair::NotReady,
            }
        );
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn etcd_failure_does_not_block_orchestrator_repair() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("server.crt"), "cert").unwrap();
        std::fs::write(dir.path().join("kube.config"), "kube").unwrap();
        let runner = Arc::new(
            ScriptedRunner::new()
                .on("etcdctl", &["member", "list"], CommandOutput::failed(1, "no leader"))
                .on(
                    "kubectl",
                    &["get", "nodes"],
                    CommandOutput::ok(r#"{"items":[{"metadata":{"name":"node1"}}]}"#),
                ),
        );
        let reconciler = MembershipReconciler::new(config(dir.path()), runner.clone());
        let me = NodeIdentity::new("node1", Ipv4Addr::new(10, 0, 0, 1));
        let peers = PeerSet::new(vec![Announcement::from(&me)]);

        let report = reconciler.repair(&me, &peers).await;

        assert_eq!(report.etcd, EtcdRepair::ListFailed);
        assert_eq!(
            report.orchestrator,
            OrchestratorRepair::Evicted { drained: true, deleted: true }
        );
        assert_eq!(runner.calls_to("kubectl").len(), 3);
    }
}
