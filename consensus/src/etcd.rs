use serde::Deserialize;
use std::sync::Arc;
use storage::PeerSet;
use system::{CommandRunner, CommandSpec, NodeIdentity};
use url::Url;

use crate::{credential_present, EtcdConfig, Result};

pub const ETCD_CLIENT_PORT: u16 = 2379;

/// One entry of `etcdctl -w json member list`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EtcdMember {
    #[serde(rename = "ID")]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "clientURLs", default)]
    pub client_urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MemberList {
    #[serde(default)]
    members: Vec<EtcdMember>,
}

impl EtcdMember {
    /// True when one of the client URLs points at exactly `address` on the
    /// etcd client port. `10.0.0.1` does not match `https://10.0.0.10:2379`.
    pub fn serves(&self, address: &str) -> bool {
        self.client_urls.iter().any(|raw| match Url::parse(raw) {
            Ok(url) => {
                url.host_str() == Some(address) && url.port_or_known_default() == Some(ETCD_CLIENT_PORT)
            }
            Err(e) => {
                tracing::warn!("Ignoring unparsable client URL {:?} of member {:x}: {}", raw, self.id, e);
                false
            }
        })
    }

    /// etcdctl takes member ids in hexadecimal.
    pub fn hex_id(&self) -> String {
        format!("{:x}", self.id)
    }
}

pub fn parse_member_list(json: &str) -> Result<Vec<EtcdMember>> {
    let list: MemberList = serde_json::from_str(json)?;
    Ok(list.members)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtcdRepair {
    /// No client certificate yet: there is no etcd cluster to repair.
    NotBootstrapped,
    ListFailed,
    NotMember,
    Removed { id: u64 },
    RemoveFailed { id: u64 },
}

/// Removes this node's stale etcd membership so it can rejoin as a new member.
#[derive(Clone)]
pub struct EtcdRepairer {
    config: EtcdConfig,
    runner: Arc<dyn CommandRunner>,
}

impl EtcdRepairer {
    pub fn new(config: EtcdConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }

    pub fn endpoints(peers: &PeerSet) -> String {
        peers
            .iter()
            .map(|peer| format!("{}:{}", peer.address, ETCD_CLIENT_PORT))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn etcdctl(&self, endpoints: &str) -> CommandSpec {
        CommandSpec::new(&self.config.etcdctl)
            .args(["--endpoints", endpoints])
            .arg(format!("--cert={}", self.config.cert.display()))
            .arg(format!("--key={}", self.config.key.display()))
            .arg(format!("--cacert={}", self.config.ca.display()))
            .args(["-w", "json"])
    }

    pub async fn list_members(&self, endpoints: &str) -> Result<Vec<EtcdMember>> {
        let command = self.etcdctl(endpoints).args(["member", "list"]);
        let output = self.runner.run_checked(&command).await?;
        tracing::debug!("etcd member list: {}", output.stdout.trim_end());
        parse_member_list(&output.stdout)
    }

    pub async fn remove_member(&self, endpoints: &str, member: &EtcdMember) -> Result<()> {
        let command = self
            .etcdctl(endpoints)
            .args(["member", "remove"])
            .arg(member.hex_id());
        let output = self.runner.run_checked(&command).await?;
        tracing::info!("etcd member remove: {}", output.stdout.trim_end());
        Ok(())
    }

    pub async fn repair(&self, identity: &NodeIdentity, peers: &PeerSet) -> EtcdRepair {
        let endpoints = Self::endpoints(peers);
        tracing::info!("Using etcd endpoints {}", endpoints);

        if !credential_present(&self.config.cert).await {
            tracing::info!("No etcd client certificate at {:?}, cluster not bootstrapped yet; skipping etcd check", self.config.cert);
            return EtcdRepair::NotBootstrapped;
        }

        let members = match self.list_members(&endpoints).await {
            Ok(members) => members,
            Err(e) => {
                tracing::error!("Failed to get etcd member list: {}", e);
                return EtcdRepair::ListFailed;
            }
        };

        let address = identity.address.to_string();
        let Some(stale) = members.iter().find(|m| m.serves(&address)) else {
            tracing::info!("{} is not an etcd member", address);
            return EtcdRepair::NotMember;
        };

        tracing::info!("Removing stale etcd member {} ({})", stale.hex_id(), stale.name);
        match self.remove_member(&endpoints, stale).await {
            Ok(()) => EtcdRepair::Removed { id: stale.id },
            Err(e) => {
                tracing::error!("Failed to remove etcd member {}: {}", stale.hex_id(), e);
                EtcdRepair::RemoveFailed { id: stale.id }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::path::Path;
    use storage::Announcement;
    use system::testing::ScriptedRunner;
    use system::CommandOutput;

    const MEMBERS: &str = r#"{
        "header": {"cluster_id": 17237436991929493444, "member_id": 9372538179322589801, "raft_term": 4},
        "members": [
            {"ID": 305441741, "name": "node1", "peerURLs": ["https://10.0.0.1:2380"], "clientURLs": ["https://10.0.0.1:2379"]},
            {"ID": 4022250974, "name": "node10", "peerURLs": ["https://10.0.0.10:2380"], "clientURLs": ["https://10.0.0.10:2379"]},
            {"ID": 11259375, "name": "node2", "peerURLs": ["https://10.0.0.2:2380"], "clientURLs": ["https://10.0.0.2:2379"]}
        ]
    }"#;

    fn config(pki: &Path) -> EtcdConfig {
        EtcdConfig {
            etcdctl: "etcdctl".to_string(),
            cert: pki.join("server.crt"),
            key: pki.join("server.key"),
            ca: pki.join("ca.crt"),
        }
    }

    fn peers() -> PeerSet {
        PeerSet::new(vec![
            Announcement::new("node1", "10.0.0.1"),
            Announcement::new("node2", "10.0.0.2"),
        ])
    }

    fn node(address: [u8; 4]) -> NodeIdentity {
        let [a, b, c, d] = address;
        NodeIdentity::new("node", Ipv4Addr::new(a, b, c, d))
    }

    #[test]
    fn parses_member_list() {
        let members = parse_member_list(MEMBERS).unwrap();
        assert_eq!(members.len(), 3);
        assert_eq!(members[0].id, 305441741);
        assert_eq!(members[0].hex_id(), "1234abcd");
        assert_eq!(members[2].client_urls, vec!["https://10.0.0.2:2379".to_string()]);
    }

    #[test]
    fn member_without_client_urls_parses() {
        let members = parse_member_list(r#"{"members":[{"ID":1,"name":"","peerURLs":["http://10.0.0.9:2380"],"isLearner":true}]}"#).unwrap();
        assert!(members[0].client_urls.is_empty());
        assert!(!members[0].serves("10.0.0.9"));
    }

    #[test]
    fn serves_compares_host_and_port_exactly() {
        let member = EtcdMember {
            id: 1,
            name: "node1".to_string(),
            client_urls: vec!["https://10.0.0.10:2379".to_string()],
        };
        assert!(member.serves("10.0.0.10"));
        assert!(!member.serves("10.0.0.1"));

        let other_port = EtcdMember {
            client_urls: vec!["https://10.0.0.1:4001".to_string(), "not a url".to_string()],
            ..member
        };
        assert!(!other_port.serves("10.0.0.1"));
    }

    #[test]
    fn endpoints_cover_every_peer() {
        assert_eq!(EtcdRepairer::endpoints(&peers()), "10.0.0.1:2379,10.0.0.2:2379");
    }

    #[tokio::test]
    async fn skips_without_certificate() {
        let pki = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let repairer = EtcdRepairer::new(config(pki.path()), runner.clone());

        let outcome = repairer.repair(&node([10, 0, 0, 1]), &peers()).await;

        assert_eq!(outcome, EtcdRepair::NotBootstrapped);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn removes_exactly_the_matching_member() {
        let pki = tempfile::tempdir().unwrap();
        std::fs::write(pki.path().join("server.crt"), "cert").unwrap();
        let runner = Arc::new(
            ScriptedRunner::new().on("etcdctl", &["member", "list"], CommandOutput::ok(MEMBERS)),
        );
        let repairer = EtcdRepairer::new(config(pki.path()), runner.clone());

        let outcome = repairer.repair(&node([10, 0, 0, 1]), &peers()).await;

        assert_eq!(outcome, EtcdRepair::Removed { id: 305441741 });
        let calls = runner.calls_to("etcdctl");
        assert_eq!(calls.len(), 2);

        let list = &calls[0];
        assert_eq!(
            list.args,
            vec![
                "--endpoints".to_string(),
                "10.0.0.1:2379,10.0.0.2:2379".to_string(),
                format!("--cert={}", pki.path().join("server.crt").display()),
                format!("--key={}", pki.path().join("server.key").display()),
                format!("--cacert={}", pki.path().join("ca.crt").display()),
                "-w".to_string(),
                "json".to_string(),
                "member".to_string(),
                "list".to_string(),
            ]
        );

        let remove = &calls[1];
        assert!(remove.has_args(&["member", "remove"]));
        assert_eq!(remove.args.last().map(String::as_str), Some("1234abcd"));
    }

    #[tokio::test]
    async fn not_a_member_issues_no_remove() {
        let pki = tempfile::tempdir().unwrap();
        std::fs::write(pki.path().join("server.crt"), "cert").unwrap();
        let runner = Arc::new(
            ScriptedRunner::new().on("etcdctl", &["member", "list"], CommandOutput::ok(MEMBERS)),
        );
        let repairer = EtcdRepairer::new(config(pki.path()), runner.clone());

        let outcome = repairer.repair(&node([10, 0, 0, 3]), &peers()).await;

        assert_eq!(outcome, EtcdRepair::NotMember);
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn list_failures_abandon_the_repair() {
        let pki = tempfile::tempdir().unwrap();
        std::fs::write(pki.path().join("server.crt"), "cert").unwrap();

        for runner in [
            ScriptedRunner::new().on("etcdctl", &["list"], CommandOutput::failed(1, "context deadline exceeded")),
            ScriptedRunner::new().on("etcdctl", &["list"], CommandOutput::ok("not json")),
            ScriptedRunner::new().on_timeout("etcdctl", &["list"]),
            ScriptedRunner::new().on_spawn_failure("etcdctl", &["list"]),
        ] {
            let runner = Arc::new(runner);
            let repairer = EtcdRepairer::new(config(pki.path()), runner.clone());

            let outcome = repairer.repair(&node([10, 0, 0, 1]), &peers()).await;

            assert_eq!(outcome, EtcdRepair::ListFailed);
            assert_eq!(runner.calls().len(), 1);
        }
    }

    #[tokio::test]
    async fn remove_failure_is_reported() {
        let pki = tempfile::tempdir().unwrap();
        std::fs::write(pki.path().join("server.crt"), "cert").unwrap();
        let runner = Arc::new(
            ScriptedRunner::new()
                .on("etcdctl", &["member", "list"], CommandOutput::ok(MEMBERS))
                .on("etcdctl", &["member", "remove"], CommandOutput::failed(1, "member not found")),
        );
        let repairer = EtcdRepairer::new(config(pki.path()), runner.clone());

        let outcome = repairer.repair(&node([10, 0, 0, 2]), &peers()).await;

        assert_eq!(outcome, EtcdRepair::RemoveFailed { id: 11259375 });
        assert_eq!(runner.calls().len(), 2);
    }
}
