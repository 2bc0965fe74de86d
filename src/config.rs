use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SHARED_DIR: &str = "/share/phylactery";
pub const DEFAULT_PORT: u16 = 9999;
pub const DEFAULT_INTERFACE: &str = "net0";

/// Everything the coordinator needs, built once at startup and handed to
/// each component through the `From` conversions below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub shared_dir: PathBuf,
    pub port: u16,
    pub interface: String,
    /// Overrides the OS hostname.
    pub hostname: Option<String>,
    /// Overrides the address looked up on `interface`.
    pub address: Option<Ipv4Addr>,

    pub base_config: PathBuf,
    pub rendered_config: PathBuf,
    pub install_config: PathBuf,
    pub service_unit: String,

    pub etcd_cert: PathBuf,
    pub etcd_key: PathBuf,
    pub etcd_ca: PathBuf,
    pub kubeconfig: PathBuf,
    pub ready_marker: PathBuf,

    pub notify_timeout_ms: u64,
    pub command_timeout_ms: u64,

    pub systemctl: String,
    pub etcdctl: String,
    pub kubectl: String,
}

impl Config {
    /// Defaults for a node whose shared storage is mounted at `shared_dir`.
    pub fn new(shared_dir: impl Into<PathBuf>) -> Self {
        let shared_dir = shared_dir.into();
        Self {
            base_config: shared_dir.join("haproxy.cfg.base"),
            rendered_config: shared_dir.join("haproxy.cfg"),
            shared_dir,
            port: DEFAULT_PORT,
            interface: DEFAULT_INTERFACE.to_string(),
            hostname: None,
            address: None,
            install_config: PathBuf::from("/etc/haproxy/haproxy.cfg"),
            service_unit: "haproxy".to_string(),
            etcd_cert: PathBuf::from("/share/pki/etcd/server.crt"),
            etcd_key: PathBuf::from("/share/pki/etcd/server.key"),
            etcd_ca: PathBuf::from("/share/pki/etcd/ca.crt"),
            kubeconfig: PathBuf::from("/share/kube.config"),
            ready_marker: PathBuf::from("/root/phylactery_ready"),
            notify_timeout_ms: 5_000,
            command_timeout_ms: 120_000,
            systemctl: "systemctl".to_string(),
            etcdctl: "etcdctl".to_string(),
            kubectl: "kubectl".to_string(),
        }
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_SHARED_DIR)
    }
}

impl From<Config> for storage::Config {
    fn from(config: Config) -> Self {
        storage::Config {
            shared_dir: config.shared_dir,
            base_config: config.base_config,
            rendered_config: config.rendered_config,
            ready_marker: config.ready_marker,
        }
    }
}

impl From<Config> for network::Config {
    fn from(config: Config) -> Self {
        network::Config {
            port: config.port,
            notify_timeout: config.notify_timeout(),
        }
    }
}

impl From<Config> for consensus::Config {
    fn from(config: Config) -> Self {
        consensus::Config {
            etcd: consensus::EtcdConfig {
                etcdctl: config.etcdctl,
                cert: config.etcd_cert,
                key: config.etcd_key,
                ca: config.etcd_ca,
            },
            kube: consensus::KubeConfig {
                kubectl: config.kubectl,
                kubeconfig: config.kubeconfig,
            },
        }
    }
}

impl From<Config> for api::Config {
    fn from(config: Config) -> Self {
        api::Config::new(config.port)
    }
}
