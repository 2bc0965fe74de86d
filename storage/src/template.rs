use std::path::PathBuf;
use tokio::fs;

use crate::{Announcement, PeerSet, Result, StorageError};

/// Port the load balancer forwards to on every control-plane node.
pub const BACKEND_PORT: u16 = 6443;

pub fn server_line(peer: &Announcement) -> String {
    format!(
        "    server {} {}:{} check verify none\n",
        peer.hostname, peer.address, BACKEND_PORT
    )
}

/// Base template followed by one backend line per peer, in peer-set order.
/// Peer values are not validated and land in the output verbatim.
pub fn render(template: &str, peers: &PeerSet) -> String {
    let mut config = String::with_capacity(template.len() + peers.len() * 64);
    config.push_str(template);
    for peer in peers {
        config.push_str(&server_line(peer));
    }
    config
}

/// Renders the load-balancer config from the shared base template into the
/// shared rendered-config path.
#[derive(Debug, Clone)]
pub struct ConfigGenerator {
    base_config: PathBuf,
    rendered_config: PathBuf,
}

impl ConfigGenerator {
    pub fn new(base_config: impl Into<PathBuf>, rendered_config: impl Into<PathBuf>) -> Self {
        Self {
            base_config: base_config.into(),
            rendered_config: rendered_config.into(),
        }
    }

    pub async fn generate(&self, peers: &PeerSet) -> Result<String> {
        let template = fs::read_to_string(&self.base_config)
            .await
            .map_err(|source| StorageError::Template {
                path: self.base_config.clone(),
                source,
            })?;

        let config = render(&template, peers);

        fs::write(&self.rendered_config, &config)
            .await
            .map_err(|source| StorageError::Render {
                path: self.rendered_config.clone(),
                source,
            })?;

        tracing::info!(
            "Rendered {:?} with {} backend servers",
            self.rendered_config,
            peers.len()
        );
        Ok(config)
    }
}
