use futures::future::join_all;
use storage::{Announcement, PeerSet};
use system::NodeIdentity;

use crate::{Config, NetworkError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Asks peers to re-activate their load-balancer config.
#[derive(Debug, Clone)]
pub struct PeerNotifier {
    client: reqwest::Client,
    port: u16,
}

impl PeerNotifier {
    pub fn new(config: Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.notify_timeout)
            .build()
            .map_err(|e| NetworkError::Client(e.to_string()))?;

        Ok(Self {
            client,
            port: config.port,
        })
    }

    pub fn trigger_url(&self, peer: &Announcement) -> String {
        format!("http://{}:{}/", peer.address, self.port)
    }

    pub async fn notify(&self, peer: &Announcement) -> Result<()> {
        let url = self.trigger_url(peer);
        tracing::info!("Sending trigger to {} ({}:{})", peer.hostname, peer.address, self.port);

        self.client.get(&url).send().await?.error_for_status()?;
        Ok(())
    }

    /// Notifies every peer except `local` concurrently. A peer that fails is
    /// logged and counted; it never stops the others.
    pub async fn broadcast(&self, peers: &PeerSet, local: &NodeIdentity) -> BroadcastSummary {
        let targets: Vec<&Announcement> = peers.others(local).collect();

        let results = join_all(targets.iter().map(|peer| async move {
            let result = self.notify(peer).await;
            if let Err(e) = &result {
                tracing::error!(
                    "Failed to send trigger to {} ({}:{}): {}",
                    peer.hostname,
                    peer.address,
                    self.port,
                    e
                );
            }
            result
        }))
        .await;

        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        let summary = BroadcastSummary {
            attempted: targets.len(),
            succeeded,
            failed: targets.len() - succeeded,
        };

        tracing::info!(
            "Trigger broadcast finished: {}/{} peers reached",
            summary.succeeded,
            summary.attempted
        );
        summary
    }
}
