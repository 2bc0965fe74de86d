use std::path::PathBuf;
use system::NodeIdentity;
use tokio::fs;

use crate::{Announcement, Result, StorageError};

/// Every announcement seen in one listing, self included, ordered by file
/// name so that config rendering is reproducible across nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerSet {
    peers: Vec<Announcement>,
}

impl PeerSet {
    /// Sorts the given announcements into discovery order.
    pub fn new(mut peers: Vec<Announcement>) -> Self {
        peers.sort_by_key(Announcement::file_name);
        peers.dedup();
        Self { peers }
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Announcement> {
        self.peers.iter()
    }

    pub fn contains(&self, identity: &NodeIdentity) -> bool {
        self.peers.iter().any(|p| p.is(identity))
    }

    /// Peers other than `identity`.
    pub fn others<'a>(
        &'a self,
        identity: &'a NodeIdentity,
    ) -> impl Iterator<Item = &'a Announcement> + 'a {
        self.peers.iter().filter(move |p| !p.is(identity))
    }
}

impl<'a> IntoIterator for &'a PeerSet {
    type Item = &'a Announcement;
    type IntoIter = std::slice::Iter<'a, Announcement>;

    fn into_iter(self) -> Self::IntoIter {
        self.peers.iter()
    }
}

/// Read side of the shared announcement directory.
#[derive(Debug, Clone)]
pub struct PeerDiscovery {
    dir: PathBuf,
}

impl PeerDiscovery {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Lists the directory afresh. Malformed announcement names are logged
    /// and skipped; they never hide the well-formed ones.
    pub async fn list(&self) -> Result<PeerSet> {
        let listing_error = |source| StorageError::Listing {
            path: self.dir.clone(),
            source,
        };

        let mut entries = fs::read_dir(&self.dir).await.map_err(listing_error)?;
        let mut peers = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(listing_error)? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                tracing::warn!("Skipping non UTF-8 entry {:?} in {:?}", file_name, self.dir);
                continue;
            };

            match Announcement::from_file_name(name) {
                None => continue,
                Some(Ok(announcement)) => {
                    tracing::info!("Discovered {} from {}", announcement.hostname, announcement.address);
                    peers.push(announcement);
                }
                Some(Err(e)) => {
                    tracing::warn!("Skipping malformed announcement {}: {}", name, e);
                }
            }
        }

        Ok(PeerSet::new(peers))
    }
}
