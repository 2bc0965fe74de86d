use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use system::NodeIdentity;
use tokio::fs;

use crate::{Result, StorageError};

const SEPARATOR: char = '_';
const EXTENSION: &str = ".txt";

/// A node's claim, visible to every peer, that it is alive at `address`.
/// Stored as `<hostname>_<address>.txt` holding `<hostname>_<address>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Announcement {
    pub hostname: String,
    /// Kept as written by the announcing node; only the owning node's own
    /// address is guaranteed to be a valid IPv4 address.
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnnouncementParseError {
    #[error("{0:?} has no '_' separator")]
    MissingSeparator(String),

    #[error("{0:?} has more than one '_' separator")]
    ExtraSeparator(String),

    #[error("{0:?} has an empty hostname")]
    EmptyHostname(String),

    #[error("{0:?} has an empty address")]
    EmptyAddress(String),
}

impl Announcement {
    pub fn new(hostname: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            address: address.into(),
        }
    }

    pub fn key(&self) -> String {
        format!("{}{}{}", self.hostname, SEPARATOR, self.address)
    }

    pub fn file_name(&self) -> String {
        format!("{}{}", self.key(), EXTENSION)
    }

    /// `None` when the file is not an announcement at all (the shared
    /// directory also holds the load-balancer templates).
    pub fn from_file_name(name: &str) -> Option<std::result::Result<Self, AnnouncementParseError>> {
        name.strip_suffix(EXTENSION).map(str::parse)
    }

    pub fn is(&self, identity: &NodeIdentity) -> bool {
        self.hostname == identity.hostname && self.address == identity.address.to_string()
    }
}

impl From<&NodeIdentity> for Announcement {
    fn from(identity: &NodeIdentity) -> Self {
        Self::new(identity.hostname.clone(), identity.address.to_string())
    }
}

impl FromStr for Announcement {
    type Err = AnnouncementParseError;

    fn from_str(key: &str) -> std::result::Result<Self, Self::Err> {
        let (hostname, address) = key
            .split_once(SEPARATOR)
            .ok_or_else(|| AnnouncementParseError::MissingSeparator(key.to_string()))?;

        if address.contains(SEPARATOR) {
            return Err(AnnouncementParseError::ExtraSeparator(key.to_string()));
        }
        if hostname.is_empty() {
            return Err(AnnouncementParseError::EmptyHostname(key.to_string()));
        }
        if address.is_empty() {
            return Err(AnnouncementParseError::EmptyAddress(key.to_string()));
        }

        Ok(Self::new(hostname, address))
    }
}

impl fmt::Display for Announcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.hostname, self.address)
    }
}

/// Write side of the shared announcement directory.
#[derive(Debug, Clone)]
pub struct AnnouncementStore {
    dir: PathBuf,
}

impl AnnouncementStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Publishes this node. Rewriting an existing announcement leaves it
    /// byte-identical, so repeated startups are harmless. A hostname that
    /// would not read back as the same announcement is refused before
    /// anything is written.
    pub async fn announce(&self, identity: &NodeIdentity) -> Result<Announcement> {
        let announcement = Announcement::from(identity);
        announcement.key().parse::<Announcement>()?;

        let path = self.dir.join(announcement.file_name());

        fs::write(&path, announcement.key())
            .await
            .map_err(|source| StorageError::Announce {
                path: path.clone(),
                source,
            })?;

        tracing::info!("Announced {} at {:?}", announcement, path);
        Ok(announcement)
    }
}
