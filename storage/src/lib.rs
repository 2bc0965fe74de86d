mod announcement;
mod discovery;
mod readiness;
mod template;

pub use announcement::{Announcement, AnnouncementParseError, AnnouncementStore};
pub use discovery::{PeerDiscovery, PeerSet};
pub use readiness::{MarkOutcome, ReadinessMarker};
pub use template::{render, server_line, ConfigGenerator, BACKEND_PORT};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Paths this crate reads and writes. Everything except `ready_marker`
/// normally lives on the storage shared by all control-plane nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub shared_dir: PathBuf,
    pub base_config: PathBuf,
    pub rendered_config: PathBuf,
    pub ready_marker: PathBuf,
}

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Cannot write announcement {path:?}: {source}")]
    Announce {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot list shared directory {path:?}: {source}")]
    Listing {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot read base template {path:?}: {source}")]
    Template {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot write rendered config {path:?}: {source}")]
    Render {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot announce this node: {0}")]
    InvalidAnnouncement(#[from] AnnouncementParseError),
}
