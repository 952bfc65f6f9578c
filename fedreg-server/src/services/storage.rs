//! Two-tier persistence: remote bucket first, local disk second
//!
//! Degradation is never an error. The caller always receives a
//! [`PersistOutcome`] saying where the bytes ended up.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::object_store::{LocalDirStore, ObjectStore};

/// Where a persisted object lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Remote,
    Local,
    None,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Remote => "remote",
            StorageKind::Local => "local",
            StorageKind::None => "none",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "remote" => StorageKind::Remote,
            "local" => StorageKind::Local,
            _ => StorageKind::None,
        }
    }
}

/// Result of a persistence attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Remote { url: String },
    Local { url: String },
    NotStored,
}

impl PersistOutcome {
    pub fn url(&self) -> Option<&str> {
        match self {
            PersistOutcome::Remote { url } | PersistOutcome::Local { url } => Some(url),
            PersistOutcome::NotStored => None,
        }
    }

    pub fn kind(&self) -> StorageKind {
        match self {
            PersistOutcome::Remote { .. } => StorageKind::Remote,
            PersistOutcome::Local { .. } => StorageKind::Local,
            PersistOutcome::NotStored => StorageKind::None,
        }
    }
}

/// Remote-then-local writer
#[derive(Clone)]
pub struct TieredStorage {
    remote: Option<Arc<dyn ObjectStore>>,
    local: Arc<dyn ObjectStore>,
}

impl TieredStorage {
    pub fn new(remote: Option<Arc<dyn ObjectStore>>, local: LocalDirStore) -> Self {
        Self::with_local(remote, Arc::new(local))
    }

    /// Use an arbitrary store as the local tier
    pub fn with_local(remote: Option<Arc<dyn ObjectStore>>, local: Arc<dyn ObjectStore>) -> Self {
        Self { remote, local }
    }

    pub fn remote_enabled(&self) -> bool {
        self.remote.is_some()
    }

    /// Persist `bytes`, trying `remote_key` on the remote tier and `local_key` on disk
    pub async fn persist(
        &self,
        remote_key: &str,
        local_key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> PersistOutcome {
        if let Some(remote) = &self.remote {
            match remote.put(remote_key, bytes.clone(), content_type).await {
                Ok(url) => {
                    info!(key = remote_key, url = %url, "Stored object remotely");
                    return PersistOutcome::Remote { url };
                }
                Err(e) => {
                    warn!(
                        key = remote_key,
                        error = %e,
                        "Remote upload failed, falling back to {}",
                        self.local.name()
                    );
                }
            }
        }

        match self.local.put(local_key, bytes, content_type).await {
            Ok(url) => {
                info!(key = local_key, url = %url, "Stored object locally");
                PersistOutcome::Local { url }
            }
            Err(e) => {
                error!(key = local_key, error = %e, "Local save failed, object not stored");
                PersistOutcome::NotStored
            }
        }
    }
}
