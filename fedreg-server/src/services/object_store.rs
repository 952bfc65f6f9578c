//! Object storage clients
//!
//! An [`ObjectStore`] takes a key and bytes and returns the URL the object is
//! reachable at. Two implementations:
//! - [`HttpObjectStore`]: remote bucket, `PUT <upload_base>/<key>`
//! - [`LocalDirStore`]: files under a directory served by the static router
//!
//! `HttpObjectStore` does not sign requests. It sends a plain PUT carrying an
//! optional `x-access-key-id` header and the secret as a bearer token, so the
//! upload base must be a gateway that accepts bearer auth or pre-signed PUT
//! URLs. Pointing it at a raw OSS or S3 endpoint that expects signed requests
//! gets a 403 on every upload, and reports fall back to the local tier.

use async_trait::async_trait;
use fedreg_common::config::StorageConfig;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Object storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Storage is enabled but incompletely configured
    #[error("Object storage not configured: {0}")]
    NotConfigured(String),

    /// Key would escape the bucket or directory
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    /// Connection failure or timeout
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status
    #[error("Storage returned HTTP {0}: {1}")]
    Status(u16, String),

    /// Local filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable blob storage addressed by key
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key`, returning the object's URL
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Reject keys that are empty, absolute, or climb out with `..`
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    let escapes = Path::new(key)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if escapes {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

// ============================================================================
// Remote bucket
// ============================================================================

/// Remote bucket reached over HTTP
pub struct HttpObjectStore {
    client: reqwest::Client,
    upload_base: String,
    public_base: String,
    access_key_id: Option<String>,
    access_key_secret: Option<String>,
}

impl HttpObjectStore {
    /// Build from configuration; needs a resolvable public base URL
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let public_base = config.public_base().ok_or_else(|| {
            StorageError::NotConfigured(
                "bucket and endpoint (or public_base_url) required".to_string(),
            )
        })?;
        let upload_base = config.upload_base().unwrap_or_else(|| public_base.clone());

        let client = reqwest::Client::builder()
            .user_agent(concat!("fedreg/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.upload_timeout_secs))
            .build()
            .map_err(|e| StorageError::Network(e.to_string()))?;

        Ok(Self {
            client,
            upload_base,
            public_base,
            access_key_id: config.access_key_id.clone(),
            access_key_secret: config.access_key_secret.clone(),
        })
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        validate_key(key)?;
        let upload_url = format!("{}/{}", self.upload_base, key);
        debug!(url = %upload_url, size = bytes.len(), "Uploading object");

        let mut request = self
            .client
            .put(&upload_url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);
        if let Some(id) = &self.access_key_id {
            request = request.header("x-access-key-id", id);
        }
        if let Some(secret) = &self.access_key_secret {
            request = request.bearer_auth(secret);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StorageError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Status(status.as_u16(), body));
        }

        Ok(format!("{}/{}", self.public_base, key))
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

// ============================================================================
// Local directory
// ============================================================================

/// Files under a directory, exposed under a URL prefix
#[derive(Debug, Clone)]
pub struct LocalDirStore {
    root: PathBuf,
    url_prefix: String,
}

impl LocalDirStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: &str) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalDirStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        validate_key(key)?;
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), "Stored object on local disk");
        Ok(format!("{}/{}", self.url_prefix, key))
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
