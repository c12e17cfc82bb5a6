//! Artifact publisher seam and its implementations.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use crate::client::{R2Client, R2Config};
use crate::error::{StorageError, StorageResult};

/// Object storage as seen by the composition pipeline.
///
/// One call per asset; the implementation returns the public URL or fails.
/// Callers must not assume retries happen behind this interface.
#[async_trait]
pub trait ArtifactPublisher: Send + Sync {
    async fn upload(&self, content: Vec<u8>, key: &str, content_type: &str)
        -> StorageResult<String>;
}

/// Reject keys that would not map onto a single object path.
fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|segment| segment.is_empty() || segment == "..")
    {
        return Err(StorageError::invalid_key(key));
    }
    Ok(())
}

/// Publishes to an R2 bucket served from a public base URL.
#[derive(Clone)]
pub struct R2Publisher {
    client: R2Client,
    public_base_url: String,
}

impl R2Publisher {
    pub fn new(config: &R2Config) -> Self {
        Self {
            client: R2Client::new(config),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let config = R2Config::from_env()?;
        Ok(Self::new(&config))
    }

    pub fn client(&self) -> &R2Client {
        &self.client
    }

    /// Public URL an uploaded key is served from.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}

#[async_trait]
impl ArtifactPublisher for R2Publisher {
    async fn upload(
        &self,
        content: Vec<u8>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<String> {
        validate_key(key)?;
        self.client.put_asset(key, content, content_type).await?;
        Ok(self.public_url(key))
    }
}

/// Object held by [`MemoryPublisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub content: Vec<u8>,
    pub content_type: String,
}

/// In-process publisher for tests and dry runs.
///
/// Returns `memory://{key}` URLs. Can be set to fail starting at the n-th
/// upload (zero-based) to exercise failure paths.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    uploads: AtomicUsize,
    fail_from: Option<usize>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every upload whose index is `n` or later.
    pub fn failing_from(n: usize) -> Self {
        Self {
            fail_from: Some(n),
            ..Self::default()
        }
    }

    /// Snapshot of all stored objects.
    pub fn objects(&self) -> BTreeMap<String, StoredObject> {
        match self.objects.lock() {
            Ok(objects) => objects.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Stored keys in order.
    pub fn keys(&self) -> Vec<String> {
        self.objects().into_keys().collect()
    }

    /// Number of upload attempts, successful or not.
    pub fn upload_attempts(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactPublisher for MemoryPublisher {
    async fn upload(
        &self,
        content: Vec<u8>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<String> {
        validate_key(key)?;

        let index = self.uploads.fetch_add(1, Ordering::SeqCst);
        if self.fail_from.is_some_and(|n| index >= n) {
            return Err(StorageError::upload_failed(key, "injected failure"));
        }

        let size = content.len();
        let object = StoredObject {
            content,
            content_type: content_type.to_string(),
        };
        match self.objects.lock() {
            Ok(mut objects) => objects.insert(key.to_string(), object),
            Err(poisoned) => poisoned.into_inner().insert(key.to_string(), object),
        };

        info!("Stored {} bytes in memory at {}", size, key);
        Ok(format!("memory://{}", key))
    }
}
