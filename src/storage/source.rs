//! Fetching hosted copies of media by storage reference.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Media host unreachable: {0}")]
    Transport(String),

    #[error("Media host returned {status} for {url}")]
    Status { status: u16, url: String },
}

/// Source of media bytes for items whose hosted copy is pinned instead of
/// the originally submitted bytes.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch(&self, storage_ref: &str) -> Result<Vec<u8>, FetchError>;
}

pub struct HttpMediaSource {
    client: reqwest::Client,
}

impl HttpMediaSource {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpMediaSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaSource for HttpMediaSource {
    async fn fetch(&self, storage_ref: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(storage_ref)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: storage_ref.to_string(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Fixed map of storage references to bytes.
#[derive(Clone, Default)]
pub struct MemoryMediaSource {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryMediaSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, storage_ref: &str, bytes: Vec<u8>) {
        self.objects.lock().insert(storage_ref.to_string(), bytes);
    }
}

#[async_trait]
impl MediaSource for MemoryMediaSource {
    async fn fetch(&self, storage_ref: &str) -> Result<Vec<u8>, FetchError> {
        self.objects
            .lock()
            .get(storage_ref)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                status: 404,
                url: storage_ref.to_string(),
            })
    }
}
