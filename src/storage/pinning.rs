//! Content-addressed pinning service clients.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::multipart;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const PINATA_API_URL: &str = "https://api.pinata.cloud";

#[derive(Debug, Error)]
pub enum PinningError {
    #[error("Pinning service unreachable: {0}")]
    Transport(String),

    #[error("Pinning service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response from pinning service: {0}")]
    Malformed(String),
}

impl PinningError {
    pub fn is_transport(&self) -> bool {
        matches!(self, PinningError::Transport(_))
    }
}

/// A named object to pin.
#[derive(Clone)]
pub struct PinObject {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl PinObject {
    pub fn new(name: &str, content_type: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            content_type: content_type.to_string(),
            bytes,
        }
    }

    pub fn json(name: &str, bytes: Vec<u8>) -> Self {
        Self::new(name, "application/json", bytes)
    }
}

impl std::fmt::Debug for PinObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinObject")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

#[async_trait]
pub trait PinningService: Send + Sync {
    /// Pin an object and return its CID.
    async fn pin(&self, object: PinObject) -> Result<String, PinningError>;

    async fn unpin(&self, cid: &str) -> Result<(), PinningError>;
}

#[derive(Debug, Deserialize)]
struct PinFileResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: Option<String>,
}

/// Pinata REST client authenticated with a bearer JWT.
pub struct PinataClient {
    base_url: String,
    jwt: String,
    client: reqwest::Client,
}

impl PinataClient {
    pub fn new(base_url: &str, jwt: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            jwt: jwt.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn pin_url(&self) -> String {
        format!("{}/pinning/pinFileToIPFS", self.base_url)
    }

    fn unpin_url(&self, cid: &str) -> String {
        format!("{}/pinning/unpin/{}", self.base_url, cid)
    }
}

async fn error_status(response: reqwest::Response) -> PinningError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    PinningError::Status { status, body }
}

#[async_trait]
impl PinningService for PinataClient {
    async fn pin(&self, object: PinObject) -> Result<String, PinningError> {
        let size = object.bytes.len();
        let part = multipart::Part::bytes(object.bytes)
            .file_name(object.name.clone())
            .mime_str(&object.content_type)
            .map_err(|e| PinningError::Malformed(e.to_string()))?;
        let form = multipart::Form::new().part("file", part);

        log::debug!("PIN_REQUEST name={} bytes={}", object.name, size);

        let response = self
            .client
            .post(self.pin_url())
            .bearer_auth(&self.jwt)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PinningError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(error_status(response).await);
        }

        let body: PinFileResponse = response
            .json()
            .await
            .map_err(|e| PinningError::Malformed(e.to_string()))?;
        body.ipfs_hash
            .filter(|cid| !cid.is_empty())
            .ok_or_else(|| PinningError::Malformed("IPFS hash not found".to_string()))
    }

    async fn unpin(&self, cid: &str) -> Result<(), PinningError> {
        let response = self
            .client
            .delete(self.unpin_url(cid))
            .bearer_auth(&self.jwt)
            .send()
            .await
            .map_err(|e| PinningError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(error_status(response).await);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryPinState {
    objects: HashMap<String, PinObject>,
    pin_log: Vec<String>,
    failing: HashSet<String>,
}

/// In-process pinning service. CIDs are derived from content, so pinning
/// identical bytes twice yields the same CID.
#[derive(Clone, Default)]
pub struct MemoryPinning {
    state: Arc<Mutex<MemoryPinState>>,
}

impl MemoryPinning {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every pin of an object with this name fail with a transport error.
    pub fn fail_on(&self, name: &str) {
        self.state.lock().failing.insert(name.to_string());
    }

    pub fn is_pinned(&self, cid: &str) -> bool {
        self.state.lock().objects.contains_key(cid)
    }

    pub fn get(&self, cid: &str) -> Option<Vec<u8>> {
        self.state.lock().objects.get(cid).map(|o| o.bytes.clone())
    }

    pub fn pinned_count(&self) -> usize {
        self.state.lock().objects.len()
    }

    /// Names of successfully pinned objects in pin order.
    pub fn pin_log(&self) -> Vec<String> {
        self.state.lock().pin_log.clone()
    }

    pub fn cid_for(bytes: &[u8]) -> String {
        let digest = Sha256::digest(bytes);
        format!("bafk{}", hex::encode(&digest[..20]))
    }
}

#[async_trait]
impl PinningService for MemoryPinning {
    async fn pin(&self, object: PinObject) -> Result<String, PinningError> {
        let mut state = self.state.lock();
        if state.failing.contains(&object.name) {
            return Err(PinningError::Transport(format!(
                "connection reset while pinning {}",
                object.name
            )));
        }
        let cid = Self::cid_for(&object.bytes);
        state.pin_log.push(object.name.clone());
        state.objects.insert(cid.clone(), object);
        Ok(cid)
    }

    async fn unpin(&self, cid: &str) -> Result<(), PinningError> {
        match self.state.lock().objects.remove(cid) {
            Some(_) => Ok(()),
            None => Err(PinningError::Status {
                status: 404,
                body: format!("{} is not pinned", cid),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_pinning_is_content_addressed() {
        let pinning = MemoryPinning::new();
        let a = pinning.pin(PinObject::new("a.png", "image/png", vec![1, 2])).await.unwrap();
        let b = pinning.pin(PinObject::new("b.png", "image/png", vec![1, 2])).await.unwrap();
        let c = pinning.pin(PinObject::new("c.png", "image/png", vec![3])).await.unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(pinning.pinned_count(), 2);
        assert_eq!(pinning.pin_log(), vec!["a.png", "b.png", "c.png"]);
    }

    #[tokio::test]
    async fn test_memory_pinning_failure_and_unpin() {
        let pinning = MemoryPinning::new();
        pinning.fail_on("bad.png");
        let err = pinning
            .pin(PinObject::new("bad.png", "image/png", vec![9]))
            .await
            .unwrap_err();
        assert!(err.is_transport());

        let cid = pinning.pin(PinObject::json("meta.json", b"{}".to_vec())).await.unwrap();
        pinning.unpin(&cid).await.unwrap();
        assert!(!pinning.is_pinned(&cid));
        assert!(matches!(
            pinning.unpin(&cid).await,
            Err(PinningError::Status { status: 404, .. })
        ));
    }

    #[test]
    fn test_pinata_urls() {
        let client = PinataClient::new("https://api.pinata.cloud/", "jwt");
        assert_eq!(client.pin_url(), "https://api.pinata.cloud/pinning/pinFileToIPFS");
        assert_eq!(client.unpin_url("QmX"), "https://api.pinata.cloud/pinning/unpin/QmX");
    }

    #[test]
    fn test_pin_response_shape() {
        let body: PinFileResponse =
            serde_json::from_str(r#"{"IpfsHash":"QmAbc","PinSize":12,"Timestamp":"2024-01-01"}"#).unwrap();
        assert_eq!(body.ipfs_hash.as_deref(), Some("QmAbc"));
    }
}
