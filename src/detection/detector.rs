//! Detector contract and HTTP client.

use async_trait::async_trait;
use reqwest::multipart;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::media::{MediaItem, MediaKind};

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Detector unreachable: {0}")]
    Transport(String),

    #[error("Detection failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed detector response: {0}")]
    Malformed(String),
}

impl DetectorError {
    pub fn is_transport(&self) -> bool {
        matches!(self, DetectorError::Transport(_))
    }
}

/// Free-text reasoning returned with a detection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reasoning {
    #[serde(default, alias = "content_analysis")]
    pub content_analysis: String,
    #[serde(default, alias = "deepfake_indicators", alias = "synthetic_indicators")]
    pub synthetic_indicators: String,
    #[serde(default, alias = "authentic_indicators")]
    pub authentic_indicators: String,
    #[serde(default)]
    pub overall: String,
}

/// Detector output. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    #[serde(alias = "media_type", alias = "media_kind")]
    pub media_kind: String,
    #[serde(alias = "deepfake_probability", alias = "synthetic_probability")]
    pub synthetic_probability: u8,
    #[serde(alias = "natural_probability")]
    pub natural_probability: u8,
    #[serde(default)]
    pub reasoning: Reasoning,
    /// Detector-hosted copy of the media.
    #[serde(default, alias = "cloudinary_url", alias = "storage_ref")]
    pub storage_ref: Option<String>,
    #[serde(default, alias = "cloudinary_public_id", alias = "storage_ref_id")]
    pub storage_ref_id: Option<String>,
}

impl DetectionResult {
    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::parse(&self.media_kind)
    }

    /// Probabilities must lie in 0..=100 and sum to exactly 100.
    pub fn validate(&self) -> Result<(), DetectorError> {
        if self.synthetic_probability > 100 || self.natural_probability > 100 {
            return Err(DetectorError::Malformed(format!(
                "probability out of range: synthetic={} natural={}",
                self.synthetic_probability, self.natural_probability
            )));
        }
        let sum = self.synthetic_probability as u16 + self.natural_probability as u16;
        if sum != 100 {
            return Err(DetectorError::Malformed(format!(
                "probabilities sum to {} (synthetic={} natural={})",
                sum, self.synthetic_probability, self.natural_probability
            )));
        }
        Ok(())
    }
}

/// External authenticity detector. One call per item, never retried here.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, item: &MediaItem) -> Result<DetectionResult, DetectorError>;
}

/// Client for the detector's `POST /api/detect` endpoint.
pub struct HttpDetector {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDetector {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/api/detect", self.base_url)
    }
}

#[async_trait]
impl Detector for HttpDetector {
    async fn detect(&self, item: &MediaItem) -> Result<DetectionResult, DetectorError> {
        let part = multipart::Part::bytes(item.raw_bytes.clone()).file_name(item.display_name.clone());
        let form = multipart::Form::new().part("file_data", part);

        log::debug!(
            "DETECT_REQUEST url={} file={} bytes={}",
            self.endpoint(),
            item.display_name,
            item.size()
        );

        let response = self
            .client
            .post(self.endpoint())
            .multipart(form)
            .send()
            .await
            .map_err(|e| DetectorError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DetectorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let result: DetectionResult = response
            .json()
            .await
            .map_err(|e| DetectorError::Malformed(e.to_string()))?;
        result.validate()?;
        Ok(result)
    }
}
