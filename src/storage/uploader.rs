//! Pinning of media objects and their metadata documents.

use std::sync::Arc;

use crate::logging::structured::LogContext;
use crate::{log_error, log_info};

use super::pinning::{PinObject, PinningError, PinningService};

/// CIDs produced by one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub media_cids: Vec<String>,
    pub metadata_cid: String,
}

pub struct StorageUploader {
    pinning: Arc<dyn PinningService>,
    gateway: String,
}

impl StorageUploader {
    pub fn new(pinning: Arc<dyn PinningService>, gateway: &str) -> Self {
        Self {
            pinning,
            gateway: gateway.trim_end_matches('/').to_string(),
        }
    }

    /// Public gateway URL for a CID.
    pub fn gateway_url(&self, cid: &str) -> String {
        format!("{}/ipfs/{}", self.gateway, cid)
    }

    pub async fn pin_media(&self, object: PinObject, ctx: &LogContext) -> Result<String, PinningError> {
        let name = object.name.clone();
        let size = object.bytes.len();
        match self.pinning.pin(object).await {
            Ok(cid) => {
                log_info!(ctx, "MEDIA_PINNED", name = name, bytes = size, cid = cid);
                Ok(cid)
            }
            Err(e) => {
                log_error!(ctx, "MEDIA_PIN_FAILED", name = name, error = e);
                Err(e)
            }
        }
    }

    pub async fn pin_metadata(&self, document: PinObject, ctx: &LogContext) -> Result<String, PinningError> {
        let name = document.name.clone();
        match self.pinning.pin(document).await {
            Ok(cid) => {
                log_info!(ctx, "METADATA_PINNED", name = name, cid = cid);
                Ok(cid)
            }
            Err(e) => {
                log_error!(ctx, "METADATA_PIN_FAILED", name = name, error = e);
                Err(e)
            }
        }
    }

    /// Pin every media object, then the metadata document that references
    /// them. The first failure aborts the upload.
    pub async fn upload(
        &self,
        media: Vec<PinObject>,
        metadata: PinObject,
        ctx: &LogContext,
    ) -> Result<UploadReceipt, PinningError> {
        let mut media_cids = Vec::with_capacity(media.len());
        for object in media {
            media_cids.push(self.pin_media(object, ctx).await?);
        }
        let metadata_cid = self.pin_metadata(metadata, ctx).await?;
        Ok(UploadReceipt {
            media_cids,
            metadata_cid,
        })
    }

    /// Best-effort removal; failures are logged and returned per CID.
    pub async fn unpin_all(&self, cids: &[String], ctx: &LogContext) -> Vec<(String, PinningError)> {
        let mut failures = Vec::new();
        for cid in cids {
            match self.pinning.unpin(cid).await {
                Ok(()) => {
                    log_info!(ctx, "UNPINNED", cid = cid);
                }
                Err(e) => {
                    log_error!(ctx, "UNPIN_FAILED", cid = cid, error = e);
                    failures.push((cid.clone(), e));
                }
            }
        }
        failures
    }
}
