//! Tag persistence step of the pipeline.

use std::sync::Arc;

use crate::logging::structured::LogContext;
use crate::{log_error, log_info, log_warn};

use super::models::{NewTag, Tag};
use super::store::{RecordError, RecordStore};

pub struct MetadataRecorder {
    store: Arc<dyn RecordStore>,
}

impl MetadataRecorder {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Persist a tag. Uniqueness of fingerprint and CIDs is enforced by the
    /// store; a collision surfaces as `RecordError::Conflict`.
    pub async fn record(&self, tag: NewTag, ctx: &LogContext) -> Result<Tag, RecordError> {
        let fingerprint = tag.fingerprint.clone();
        match self.store.create_tag(tag).await {
            Ok(stored) => {
                log_info!(
                    ctx,
                    "TAG_RECORDED",
                    id = stored.id,
                    fingerprint = fingerprint,
                    file_count = stored.file_count
                );
                Ok(stored)
            }
            Err(RecordError::Conflict { field }) => {
                log_warn!(ctx, "TAG_CONFLICT", fingerprint = fingerprint, field = field);
                Err(RecordError::Conflict { field })
            }
            Err(e) => {
                log_error!(ctx, "TAG_RECORD_FAILED", fingerprint = fingerprint, error = e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::fingerprint_bytes;
    use crate::media::MediaKind;
    use crate::records::models::MediaUrls;
    use crate::records::store::InMemoryRecordStore;

    fn new_tag() -> NewTag {
        let mut urls = MediaUrls::default();
        urls.push(MediaKind::Audio, "https://gw/ipfs/bafkS".to_string());
        NewTag {
            file_name: "song.mp3".to_string(),
            description: String::new(),
            fingerprint: fingerprint_bytes(b"song"),
            media_cid: "bafkS".to_string(),
            metadata_cid: "bafkM".to_string(),
            owner: "0xabc".to_string(),
            media_kind: MediaKind::Audio,
            urls,
            file_size: Some(4),
            audit_trail: None,
        }
    }

    #[tokio::test]
    async fn test_record_then_conflict() {
        let store = InMemoryRecordStore::new();
        let recorder = MetadataRecorder::new(Arc::new(store.clone()));
        let ctx = LogContext::new("batch-test");

        let tag = recorder.record(new_tag(), &ctx).await.unwrap();
        assert_eq!(tag.file_size, Some(4));

        let err = recorder.record(new_tag(), &ctx).await.unwrap_err();
        assert!(matches!(err, RecordError::Conflict { .. }));
        assert_eq!(store.len(), 1);
    }
}
