//! Record store contract and in-process implementation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use uuid::Uuid;

use crate::audit::AuditTrail;
use crate::hashing::ContentFingerprint;
use crate::media::MediaKind;

use super::models::{NewTag, Tag, TagStatus};
use super::validation::{validate_new_tag, validate_urls};

#[derive(Debug, Error)]
pub enum RecordError {
    /// A unique field collides with an existing tag.
    #[error("{field} already exists")]
    Conflict { field: String },

    #[error("Validation error: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Tag not found: {0}")]
    NotFound(String),

    #[error("Record store unreachable: {0}")]
    Transport(String),

    #[error("Record store returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed record store response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create_tag(&self, tag: NewTag) -> Result<Tag, RecordError>;

    async fn get_tag(&self, id: &str) -> Result<Tag, RecordError>;

    async fn find_by_fingerprint(&self, fingerprint: &ContentFingerprint) -> Result<Option<Tag>, RecordError>;

    /// Hard delete. Returns the removed tag so callers can clean up the
    /// objects it referenced.
    async fn delete_tag(&self, id: &str) -> Result<Tag, RecordError>;

    /// Returns the new view count.
    async fn record_view(&self, id: &str) -> Result<u64, RecordError>;

    /// Returns the new like count.
    async fn record_like(&self, id: &str) -> Result<u64, RecordError>;

    /// Replace the URL list for one kind. Returns URLs no longer referenced.
    async fn update_media_urls(
        &self,
        id: &str,
        kind: MediaKind,
        urls: Vec<String>,
    ) -> Result<Vec<String>, RecordError>;

    async fn set_status(&self, id: &str, status: TagStatus) -> Result<Tag, RecordError>;

    async fn get_audit_trail(&self, tag_id: &str) -> Result<Option<AuditTrail>, RecordError>;
}

#[derive(Debug, Default)]
struct RecordState {
    tags: BTreeMap<String, Tag>,
    trails: HashMap<String, AuditTrail>,
}

impl RecordState {
    fn conflict(&self, tag: &NewTag) -> Option<&'static str> {
        self.tags.values().find_map(|existing| {
            if existing.fingerprint == tag.fingerprint {
                Some("hash_address")
            } else if existing.media_cid == tag.media_cid {
                Some("mediacid")
            } else if existing.metadata_cid == tag.metadata_cid {
                Some("metadatacid")
            } else {
                None
            }
        })
    }

    fn tag_mut(&mut self, id: &str) -> Result<&mut Tag, RecordError> {
        self.tags
            .get_mut(id)
            .ok_or_else(|| RecordError::NotFound(id.to_string()))
    }
}

/// In-process record store enforcing the same uniqueness and shape rules as
/// the hosted one.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    state: Arc<Mutex<RecordState>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.lock().tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.state.lock().tags.values().cloned().collect()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn create_tag(&self, mut tag: NewTag) -> Result<Tag, RecordError> {
        validate_new_tag(&tag).map_err(RecordError::Validation)?;

        if let Some(linked) = tag.audit_trail.as_ref().and_then(|t| t.linked_fingerprint.as_ref()) {
            if *linked != tag.fingerprint {
                return Err(RecordError::Validation(vec![
                    "Audit trail is linked to a different hash address".to_string(),
                ]));
            }
        }

        let mut state = self.state.lock();
        if let Some(field) = state.conflict(&tag) {
            return Err(RecordError::Conflict {
                field: field.to_string(),
            });
        }

        let trail_ref = match tag.audit_trail.take() {
            Some(trail) if !trail.is_empty() && trail.linked_fingerprint.is_some() => {
                let id = trail.id.clone();
                state.trails.insert(id.clone(), trail);
                Some(id)
            }
            _ => None,
        };

        let id = Uuid::new_v4().simple().to_string();
        let stored = Tag::from_new(id.clone(), tag, trail_ref);
        state.tags.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_tag(&self, id: &str) -> Result<Tag, RecordError> {
        self.state
            .lock()
            .tags
            .get(id)
            .cloned()
            .ok_or_else(|| RecordError::NotFound(id.to_string()))
    }

    async fn find_by_fingerprint(&self, fingerprint: &ContentFingerprint) -> Result<Option<Tag>, RecordError> {
        Ok(self
            .state
            .lock()
            .tags
            .values()
            .find(|t| &t.fingerprint == fingerprint)
            .cloned())
    }

    async fn delete_tag(&self, id: &str) -> Result<Tag, RecordError> {
        let mut state = self.state.lock();
        let tag = state
            .tags
            .remove(id)
            .ok_or_else(|| RecordError::NotFound(id.to_string()))?;
        if let Some(trail_ref) = &tag.audit_trail_ref {
            state.trails.remove(trail_ref);
        }
        Ok(tag)
    }

    async fn record_view(&self, id: &str) -> Result<u64, RecordError> {
        let mut state = self.state.lock();
        let tag = state.tag_mut(id)?;
        tag.view_count += 1;
        Ok(tag.view_count)
    }

    async fn record_like(&self, id: &str) -> Result<u64, RecordError> {
        let mut state = self.state.lock();
        let tag = state.tag_mut(id)?;
        tag.like_count += 1;
        tag.touch();
        Ok(tag.like_count)
    }

    async fn update_media_urls(
        &self,
        id: &str,
        kind: MediaKind,
        urls: Vec<String>,
    ) -> Result<Vec<String>, RecordError> {
        let mut state = self.state.lock();
        let tag = state.tag_mut(id)?;

        let mut updated = tag.urls.clone();
        let orphaned = updated.replace(kind, urls);
        validate_urls(tag.media_kind, &updated).map_err(RecordError::Validation)?;

        tag.urls = updated;
        tag.touch();
        Ok(orphaned)
    }

    async fn set_status(&self, id: &str, status: TagStatus) -> Result<Tag, RecordError> {
        let mut state = self.state.lock();
        let tag = state.tag_mut(id)?;
        tag.status = status;
        tag.touch();
        Ok(tag.clone())
    }

    async fn get_audit_trail(&self, tag_id: &str) -> Result<Option<AuditTrail>, RecordError> {
        let state = self.state.lock();
        let tag = state
            .tags
            .get(tag_id)
            .ok_or_else(|| RecordError::NotFound(tag_id.to_string()))?;
        Ok(tag
            .audit_trail_ref
            .as_ref()
            .and_then(|r| state.trails.get(r))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditEventType, AuditStatus};
    use crate::hashing::fingerprint_bytes;
    use crate::records::models::MediaUrls;

    fn new_tag(seed: &str) -> NewTag {
        let mut urls = MediaUrls::default();
        urls.push(MediaKind::Image, format!("https://gw/ipfs/bafk{}", seed));
        NewTag {
            file_name: format!("{}.png", seed),
            description: String::new(),
            fingerprint: fingerprint_bytes(seed.as_bytes()),
            media_cid: format!("bafk{}", seed),
            metadata_cid: format!("bafkmeta{}", seed),
            owner: "0xabc".to_string(),
            media_kind: MediaKind::Image,
            urls,
            file_size: None,
            audit_trail: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryRecordStore::new();
        let tag = store.create_tag(new_tag("a")).await.unwrap();
        assert_eq!(tag.file_count, 1);
        assert!(!tag.is_bulk);
        assert_eq!(store.get_tag(&tag.id).await.unwrap(), tag);

        let found = store.find_by_fingerprint(&fingerprint_bytes(b"a")).await.unwrap();
        assert_eq!(found.map(|t| t.id), Some(tag.id));
    }

    #[tokio::test]
    async fn test_unique_fields() {
        let store = InMemoryRecordStore::new();
        store.create_tag(new_tag("a")).await.unwrap();

        let err = store.create_tag(new_tag("a")).await.unwrap_err();
        assert!(matches!(err, RecordError::Conflict { ref field } if field == "hash_address"));

        let mut same_media = new_tag("b");
        same_media.media_cid = "bafka".to_string();
        let err = store.create_tag(same_media).await.unwrap_err();
        assert!(matches!(err, RecordError::Conflict { ref field } if field == "mediacid"));

        let mut same_meta = new_tag("c");
        same_meta.metadata_cid = "bafkmetaa".to_string();
        let err = store.create_tag(same_meta).await.unwrap_err();
        assert!(matches!(err, RecordError::Conflict { ref field } if field == "metadatacid"));

        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_media_rejected() {
        let store = InMemoryRecordStore::new();
        let mut tag = new_tag("a");
        tag.urls = MediaUrls::default();
        assert!(matches!(
            store.create_tag(tag).await,
            Err(RecordError::Validation(_))
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_audit_trail_stored_by_reference() {
        let store = InMemoryRecordStore::new();
        let mut tag = new_tag("a");
        let mut trail = AuditTrail::new("a.png");
        trail.link(&tag.fingerprint);
        trail.append(AuditEventType::FileIngest, "File hashed", AuditStatus::Success, None);
        tag.audit_trail = Some(trail.clone());

        let stored = store.create_tag(tag).await.unwrap();
        assert_eq!(stored.audit_trail_ref.as_deref(), Some(trail.id.as_str()));
        assert_eq!(store.get_audit_trail(&stored.id).await.unwrap(), Some(trail));
    }

    #[tokio::test]
    async fn test_trail_for_other_content_rejected() {
        let store = InMemoryRecordStore::new();
        let mut tag = new_tag("a");
        let mut trail = AuditTrail::new("a.png");
        trail.link(&fingerprint_bytes(b"other"));
        tag.audit_trail = Some(trail);
        assert!(matches!(
            store.create_tag(tag).await,
            Err(RecordError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_counters_status_and_urls() {
        let store = InMemoryRecordStore::new();
        let tag = store.create_tag(new_tag("a")).await.unwrap();

        assert_eq!(store.record_view(&tag.id).await.unwrap(), 1);
        assert_eq!(store.record_view(&tag.id).await.unwrap(), 2);
        assert_eq!(store.record_like(&tag.id).await.unwrap(), 1);

        let updated = store.set_status(&tag.id, TagStatus::Inactive).await.unwrap();
        assert_eq!(updated.status, TagStatus::Inactive);

        let orphaned = store
            .update_media_urls(
                &tag.id,
                MediaKind::Image,
                vec!["https://gw/ipfs/one".to_string(), "https://gw/ipfs/two".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(orphaned, vec!["https://gw/ipfs/bafka".to_string()]);

        let after = store.get_tag(&tag.id).await.unwrap();
        assert_eq!(after.total_media_count(), 2);
        assert_eq!(after.file_count, 1);
        assert!(!after.is_bulk);

        let err = store
            .update_media_urls(&tag.id, MediaKind::Image, Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RecordError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryRecordStore::new();
        let tag = store.create_tag(new_tag("a")).await.unwrap();
        let removed = store.delete_tag(&tag.id).await.unwrap();
        assert_eq!(removed.id, tag.id);
        assert!(matches!(
            store.get_tag(&tag.id).await,
            Err(RecordError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_tag(&tag.id).await,
            Err(RecordError::NotFound(_))
        ));
    }
}
