//! Tag records as held by the record store.
//!
//! Field names follow the record store's wire format (`hash_address`,
//! `mediacid`, `type`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::AuditTrail;
use crate::hashing::ContentFingerprint;
use crate::media::MediaKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagStatus {
    #[default]
    Active,
    Inactive,
    Pending,
    Rejected,
}

impl TagStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagStatus::Active => "active",
            TagStatus::Inactive => "inactive",
            TagStatus::Pending => "pending",
            TagStatus::Rejected => "rejected",
        }
    }
}

/// Media URLs grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaUrls {
    #[serde(default)]
    pub img_urls: Vec<String>,
    #[serde(default)]
    pub video_urls: Vec<String>,
    #[serde(default)]
    pub audio_urls: Vec<String>,
}

impl MediaUrls {
    pub fn for_kind(&self, kind: MediaKind) -> &[String] {
        match kind {
            MediaKind::Image => &self.img_urls,
            MediaKind::Video => &self.video_urls,
            MediaKind::Audio => &self.audio_urls,
        }
    }

    fn for_kind_mut(&mut self, kind: MediaKind) -> &mut Vec<String> {
        match kind {
            MediaKind::Image => &mut self.img_urls,
            MediaKind::Video => &mut self.video_urls,
            MediaKind::Audio => &mut self.audio_urls,
        }
    }

    pub fn push(&mut self, kind: MediaKind, url: String) {
        self.for_kind_mut(kind).push(url);
    }

    /// Replace the list for `kind`, returning URLs that were dropped.
    pub fn replace(&mut self, kind: MediaKind, urls: Vec<String>) -> Vec<String> {
        let old = std::mem::replace(self.for_kind_mut(kind), urls);
        let current = self.for_kind(kind);
        old.into_iter().filter(|url| !current.contains(url)).collect()
    }

    pub fn total(&self) -> usize {
        self.img_urls.len() + self.video_urls.len() + self.audio_urls.len()
    }

    pub fn all(&self) -> Vec<&str> {
        self.img_urls
            .iter()
            .chain(&self.video_urls)
            .chain(&self.audio_urls)
            .map(String::as_str)
            .collect()
    }
}

/// Fields submitted to create a tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTag {
    pub file_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "hash_address")]
    pub fingerprint: ContentFingerprint,
    /// Comma-joined for bulk registrations.
    #[serde(rename = "mediacid")]
    pub media_cid: String,
    #[serde(rename = "metadatacid")]
    pub metadata_cid: String,
    #[serde(rename = "address")]
    pub owner: String,
    #[serde(rename = "type")]
    pub media_kind: MediaKind,
    #[serde(flatten)]
    pub urls: MediaUrls,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    /// Snapshot of the submission's audit trail, stored with the tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_trail: Option<AuditTrail>,
}

/// A persisted tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub file_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "hash_address")]
    pub fingerprint: ContentFingerprint,
    #[serde(rename = "mediacid")]
    pub media_cid: String,
    #[serde(rename = "metadatacid")]
    pub metadata_cid: String,
    #[serde(rename = "address")]
    pub owner: String,
    #[serde(rename = "type")]
    pub media_kind: MediaKind,
    #[serde(flatten)]
    pub urls: MediaUrls,
    #[serde(default)]
    pub file_size: Option<u64>,
    /// Fixed at creation.
    pub file_count: usize,
    /// Fixed at creation.
    #[serde(rename = "is_bulk_upload")]
    pub is_bulk: bool,
    #[serde(default)]
    pub status: TagStatus,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub like_count: u64,
    #[serde(rename = "audit_trail_id", default)]
    pub audit_trail_ref: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Tag {
    /// Build the persisted form; file count and bulk flag are derived here
    /// and never again.
    pub fn from_new(id: String, new: NewTag, audit_trail_ref: Option<String>) -> Self {
        let now = Utc::now();
        let file_count = new.urls.total().max(1);
        Self {
            id,
            file_name: new.file_name.trim().to_string(),
            description: new.description.trim().to_string(),
            fingerprint: new.fingerprint,
            media_cid: new.media_cid,
            metadata_cid: new.metadata_cid,
            owner: new.owner,
            media_kind: new.media_kind,
            urls: new.urls,
            file_size: new.file_size,
            file_count,
            is_bulk: file_count > 1,
            status: TagStatus::Active,
            view_count: 0,
            like_count: 0,
            audit_trail_ref,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn media_cids(&self) -> Vec<&str> {
        self.media_cid.split(',').filter(|c| !c.is_empty()).collect()
    }

    pub fn total_media_count(&self) -> usize {
        self.urls.total()
    }

    pub fn primary_media_url(&self) -> Option<&str> {
        self.urls.for_kind(self.media_kind).first().map(String::as_str)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
