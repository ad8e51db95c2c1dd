//! Audit events and the append-only trail that owns them.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hashing::ContentFingerprint;

/// Stage category of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    FileIngest,
    AiVerification,
    LedgerCheck,
    WalletSign,
    StorageUpload,
    RegistrationComplete,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::FileIngest => "FILE_INGEST",
            AuditEventType::AiVerification => "AI_VERIFICATION",
            AuditEventType::LedgerCheck => "LEDGER_CHECK",
            AuditEventType::WalletSign => "WALLET_SIGN",
            AuditEventType::StorageUpload => "STORAGE_UPLOAD",
            AuditEventType::RegistrationComplete => "REGISTRATION_COMPLETE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: AuditEventType,
    pub label: String,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
    pub status: AuditStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Ordered event log for one submission.
///
/// Events are only ever appended. Timestamps never decrease along the
/// sequence, even if the wall clock steps backwards mid-run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditTrail {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(rename = "mediaId")]
    pub subject_id: String,
    events: Vec<AuditEvent>,
    pub last_updated: i64,
    #[serde(rename = "linkedHash", default, skip_serializing_if = "Option::is_none")]
    pub linked_fingerprint: Option<ContentFingerprint>,
}

impl AuditTrail {
    pub fn new(subject_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            subject_id: subject_id.to_string(),
            events: Vec::new(),
            last_updated: Utc::now().timestamp_millis(),
            linked_fingerprint: None,
        }
    }

    pub fn events(&self) -> &[AuditEvent] {
        &self.events
    }

    pub fn last_event(&self) -> Option<&AuditEvent> {
        self.events.last()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Link the trail to the content it describes. The first link wins.
    pub fn link(&mut self, fingerprint: &ContentFingerprint) {
        if self.linked_fingerprint.is_none() {
            self.linked_fingerprint = Some(fingerprint.clone());
        }
    }

    pub fn append(
        &mut self,
        event_type: AuditEventType,
        label: &str,
        status: AuditStatus,
        details: Option<String>,
    ) -> &AuditEvent {
        let now = Utc::now().timestamp_millis();
        self.append_at(event_type, label, status, details, now)
    }

    fn append_at(
        &mut self,
        event_type: AuditEventType,
        label: &str,
        status: AuditStatus,
        details: Option<String>,
        now_ms: i64,
    ) -> &AuditEvent {
        let floor = self.events.last().map(|e| e.timestamp_ms).unwrap_or(i64::MIN);
        let timestamp_ms = now_ms.max(floor);

        self.events.push(AuditEvent {
            id: Uuid::new_v4().to_string(),
            event_type,
            label: label.to_string(),
            timestamp_ms,
            status,
            details,
        });
        self.last_updated = self.last_updated.max(timestamp_ms);

        &self.events[self.events.len() - 1]
    }

    /// True when every event's timestamp is <= its successor's.
    pub fn is_ordered(&self) -> bool {
        self.events
            .windows(2)
            .all(|w| w[0].timestamp_ms <= w[1].timestamp_ms)
    }
}
