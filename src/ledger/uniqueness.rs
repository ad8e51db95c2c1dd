//! Fingerprint uniqueness check against the ledger.

use std::sync::Arc;

use crate::hashing::ContentFingerprint;
use crate::logging::structured::LogContext;
use crate::{log_info, log_warn};

use super::contract::{LedgerCallError, LedgerContract, LedgerRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniquenessOutcome {
    /// No active record; the content may be registered.
    Unique,
    /// An active record already binds this fingerprint.
    Duplicate(LedgerRecord),
    /// The lookup failed for a reason other than "not found".
    ///
    /// Uniqueness is unknown; callers must not proceed as if unique.
    LookupFailed(String),
}

impl UniquenessOutcome {
    pub fn is_unique(&self) -> bool {
        matches!(self, UniquenessOutcome::Unique)
    }
}

pub struct UniquenessVerifier {
    ledger: Arc<dyn LedgerContract>,
}

impl UniquenessVerifier {
    pub fn new(ledger: Arc<dyn LedgerContract>) -> Self {
        Self { ledger }
    }

    pub async fn verify(&self, fingerprint: &ContentFingerprint, ctx: &LogContext) -> UniquenessOutcome {
        let outcome = match self.ledger.lookup(fingerprint).await {
            Ok(record) => UniquenessOutcome::Duplicate(record),
            Err(err) => classify_lookup_error(err),
        };

        match &outcome {
            UniquenessOutcome::Unique => {
                log_info!(ctx, "UNIQUE", fingerprint = fingerprint);
            }
            UniquenessOutcome::Duplicate(record) => {
                log_info!(ctx, "DUPLICATE", fingerprint = fingerprint, owner = record.owner);
            }
            UniquenessOutcome::LookupFailed(reason) => {
                log_warn!(ctx, "LOOKUP_FAILED", fingerprint = fingerprint, reason = reason);
            }
        }
        outcome
    }
}

fn classify_lookup_error(err: LedgerCallError) -> UniquenessOutcome {
    match err.decoded() {
        Some(kind) if kind.is_not_found() => UniquenessOutcome::Unique,
        Some(kind) => UniquenessOutcome::LookupFailed(kind.message()),
        None => UniquenessOutcome::LookupFailed(err.to_string()),
    }
}
