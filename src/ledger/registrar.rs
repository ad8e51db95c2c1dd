//! Registration and deregistration transactions.

use std::sync::Arc;

use thiserror::Error;

use crate::hashing::{ContentFingerprint, FingerprintError};
use crate::logging::structured::LogContext;
use crate::{log_error, log_info, log_warn};

use super::contract::{LedgerCallError, LedgerContract, TxReceipt};
use super::errors::LedgerErrorKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Confirmed(TxReceipt),
    /// The contract reports the fingerprint is already registered. Reached
    /// only after a uniqueness check passed, so another submission won the
    /// race; callers treat this as success.
    AlreadyRegistered,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{}", .kind.message())]
    Rejected { kind: LedgerErrorKind },

    #[error("Ledger unreachable: {0}")]
    Transport(String),

    #[error("Malformed ledger response: {0}")]
    Malformed(String),

    #[error(transparent)]
    InvalidFingerprint(#[from] FingerprintError),
}

impl LedgerError {
    pub fn kind(&self) -> Option<&LedgerErrorKind> {
        match self {
            LedgerError::Rejected { kind } => Some(kind),
            _ => None,
        }
    }
}

impl From<LedgerCallError> for LedgerError {
    fn from(err: LedgerCallError) -> Self {
        match err {
            LedgerCallError::Reverted { .. } => LedgerError::Rejected {
                // Reverted always decodes
                kind: err.decoded().unwrap_or(LedgerErrorKind::Unknown(String::new())),
            },
            LedgerCallError::Transport(msg) => LedgerError::Transport(msg),
            LedgerCallError::Malformed(msg) => LedgerError::Malformed(msg),
        }
    }
}

pub struct LedgerRegistrar {
    ledger: Arc<dyn LedgerContract>,
}

impl LedgerRegistrar {
    pub fn new(ledger: Arc<dyn LedgerContract>) -> Self {
        Self { ledger }
    }

    pub fn actor(&self) -> &str {
        self.ledger.actor()
    }

    /// Bind `fingerprint` to the stored media and metadata, waiting for
    /// confirmation.
    pub async fn register(
        &self,
        media_cid: &str,
        metadata_cid: &str,
        fingerprint: &ContentFingerprint,
        ctx: &LogContext,
    ) -> Result<RegistrationOutcome, LedgerError> {
        log_info!(ctx, "REGISTER_SUBMITTED", fingerprint = fingerprint, media_cid = media_cid);

        match self.ledger.register(media_cid, metadata_cid, fingerprint).await {
            Ok(receipt) => {
                log_info!(
                    ctx,
                    "REGISTER_CONFIRMED",
                    tx = receipt.tx_hash,
                    block = receipt.block_number
                );
                Ok(RegistrationOutcome::Confirmed(receipt))
            }
            Err(err) => match err.decoded() {
                Some(LedgerErrorKind::MediaAlreadyRegistered) => {
                    log_warn!(ctx, "ALREADY_REGISTERED", fingerprint = fingerprint);
                    Ok(RegistrationOutcome::AlreadyRegistered)
                }
                _ => {
                    log_error!(ctx, "REGISTER_FAILED", fingerprint = fingerprint, error = err);
                    Err(err.into())
                }
            },
        }
    }

    /// Remove a registration owned by the acting address.
    ///
    /// The raw fingerprint is normalized first. Ownership is checked with a
    /// lookup before any transaction is sent; addresses compare
    /// case-insensitively.
    pub async fn deregister(&self, raw_fingerprint: &str, ctx: &LogContext) -> Result<TxReceipt, LedgerError> {
        let fingerprint = ContentFingerprint::parse(raw_fingerprint)?;

        let record = self.ledger.lookup(&fingerprint).await?;
        if !record.owner.eq_ignore_ascii_case(self.ledger.actor()) {
            log_warn!(
                ctx,
                "DEREGISTER_DENIED",
                fingerprint = fingerprint,
                owner = record.owner,
                actor = self.ledger.actor()
            );
            return Err(LedgerError::Rejected {
                kind: LedgerErrorKind::Unauthorized,
            });
        }

        let receipt = self.ledger.deregister(&fingerprint).await?;
        log_info!(ctx, "DEREGISTERED", fingerprint = fingerprint, tx = receipt.tx_hash);
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::fingerprint_bytes;
    use crate::ledger::memory::InMemoryLedger;

    const OWNER: &str = "0xAbC0000000000000000000000000000000000001";

    fn ctx() -> LogContext {
        LogContext::new("batch-test")
    }

    #[tokio::test]
    async fn test_register_round_trip() {
        let ledger = InMemoryLedger::new(OWNER);
        let registrar = LedgerRegistrar::new(Arc::new(ledger.clone()));
        let fp = fingerprint_bytes(b"photo");

        let outcome = registrar.register("QmMedia", "QmMeta", &fp, &ctx()).await.unwrap();
        assert!(matches!(outcome, RegistrationOutcome::Confirmed(_)));

        let record = ledger.lookup(&fp).await.unwrap();
        assert_eq!(record.media_cid, "QmMedia");
        assert_eq!(record.metadata_cid, "QmMeta");
        assert_eq!(record.owner, OWNER);
    }

    #[tokio::test]
    async fn test_lost_race_is_soft_success() {
        let ledger = InMemoryLedger::new(OWNER);
        let fp = fingerprint_bytes(b"photo");
        ledger.connect("0x2").register("QmOther", "QmOtherMeta", &fp).await.unwrap();

        let registrar = LedgerRegistrar::new(Arc::new(ledger.clone()));
        let outcome = registrar.register("QmMedia", "QmMeta", &fp, &ctx()).await.unwrap();
        assert_eq!(outcome, RegistrationOutcome::AlreadyRegistered);
        assert_eq!(ledger.lookup(&fp).await.unwrap().media_cid, "QmOther");
    }

    #[tokio::test]
    async fn test_register_transport_failure() {
        let ledger = InMemoryLedger::new(OWNER);
        ledger.set_offline(true);
        let registrar = LedgerRegistrar::new(Arc::new(ledger));
        let err = registrar
            .register("a", "b", &fingerprint_bytes(b"x"), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Transport(_)));
    }

    #[tokio::test]
    async fn test_deregister_by_owner_with_loose_input() {
        let ledger = InMemoryLedger::new(OWNER);
        let fp = fingerprint_bytes(b"photo");
        ledger.register("a", "b", &fp).await.unwrap();

        let registrar = LedgerRegistrar::new(Arc::new(ledger.connect(&OWNER.to_lowercase())));
        let raw = format!("  {}  ", fp.as_str().trim_start_matches("0x").to_uppercase());
        registrar.deregister(&raw, &ctx()).await.unwrap();
        assert_eq!(ledger.active_count(), 0);
    }

    #[tokio::test]
    async fn test_deregister_by_stranger_sends_nothing() {
        let ledger = InMemoryLedger::new(OWNER);
        let fp = fingerprint_bytes(b"photo");
        ledger.register("a", "b", &fp).await.unwrap();

        let registrar = LedgerRegistrar::new(Arc::new(ledger.connect("0xdead")));
        let err = registrar.deregister(fp.as_str(), &ctx()).await.unwrap_err();
        assert_eq!(err.kind(), Some(&LedgerErrorKind::Unauthorized));
        assert_eq!(ledger.active_count(), 1);
    }

    #[tokio::test]
    async fn test_deregister_errors() {
        let registrar = LedgerRegistrar::new(Arc::new(InMemoryLedger::new(OWNER)));

        let err = registrar.deregister("0x1234", &ctx()).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidFingerprint(_)));

        let fp = fingerprint_bytes(b"never");
        let err = registrar.deregister(fp.as_str(), &ctx()).await.unwrap_err();
        assert!(err.kind().map(|k| k.is_not_found()).unwrap_or(false));
    }
}
