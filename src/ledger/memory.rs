//! In-process registry contract.
//!
//! Mirrors the deployed contract's rules and revert encodings so the
//! pipeline can run locally and under test. Handles created with
//! [`InMemoryLedger::connect`] share state but act as different addresses.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use sha3::{Digest, Keccak256};

use crate::hashing::ContentFingerprint;

use super::contract::{LedgerCallError, LedgerContract, LedgerRecord, TxReceipt};
use super::errors::{encode_revert, LedgerErrorKind};

#[derive(Debug)]
struct Entry {
    record: LedgerRecord,
    active: bool,
}

/// A `register` call that reached the contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterCall {
    pub media_cid: String,
    pub metadata_cid: String,
    pub fingerprint: ContentFingerprint,
    pub sender: String,
}

#[derive(Debug, Default)]
struct LedgerState {
    entries: HashMap<ContentFingerprint, Entry>,
    register_calls: Vec<RegisterCall>,
    block_number: u64,
    offline: bool,
}

#[derive(Clone)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
    actor: String,
}

impl InMemoryLedger {
    pub fn new(actor: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState::default())),
            actor: actor.to_string(),
        }
    }

    /// Another handle on the same ledger, acting as `actor`.
    pub fn connect(&self, actor: &str) -> Self {
        Self {
            state: Arc::clone(&self.state),
            actor: actor.to_string(),
        }
    }

    /// Simulate an unreachable node: every call fails with a transport error.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    pub fn register_calls(&self) -> Vec<RegisterCall> {
        self.state.lock().register_calls.clone()
    }

    pub fn active_count(&self) -> usize {
        self.state.lock().entries.values().filter(|e| e.active).count()
    }

    fn revert(kind: LedgerErrorKind, fingerprint: Option<&ContentFingerprint>) -> LedgerCallError {
        match encode_revert(&kind, fingerprint) {
            Ok(data) => LedgerCallError::Reverted { data },
            Err(e) => LedgerCallError::Malformed(e.to_string()),
        }
    }

    fn receipt(state: &mut LedgerState, fingerprint: &ContentFingerprint, sender: &str) -> TxReceipt {
        state.block_number += 1;
        let mut hasher = Keccak256::new();
        hasher.update(fingerprint.to_bytes32());
        hasher.update(sender.as_bytes());
        hasher.update(state.block_number.to_be_bytes());
        TxReceipt {
            tx_hash: format!("0x{}", hex::encode(hasher.finalize())),
            block_number: state.block_number,
        }
    }
}

#[async_trait]
impl LedgerContract for InMemoryLedger {
    fn actor(&self) -> &str {
        &self.actor
    }

    async fn lookup(&self, fingerprint: &ContentFingerprint) -> Result<LedgerRecord, LedgerCallError> {
        let state = self.state.lock();
        if state.offline {
            return Err(LedgerCallError::Transport("connection refused".to_string()));
        }
        match state.entries.get(fingerprint) {
            Some(entry) if entry.active => Ok(entry.record.clone()),
            _ => Err(Self::revert(LedgerErrorKind::MediaNotFound, Some(fingerprint))),
        }
    }

    async fn register(
        &self,
        media_cid: &str,
        metadata_cid: &str,
        fingerprint: &ContentFingerprint,
    ) -> Result<TxReceipt, LedgerCallError> {
        let mut state = self.state.lock();
        if state.offline {
            return Err(LedgerCallError::Transport("connection refused".to_string()));
        }
        state.register_calls.push(RegisterCall {
            media_cid: media_cid.to_string(),
            metadata_cid: metadata_cid.to_string(),
            fingerprint: fingerprint.clone(),
            sender: self.actor.clone(),
        });

        if state.entries.get(fingerprint).map(|e| e.active).unwrap_or(false) {
            return Err(Self::revert(
                LedgerErrorKind::MediaAlreadyRegistered,
                Some(fingerprint),
            ));
        }

        state.entries.insert(
            fingerprint.clone(),
            Entry {
                record: LedgerRecord {
                    media_cid: media_cid.to_string(),
                    metadata_cid: metadata_cid.to_string(),
                    owner: self.actor.clone(),
                    timestamp: Utc::now().timestamp().max(0) as u64,
                },
                active: true,
            },
        );
        Ok(Self::receipt(&mut state, fingerprint, &self.actor))
    }

    async fn deregister(&self, fingerprint: &ContentFingerprint) -> Result<TxReceipt, LedgerCallError> {
        let mut state = self.state.lock();
        if state.offline {
            return Err(LedgerCallError::Transport("connection refused".to_string()));
        }
        let entry = match state.entries.get_mut(fingerprint) {
            Some(entry) => entry,
            None => {
                return Err(Self::revert(
                    LedgerErrorKind::MediaNotRegistered,
                    Some(fingerprint),
                ))
            }
        };
        if !entry.active {
            return Err(Self::revert(
                LedgerErrorKind::AlreadyDeregistered,
                Some(fingerprint),
            ));
        }
        if !entry.record.owner.eq_ignore_ascii_case(&self.actor) {
            return Err(Self::revert(LedgerErrorKind::Unauthorized, None));
        }
        entry.active = false;
        Ok(Self::receipt(&mut state, fingerprint, &self.actor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::fingerprint_bytes;

    const ALICE: &str = "0xA11CE00000000000000000000000000000000001";
    const BOB: &str = "0xB0B0000000000000000000000000000000000002";

    #[tokio::test]
    async fn test_register_then_lookup() {
        let ledger = InMemoryLedger::new(ALICE);
        let fp = fingerprint_bytes(b"media");

        let receipt = ledger.register("QmMedia", "QmMeta", &fp).await.unwrap();
        assert_eq!(receipt.block_number, 1);
        assert_eq!(receipt.tx_hash.len(), 66);

        let record = ledger.lookup(&fp).await.unwrap();
        assert_eq!(record.media_cid, "QmMedia");
        assert_eq!(record.metadata_cid, "QmMeta");
        assert_eq!(record.owner, ALICE);
    }

    #[tokio::test]
    async fn test_lookup_missing_reverts_not_found() {
        let ledger = InMemoryLedger::new(ALICE);
        let err = ledger.lookup(&fingerprint_bytes(b"nope")).await.unwrap_err();
        assert_eq!(err.decoded(), Some(LedgerErrorKind::MediaNotFound));
    }

    #[tokio::test]
    async fn test_double_register_reverts() {
        let ledger = InMemoryLedger::new(ALICE);
        let fp = fingerprint_bytes(b"media");
        ledger.register("a", "b", &fp).await.unwrap();

        let err = ledger.connect(BOB).register("c", "d", &fp).await.unwrap_err();
        assert_eq!(err.decoded(), Some(LedgerErrorKind::MediaAlreadyRegistered));
        assert_eq!(ledger.lookup(&fp).await.unwrap().owner, ALICE);
        assert_eq!(ledger.register_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_deregister_rules() {
        let ledger = InMemoryLedger::new(ALICE);
        let fp = fingerprint_bytes(b"media");

        let err = ledger.deregister(&fp).await.unwrap_err();
        assert_eq!(err.decoded(), Some(LedgerErrorKind::MediaNotRegistered));

        ledger.register("a", "b", &fp).await.unwrap();
        let err = ledger.connect(BOB).deregister(&fp).await.unwrap_err();
        assert_eq!(err.decoded(), Some(LedgerErrorKind::Unauthorized));

        ledger.connect(&ALICE.to_lowercase()).deregister(&fp).await.unwrap();
        assert_eq!(ledger.active_count(), 0);

        let err = ledger.deregister(&fp).await.unwrap_err();
        assert_eq!(err.decoded(), Some(LedgerErrorKind::AlreadyDeregistered));
        let err = ledger.lookup(&fp).await.unwrap_err();
        assert_eq!(err.decoded(), Some(LedgerErrorKind::MediaNotFound));
    }

    #[tokio::test]
    async fn test_offline() {
        let ledger = InMemoryLedger::new(ALICE);
        ledger.set_offline(true);
        let err = ledger.lookup(&fingerprint_bytes(b"x")).await.unwrap_err();
        assert!(matches!(err, LedgerCallError::Transport(_)));
        assert_eq!(err.decoded(), None);
    }
}
