//! Registry contract interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hashing::ContentFingerprint;

use super::errors::{decode_revert, LedgerErrorKind};

/// Binding stored on the ledger for a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRecord {
    pub media_cid: String,
    pub metadata_cid: String,
    pub owner: String,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
}

impl LedgerRecord {
    /// Media CIDs; bulk registrations carry a comma-joined list.
    pub fn media_cids(&self) -> Vec<&str> {
        self.media_cid.split(',').filter(|c| !c.is_empty()).collect()
    }
}

/// Receipt of a confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_number: u64,
}

#[derive(Debug, Error)]
pub enum LedgerCallError {
    /// The contract reverted; `data` holds the selector and arguments.
    #[error("execution reverted: {data}")]
    Reverted { data: String },

    #[error("Ledger transport error: {0}")]
    Transport(String),

    #[error("Malformed ledger response: {0}")]
    Malformed(String),
}

impl LedgerCallError {
    pub fn decoded(&self) -> Option<LedgerErrorKind> {
        match self {
            LedgerCallError::Reverted { data } => Some(decode_revert(data)),
            _ => None,
        }
    }
}

/// Handle on the registry contract, bound to one acting address.
///
/// State-changing calls return only after the transaction is confirmed.
#[async_trait]
pub trait LedgerContract: Send + Sync {
    /// Address transactions are sent from.
    fn actor(&self) -> &str;

    async fn lookup(&self, fingerprint: &ContentFingerprint) -> Result<LedgerRecord, LedgerCallError>;

    async fn register(
        &self,
        media_cid: &str,
        metadata_cid: &str,
        fingerprint: &ContentFingerprint,
    ) -> Result<TxReceipt, LedgerCallError>;

    async fn deregister(&self, fingerprint: &ContentFingerprint) -> Result<TxReceipt, LedgerCallError>;
}
