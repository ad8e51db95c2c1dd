//! Revert decoding.
//!
//! Contract reverts are identified by their 4-byte selector only. Unknown
//! selectors decode to `Unknown` and are never guessed at.

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;
use thiserror::Error;

use crate::hashing::ContentFingerprint;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LedgerErrorKind {
    MediaNotFound,
    MediaNotRegistered,
    Unauthorized,
    NotOwner,
    AlreadyDeregistered,
    MediaAlreadyRegistered,
    Unknown(String),
}

lazy_static! {
    static ref SELECTOR_TABLE: HashMap<&'static str, LedgerErrorKind> = {
        let mut m = HashMap::new();
        m.insert("0x6999de4a", LedgerErrorKind::MediaNotFound);
        m.insert("0xaa31b366", LedgerErrorKind::MediaNotRegistered);
        m.insert("0x30c41534", LedgerErrorKind::Unauthorized);
        m.insert("0x4f6de9d0", LedgerErrorKind::NotOwner);
        m.insert("0xe7e78fd5", LedgerErrorKind::AlreadyDeregistered);
        m.insert("0x95c1cb93", LedgerErrorKind::MediaAlreadyRegistered);
        m
    };
}

impl LedgerErrorKind {
    pub fn selector(&self) -> Option<&'static str> {
        SELECTOR_TABLE
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(sel, _)| *sel)
    }

    pub fn name(&self) -> &str {
        match self {
            LedgerErrorKind::MediaNotFound => "MediaNotFound",
            LedgerErrorKind::MediaNotRegistered => "MediaNotRegistered",
            LedgerErrorKind::Unauthorized => "Unauthorized",
            LedgerErrorKind::NotOwner => "NotOwner",
            LedgerErrorKind::AlreadyDeregistered => "AlreadyDeregistered",
            LedgerErrorKind::MediaAlreadyRegistered => "MediaAlreadyRegistered",
            LedgerErrorKind::Unknown(_) => "UnknownLedgerError",
        }
    }

    /// Human-readable message surfaced to callers.
    pub fn message(&self) -> String {
        match self {
            LedgerErrorKind::MediaNotFound | LedgerErrorKind::MediaNotRegistered => {
                "This media is not registered on the ledger.".to_string()
            }
            LedgerErrorKind::Unauthorized | LedgerErrorKind::NotOwner => {
                "You are not authorized to deregister this media.".to_string()
            }
            LedgerErrorKind::AlreadyDeregistered => {
                "This media has already been deregistered.".to_string()
            }
            LedgerErrorKind::MediaAlreadyRegistered => {
                "This media has already been registered.".to_string()
            }
            LedgerErrorKind::Unknown(selector) => {
                format!("Unrecognized ledger error (selector {})", selector)
            }
        }
    }

    /// Reverts that mean "no such record".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LedgerErrorKind::MediaNotFound | LedgerErrorKind::MediaNotRegistered
        )
    }

    pub fn is_authorization(&self) -> bool {
        matches!(self, LedgerErrorKind::Unauthorized | LedgerErrorKind::NotOwner)
    }
}

impl fmt::Display for LedgerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decode revert data (`0x` + selector + ABI-encoded args).
pub fn decode_revert(data: &str) -> LedgerErrorKind {
    let trimmed = data.trim().to_ascii_lowercase();
    let selector = trimmed.get(..10).unwrap_or(trimmed.as_str());
    SELECTOR_TABLE
        .get(selector)
        .cloned()
        .unwrap_or_else(|| LedgerErrorKind::Unknown(selector.to_string()))
}

#[derive(Debug, Error)]
#[error("{0} has no selector")]
pub struct UnencodableError(pub LedgerErrorKind);

/// Encode revert data for a known error, with an optional `bytes32` argument.
pub fn encode_revert(
    kind: &LedgerErrorKind,
    arg: Option<&ContentFingerprint>,
) -> Result<String, UnencodableError> {
    let selector = kind
        .selector()
        .ok_or_else(|| UnencodableError(kind.clone()))?;
    let mut data = selector.to_string();
    if let Some(fp) = arg {
        data.push_str(&fp.as_str()[2..]);
    }
    Ok(data)
}
