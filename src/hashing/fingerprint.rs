//! Two-stage content fingerprint.
//!
//! SHA-256 over the raw media bytes, then Keccak-256 over the 32 digest
//! bytes. The result is rendered the way the ledger contract expects a
//! `bytes32`: `0x` followed by 64 lowercase hex characters.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sha3::Keccak256;
use thiserror::Error;

/// Length of a formatted fingerprint, `0x` prefix included.
pub const FINGERPRINT_LEN: usize = 66;

const READ_CHUNK: usize = 8 * 1024;

lazy_static! {
    static ref FINGERPRINT_PATTERN: Regex = Regex::new(r"^0x[0-9a-fA-F]{64}$").unwrap();
}

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("Invalid hash format. Expected 66 characters (0x + 64 hex), got {0}")]
    InvalidLength(usize),

    #[error("Invalid hex format: {0}")]
    InvalidHex(String),

    #[error("Failed to read media content: {0}")]
    Io(#[from] io::Error),
}

/// Canonical content fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    /// Parse a fingerprint received from outside the process.
    ///
    /// Surrounding whitespace is trimmed and a missing `0x` prefix is added
    /// before the format is checked. Malformed input never reaches the ledger.
    pub fn parse(raw: &str) -> Result<Self, FingerprintError> {
        let trimmed = raw.trim();
        let prefixed = if trimmed.starts_with("0x") {
            trimmed.to_string()
        } else {
            format!("0x{}", trimmed)
        };

        if prefixed.len() != FINGERPRINT_LEN {
            return Err(FingerprintError::InvalidLength(prefixed.len()));
        }
        if !FINGERPRINT_PATTERN.is_match(&prefixed) {
            return Err(FingerprintError::InvalidHex(prefixed));
        }

        Ok(Self(prefixed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 32 raw bytes, as passed to a `bytes32` contract argument.
    pub fn to_bytes32(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        // Format is enforced at construction.
        if let Ok(bytes) = hex::decode(&self.0[2..]) {
            out.copy_from_slice(&bytes);
        }
        out
    }

    fn from_digest(digest: &[u8]) -> Self {
        Self(format!("0x{}", hex::encode(digest)))
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentFingerprint {
    type Error = FingerprintError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentFingerprint> for String {
    fn from(value: ContentFingerprint) -> Self {
        value.0
    }
}

/// Fingerprint an in-memory buffer.
pub fn fingerprint_bytes(bytes: &[u8]) -> ContentFingerprint {
    let content_digest = Sha256::digest(bytes);
    ledger_encode(&content_digest)
}

/// Fingerprint a byte stream without buffering it whole.
pub fn fingerprint_reader<R: Read>(mut reader: R) -> Result<ContentFingerprint, FingerprintError> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; READ_CHUNK];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&buf[..n]);
    }
    Ok(ledger_encode(&hasher.finalize()))
}

/// Fingerprint a file on disk.
pub fn fingerprint_file(path: &Path) -> Result<ContentFingerprint, FingerprintError> {
    let file = File::open(path)?;
    fingerprint_reader(file)
}

fn ledger_encode(content_digest: &[u8]) -> ContentFingerprint {
    let ledger_digest = Keccak256::digest(content_digest);
    ContentFingerprint::from_digest(&ledger_digest)
}
