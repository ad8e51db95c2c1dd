//! Content fingerprinting.
//!
//! Deterministic, ledger-encoded fingerprints used as the dedup key across
//! the ledger contract and the record store.

pub mod fingerprint;

pub use fingerprint::*;
