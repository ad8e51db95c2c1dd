//! MediaTag Core - media registration pipeline
//!
//! This crate fingerprints submitted media, rejects content that is already
//! registered or judged synthetic, pins accepted media to IPFS and binds
//! each fingerprint to its stored objects on a registry ledger. The
//! implementation prioritizes:
//!
//! 1. **Integrity** - Nothing reaches the ledger without passing every gate
//! 2. **Logging** - Every decision point logged with full context
//! 3. **Traceability** - An append-only audit trail per submission
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `pipeline` - Per-item and batch orchestrators
//! - `hashing` - Content fingerprints
//! - `ledger` - Registry contract, uniqueness check, registration
//! - `detection` - Detector client and authenticity gating
//! - `storage` - IPFS pinning and metadata documents
//! - `records` - Tag records and their store
//! - `audit` - Audit trails and their local persistence
//! - `media` - Submitted media items
//! - `config` - Environment-driven configuration
//! - `logging` - Structured logging with submission context

pub mod audit;
pub mod config;
pub mod detection;
pub mod error;
pub mod hashing;
pub mod ledger;
pub mod logging;
pub mod media;
pub mod pipeline;
pub mod records;
pub mod storage;

pub use error::PipelineError;

/// Initialize the process-wide logger. Safe to call more than once.
pub fn init_logger() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_millis()
        .try_init();
}
