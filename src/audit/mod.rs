//! Audit trail module.
//!
//! Append-only, per-submission event log:
//! - Event and trail types with stable wire names
//! - Local recoverable persistence until the submission finalizes

pub mod store;
pub mod trail;

pub use store::*;
pub use trail::*;
