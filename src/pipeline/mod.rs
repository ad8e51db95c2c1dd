//! Pipeline orchestration module.
//!
//! Registration pipeline that coordinates, per media item:
//! - Content fingerprinting
//! - Ledger uniqueness check
//! - Authenticity classification and gating
//! - Media and metadata pinning
//! - Tag record creation
//! - Ledger registration
//!
//! Batches run items in order and commit them per item or as one
//! collection.

pub mod batch;
pub mod context;
pub mod orchestrator;
pub mod progress;
pub mod removal;
pub mod state;

pub use batch::*;
pub use context::*;
pub use orchestrator::*;
pub use progress::*;
pub use removal::*;
pub use state::*;
