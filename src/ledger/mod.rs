//! Ledger module.
//!
//! Everything that talks to the registry contract:
//! - `errors` - revert selector decoding table
//! - `contract` - contract interface and call errors
//! - `memory` - in-process reference contract
//! - `uniqueness` - fingerprint lookup classification
//! - `registrar` - registration and deregistration transactions

pub mod contract;
pub mod errors;
pub mod memory;
pub mod registrar;
pub mod uniqueness;

pub use contract::*;
pub use errors::*;
pub use memory::*;
pub use registrar::*;
pub use uniqueness::*;
