//! Record store module.
//!
//! Durable tag records describing registered media:
//! - `models` - tag, status and media URL types
//! - `validation` - shape rules checked before storage
//! - `store` - record store contract and in-process store
//! - `http` - REST client for the hosted store
//! - `recorder` - pipeline step persisting a tag

pub mod http;
pub mod models;
pub mod recorder;
pub mod store;
pub mod validation;

pub use http::*;
pub use models::*;
pub use recorder::*;
pub use store::*;
pub use validation::*;
