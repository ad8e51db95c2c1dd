//! Storage module.
//!
//! Content-addressed storage for media and metadata documents:
//! - `pinning` - pinning service contract, Pinata client, in-memory service
//! - `source` - fetching detector-hosted media copies
//! - `metadata` - single and collection metadata documents
//! - `uploader` - ordered pinning and gateway URLs

pub mod metadata;
pub mod pinning;
pub mod source;
pub mod uploader;

pub use metadata::*;
pub use pinning::*;
pub use source::*;
pub use uploader::*;
