//! Authenticity detection module.
//!
//! Submits media to the external detector and maps the returned
//! probabilities to a categorical verdict and a gate decision:
//! - `verdict` - thresholds and the gate policy
//! - `detector` - detector contract and HTTP client
//! - `classifier` - detector call plus policy evaluation

pub mod classifier;
pub mod detector;
pub mod verdict;

pub use classifier::*;
pub use detector::*;
pub use verdict::*;
