//! Submission-scoped event logging.
//!
//! [`LogContext`] names the submission and, once known, the media item.
//! The `log_*!` macros prefix every event with it.

pub mod structured;

pub use structured::*;
