//! Event lines for the registration pipeline.
//!
//! Each line reads `[batch=<submission>] [item=<file>] EVENT key=value ...`.
//! Events are UPPER_SNAKE names such as `MEDIA_PINNED`; grepping a batch id
//! follows one submission end to end.

use std::fmt;

/// Logging context for a submission (a batch of one or more media items).
#[derive(Debug, Clone)]
pub struct LogContext {
    pub batch_id: String,
    pub item: Option<String>,
}

impl LogContext {
    pub fn new(batch_id: &str) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            item: None,
        }
    }

    pub fn with_item(&self, item: &str) -> Self {
        Self {
            batch_id: self.batch_id.clone(),
            item: Some(item.to_string()),
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.item {
            Some(item) => write!(f, "[batch={}] [item={}]", self.batch_id, item),
            None => write!(f, "[batch={}]", self.batch_id),
        }
    }
}

/// Emit an event line at info level.
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $event:expr $(, $key:ident = $value:expr)* $(,)?) => {
        log::info!(
            concat!("{} {}" $(, " ", stringify!($key), "={}")*),
            $ctx,
            $event
            $(, $value)*
        );
    };
}

/// Emit an event line at warn level.
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $event:expr $(, $key:ident = $value:expr)* $(,)?) => {
        log::warn!(
            concat!("{} {}" $(, " ", stringify!($key), "={}")*),
            $ctx,
            $event
            $(, $value)*
        );
    };
}

/// Emit an event line at error level.
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $event:expr $(, $key:ident = $value:expr)* $(,)?) => {
        log::error!(
            concat!("{} {}" $(, " ", stringify!($key), "={}")*),
            $ctx,
            $event
            $(, $value)*
        );
    };
}

/// Emit an event line at debug level.
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $event:expr $(, $key:ident = $value:expr)* $(,)?) => {
        log::debug!(
            concat!("{} {}" $(, " ", stringify!($key), "={}")*),
            $ctx,
            $event
            $(, $value)*
        );
    };
}
