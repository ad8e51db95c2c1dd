//! Pipeline context management.
//!
//! Provides batch and submission context for logging and state tracking.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::RegistrationGranularity;
use crate::logging::structured::LogContext;
use crate::media::MediaItem;

/// Context for one submission of one or more media items.
#[derive(Debug, Clone)]
pub struct BatchContext {
    pub batch_id: String,
    pub started_at: DateTime<Utc>,
    pub registration: RegistrationGranularity,
    pub item_count: usize,
}

impl BatchContext {
    pub fn new(registration: RegistrationGranularity, item_count: usize) -> Self {
        let batch_id = format!("batch-{}", &Uuid::new_v4().to_string()[..8]);

        Self {
            batch_id,
            started_at: Utc::now(),
            registration,
            item_count,
        }
    }

    /// Create a submission context for one item of this batch.
    pub fn submission_context(&self, index: usize, item: &MediaItem) -> SubmissionContext {
        SubmissionContext {
            batch_id: self.batch_id.clone(),
            index,
            display_name: item.display_name.clone(),
        }
    }

    pub fn log_context(&self) -> LogContext {
        LogContext::new(&self.batch_id)
    }

    /// Percentage of items processed after `completed` items, never above 100.
    pub fn percent_after(&self, completed: usize) -> u8 {
        if self.item_count == 0 {
            return 100;
        }
        ((completed.min(self.item_count) * 100) / self.item_count) as u8
    }
}

/// Context for a single item within a batch.
#[derive(Debug, Clone)]
pub struct SubmissionContext {
    pub batch_id: String,
    /// Zero-based position in the batch.
    pub index: usize,
    pub display_name: String,
}

impl SubmissionContext {
    pub fn log_context(&self) -> LogContext {
        LogContext::new(&self.batch_id).with_item(&self.display_name)
    }
}
