//! Batch processing.
//!
//! Items are screened one at a time in submission order; an item's
//! failure never stops the rest. With per-item registration each accepted
//! item is committed on its own. With per-batch registration the survivors
//! are committed together as one collection after all items are screened.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::audit::{AuditEventType, AuditStatus, AuditTrail};
use crate::config::RegistrationGranularity;
use crate::detection::Verdict;
use crate::error::PipelineError;
use crate::hashing::ContentFingerprint;
use crate::media::MediaItem;
use crate::records::Tag;
use crate::{log_info, log_warn};

use super::context::BatchContext;
use super::orchestrator::{CommitShape, ItemRun, PipelineOrchestrator, Registration};
use super::progress::ProgressEvent;
use super::state::PipelineState;

/// Items submitted together, with an optional collection description.
#[derive(Debug, Clone)]
pub struct BatchSubmission {
    pub items: Vec<MediaItem>,
    pub collection_name: String,
    pub collection_description: String,
}

impl BatchSubmission {
    pub fn new(items: Vec<MediaItem>) -> Self {
        Self {
            items,
            collection_name: String::new(),
            collection_description: String::new(),
        }
    }

    pub fn with_collection(mut self, name: &str, description: &str) -> Self {
        self.collection_name = name.to_string();
        self.collection_description = description.to_string();
        self
    }
}

/// What happened to one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum ItemOutcome {
    Registered,
    ExcludedSynthetic,
    ExcludedDuplicate,
    Failed(String),
}

impl ItemOutcome {
    pub fn from_error(err: &PipelineError) -> Self {
        match err {
            PipelineError::SyntheticContent { .. } => ItemOutcome::ExcludedSynthetic,
            PipelineError::DuplicateMedia { .. } => ItemOutcome::ExcludedDuplicate,
            other => ItemOutcome::Failed(other.to_string()),
        }
    }

    pub fn from_result<T>(result: &Result<T, PipelineError>) -> Self {
        match result {
            Ok(_) => ItemOutcome::Registered,
            Err(e) => Self::from_error(e),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemOutcome::Registered => "registered",
            ItemOutcome::ExcludedSynthetic => "excluded_synthetic",
            ItemOutcome::ExcludedDuplicate => "excluded_duplicate",
            ItemOutcome::Failed(_) => "failed",
        }
    }

    /// Excluded by a screening rule rather than by a fault.
    pub fn is_excluded(&self) -> bool {
        matches!(self, ItemOutcome::ExcludedSynthetic | ItemOutcome::ExcludedDuplicate)
    }
}

#[derive(Debug, Clone)]
pub struct ItemResult {
    pub index: usize,
    pub display_name: String,
    pub fingerprint: Option<ContentFingerprint>,
    pub natural_probability: Option<u8>,
    pub verdict: Option<Verdict>,
    pub state: PipelineState,
    pub outcome: ItemOutcome,
}

impl ItemResult {
    fn from_run(run: &ItemRun, outcome: ItemOutcome) -> Self {
        Self {
            index: run.index,
            display_name: run.item.display_name.clone(),
            fingerprint: run.fingerprint.clone(),
            natural_probability: run.classification.as_ref().map(|c| c.natural_probability()),
            verdict: run.classification.as_ref().map(|c| c.display_verdict()),
            state: run.state(),
            outcome,
        }
    }
}

/// Result of a batch. Per-item entries are in submission order.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub batch_id: String,
    pub registration: RegistrationGranularity,
    pub per_item: Vec<ItemResult>,
    pub succeeded_count: usize,
    pub excluded_count: usize,
    pub failed_count: usize,
    /// One per committed item, or one for the whole batch.
    pub registrations: Vec<Registration>,
    /// Final trails: one per item, or one shared.
    pub trails: Vec<AuditTrail>,
    /// Set when a per-batch commit failed after screening.
    pub commit_error: Option<String>,
}

impl BatchResult {
    /// The combined tag of a per-batch registration.
    pub fn tag(&self) -> Option<&Tag> {
        self.registrations.first().map(|r| &r.tag)
    }

    fn tally(&mut self) {
        self.succeeded_count = self
            .per_item
            .iter()
            .filter(|r| r.outcome == ItemOutcome::Registered)
            .count();
        self.excluded_count = self.per_item.iter().filter(|r| r.outcome.is_excluded()).count();
        self.failed_count = self.per_item.len() - self.succeeded_count - self.excluded_count;
    }
}

pub struct BatchOrchestrator {
    pipeline: PipelineOrchestrator,
    granularity: RegistrationGranularity,
}

impl BatchOrchestrator {
    pub fn new(pipeline: PipelineOrchestrator, granularity: RegistrationGranularity) -> Self {
        Self { pipeline, granularity }
    }

    pub fn pipeline(&self) -> &PipelineOrchestrator {
        &self.pipeline
    }

    pub fn granularity(&self) -> RegistrationGranularity {
        self.granularity
    }

    pub async fn process(&self, submission: BatchSubmission) -> BatchResult {
        let batch = BatchContext::new(self.granularity, submission.items.len());
        let ctx = batch.log_context();

        log_info!(
            ctx,
            "BATCH_START",
            items = submission.items.len(),
            registration = self.granularity
        );

        let mut result = match self.granularity {
            RegistrationGranularity::PerItem => self.process_per_item(&batch, submission).await,
            RegistrationGranularity::PerBatch => self.process_per_batch(&batch, submission).await,
        };
        result.tally();

        log_info!(
            ctx,
            "BATCH_COMPLETE",
            succeeded = result.succeeded_count,
            excluded = result.excluded_count,
            failed = result.failed_count
        );
        result
    }

    async fn process_per_item(&self, batch: &BatchContext, submission: BatchSubmission) -> BatchResult {
        let mut result = empty_result(batch);
        let mut earlier: HashMap<ContentFingerprint, String> = HashMap::new();

        for (index, item) in submission.items.into_iter().enumerate() {
            let submission_ctx = batch.submission_context(index, &item);
            let mut trail = AuditTrail::new(&item.display_name);
            let mut run = ItemRun::new(&submission_ctx, item, RegistrationGranularity::PerItem);

            let outcome = self.pipeline.process_item(&mut run, &mut trail, &earlier).await;
            // Only committed content blocks later repeats; a failed item may be resubmitted.
            if let (Ok(_), Some(fp)) = (&outcome, &run.fingerprint) {
                earlier
                    .entry(fp.clone())
                    .or_insert_with(|| run.item.display_name.clone());
            }

            let item_outcome = ItemOutcome::from_result(&outcome);
            self.item_completed(batch, &run, item_outcome.as_str());
            result.per_item.push(ItemResult::from_run(&run, item_outcome));
            if let Ok(registration) = outcome {
                result.registrations.push(registration);
            }
            result.trails.push(trail);
        }
        result
    }

    async fn process_per_batch(&self, batch: &BatchContext, submission: BatchSubmission) -> BatchResult {
        let mut result = empty_result(batch);
        let ctx = batch.log_context();
        let subject = if submission.collection_name.trim().is_empty() {
            batch.batch_id.clone()
        } else {
            submission.collection_name.clone()
        };
        let mut trail = AuditTrail::new(&subject);
        let mut earlier: HashMap<ContentFingerprint, String> = HashMap::new();
        let mut runs: Vec<(ItemRun, Option<PipelineError>)> = Vec::with_capacity(submission.items.len());

        for (index, item) in submission.items.into_iter().enumerate() {
            let submission_ctx = batch.submission_context(index, &item);
            let mut run = ItemRun::new(&submission_ctx, item, RegistrationGranularity::PerBatch);

            let mut screened = self.pipeline.screen(&mut run, &mut trail, &earlier).await;
            if screened.is_ok() {
                screened = self.pipeline.stage_media(&mut run, &mut trail).await;
            }
            // Only survivors block later repeats.
            if let (Ok(()), Some(fp)) = (&screened, &run.fingerprint) {
                earlier
                    .entry(fp.clone())
                    .or_insert_with(|| run.item.display_name.clone());
            }

            // Survivors are only accepted until the commit decides.
            let provisional = match &screened {
                Ok(()) => "accepted",
                Err(e) => ItemOutcome::from_error(e).as_str(),
            };
            self.item_completed(batch, &run, provisional);
            runs.push((run, screened.err()));
        }

        let (survivors, rejected): (Vec<_>, Vec<_>) = runs.into_iter().partition(|(_, err)| err.is_none());
        let mut survivor_runs: Vec<ItemRun> = survivors.into_iter().map(|(run, _)| run).collect();

        let commit = if survivor_runs.is_empty() {
            log_warn!(ctx, "BATCH_EMPTY", reason = "no items passed screening");
            self.pipeline.audit(
                &mut trail,
                &ctx,
                AuditEventType::RegistrationComplete,
                "Registration complete",
                AuditStatus::Error,
                Some("No items passed screening".to_string()),
            );
            None
        } else {
            let shape = CommitShape::Collection {
                name: submission.collection_name.clone(),
                description: submission.collection_description.clone(),
            };
            Some(self.pipeline.commit(&mut survivor_runs, &mut trail, &shape, &ctx).await)
        };

        let survivor_outcome = match &commit {
            Some(Ok(registration)) => {
                result.registrations.push(registration.clone());
                ItemOutcome::Registered
            }
            Some(Err(e)) => {
                result.commit_error = Some(e.to_string());
                ItemOutcome::Failed(e.to_string())
            }
            None => ItemOutcome::Registered,
        };

        let mut per_item: Vec<ItemResult> = survivor_runs
            .iter()
            .map(|run| ItemResult::from_run(run, survivor_outcome.clone()))
            .chain(
                rejected
                    .iter()
                    .map(|(run, err)| match err {
                        Some(e) => ItemResult::from_run(run, ItemOutcome::from_error(e)),
                        None => ItemResult::from_run(run, ItemOutcome::Failed("not screened".to_string())),
                    }),
            )
            .collect();
        per_item.sort_by_key(|r| r.index);

        result.per_item = per_item;
        result.trails.push(trail);
        result
    }

    fn item_completed(&self, batch: &BatchContext, run: &ItemRun, outcome: &str) {
        self.pipeline.progress.emit(ProgressEvent::ItemCompleted {
            index: run.index,
            item: run.item.display_name.clone(),
            outcome: outcome.to_string(),
            percent: batch.percent_after(run.index + 1),
        });
    }
}

fn empty_result(batch: &BatchContext) -> BatchResult {
    BatchResult {
        batch_id: batch.batch_id.clone(),
        registration: batch.registration,
        per_item: Vec::new(),
        succeeded_count: 0,
        excluded_count: 0,
        failed_count: 0,
        registrations: Vec::new(),
        trails: Vec::new(),
        commit_error: None,
    }
}
