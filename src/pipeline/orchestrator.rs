//! Registration pipeline for media items.
//!
//! One item moves through hashing, the ledger uniqueness check,
//! authenticity classification and media pinning (`screen` and
//! `stage_media`). Accepted items are then committed together: metadata
//! document, tag record, ledger registration (`commit`). A single
//! submission commits one item; a per-batch submission commits all
//! survivors at once.
//!
//! Every stage appends a PENDING audit event on entry and a SUCCESS or
//! ERROR event on exit. Nothing here retries.

use std::collections::HashMap;
use std::sync::Arc;

use crate::audit::{AuditEventType, AuditStatus, AuditStore, AuditStoreError, AuditTrail, FileAuditStore};
use crate::config::{ConfigError, PipelineConfig, RegistrationGranularity};
use crate::detection::{AuthenticityClassifier, Classification, Detector, GatePolicy, HttpDetector};
use crate::error::PipelineError;
use crate::hashing::{fingerprint_bytes, ContentFingerprint};
use crate::ledger::{LedgerContract, LedgerRegistrar, RegistrationOutcome, UniquenessOutcome, UniquenessVerifier};
use crate::logging::structured::LogContext;
use crate::media::MediaItem;
use crate::records::{MediaUrls, MetadataRecorder, NewTag, RecordStore, RestRecordStore, Tag};
use crate::storage::{
    CollectionFile, CollectionMetadata, HttpMediaSource, MediaSource, PinObject, PinataClient,
    PinningService, StorageUploader, SubmissionMetadata,
};
use crate::{log_debug, log_error, log_info, log_warn};

use super::batch::ItemOutcome;
use super::context::{BatchContext, SubmissionContext};
use super::progress::{ProgressEvent, ProgressSink};
use super::state::{BlockReason, PipelineState, Stage, StageTracker};

/// External systems the pipeline talks to.
pub struct Collaborators {
    pub ledger: Arc<dyn LedgerContract>,
    pub detector: Arc<dyn Detector>,
    pub pinning: Arc<dyn PinningService>,
    pub records: Arc<dyn RecordStore>,
    pub audit_store: Arc<dyn AuditStore>,
    /// Source for detector-hosted copies, used when committing per batch.
    pub media_source: Option<Arc<dyn MediaSource>>,
}

impl Collaborators {
    /// HTTP clients for every service named in `config`, with trails kept
    /// under `config.audit_dir`. The ledger handle is supplied by the caller.
    pub fn from_config(config: &PipelineConfig, ledger: Arc<dyn LedgerContract>) -> Result<Self, ConfigError> {
        let jwt = config.pinning_jwt.as_deref().ok_or_else(|| ConfigError::Invalid {
            key: "MEDIATAG_PINNING_JWT".to_string(),
            value: String::new(),
            reason: "required by the pinning client".to_string(),
        })?;
        let audit_store = FileAuditStore::open(&config.audit_dir).map_err(|e| ConfigError::Invalid {
            key: "MEDIATAG_AUDIT_DIR".to_string(),
            value: config.audit_dir.display().to_string(),
            reason: e.to_string(),
        })?;

        log::info!(
            "COLLABORATORS_CONFIGURED detector={} pinning={} records={} audit_dir={}",
            config.detector_url,
            config.pinning_url,
            config.records_url,
            config.audit_dir.display()
        );

        Ok(Self {
            ledger,
            detector: Arc::new(HttpDetector::new(&config.detector_url)),
            pinning: Arc::new(PinataClient::new(&config.pinning_url, jwt)),
            records: Arc::new(RestRecordStore::new(&config.records_url)),
            audit_store: Arc::new(audit_store),
            media_source: Some(Arc::new(HttpMediaSource::new())),
        })
    }
}

/// Working state of one item.
#[derive(Debug)]
pub struct ItemRun {
    pub index: usize,
    pub item: MediaItem,
    pub ctx: LogContext,
    pub granularity: RegistrationGranularity,
    pub fingerprint: Option<ContentFingerprint>,
    pub classification: Option<Classification>,
    pub media_cid: Option<String>,
    pub media_url: Option<String>,
    tracker: StageTracker,
}

impl ItemRun {
    pub fn new(submission: &SubmissionContext, item: MediaItem, granularity: RegistrationGranularity) -> Self {
        Self {
            index: submission.index,
            item,
            ctx: submission.log_context(),
            granularity,
            fingerprint: None,
            classification: None,
            media_cid: None,
            media_url: None,
            tracker: StageTracker::new(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.tracker.state()
    }

    pub fn tracker(&self) -> &StageTracker {
        &self.tracker
    }

    fn transition(&mut self, next: PipelineState) {
        if let Err(e) = self.tracker.advance(next) {
            log_error!(self.ctx, "ILLEGAL_TRANSITION", error = e);
        }
    }
}

/// How the committed record describes its items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitShape {
    /// One item, described by its own name and description.
    Single,
    /// A collection of items under one name.
    Collection { name: String, description: String },
}

/// A committed registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub tag: Tag,
    pub ledger: RegistrationOutcome,
    /// Trail as of finalization.
    pub trail: AuditTrail,
}

pub struct PipelineOrchestrator {
    pub(super) uniqueness: UniquenessVerifier,
    pub(super) classifier: AuthenticityClassifier,
    pub(super) uploader: StorageUploader,
    pub(super) recorder: MetadataRecorder,
    pub(super) registrar: LedgerRegistrar,
    pub(super) audit_store: Arc<dyn AuditStore>,
    pub(super) media_source: Option<Arc<dyn MediaSource>>,
    pub(super) progress: ProgressSink,
}

impl PipelineOrchestrator {
    pub fn new(collaborators: Collaborators, config: &PipelineConfig) -> Self {
        let Collaborators {
            ledger,
            detector,
            pinning,
            records,
            audit_store,
            media_source,
        } = collaborators;

        Self {
            uniqueness: UniquenessVerifier::new(Arc::clone(&ledger)),
            classifier: AuthenticityClassifier::new(detector, config.gate_policy),
            uploader: StorageUploader::new(pinning, &config.gateway_url),
            recorder: MetadataRecorder::new(records),
            registrar: LedgerRegistrar::new(ledger),
            audit_store,
            media_source,
            progress: ProgressSink::disabled(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    /// Address registrations are made from.
    pub fn owner(&self) -> &str {
        self.registrar.actor()
    }

    pub fn policy(&self) -> &GatePolicy {
        self.classifier.policy()
    }

    /// Register a single item. Equivalent to a batch of one with per-item
    /// registration.
    pub async fn run(&self, item: MediaItem) -> Result<Registration, PipelineError> {
        let batch = BatchContext::new(RegistrationGranularity::PerItem, 1);
        let mut trail = AuditTrail::new(&item.display_name);
        self.run_traced(item, &batch, &mut trail).await
    }

    /// Like [`run`](Self::run), writing to a caller-owned trail.
    pub async fn run_traced(
        &self,
        item: MediaItem,
        batch: &BatchContext,
        trail: &mut AuditTrail,
    ) -> Result<Registration, PipelineError> {
        let submission = batch.submission_context(0, &item);
        let mut run = ItemRun::new(&submission, item, RegistrationGranularity::PerItem);
        let result = self.process_item(&mut run, trail, &HashMap::new()).await;

        self.progress.emit(ProgressEvent::ItemCompleted {
            index: 0,
            item: run.item.display_name.clone(),
            outcome: ItemOutcome::from_result(&result).as_str().to_string(),
            percent: batch.percent_after(1),
        });
        result
    }

    /// Full per-item path: screen, pin, commit this item alone.
    pub(super) async fn process_item(
        &self,
        run: &mut ItemRun,
        trail: &mut AuditTrail,
        earlier: &HashMap<ContentFingerprint, String>,
    ) -> Result<Registration, PipelineError> {
        self.screen(run, trail, earlier).await?;
        self.stage_media(run, trail).await?;
        let ctx = run.ctx.clone();
        self.commit(std::slice::from_mut(run), trail, &CommitShape::Single, &ctx)
            .await
    }

    /// Hash, check uniqueness and classify one item.
    ///
    /// `earlier` maps fingerprints already seen in the same batch to the
    /// item that carried them; a repeat is excluded as a duplicate.
    pub async fn screen(
        &self,
        run: &mut ItemRun,
        trail: &mut AuditTrail,
        earlier: &HashMap<ContentFingerprint, String>,
    ) -> Result<(), PipelineError> {
        // Hashing
        self.enter(run, trail, Stage::Hashing);
        let fingerprint = fingerprint_bytes(&run.item.raw_bytes);
        if run.granularity == RegistrationGranularity::PerItem {
            trail.link(&fingerprint);
        }
        self.audit(
            trail,
            &run.ctx,
            AuditEventType::FileIngest,
            "Content hash generated",
            AuditStatus::Success,
            Some(format!("Hash: {}", fingerprint)),
        );
        run.fingerprint = Some(fingerprint.clone());

        // Uniqueness
        self.enter(run, trail, Stage::CheckingUniqueness);
        if let Some(first) = earlier.get(&fingerprint) {
            let err = PipelineError::DuplicateMedia {
                fingerprint: fingerprint.to_string(),
                detail: format!("same content as {} earlier in this batch", first),
            };
            return Err(self.fail(run, trail, err));
        }
        match self.uniqueness.verify(&fingerprint, &run.ctx).await {
            UniquenessOutcome::Unique => {
                self.audit(
                    trail,
                    &run.ctx,
                    AuditEventType::LedgerCheck,
                    "No existing registration found",
                    AuditStatus::Success,
                    None,
                );
            }
            UniquenessOutcome::Duplicate(record) => {
                let err = PipelineError::DuplicateMedia {
                    fingerprint: fingerprint.to_string(),
                    detail: format!("already registered by {}", record.owner),
                };
                return Err(self.fail(run, trail, err));
            }
            UniquenessOutcome::LookupFailed(reason) => {
                return Err(self.fail(run, trail, PipelineError::LookupIndeterminate(reason)));
            }
        }

        // Classification
        self.enter(run, trail, Stage::Classifying);
        let classification = match self.classifier.classify(&run.item, &run.ctx).await {
            Ok(c) => c,
            Err(e) => return Err(self.fail(run, trail, e.into())),
        };
        let natural = classification.natural_probability();
        let blocked = classification.is_blocked();
        let display = classification.display_verdict();
        run.classification = Some(classification);

        if blocked {
            let err = PipelineError::SyntheticContent {
                natural_probability: natural,
            };
            return Err(self.fail(run, trail, err));
        }
        self.audit(
            trail,
            &run.ctx,
            AuditEventType::AiVerification,
            "Authenticity analysis complete",
            AuditStatus::Success,
            Some(format!("Verdict: {} (natural {}%)", display, natural)),
        );
        Ok(())
    }

    /// Pin the item's media object.
    ///
    /// Per-batch runs pin the detector-hosted copy when one exists and a
    /// media source is configured, so original bytes need not be held for
    /// the whole batch. Otherwise the submitted bytes are pinned.
    pub async fn stage_media(&self, run: &mut ItemRun, trail: &mut AuditTrail) -> Result<(), PipelineError> {
        self.enter(run, trail, Stage::Uploading);

        if run.classification.is_none() {
            let err = PipelineError::StorageUpload("item has not passed classification".to_string());
            return Err(self.fail(run, trail, err));
        }
        let storage_ref = run
            .classification
            .as_ref()
            .and_then(|c| c.result.storage_ref.clone());

        let bytes = match (run.granularity, &storage_ref, &self.media_source) {
            (RegistrationGranularity::PerBatch, Some(hosted), Some(source)) => {
                log_debug!(run.ctx, "FETCH_HOSTED_COPY", url = hosted);
                match source.fetch(hosted).await {
                    Ok(bytes) => bytes,
                    Err(e) => return Err(self.fail(run, trail, e.into())),
                }
            }
            _ => run.item.raw_bytes.clone(),
        };

        let object = PinObject::new(&run.item.display_name, &run.item.content_type(), bytes);
        let cid = match self.uploader.pin_media(object, &run.ctx).await {
            Ok(cid) => cid,
            Err(e) => return Err(self.fail(run, trail, e.into())),
        };

        self.audit(
            trail,
            &run.ctx,
            AuditEventType::StorageUpload,
            "Media pinned to IPFS",
            AuditStatus::Success,
            Some(format!("Media CID: {}", cid)),
        );
        run.media_url = Some(storage_ref.unwrap_or_else(|| self.uploader.gateway_url(&cid)));
        run.media_cid = Some(cid);
        Ok(())
    }

    /// Pin the metadata document, record the tag, then register on the
    /// ledger. The record is written first since the ledger step cannot be
    /// undone. The combined record takes the first item's fingerprint and
    /// kind.
    pub async fn commit(
        &self,
        runs: &mut [ItemRun],
        trail: &mut AuditTrail,
        shape: &CommitShape,
        ctx: &LogContext,
    ) -> Result<Registration, PipelineError> {
        let owner = self.owner().to_string();

        self.enter_commit(runs, trail, ctx, Stage::Recording);

        let staged = match StagedSet::collect(runs) {
            Ok(staged) => staged,
            Err(e) => return Err(self.fail_commit(runs, trail, ctx, Stage::Recording, e)),
        };
        trail.link(&staged.fingerprint);

        let document = match shape {
            CommitShape::Single => {
                SubmissionMetadata::new(&runs[0].item, &staged.classifications[0].result, &owner).to_pin_object()
            }
            CommitShape::Collection { name, description } => {
                let files = runs
                    .iter()
                    .zip(&staged.classifications)
                    .map(|(run, c)| CollectionFile::new(&run.item, &c.result))
                    .collect();
                CollectionMetadata::new(name, description, files, &owner).to_pin_object()
            }
        };
        let document = match document {
            Ok(doc) => doc,
            Err(e) => {
                let err = PipelineError::StorageUpload(format!("could not encode metadata: {}", e));
                return Err(self.fail_commit(runs, trail, ctx, Stage::Recording, err));
            }
        };
        let metadata_cid = match self.uploader.pin_metadata(document, ctx).await {
            Ok(cid) => cid,
            Err(e) => return Err(self.fail_commit(runs, trail, ctx, Stage::Recording, e.into())),
        };

        let (file_name, description) = match shape {
            CommitShape::Single => (runs[0].item.display_name.clone(), runs[0].item.description.clone()),
            CommitShape::Collection { name, description } => {
                let name = if name.trim().is_empty() {
                    "My Collection".to_string()
                } else {
                    name.clone()
                };
                (name, description.clone())
            }
        };
        let new_tag = NewTag {
            file_name,
            description,
            fingerprint: staged.fingerprint.clone(),
            media_cid: staged.media_cids.join(","),
            metadata_cid: metadata_cid.clone(),
            owner,
            media_kind: runs[0].item.media_kind,
            urls: staged.urls,
            file_size: Some(runs.iter().map(|r| r.item.size() as u64).sum()),
            audit_trail: Some(trail.clone()),
        };
        let tag = match self.recorder.record(new_tag, ctx).await {
            Ok(tag) => tag,
            Err(e) => return Err(self.fail_commit(runs, trail, ctx, Stage::Recording, e.into())),
        };
        self.audit(
            trail,
            ctx,
            AuditEventType::StorageUpload,
            "Tag record saved",
            AuditStatus::Success,
            Some(format!("Tag: {}, Metadata CID: {}", tag.id, metadata_cid)),
        );

        // Registration
        self.enter_commit(runs, trail, ctx, Stage::Registering);
        let outcome = match self
            .registrar
            .register(&tag.media_cid, &tag.metadata_cid, &tag.fingerprint, ctx)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.fail_commit(runs, trail, ctx, Stage::Registering, e.into())),
        };
        let details = match &outcome {
            RegistrationOutcome::Confirmed(receipt) => {
                format!("Tx: {} (block {})", receipt.tx_hash, receipt.block_number)
            }
            RegistrationOutcome::AlreadyRegistered => {
                "Already registered by another submission; existing entry kept".to_string()
            }
        };
        self.audit(
            trail,
            ctx,
            AuditEventType::WalletSign,
            "Ledger registration confirmed",
            AuditStatus::Success,
            Some(details),
        );

        // Finalized
        for run in runs.iter_mut() {
            run.transition(PipelineState::Finalized);
        }
        self.audit(
            trail,
            ctx,
            AuditEventType::RegistrationComplete,
            "Registration complete",
            AuditStatus::Success,
            Some(format!("{} file(s) registered", tag.file_count)),
        );
        if let Err(e) = self.audit_store.clear(&trail.id) {
            log_warn!(ctx, "AUDIT_CLEAR_FAILED", trail = trail.id, error = e);
        }

        log_info!(
            ctx,
            "REGISTERED",
            tag = tag.id,
            fingerprint = tag.fingerprint,
            files = tag.file_count
        );
        self.progress.emit(ProgressEvent::Committed {
            tag_id: tag.id.clone(),
            file_count: tag.file_count,
        });

        Ok(Registration {
            tag,
            ledger: outcome,
            trail: trail.clone(),
        })
    }

    /// Drop a trail that will not be finalized from local storage.
    pub fn abandon(&self, trail_id: &str) -> Result<(), AuditStoreError> {
        self.audit_store.clear(trail_id)?;
        log::info!("AUDIT_ABANDONED trail={}", trail_id);
        Ok(())
    }

    pub(super) fn audit(
        &self,
        trail: &mut AuditTrail,
        ctx: &LogContext,
        event_type: AuditEventType,
        label: &str,
        status: AuditStatus,
        details: Option<String>,
    ) {
        trail.append(event_type, label, status, details);
        if let Err(e) = self.audit_store.save(trail) {
            log_warn!(ctx, "AUDIT_SAVE_FAILED", trail = trail.id, error = e);
        }
    }

    fn enter(&self, run: &mut ItemRun, trail: &mut AuditTrail, stage: Stage) {
        run.transition(PipelineState::Active(stage));
        log_debug!(run.ctx, "STAGE_ENTER", stage = stage);
        self.audit(
            trail,
            &run.ctx,
            stage.audit_type(),
            stage.label(),
            AuditStatus::Pending,
            None,
        );
        self.progress.emit(ProgressEvent::StageEntered {
            index: run.index,
            item: run.item.display_name.clone(),
            stage,
        });
    }

    /// Commit stages cover every staged item with one audit event.
    fn enter_commit(&self, runs: &mut [ItemRun], trail: &mut AuditTrail, ctx: &LogContext, stage: Stage) {
        for run in runs.iter_mut() {
            run.transition(PipelineState::Active(stage));
            self.progress.emit(ProgressEvent::StageEntered {
                index: run.index,
                item: run.item.display_name.clone(),
                stage,
            });
        }
        log_debug!(ctx, "STAGE_ENTER", stage = stage, items = runs.len());
        self.audit(trail, ctx, stage.audit_type(), stage.label(), AuditStatus::Pending, None);
    }

    /// Close the current stage with an ERROR event and a terminal state.
    fn fail(&self, run: &mut ItemRun, trail: &mut AuditTrail, err: PipelineError) -> PipelineError {
        let stage = match run.tracker.current_stage() {
            Some(stage) => stage,
            None => return err,
        };
        let next = match &err {
            PipelineError::DuplicateMedia { .. } => PipelineState::Blocked(BlockReason::Duplicate),
            PipelineError::SyntheticContent { .. } => PipelineState::Blocked(BlockReason::Synthetic),
            _ => PipelineState::Failed(stage),
        };
        run.transition(next);
        log_warn!(run.ctx, "STAGE_FAILED", stage = stage, state = next, error = err);
        self.audit(
            trail,
            &run.ctx,
            stage.audit_type(),
            stage.label(),
            AuditStatus::Error,
            Some(err.to_string()),
        );
        err
    }

    fn fail_commit(
        &self,
        runs: &mut [ItemRun],
        trail: &mut AuditTrail,
        ctx: &LogContext,
        stage: Stage,
        err: PipelineError,
    ) -> PipelineError {
        for run in runs.iter_mut() {
            run.transition(PipelineState::Failed(stage));
        }
        log_error!(ctx, "COMMIT_FAILED", stage = stage, items = runs.len(), error = err);
        self.audit(
            trail,
            ctx,
            stage.audit_type(),
            stage.label(),
            AuditStatus::Error,
            Some(err.to_string()),
        );
        err
    }
}

/// Data gathered from staged items for the combined record.
struct StagedSet {
    fingerprint: ContentFingerprint,
    media_cids: Vec<String>,
    urls: MediaUrls,
    classifications: Vec<Classification>,
}

impl StagedSet {
    fn collect(runs: &[ItemRun]) -> Result<Self, PipelineError> {
        let mut fingerprint = None;
        let mut media_cids = Vec::with_capacity(runs.len());
        let mut urls = MediaUrls::default();
        let mut classifications = Vec::with_capacity(runs.len());

        for run in runs {
            match (&run.fingerprint, &run.classification, &run.media_cid, &run.media_url) {
                (Some(fp), Some(c), Some(cid), Some(url)) => {
                    fingerprint.get_or_insert_with(|| fp.clone());
                    media_cids.push(cid.clone());
                    urls.push(run.item.media_kind, url.clone());
                    classifications.push(c.clone());
                }
                _ => {
                    return Err(PipelineError::StorageUpload(format!(
                        "{} was not staged",
                        run.item.display_name
                    )))
                }
            }
        }

        let fingerprint = fingerprint
            .ok_or_else(|| PipelineError::StorageUpload("no staged items to commit".to_string()))?;
        Ok(Self {
            fingerprint,
            media_cids,
            urls,
            classifications,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::audit::MemoryAuditStore;
    use crate::detection::{DetectionResult, DetectorError, Reasoning};
    use crate::ledger::{encode_revert, InMemoryLedger, LedgerCallError, LedgerErrorKind, LedgerRecord, TxReceipt};
    use crate::media::MediaKind;
    use crate::records::InMemoryRecordStore;
    use crate::storage::MemoryPinning;

    const OWNER: &str = "0x00000000000000000000000000000000000000a1";

    struct FixedDetector(u8);

    #[async_trait]
    impl Detector for FixedDetector {
        async fn detect(&self, item: &MediaItem) -> Result<DetectionResult, DetectorError> {
            Ok(DetectionResult {
                media_kind: item.media_kind.as_str().to_string(),
                synthetic_probability: 100 - self.0,
                natural_probability: self.0,
                reasoning: Reasoning::default(),
                storage_ref: None,
                storage_ref_id: None,
            })
        }
    }

    /// Ledger whose lookups never see existing records.
    struct BlindLedger(InMemoryLedger);

    #[async_trait]
    impl LedgerContract for BlindLedger {
        fn actor(&self) -> &str {
            self.0.actor()
        }

        async fn lookup(&self, fingerprint: &ContentFingerprint) -> Result<LedgerRecord, LedgerCallError> {
            let data = encode_revert(&LedgerErrorKind::MediaNotFound, Some(fingerprint))
                .map_err(|e| LedgerCallError::Malformed(e.to_string()))?;
            Err(LedgerCallError::Reverted { data })
        }

        async fn register(
            &self,
            media_cid: &str,
            metadata_cid: &str,
            fingerprint: &ContentFingerprint,
        ) -> Result<TxReceipt, LedgerCallError> {
            self.0.register(media_cid, metadata_cid, fingerprint).await
        }

        async fn deregister(&self, fingerprint: &ContentFingerprint) -> Result<TxReceipt, LedgerCallError> {
            self.0.deregister(fingerprint).await
        }
    }

    struct Harness {
        ledger: InMemoryLedger,
        pinning: MemoryPinning,
        records: InMemoryRecordStore,
        audit: Arc<MemoryAuditStore>,
        pipeline: PipelineOrchestrator,
    }

    fn harness_with(natural: u8, ledger_handle: Option<Arc<dyn LedgerContract>>) -> Harness {
        let ledger = InMemoryLedger::new(OWNER);
        let pinning = MemoryPinning::new();
        let records = InMemoryRecordStore::new();
        let audit = Arc::new(MemoryAuditStore::new());
        let contract: Arc<dyn LedgerContract> = ledger_handle.unwrap_or_else(|| Arc::new(ledger.clone()));
        let audit_store: Arc<dyn AuditStore> = audit.clone();

        let pipeline = PipelineOrchestrator::new(
            Collaborators {
                ledger: contract,
                detector: Arc::new(FixedDetector(natural)),
                pinning: Arc::new(pinning.clone()),
                records: Arc::new(records.clone()),
                audit_store,
                media_source: None,
            },
            &PipelineConfig::default(),
        );
        Harness {
            ledger,
            pinning,
            records,
            audit,
            pipeline,
        }
    }

    fn harness(natural: u8) -> Harness {
        harness_with(natural, None)
    }

    fn photo() -> MediaItem {
        MediaItem::new(b"sunset pixels".to_vec(), "sunset.jpg", MediaKind::Image, "Evening")
    }

    #[tokio::test]
    async fn test_authentic_item_is_registered() {
        let h = harness(90);
        let reg = h.pipeline.run(photo()).await.unwrap();

        assert!(matches!(reg.ledger, RegistrationOutcome::Confirmed(_)));
        assert_eq!(reg.tag.file_count, 1);
        assert!(!reg.tag.is_bulk);
        assert_eq!(reg.tag.owner, OWNER);
        assert_eq!(reg.tag.fingerprint, fingerprint_bytes(b"sunset pixels"));
        assert!(reg.tag.urls.img_urls[0].ends_with(&format!("/ipfs/{}", reg.tag.media_cid)));

        assert!(reg.trail.is_ordered());
        let last = reg.trail.last_event().unwrap();
        assert_eq!(last.event_type, AuditEventType::RegistrationComplete);
        assert_eq!(last.status, AuditStatus::Success);
        assert_eq!(reg.trail.linked_fingerprint.as_ref(), Some(&reg.tag.fingerprint));

        // Media is pinned before its metadata document.
        assert_eq!(h.pinning.pin_log(), vec!["sunset.jpg".to_string(), "metadata.json".to_string()]);
        assert_eq!(h.ledger.register_calls().len(), 1);
        assert_eq!(h.records.len(), 1);
        assert!(h.audit.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_submission_is_duplicate() {
        let h = harness(90);
        h.pipeline.run(photo()).await.unwrap();

        let err = h.pipeline.run(photo()).await.unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateMedia { .. }));
        assert!(err.to_string().contains(OWNER));
        assert_eq!(h.records.len(), 1);
        assert_eq!(h.ledger.register_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_synthetic_item_stops_before_storage() {
        let h = harness(40);
        let batch = BatchContext::new(RegistrationGranularity::PerItem, 1);
        let mut trail = AuditTrail::new("sunset.jpg");

        let err = h.pipeline.run_traced(photo(), &batch, &mut trail).await.unwrap_err();
        assert!(matches!(err, PipelineError::SyntheticContent { natural_probability: 40 }));
        assert!(h.pinning.pin_log().is_empty());
        assert!(h.records.is_empty());

        let last = trail.last_event().unwrap();
        assert_eq!(last.event_type, AuditEventType::AiVerification);
        assert_eq!(last.status, AuditStatus::Error);
        // Unfinished trails stay in the store.
        assert_eq!(h.audit.list().unwrap(), vec![trail.id.clone()]);

        h.pipeline.abandon(&trail.id).unwrap();
        assert!(h.audit.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_failure_is_not_treated_as_unique() {
        let h = harness(90);
        h.ledger.set_offline(true);

        let err = h.pipeline.run(photo()).await.unwrap_err();
        assert!(matches!(err, PipelineError::LookupIndeterminate(_)));
        assert!(err.is_retryable());
        assert!(h.pinning.pin_log().is_empty());
    }

    #[tokio::test]
    async fn test_race_on_register_is_soft_success() {
        let ledger = InMemoryLedger::new(OWNER);
        let rival = ledger.connect("0x00000000000000000000000000000000000000b2");
        rival
            .register("bafkrival", "bafkrivalmeta", &fingerprint_bytes(b"sunset pixels"))
            .await
            .unwrap();

        let h = harness_with(90, Some(Arc::new(BlindLedger(ledger.clone()))));
        let reg = h.pipeline.run(photo()).await.unwrap();

        assert_eq!(reg.ledger, RegistrationOutcome::AlreadyRegistered);
        assert_eq!(h.records.len(), 1);
        let last = reg.trail.last_event().unwrap();
        assert_eq!(last.status, AuditStatus::Success);
        assert!(reg
            .trail
            .events()
            .iter()
            .any(|e| e.details.as_deref().map_or(false, |d| d.contains("Already registered"))));
    }

    #[tokio::test]
    async fn test_item_state_history_for_registration() {
        let h = harness(90);
        let batch = BatchContext::new(RegistrationGranularity::PerItem, 1);
        let item = photo();
        let mut run = ItemRun::new(&batch.submission_context(0, &item), item, RegistrationGranularity::PerItem);
        let mut trail = AuditTrail::new("sunset.jpg");

        h.pipeline.process_item(&mut run, &mut trail, &HashMap::new()).await.unwrap();

        let expected = vec![
            PipelineState::Pending,
            PipelineState::Active(Stage::Hashing),
            PipelineState::Active(Stage::CheckingUniqueness),
            PipelineState::Active(Stage::Classifying),
            PipelineState::Active(Stage::Uploading),
            PipelineState::Active(Stage::Recording),
            PipelineState::Active(Stage::Registering),
            PipelineState::Finalized,
        ];
        assert_eq!(run.tracker().history(), expected.as_slice());
    }

    #[test]
    fn test_http_collaborators_need_pinning_jwt() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.audit_dir = dir.path().join("audit");
        let ledger: Arc<dyn LedgerContract> = Arc::new(InMemoryLedger::new(OWNER));

        let err = Collaborators::from_config(&config, Arc::clone(&ledger)).err().unwrap();
        assert!(err.to_string().contains("MEDIATAG_PINNING_JWT"));

        config.pinning_jwt = Some("jwt".to_string());
        let collaborators = Collaborators::from_config(&config, ledger).unwrap();
        assert!(collaborators.media_source.is_some());
        assert!(config.audit_dir.is_dir());
    }

    #[tokio::test]
    async fn test_repeat_within_batch_is_duplicate() {
        let h = harness(90);
        let batch = BatchContext::new(RegistrationGranularity::PerBatch, 2);
        let item = photo();
        let mut run = ItemRun::new(&batch.submission_context(1, &item), item, RegistrationGranularity::PerBatch);
        let mut trail = AuditTrail::new("shared");
        let mut earlier = HashMap::new();
        earlier.insert(fingerprint_bytes(b"sunset pixels"), "first.jpg".to_string());

        let err = h.pipeline.screen(&mut run, &mut trail, &earlier).await.unwrap_err();
        assert!(err.to_string().contains("first.jpg"));
        assert_eq!(run.state(), PipelineState::Blocked(BlockReason::Duplicate));
        // Per-batch trails are linked at commit time.
        assert!(trail.linked_fingerprint.is_none());
    }
}
