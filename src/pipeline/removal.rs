//! Removal of a finalized registration.

use crate::error::PipelineError;
use crate::ledger::TxReceipt;
use crate::logging::structured::LogContext;
use crate::records::Tag;
use crate::{log_info, log_warn};

use super::orchestrator::PipelineOrchestrator;

#[derive(Debug, Clone)]
pub struct RemovalReport {
    /// The deleted record.
    pub tag: Tag,
    pub receipt: TxReceipt,
    /// CIDs that could not be unpinned. Removal still counts as done.
    pub unpin_failures: Vec<String>,
}

impl PipelineOrchestrator {
    /// Deregister a tag on the ledger, unpin its objects and delete the
    /// record.
    ///
    /// Only the registration owner may remove it; the ledger step runs
    /// first so a refused removal leaves everything in place.
    pub async fn remove_registration(&self, tag_id: &str) -> Result<RemovalReport, PipelineError> {
        let ctx = LogContext::new(&format!("remove-{}", tag_id));
        let store = self.recorder.store();

        let tag = store.get_tag(tag_id).await?;
        let ctx = ctx.with_item(&tag.file_name);

        let receipt = self.registrar.deregister(tag.fingerprint.as_str(), &ctx).await?;

        let mut cids: Vec<String> = tag.media_cids().into_iter().map(str::to_string).collect();
        cids.push(tag.metadata_cid.clone());
        let unpin_failures: Vec<String> = self
            .uploader
            .unpin_all(&cids, &ctx)
            .await
            .into_iter()
            .map(|(cid, err)| {
                log_warn!(ctx, "UNPIN_FAILED", cid = cid, error = err);
                cid
            })
            .collect();

        let tag = store.delete_tag(&tag.id).await?;
        log_info!(
            ctx,
            "REGISTRATION_REMOVED",
            tag = tag.id,
            tx = receipt.tx_hash,
            unpin_failures = unpin_failures.len()
        );

        Ok(RemovalReport {
            tag,
            receipt,
            unpin_failures,
        })
    }
}
