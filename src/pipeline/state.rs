//! Forward-only pipeline state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::audit::AuditEventType;

/// Working stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Hashing,
    CheckingUniqueness,
    Classifying,
    Uploading,
    Recording,
    Registering,
}

impl Stage {
    fn rank(&self) -> u8 {
        match self {
            Stage::Hashing => 0,
            Stage::CheckingUniqueness => 1,
            Stage::Classifying => 2,
            Stage::Uploading => 3,
            Stage::Recording => 4,
            Stage::Registering => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Hashing => "hashing",
            Stage::CheckingUniqueness => "checking_uniqueness",
            Stage::Classifying => "classifying",
            Stage::Uploading => "uploading",
            Stage::Recording => "recording",
            Stage::Registering => "registering",
        }
    }

    /// Audit event category written for this stage.
    pub fn audit_type(&self) -> AuditEventType {
        match self {
            Stage::Hashing => AuditEventType::FileIngest,
            Stage::CheckingUniqueness => AuditEventType::LedgerCheck,
            Stage::Classifying => AuditEventType::AiVerification,
            Stage::Uploading | Stage::Recording => AuditEventType::StorageUpload,
            Stage::Registering => AuditEventType::WalletSign,
        }
    }

    /// Label of the PENDING event written on entry.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Hashing => "Generating content hash",
            Stage::CheckingUniqueness => "Checking ledger for existing registration",
            Stage::Classifying => "Running authenticity analysis",
            Stage::Uploading => "Uploading media to IPFS",
            Stage::Recording => "Saving metadata and tag record",
            Stage::Registering => "Registering on ledger",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    Duplicate,
    Synthetic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "stage")]
pub enum PipelineState {
    Pending,
    Active(Stage),
    Finalized,
    Blocked(BlockReason),
    Failed(Stage),
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Finalized | PipelineState::Blocked(_) | PipelineState::Failed(_)
        )
    }

    /// Legal edges. There are no backward edges; a retry is a new run.
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        match (*self, next) {
            (PipelineState::Pending, PipelineState::Active(Stage::Hashing)) => true,
            (PipelineState::Active(from), PipelineState::Active(to)) => to.rank() == from.rank() + 1,
            (PipelineState::Active(Stage::CheckingUniqueness), PipelineState::Blocked(BlockReason::Duplicate)) => true,
            (PipelineState::Active(Stage::Classifying), PipelineState::Blocked(BlockReason::Synthetic)) => true,
            (PipelineState::Active(Stage::Registering), PipelineState::Finalized) => true,
            (PipelineState::Active(from), PipelineState::Failed(at)) => from == at,
            _ => false,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Pending => f.write_str("pending"),
            PipelineState::Active(stage) => write!(f, "{}", stage),
            PipelineState::Finalized => f.write_str("finalized"),
            PipelineState::Blocked(BlockReason::Duplicate) => f.write_str("blocked(duplicate)"),
            PipelineState::Blocked(BlockReason::Synthetic) => f.write_str("blocked(synthetic)"),
            PipelineState::Failed(stage) => write!(f, "failed({})", stage),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: PipelineState,
    pub to: PipelineState,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal transition {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for InvalidTransition {}

/// Current state of one item plus the path it took.
#[derive(Debug, Clone)]
pub struct StageTracker {
    state: PipelineState,
    history: Vec<PipelineState>,
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTracker {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Pending,
            history: vec![PipelineState::Pending],
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// Stage currently executing, if any.
    pub fn current_stage(&self) -> Option<Stage> {
        match self.state {
            PipelineState::Active(stage) => Some(stage),
            _ => None,
        }
    }

    pub fn advance(&mut self, next: PipelineState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.history.push(next);
        Ok(())
    }
}
