//! Verdict thresholds.
//!
//! Two schemes are applied to the natural probability:
//! - display categories: AUTHENTIC >= 90, INCONCLUSIVE >= 70, SYNTHETIC below
//! - the hard gate: natural <= 50 is blocked outright
//!
//! Scores between the gate and the INCONCLUSIVE floor proceed, flagged
//! INCONCLUSIVE for display. All three numbers are configurable.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_AUTHENTIC_MIN: u8 = 90;
pub const DEFAULT_INCONCLUSIVE_MIN: u8 = 70;
pub const DEFAULT_BLOCK_MAX: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Authentic,
    Inconclusive,
    Synthetic,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Authentic => "AUTHENTIC",
            Verdict::Inconclusive => "INCONCLUSIVE",
            Verdict::Synthetic => "SYNTHETIC",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the hard authenticity gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    /// Clean pass (AUTHENTIC or INCONCLUSIVE by display category).
    Pass,
    /// Proceeds, but is shown as INCONCLUSIVE.
    Flagged,
    /// Hard block; the item halts.
    Block,
}

impl GateDecision {
    pub fn proceeds(&self) -> bool {
        !matches!(self, GateDecision::Block)
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("Invalid gate policy: {0}")]
pub struct GatePolicyError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatePolicy {
    pub authentic_min: u8,
    pub inconclusive_min: u8,
    pub block_max: u8,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            authentic_min: DEFAULT_AUTHENTIC_MIN,
            inconclusive_min: DEFAULT_INCONCLUSIVE_MIN,
            block_max: DEFAULT_BLOCK_MAX,
        }
    }
}

impl GatePolicy {
    pub fn new(authentic_min: u8, inconclusive_min: u8, block_max: u8) -> Result<Self, GatePolicyError> {
        let policy = Self {
            authentic_min,
            inconclusive_min,
            block_max,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), GatePolicyError> {
        if self.authentic_min > 100 {
            return Err(GatePolicyError(format!(
                "authentic_min {} exceeds 100",
                self.authentic_min
            )));
        }
        if self.inconclusive_min > self.authentic_min {
            return Err(GatePolicyError(format!(
                "inconclusive_min {} above authentic_min {}",
                self.inconclusive_min, self.authentic_min
            )));
        }
        if self.block_max >= self.inconclusive_min {
            return Err(GatePolicyError(format!(
                "block_max {} must be below inconclusive_min {}",
                self.block_max, self.inconclusive_min
            )));
        }
        Ok(())
    }

    /// Display category for a natural probability.
    pub fn verdict(&self, natural_probability: u8) -> Verdict {
        if natural_probability >= self.authentic_min {
            Verdict::Authentic
        } else if natural_probability >= self.inconclusive_min {
            Verdict::Inconclusive
        } else {
            Verdict::Synthetic
        }
    }

    pub fn gate(&self, natural_probability: u8) -> GateDecision {
        if natural_probability <= self.block_max {
            GateDecision::Block
        } else if natural_probability < self.inconclusive_min {
            GateDecision::Flagged
        } else {
            GateDecision::Pass
        }
    }
}
