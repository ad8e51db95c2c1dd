//! Authenticity classification.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::logging::structured::LogContext;
use crate::media::MediaItem;

use super::detector::{DetectionResult, Detector, DetectorError};
use super::verdict::{GateDecision, GatePolicy, Verdict};

/// Detector result plus the verdict and gate decision derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub result: DetectionResult,
    pub verdict: Verdict,
    pub gate: GateDecision,
}

impl Classification {
    pub fn natural_probability(&self) -> u8 {
        self.result.natural_probability
    }

    pub fn is_blocked(&self) -> bool {
        !self.gate.proceeds()
    }

    /// Category shown to users. Flagged items read INCONCLUSIVE.
    pub fn display_verdict(&self) -> Verdict {
        match self.gate {
            GateDecision::Flagged => Verdict::Inconclusive,
            _ => self.verdict,
        }
    }
}

pub struct AuthenticityClassifier {
    detector: Arc<dyn Detector>,
    policy: GatePolicy,
}

impl AuthenticityClassifier {
    pub fn new(detector: Arc<dyn Detector>, policy: GatePolicy) -> Self {
        Self { detector, policy }
    }

    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    /// Evaluate a detector result against the policy.
    pub fn evaluate(&self, result: DetectionResult) -> Classification {
        let natural = result.natural_probability;
        Classification {
            verdict: self.policy.verdict(natural),
            gate: self.policy.gate(natural),
            result,
        }
    }

    /// Call the detector once and classify its answer.
    pub async fn classify(
        &self,
        item: &MediaItem,
        ctx: &LogContext,
    ) -> Result<Classification, DetectorError> {
        let result = self.detector.detect(item).await?;
        result.validate()?;

        let classification = self.evaluate(result);

        log::info!(
            "{} CLASSIFIED natural={} synthetic={} verdict={} gate={:?}",
            ctx,
            classification.result.natural_probability,
            classification.result.synthetic_probability,
            classification.verdict,
            classification.gate
        );

        Ok(classification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::detection::detector::Reasoning;
    use crate::media::MediaKind;

    struct FixedDetector(u8, u8);

    #[async_trait]
    impl Detector for FixedDetector {
        async fn detect(&self, _item: &MediaItem) -> Result<DetectionResult, DetectorError> {
            Ok(DetectionResult {
                media_kind: "image".to_string(),
                synthetic_probability: self.0,
                natural_probability: self.1,
                reasoning: Reasoning::default(),
                storage_ref: None,
                storage_ref_id: None,
            })
        }
    }

    fn item() -> MediaItem {
        MediaItem::new(vec![1, 2, 3], "a.png", MediaKind::Image, "")
    }

    #[tokio::test]
    async fn test_flagged_item_proceeds_as_inconclusive() {
        let classifier = AuthenticityClassifier::new(Arc::new(FixedDetector(45, 55)), GatePolicy::default());
        let c = classifier.classify(&item(), &LogContext::new("t")).await.unwrap();

        assert_eq!(c.verdict, Verdict::Synthetic);
        assert_eq!(c.gate, GateDecision::Flagged);
        assert!(!c.is_blocked());
        assert_eq!(c.display_verdict(), Verdict::Inconclusive);
    }

    #[tokio::test]
    async fn test_blocked_item() {
        let classifier = AuthenticityClassifier::new(Arc::new(FixedDetector(60, 40)), GatePolicy::default());
        let c = classifier.classify(&item(), &LogContext::new("t")).await.unwrap();
        assert!(c.is_blocked());
        assert_eq!(c.display_verdict(), Verdict::Synthetic);
    }

    #[tokio::test]
    async fn test_inconsistent_probabilities_rejected() {
        let classifier = AuthenticityClassifier::new(Arc::new(FixedDetector(10, 10)), GatePolicy::default());
        let err = classifier.classify(&item(), &LogContext::new("t")).await.unwrap_err();
        assert!(matches!(err, DetectorError::Malformed(_)));
    }
}
