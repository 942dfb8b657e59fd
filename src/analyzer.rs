//! Facade over the four analysis stages: classify, detect, estimate, assess.

use crate::anomaly::{AnomalyDetector, AnomalyReport};
use crate::classify::{estimate_noise_level, Classification, SourceClassifier, SourceLabel};
use crate::compliance::{assess_compliance, ComplianceVerdict};
use crate::config::EngineConfig;
use crate::features::FeatureInput;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Complete result for one payload. Structurally complete even when every
/// model stage fell back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub classification: Classification,
    pub anomaly: AnomalyReport,
    pub noise_db: f32,
    pub dominant_source: Option<SourceLabel>,
    pub confidence: f32,
    pub compliance: ComplianceVerdict,
}

/// Owns the classifier and the stateful detector. One instance serves all
/// requests; the detector carries the only cross-request state.
pub struct NoiseAnalyzer {
    classifier: SourceClassifier,
    detector: AnomalyDetector,
}

impl NoiseAnalyzer {
    /// Build both stages from configuration. A missing or mismatched
    /// classifier artifact falls back to the synthetic bootstrap.
    pub fn new(config: &EngineConfig) -> Self {
        NoiseAnalyzer {
            classifier: SourceClassifier::load_or_train(&config.classifier),
            detector: AnomalyDetector::new(&config.anomaly),
        }
    }

    pub fn classifier(&self) -> &SourceClassifier {
        &self.classifier
    }

    pub fn detector(&self) -> &AnomalyDetector {
        &self.detector
    }

    /// Run the full pipeline for one payload.
    pub fn analyze(&self, input: &FeatureInput) -> AnalysisReport {
        let classification = self.classifier.classify(input);
        let anomaly = self.detector.detect(input);
        let noise_db = estimate_noise_level(input, &classification);
        let compliance = assess_compliance(noise_db);

        let (dominant_source, confidence) = match classification.top() {
            Some(top) => (Some(top.label), top.confidence),
            None => (None, 0.0),
        };
        debug!(
            noise_db,
            detected = anomaly.detected,
            synthetic = classification.synthetic,
            "analysis complete"
        );

        AnalysisReport {
            classification,
            anomaly,
            noise_db,
            dominant_source,
            confidence,
            compliance,
        }
    }
}
