//! Acoustic anomaly detection: a sliding window of recent feature vectors, an
//! outlier model refit on a fixed cadence, and rule fallbacks for the cold
//! start before the first fit.

mod detector;
mod forest;
mod gaussian;

pub use detector::{AnomalyDetector, AnomalySnapshot, DetectorStats};
pub use forest::IsolationForest;
pub use gaussian::GaussianDensity;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Interpretation of a flagged vector, decided from its raw values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    HighEnergyEvent,
    LoudMachinery,
    UnusualQuiet,
    UnusualFrequency,
    AcousticAnomaly,
}

impl AnomalyKind {
    pub fn description(self) -> &'static str {
        match self {
            AnomalyKind::HighEnergyEvent => {
                "Extremely loud sound detected (possible emergency vehicle, alarm, or explosion)"
            }
            AnomalyKind::LoudMachinery => {
                "Unusually loud mechanical noise (construction equipment, industrial machinery)"
            }
            AnomalyKind::UnusualQuiet => {
                "Abnormally quiet period detected (possible sensor malfunction or unusual conditions)"
            }
            AnomalyKind::UnusualFrequency => {
                "Unusual frequency content detected (possible interference or unique sound source)"
            }
            AnomalyKind::AcousticAnomaly => "Unusual acoustic pattern detected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Severity tier for a flagged score.
    pub fn from_score(score: f32) -> Self {
        if score > 0.7 {
            Severity::Critical
        } else if score > 0.4 {
            Severity::High
        } else if score > 0.2 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// Outcome of one detection pass. Every pass produces a report; quiet frames
/// get the canonical non-detection below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub detected: bool,
    pub kind: Option<AnomalyKind>,
    pub severity: Severity,
    pub score: f32,
    pub confidence: f32,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl AnomalyReport {
    /// Canonical non-detection: score and confidence both zeroed, even when a
    /// sub-threshold score was computed.
    pub fn normal() -> Self {
        AnomalyReport {
            detected: false,
            kind: None,
            severity: Severity::None,
            score: 0.0,
            confidence: 0.0,
            description: "No anomaly detected".to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn flagged(kind: AnomalyKind, score: f32) -> Self {
        AnomalyReport {
            detected: true,
            kind: Some(kind),
            severity: Severity::from_score(score),
            score,
            confidence: (score * 2.0).min(1.0),
            description: kind.description().to_string(),
            timestamp: Utc::now(),
        }
    }
}
