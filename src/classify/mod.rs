//! Sound-source classification over canonical feature vectors.

mod model;
mod noise;

pub use model::{ClassifierArtifact, SourceClassifier, ARTIFACT_VERSION};
pub use noise::{estimate_noise_level, NO_SIGNAL_DB};

use serde::{Deserialize, Serialize};

/// Fixed label set for urban sound sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceLabel {
    Traffic,
    Construction,
    Nature,
    Human,
    Industrial,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCategory {
    Vehicular,
    Industrial,
    Social,
    Environmental,
    Mixed,
}

impl SourceLabel {
    pub const ALL: [SourceLabel; 6] = [
        SourceLabel::Traffic,
        SourceLabel::Construction,
        SourceLabel::Nature,
        SourceLabel::Human,
        SourceLabel::Industrial,
        SourceLabel::Other,
    ];

    pub fn category(self) -> SourceCategory {
        match self {
            SourceLabel::Traffic => SourceCategory::Vehicular,
            SourceLabel::Construction | SourceLabel::Industrial => SourceCategory::Industrial,
            SourceLabel::Human => SourceCategory::Social,
            SourceLabel::Nature => SourceCategory::Environmental,
            SourceLabel::Other => SourceCategory::Mixed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceLabel::Traffic => "traffic",
            SourceLabel::Construction => "construction",
            SourceLabel::Nature => "nature",
            SourceLabel::Human => "human",
            SourceLabel::Industrial => "industrial",
            SourceLabel::Other => "other",
        }
    }
}

/// One ranked entry: label, its broad category, and model confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: SourceLabel,
    pub category: SourceCategory,
    pub confidence: f32,
}

/// Ranked label distribution, confidences descending and summing to ~1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub ranked: Vec<LabelScore>,
    /// Set when the result came from the random fallback rather than the
    /// fitted model.
    pub synthetic: bool,
}

impl Classification {
    pub fn top(&self) -> Option<&LabelScore> {
        self.ranked.first()
    }
}
