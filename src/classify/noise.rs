//! Heuristic dB(A) estimate derived from the winning label and signal energy.

use super::{Classification, SourceLabel};
use crate::features::{mean_energy, FeatureInput};

/// Level reported when there is no usable signal or ranking.
pub const NO_SIGNAL_DB: f32 = 55.0;

const MIN_DB: f32 = 30.0;
const MAX_DB: f32 = 120.0;

fn base_level(label: SourceLabel) -> f32 {
    match label {
        SourceLabel::Traffic => 75.0,
        SourceLabel::Construction => 85.0,
        SourceLabel::Industrial => 80.0,
        SourceLabel::Human => 60.0,
        SourceLabel::Nature => 45.0,
        SourceLabel::Other => 55.0,
    }
}

/// Estimate the sound level for one payload. Starts from the winning label's
/// typical level, then shifts by confidence and by mean energy, and clamps to
/// the plausible urban range.
pub fn estimate_noise_level(input: &FeatureInput, classification: &Classification) -> f32 {
    let top = match classification.top() {
        Some(top) => top,
        None => return NO_SIGNAL_DB,
    };
    let energy = match mean_energy(input) {
        Some(e) => e,
        None => return NO_SIGNAL_DB,
    };
    let level = base_level(top.label) + (top.confidence - 0.5) * 10.0 + (energy - 0.3) * 25.0;
    level.clamp(MIN_DB, MAX_DB)
}
