//! Acoustic feature payloads and their canonical flat-vector form.

mod adapter;
mod scaler;

pub use adapter::{mean_energy, prepare, resize};
pub use scaler::StandardScaler;

use serde::{Deserialize, Serialize};

/// Number of canonical values per analysis frame.
pub const FRAME_WIDTH: usize = 7;

/// Caller-supplied features: either a flat numeric vector or an ordered
/// sequence of per-frame measurements keyed by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureInput {
    Samples(Vec<f32>),
    Frames(Vec<FeatureFrame>),
}

impl FeatureInput {
    pub fn is_empty(&self) -> bool {
        match self {
            FeatureInput::Samples(v) => v.is_empty(),
            FeatureInput::Frames(f) => f.is_empty(),
        }
    }
}

/// One frame of named acoustic measurements. Missing fields read as 0.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureFrame {
    #[serde(default)]
    pub energy: f32,
    #[serde(default)]
    pub zcr: f32,
    #[serde(default)]
    pub spectral_centroid: f32,
    #[serde(default)]
    pub spectral_rolloff: f32,
    #[serde(default)]
    pub mfcc_0: f32,
    #[serde(default)]
    pub mfcc_1: f32,
    #[serde(default)]
    pub mfcc_2: f32,
}

impl FeatureFrame {
    /// Canonical per-frame field order. Every downstream consumer depends on
    /// this ordering.
    pub fn to_values(&self) -> [f32; FRAME_WIDTH] {
        [
            self.energy,
            self.zcr,
            self.spectral_centroid,
            self.spectral_rolloff,
            self.mfcc_0,
            self.mfcc_1,
            self.mfcc_2,
        ]
    }
}
