//! Diagonal-Gaussian prototype classifier with a seeded synthetic bootstrap.
//! When no pretrained artifact is available the classifier trains itself at
//! startup from fixed per-label acoustic profiles, so the pipeline always has
//! a working scorer.

use super::{Classification, LabelScore, SourceLabel};
use crate::config::ClassifierConfig;
use crate::error::Result;
use crate::features::{prepare, resize, FeatureInput, StandardScaler, FRAME_WIDTH};
use ndarray::{s, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;
use tracing::warn;

const VAR_FLOOR: f32 = 1e-6;
const LN_2PI: f32 = 1.837_877_1;

pub const ARTIFACT_VERSION: u32 = 1;

/// Rough per-frame acoustic center for one label, used to draw the synthetic
/// bootstrap corpus. Field order matches the canonical frame layout.
struct LabelProfile {
    label: SourceLabel,
    center: [f32; FRAME_WIDTH],
    spread: f32,
}

const PROFILES: [LabelProfile; 6] = [
    LabelProfile {
        label: SourceLabel::Traffic,
        center: [0.62, 0.28, 0.45, 0.52, -0.22, 0.10, 0.05],
        spread: 0.10,
    },
    LabelProfile {
        label: SourceLabel::Construction,
        center: [0.85, 0.48, 0.62, 0.70, 0.05, 0.22, 0.12],
        spread: 0.12,
    },
    LabelProfile {
        label: SourceLabel::Nature,
        center: [0.18, 0.12, 0.30, 0.34, -0.45, -0.15, -0.08],
        spread: 0.08,
    },
    LabelProfile {
        label: SourceLabel::Human,
        center: [0.40, 0.42, 0.50, 0.46, 0.18, -0.12, 0.09],
        spread: 0.10,
    },
    LabelProfile {
        label: SourceLabel::Industrial,
        center: [0.70, 0.33, 0.57, 0.63, -0.10, 0.30, 0.18],
        spread: 0.09,
    },
    // Catch-all: centered between the rest with a wide spread.
    LabelProfile {
        label: SourceLabel::Other,
        center: [0.45, 0.30, 0.42, 0.47, 0.00, 0.05, 0.02],
        spread: 0.20,
    },
];

/// Fitted per-label profile over the standardized input space.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClassProfile {
    label: SourceLabel,
    mean: Vec<f32>,
    var: Vec<f32>,
}

impl ClassProfile {
    /// Mean log-likelihood of `z` under this label's diagonal Gaussian.
    fn log_likelihood(&self, z: &[f32]) -> f32 {
        let dims = self.mean.len().min(z.len());
        if dims == 0 {
            return 0.0;
        }
        let mut ll = 0.0f32;
        for j in 0..dims {
            let d = z[j] - self.mean[j];
            ll += -0.5 * (LN_2PI + self.var[j].ln() + d * d / self.var[j]);
        }
        ll / dims as f32
    }
}

/// Everything needed to reproduce scoring: the committed input width, the
/// standardization fitted on the training corpus, and the label profiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierArtifact {
    pub version: u32,
    pub input_dim: usize,
    scaler: StandardScaler,
    classes: Vec<ClassProfile>,
}

pub struct SourceClassifier {
    input_dim: usize,
    scaler: StandardScaler,
    classes: Vec<ClassProfile>,
}

impl SourceClassifier {
    /// Use the pretrained artifact when it loads cleanly and matches the
    /// configured width; otherwise fall back to the synthetic bootstrap.
    /// Never a hard failure.
    pub fn load_or_train(config: &ClassifierConfig) -> Self {
        if let Some(path) = &config.artifact_path {
            match Self::load(path) {
                Ok(c) if c.input_dim == config.input_dim => return c,
                Ok(c) => {
                    warn!(
                        artifact_dim = c.input_dim,
                        expected = config.input_dim,
                        "classifier artifact width mismatch; retraining"
                    );
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "classifier artifact unavailable; training bootstrap"
                    );
                }
            }
        }
        Self::train(config)
    }

    /// Train from the synthetic per-label profiles. Deterministic for a given
    /// seed. Standardization is fitted once here, over the whole corpus, and
    /// reused per call.
    pub fn train(config: &ClassifierConfig) -> Self {
        let dim = config.input_dim;
        let per_label = config.bootstrap_samples.max(2);
        let mut rng = StdRng::seed_from_u64(config.bootstrap_seed);

        let total = per_label * PROFILES.len();
        let mut flat = Vec::with_capacity(total * dim);
        for profile in &PROFILES {
            for _ in 0..per_label {
                for j in 0..dim {
                    let center = profile.center[j % FRAME_WIDTH];
                    let jitter = (rng.gen::<f32>() * 2.0 - 1.0) * profile.spread;
                    flat.push(center + jitter);
                }
            }
        }
        let corpus = match Array2::from_shape_vec((total, dim), flat) {
            Ok(m) => m,
            Err(_) => Array2::zeros((total, dim)),
        };
        let scaler = StandardScaler::fit(&corpus);
        let z = scaler.transform_matrix(&corpus);

        let mut classes = Vec::with_capacity(PROFILES.len());
        for (k, profile) in PROFILES.iter().enumerate() {
            let block = z.slice(s![k * per_label..(k + 1) * per_label, ..]);
            let mut mean = vec![0.0f32; dim];
            let mut var = vec![0.0f32; dim];
            for (j, col) in block.axis_iter(Axis(1)).enumerate() {
                let m = col.sum() / per_label as f32;
                let v = col.iter().map(|x| (x - m) * (x - m)).sum::<f32>() / per_label as f32;
                mean[j] = m;
                var[j] = v.max(VAR_FLOOR);
            }
            classes.push(ClassProfile {
                label: profile.label,
                mean,
                var,
            });
        }

        Self {
            input_dim: dim,
            scaler,
            classes,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let artifact: ClassifierArtifact = serde_json::from_str(&data)?;
        Ok(Self::from_artifact(artifact))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(&self.artifact())?)?;
        Ok(())
    }

    pub fn artifact(&self) -> ClassifierArtifact {
        ClassifierArtifact {
            version: ARTIFACT_VERSION,
            input_dim: self.input_dim,
            scaler: self.scaler.clone(),
            classes: self.classes.clone(),
        }
    }

    pub fn from_artifact(artifact: ClassifierArtifact) -> Self {
        Self {
            input_dim: artifact.input_dim,
            scaler: artifact.scaler,
            classes: artifact.classes,
        }
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Rank every label for one payload. Internal failures never propagate;
    /// they produce the synthetic fallback distribution instead.
    pub fn classify(&self, input: &FeatureInput) -> Classification {
        match self.score(input) {
            Some(ranked) => Classification {
                ranked,
                synthetic: false,
            },
            None => self.synthetic_fallback(),
        }
    }

    /// Top-3 ranking for the low-latency path. Same computation as
    /// [`Self::classify`], narrower result.
    pub fn quick_classify(&self, input: &FeatureInput) -> Classification {
        let mut c = self.classify(input);
        c.ranked.truncate(3);
        c
    }

    fn score(&self, input: &FeatureInput) -> Option<Vec<LabelScore>> {
        let raw = prepare(input)?;
        if raw.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let z = self.scaler.transform(&resize(&raw, self.input_dim));
        let lls: Vec<f32> = self.classes.iter().map(|c| c.log_likelihood(&z)).collect();
        if lls.is_empty() || lls.iter().any(|v| !v.is_finite()) {
            return None;
        }
        // Softmax over per-label log-likelihoods.
        let max = lls.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = lls.iter().map(|ll| (ll - max).exp()).collect();
        let sum: f32 = exps.iter().sum();
        if sum <= 0.0 || !sum.is_finite() {
            return None;
        }
        let mut ranked: Vec<LabelScore> = self
            .classes
            .iter()
            .zip(exps)
            .map(|(c, e)| LabelScore {
                label: c.label,
                category: c.label.category(),
                confidence: e / sum,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });
        Some(ranked)
    }

    /// Normalized random confidences over every label, so the pipeline keeps
    /// moving on frames the model cannot score.
    fn synthetic_fallback(&self) -> Classification {
        let mut rng = rand::thread_rng();
        let raw: Vec<f32> = SourceLabel::ALL.iter().map(|_| rng.gen::<f32>()).collect();
        let sum: f32 = raw.iter().sum::<f32>().max(f32::EPSILON);
        let mut ranked: Vec<LabelScore> = SourceLabel::ALL
            .iter()
            .zip(raw)
            .map(|(&label, r)| LabelScore {
                label,
                category: label.category(),
                confidence: r / sum,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });
        Classification {
            ranked,
            synthetic: true,
        }
    }
}
