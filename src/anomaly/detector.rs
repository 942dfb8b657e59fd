//! Stateful detector: append to the window, refit on cadence, score, apply
//! the threshold. The mutex covers the whole sequence so a score is never
//! computed against a model mid-replacement.

use super::forest::IsolationForest;
use super::gaussian::GaussianDensity;
use super::{AnomalyKind, AnomalyReport};
use crate::config::{AnomalyConfig, ModelKind};
use crate::error::{EngineError, Result};
use crate::features::{prepare, resize, FeatureInput, StandardScaler};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::{debug, info, warn};

pub const SNAPSHOT_VERSION: u32 = 1;

/// Closed set of window models; the variant fixes the score mapping once at
/// fit time instead of probing per call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum OutlierModel {
    Forest(IsolationForest),
    Gaussian(GaussianDensity),
}

impl OutlierModel {
    /// Mapped anomaly score, >= 0 with higher more unusual: signed decision
    /// values via `max(0, -d/2)`, log-likelihoods via `max(0, -ll)`.
    fn score(&self, z: &[f32]) -> f32 {
        match self {
            OutlierModel::Forest(f) => (-f.decision_function(z) / 2.0).max(0.0),
            OutlierModel::Gaussian(g) => (-g.score_samples(z)).max(0.0),
        }
    }
}

/// Model, standardization, and the committed feature width, replaced as a
/// unit on every successful refit.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FittedState {
    width: usize,
    scaler: StandardScaler,
    model: OutlierModel,
}

/// Persisted form of the fitted window model. History is not carried; it
/// refills from live traffic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalySnapshot {
    pub version: u32,
    threshold: f32,
    fitted: Option<FittedState>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectorStats {
    pub model_kind: ModelKind,
    pub history_size: usize,
    pub threshold: f32,
    pub scaler_fitted: bool,
    pub model_fitted: bool,
}

struct DetectorState {
    history: VecDeque<Vec<f32>>,
    fitted: Option<FittedState>,
    since_fit: usize,
    threshold: f32,
}

pub struct AnomalyDetector {
    state: Mutex<DetectorState>,
    config: AnomalyConfig,
}

impl AnomalyDetector {
    pub fn new(config: &AnomalyConfig) -> Self {
        AnomalyDetector {
            state: Mutex::new(DetectorState {
                history: VecDeque::with_capacity(config.max_history.min(1024)),
                fitted: None,
                since_fit: 0,
                threshold: config.threshold.clamp(0.0, 1.0),
            }),
            config: config.clone(),
        }
    }

    /// Score one payload against the window model, updating the window as a
    /// side effect. Never fails: unusable input yields the canonical
    /// non-detection, and refit errors keep the previous model.
    pub fn detect(&self, input: &FeatureInput) -> AnomalyReport {
        let raw = match prepare(input) {
            Some(v) => v,
            None => return AnomalyReport::normal(),
        };

        let mut state = self.state.lock().expect("lock");
        state.history.push_back(raw.clone());
        while state.history.len() > self.config.max_history {
            state.history.pop_front();
        }

        state.since_fit += 1;
        if state.since_fit >= self.config.retrain_interval {
            state.since_fit = 0;
            match fit_window(&state.history, &self.config) {
                Ok(fitted) => state.fitted = Some(fitted),
                Err(e) => warn!(
                    error = %e,
                    window = state.history.len(),
                    "window refit failed; keeping previous model"
                ),
            }
        }

        let score = match &state.fitted {
            Some(f) => {
                let z = f.scaler.transform(&resize(&raw, f.width));
                f.model.score(&z)
            }
            None => rule_score(&raw),
        };
        let threshold = state.threshold;
        drop(state);

        if score > threshold {
            AnomalyReport::flagged(classify_kind(&raw), score)
        } else {
            AnomalyReport::normal()
        }
    }

    /// Replace the detection threshold. The one caller-visible error in the
    /// detector: values outside [0, 1] are rejected.
    pub fn update_threshold(&self, threshold: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(EngineError::InvalidThreshold(threshold));
        }
        self.state.lock().expect("lock").threshold = threshold;
        info!(threshold, "anomaly threshold updated");
        Ok(())
    }

    /// Drop the window and the fitted model, back to the untrained state.
    /// The threshold survives a reset.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("lock");
        state.history.clear();
        state.fitted = None;
        state.since_fit = 0;
        info!("anomaly detector reset");
    }

    pub fn stats(&self) -> DetectorStats {
        let state = self.state.lock().expect("lock");
        DetectorStats {
            model_kind: self.config.model,
            history_size: state.history.len(),
            threshold: state.threshold,
            scaler_fitted: state.fitted.is_some(),
            model_fitted: state.fitted.is_some(),
        }
    }

    pub fn snapshot(&self) -> AnomalySnapshot {
        let state = self.state.lock().expect("lock");
        AnomalySnapshot {
            version: SNAPSHOT_VERSION,
            threshold: state.threshold,
            fitted: state.fitted.clone(),
        }
    }

    /// Adopt a previously saved model and threshold. The window starts empty
    /// and the refit cadence restarts.
    pub fn restore(&self, snapshot: AnomalySnapshot) {
        let mut state = self.state.lock().expect("lock");
        state.threshold = snapshot.threshold.clamp(0.0, 1.0);
        state.fitted = snapshot.fitted;
        state.since_fit = 0;
    }
}

/// Refit scaler and model over the whole window. The committed width is the
/// first stored vector's length; every row is reconciled to it.
fn fit_window(history: &VecDeque<Vec<f32>>, config: &AnomalyConfig) -> Result<FittedState> {
    let width = history.front().map(|v| v.len()).unwrap_or(0);
    if width == 0 {
        return Err(EngineError::DegenerateFit(0));
    }
    let rows = history.len();
    let mut flat = Vec::with_capacity(rows * width);
    for v in history {
        flat.extend_from_slice(&resize(v, width));
    }
    let matrix = match Array2::from_shape_vec((rows, width), flat) {
        Ok(m) => m,
        Err(_) => return Err(EngineError::DegenerateFit(width)),
    };

    let scaler = StandardScaler::fit(&matrix);
    let standardized = scaler.transform_matrix(&matrix);
    let model = match config.model {
        ModelKind::IsolationForest => {
            OutlierModel::Forest(IsolationForest::fit(&standardized, &config.forest)?)
        }
        ModelKind::GaussianDensity => OutlierModel::Gaussian(GaussianDensity::fit(&standardized)?),
    };
    debug!(rows, width, "window model refit");
    Ok(FittedState {
        width,
        scaler,
        model,
    })
}

/// Cold-start heuristic used before any window model has fit: extreme energy
/// in either direction is suspicious on its own.
fn rule_score(raw: &[f32]) -> f32 {
    let energy = raw.first().map(|v| v.abs()).unwrap_or(0.0);
    if energy > 0.8 {
        energy.min(1.0)
    } else if energy < 0.05 {
        0.3
    } else {
        0.0
    }
}

/// Interpret a flagged vector from its first two dimensions, energy and a
/// secondary spectral indicator.
fn classify_kind(raw: &[f32]) -> AnomalyKind {
    let energy = raw.first().map(|v| v.abs()).unwrap_or(0.0);
    if energy > 0.9 {
        AnomalyKind::HighEnergyEvent
    } else if energy > 0.7 {
        AnomalyKind::LoudMachinery
    } else if energy < 0.1 {
        AnomalyKind::UnusualQuiet
    } else if raw.get(1).map(|v| v.abs() > 0.8).unwrap_or(false) {
        AnomalyKind::UnusualFrequency
    } else {
        AnomalyKind::AcousticAnomaly
    }
}
