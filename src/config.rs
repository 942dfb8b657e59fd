//! Engine configuration. One section per analysis stage.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Data directory (SQLite store, saved model artifacts)
    pub data_dir: PathBuf,
    /// Source classification parameters
    pub classifier: ClassifierConfig,
    /// Anomaly detection parameters
    pub anomaly: AnomalyConfig,
    /// Persistence / retention
    pub store: StoreConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Width of the canonical classifier input vector
    pub input_dim: usize,
    /// Pretrained artifact path; absence triggers the synthetic bootstrap
    pub artifact_path: Option<PathBuf>,
    /// Samples drawn per label when bootstrapping synthetically
    pub bootstrap_samples: usize,
    /// RNG seed for the synthetic bootstrap
    pub bootstrap_seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Sliding history capacity; oldest vectors are evicted first
    pub max_history: usize,
    /// Refit the window model after this many new samples
    pub retrain_interval: usize,
    /// Detection threshold on the mapped anomaly score
    pub threshold: f32,
    /// Which outlier model is fitted over the history window
    pub model: ModelKind,
    pub forest: ForestConfig,
}

/// Closed set of outlier models. The variant fixes the score mapping: signed
/// decision scores for the forest, log-likelihoods for the density model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    IsolationForest,
    GaussianDensity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_estimators: usize,
    /// Subsample size per tree (capped by the window size)
    pub max_samples: usize,
    /// Expected share of outliers; sets the decision offset quantile
    pub contamination: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Days of recordings kept by the retention sweep
    pub retention_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".ecosound"),
            classifier: ClassifierConfig::default(),
            anomaly: AnomalyConfig::default(),
            store: StoreConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            input_dim: 13,
            artifact_path: None,
            bootstrap_samples: 200,
            bootstrap_seed: 7,
        }
    }
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            max_history: 1000,
            retrain_interval: 30,
            threshold: 0.1,
            model: ModelKind::IsolationForest,
            forest: ForestConfig::default(),
        }
    }
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.1,
            seed: 42,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { retention_days: 90 }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl EngineConfig {
    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &std::path::Path) -> Self {
        if path.exists() {
            if let Ok(data) = std::fs::read_to_string(path) {
                if let Ok(c) = serde_json::from_str::<EngineConfig>(&data) {
                    return c;
                }
            }
        }
        Self::default()
    }
}
