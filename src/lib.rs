//! EcoSound Engine — Urban noise analysis core.
//!
//! Modular structure:
//! - [`features`] — Feature input adaptation and standardization
//! - [`classify`] — Noise source classification and dB estimation
//! - [`anomaly`] — Windowed acoustic anomaly detection
//! - [`compliance`] — WHO compliance verdicts
//! - [`forecast`] — Hourly noise forecasting
//! - [`storage`] — SQLite recording and artifact persistence
//! - [`logging`] — Structured JSON logging

pub mod analyzer;
pub mod anomaly;
pub mod classify;
pub mod compliance;
pub mod config;
pub mod error;
pub mod features;
pub mod forecast;
pub mod logging;
pub mod storage;

pub use analyzer::{AnalysisReport, NoiseAnalyzer};
pub use anomaly::{AnomalyDetector, AnomalyReport};
pub use classify::{Classification, SourceClassifier};
pub use compliance::{assess_compliance, ComplianceVerdict};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use features::FeatureInput;
pub use logging::StructuredLogger;
pub use storage::NoiseStore;
