//! EcoSound engine entrypoint: reads one analysis request per line (JSON)
//! from stdin, writes one analysis report per line to stdout, and persists
//! every analyzed recording. The anomaly model resumes from the last saved
//! snapshot and is saved back when the stream ends.

use chrono::{DateTime, Utc};
use ecosound_engine::{
    analyzer::NoiseAnalyzer,
    anomaly::AnomalySnapshot,
    config::EngineConfig,
    features::FeatureInput,
    logging::{AnalysisEvent, StructuredLogger},
    storage::{NoiseStore, RecordingRow},
};
use serde::Deserialize;
use std::io::{BufRead, Write};
use tracing::{info, warn};
use uuid::Uuid;

const ANOMALY_ARTIFACT: &str = "anomaly-snapshot";

/// One stdin line. Everything but the features is optional.
#[derive(Debug, Deserialize)]
struct AnalysisRequest {
    #[serde(default)]
    id: Option<Uuid>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    captured_at: Option<DateTime<Utc>>,
    features: FeatureInput,
}

fn run_stream<R: BufRead, W: Write>(
    analyzer: &NoiseAnalyzer,
    store: &NoiseStore,
    input: R,
    out: &mut W,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut analyzed: u64 = 0;
    let mut flagged: u64 = 0;

    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let request: AnalysisRequest = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "skipping malformed request line");
                continue;
            }
        };

        let report = analyzer.analyze(&request.features);
        analyzed += 1;

        let id = request.id.unwrap_or_else(Uuid::new_v4);
        let row = RecordingRow {
            id,
            latitude: request.latitude,
            longitude: request.longitude,
            captured_at: request.captured_at.unwrap_or_else(Utc::now),
            noise_level: report.noise_db,
            classification: report.classification.clone(),
            anomaly: report.anomaly.detected.then(|| report.anomaly.clone()),
        };
        if let Err(e) = store.insert_recording(&row) {
            warn!(recording = %id, error = %e, "failed to persist recording");
        }

        if report.anomaly.detected {
            flagged += 1;
            let id_str = id.to_string();
            let event = AnalysisEvent {
                ts: Utc::now().to_rfc3339(),
                level: "warn",
                message: &report.anomaly.description,
                recording_id: Some(&id_str),
                noise_db: Some(report.noise_db),
                top_label: report.classification.top().map(|t| t.label.as_str()),
                anomaly_score: Some(report.anomaly.score),
                severity: Some(report.anomaly.severity.as_str()),
                error: None,
            };
            StructuredLogger::emit_json(&event, &mut std::io::stderr());
        }

        StructuredLogger::emit_json(&report, out);
    }

    info!(analyzed, flagged, "input stream drained");
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config_path = std::env::var("ECOSOUND_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("config.json"));
    let config = EngineConfig::load(&config_path);

    StructuredLogger::init(config.log.json, &config.log.level);
    info!(data_dir = ?config.data_dir, "ecosound engine starting");

    std::fs::create_dir_all(&config.data_dir)?;
    let store = NoiseStore::open(&config.data_dir.join("ecosound.db"))?;
    let analyzer = NoiseAnalyzer::new(&config);

    // Resume the window model from the previous run when one was saved.
    match store.load_artifact(ANOMALY_ARTIFACT) {
        Ok(Some((version, payload))) => match serde_json::from_str::<AnomalySnapshot>(&payload) {
            Ok(snapshot) => {
                analyzer.detector().restore(snapshot);
                info!(version, "anomaly model restored");
            }
            Err(e) => warn!(error = %e, "discarding unreadable anomaly snapshot"),
        },
        Ok(None) => {}
        Err(e) => warn!(error = %e, "anomaly snapshot unavailable"),
    }

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    run_stream(&analyzer, &store, stdin.lock(), &mut stdout)?;

    let snapshot = analyzer.detector().snapshot();
    store.save_artifact(
        ANOMALY_ARTIFACT,
        snapshot.version,
        &serde_json::to_string(&snapshot)?,
    )?;

    let pruned = store.prune_older_than(config.store.retention_days)?;
    if pruned > 0 {
        info!(pruned, "old recordings pruned");
    }
    let stats = analyzer.detector().stats();
    info!(
        history = stats.history_size,
        fitted = stats.model_fitted,
        recordings = store.recording_count()?,
        "ecosound engine stopping"
    );
    Ok(())
}
