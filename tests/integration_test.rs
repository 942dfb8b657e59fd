//! Integration tests: config load, the analysis pipeline end to end, window
//! model behavior, persistence, artifact round-trips.

use chrono::{TimeZone, Utc};
use ecosound_engine::anomaly::{AnomalyDetector, AnomalyKind, AnomalySnapshot, Severity};
use ecosound_engine::classify::{estimate_noise_level, SourceClassifier};
use ecosound_engine::compliance::{assess_compliance, ComplianceTier};
use ecosound_engine::config::{AnomalyConfig, ClassifierConfig, EngineConfig, ModelKind};
use ecosound_engine::error::EngineError;
use ecosound_engine::features::{FeatureFrame, FeatureInput};
use ecosound_engine::storage::{HotspotSeverity, NoiseStore, RecordingRow};
use ecosound_engine::{AnomalyReport, NoiseAnalyzer};
use std::path::Path;
use uuid::Uuid;

fn vec7(energy: f32) -> FeatureInput {
    let mut v = vec![0.0f32; 7];
    v[0] = energy;
    FeatureInput::Samples(v)
}

#[test]
fn config_load_default() {
    let c = EngineConfig::load(Path::new("nonexistent.json"));
    assert_eq!(c.classifier.input_dim, 13);
    assert_eq!(c.anomaly.max_history, 1000);
    assert_eq!(c.anomaly.retrain_interval, 30);
    assert!((c.anomaly.threshold - 0.1).abs() < f32::EPSILON);
    assert_eq!(c.anomaly.model, ModelKind::IsolationForest);
    assert_eq!(c.store.retention_days, 90);
}

#[test]
fn config_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{
            "data_dir": "/tmp/eco-test",
            "classifier": {"input_dim": 9, "artifact_path": null,
                           "bootstrap_samples": 50, "bootstrap_seed": 3},
            "anomaly": {"max_history": 200, "retrain_interval": 10,
                        "threshold": 0.25, "model": "gaussian_density",
                        "forest": {"n_estimators": 20, "max_samples": 64,
                                   "contamination": 0.05, "seed": 1}},
            "store": {"retention_days": 14},
            "log": {"level": "debug", "json": false}
        }"#,
    )
    .unwrap();
    let c = EngineConfig::load(&path);
    assert_eq!(c.classifier.input_dim, 9);
    assert_eq!(c.anomaly.max_history, 200);
    assert_eq!(c.anomaly.model, ModelKind::GaussianDensity);
    assert_eq!(c.store.retention_days, 14);
    assert!(!c.log.json);
}

#[test]
fn zero_padding_matches_manual_padding() {
    let clf = SourceClassifier::train(&ClassifierConfig::default());
    let short = FeatureInput::Samples(vec![0.6, 0.2, 0.4, 0.5, -0.1, 0.1, 0.0]);
    let mut padded_vals = vec![0.6, 0.2, 0.4, 0.5, -0.1, 0.1, 0.0];
    padded_vals.resize(13, 0.0);
    let padded = FeatureInput::Samples(padded_vals);

    let a = clf.classify(&short);
    let b = clf.classify(&padded);
    assert_eq!(a.ranked.len(), b.ranked.len());
    for (x, y) in a.ranked.iter().zip(&b.ranked) {
        assert_eq!(x.label, y.label);
        assert_eq!(x.confidence, y.confidence);
    }
}

#[test]
fn noise_estimate_stays_bounded_and_defaults_on_empty() {
    let clf = SourceClassifier::train(&ClassifierConfig::default());

    for energy in [-10.0f32, 0.0, 0.3, 0.9, 50.0] {
        let input = FeatureInput::Samples(vec![energy; 13]);
        let c = clf.classify(&input);
        let db = estimate_noise_level(&input, &c);
        assert!((30.0..=120.0).contains(&db), "out of range for {energy}");
    }

    let empty = FeatureInput::Samples(vec![]);
    let c = clf.classify(&empty);
    assert_eq!(estimate_noise_level(&empty, &c), 55.0);
}

#[test]
fn empty_input_never_raises_an_anomaly() {
    let detector = AnomalyDetector::new(&AnomalyConfig::default());
    for input in [FeatureInput::Samples(vec![]), FeatureInput::Frames(vec![])] {
        let r = detector.detect(&input);
        assert!(!r.detected);
        assert_eq!(r.score, 0.0);
        assert_eq!(r.severity, Severity::None);
        assert_eq!(r.description, "No anomaly detected");
    }
    assert_eq!(detector.stats().history_size, 0);
}

#[test]
fn window_evicts_oldest_beyond_capacity() {
    let config = AnomalyConfig {
        retrain_interval: 2000,
        ..AnomalyConfig::default()
    };
    let detector = AnomalyDetector::new(&config);
    for i in 0..1001 {
        detector.detect(&vec7(0.2 + (i % 7) as f32 * 0.01));
    }
    assert_eq!(detector.stats().history_size, 1000);
}

#[test]
fn threshold_updates_are_validated_and_applied() {
    let detector = AnomalyDetector::new(&AnomalyConfig::default());
    assert!(matches!(
        detector.update_threshold(-0.1),
        Err(EngineError::InvalidThreshold(_))
    ));
    assert!(matches!(
        detector.update_threshold(1.5),
        Err(EngineError::InvalidThreshold(_))
    ));

    // Cold start: a near-silent vector rule-scores 0.3, over the default 0.1.
    let quiet = vec7(0.01);
    assert!(detector.detect(&quiet).detected);

    detector.update_threshold(0.5).unwrap();
    let r = detector.detect(&quiet);
    assert!(!r.detected);
    assert_eq!(r.score, 0.0);
    assert!((detector.stats().threshold - 0.5).abs() < f32::EPSILON);
}

#[test]
fn rule_cascade_drives_detection_when_the_window_cannot_fit() {
    // A constant window has no variance, so the forest refit is rejected and
    // scoring stays on the energy rules.
    let detector = AnomalyDetector::new(&AnomalyConfig::default());
    for _ in 0..30 {
        detector.detect(&FeatureInput::Samples(vec![0.0; 7]));
    }
    let stats = detector.stats();
    assert!(!stats.model_fitted);

    let r = detector.detect(&vec7(0.95));
    assert!(r.detected);
    assert_eq!(r.kind, Some(AnomalyKind::HighEnergyEvent));
    assert_eq!(r.severity, Severity::Critical);
    assert!((r.score - 0.95).abs() < 1e-6);
    assert!((r.confidence - 1.0).abs() < 1e-6);
    assert_eq!(
        r.description,
        "Extremely loud sound detected (possible emergency vehicle, alarm, or explosion)"
    );

    let r = detector.detect(&vec7(0.85));
    assert!(r.detected);
    assert_eq!(r.kind, Some(AnomalyKind::LoudMachinery));
    assert_eq!(r.severity, Severity::Critical);

    let r = detector.detect(&vec7(0.03));
    assert!(r.detected);
    assert_eq!(r.kind, Some(AnomalyKind::UnusualQuiet));
    assert_eq!(r.severity, Severity::Medium);
    assert!((r.score - 0.3).abs() < 1e-6);
}

#[test]
fn gaussian_window_model_passes_repeats_and_flags_outliers() {
    let config = AnomalyConfig {
        model: ModelKind::GaussianDensity,
        ..AnomalyConfig::default()
    };
    let detector = AnomalyDetector::new(&config);
    for _ in 0..30 {
        detector.detect(&FeatureInput::Samples(vec![0.3; 7]));
    }
    assert!(detector.stats().model_fitted);

    // Exact repeat of the constant pattern: no anomaly, score zeroed.
    let r = detector.detect(&FeatureInput::Samples(vec![0.3; 7]));
    assert!(!r.detected);
    assert_eq!(r.score, 0.0);

    // One loud dimension against a floor-variance fit is unmistakable.
    let mut loud = vec![0.3f32; 7];
    loud[0] = 0.95;
    let r = detector.detect(&FeatureInput::Samples(loud));
    assert!(r.detected);
    assert_eq!(r.kind, Some(AnomalyKind::HighEnergyEvent));
    assert_eq!(r.severity, Severity::Critical);
    assert!((r.confidence - 1.0).abs() < 1e-6);
}

#[test]
fn forest_window_model_separates_outliers_at_zero_threshold() {
    let config = AnomalyConfig::default();
    let detector = AnomalyDetector::new(&config);
    // Varied cluster around 0.5 so the forest has columns to split on.
    for i in 0..30u32 {
        let v: Vec<f32> = (0..13)
            .map(|j| 0.5 + ((i * 13 + j) % 11) as f32 * 0.01)
            .collect();
        detector.detect(&FeatureInput::Samples(v));
    }
    assert!(detector.stats().model_fitted);

    detector.update_threshold(0.0).unwrap();

    // The cluster center scores below the training contamination quantile,
    // so its mapped score stays at 0 even with the threshold floored.
    let center = detector.detect(&FeatureInput::Samples(vec![0.55; 13]));
    assert!(!center.detected);

    let outlier = detector.detect(&FeatureInput::Samples(vec![8.0; 13]));
    assert!(outlier.detected);
    assert_eq!(outlier.kind, Some(AnomalyKind::HighEnergyEvent));
    assert!(outlier.score > 0.0);
}

#[test]
fn reset_drops_history_and_model_but_keeps_threshold() {
    let config = AnomalyConfig {
        model: ModelKind::GaussianDensity,
        ..AnomalyConfig::default()
    };
    let detector = AnomalyDetector::new(&config);
    for _ in 0..30 {
        detector.detect(&FeatureInput::Samples(vec![0.3; 7]));
    }
    detector.update_threshold(0.7).unwrap();
    assert!(detector.stats().model_fitted);

    detector.reset();
    let stats = detector.stats();
    assert_eq!(stats.history_size, 0);
    assert!(!stats.model_fitted);
    assert!(!stats.scaler_fitted);
    assert!((stats.threshold - 0.7).abs() < f32::EPSILON);
}

#[test]
fn anomaly_snapshot_roundtrips_through_json() {
    let config = AnomalyConfig {
        model: ModelKind::GaussianDensity,
        ..AnomalyConfig::default()
    };
    let trained = AnomalyDetector::new(&config);
    for _ in 0..30 {
        trained.detect(&FeatureInput::Samples(vec![0.3; 7]));
    }
    trained.update_threshold(0.42).unwrap();

    let json = serde_json::to_string(&trained.snapshot()).unwrap();
    let snapshot: AnomalySnapshot = serde_json::from_str(&json).unwrap();

    let restored = AnomalyDetector::new(&config);
    restored.restore(snapshot);
    let stats = restored.stats();
    assert_eq!(stats.history_size, 0);
    assert!(stats.model_fitted);
    assert!((stats.threshold - 0.42).abs() < f32::EPSILON);

    // 0.5 energy scores 0 under the cold-start rules, so a detection here
    // can only come from the restored model.
    let r = restored.detect(&FeatureInput::Samples(vec![0.5; 7]));
    assert!(r.detected);
    assert_eq!(r.kind, Some(AnomalyKind::AcousticAnomaly));
}

#[test]
fn compliance_tiers() {
    let v = assess_compliance(70.0);
    assert_eq!(v.tier, ComplianceTier::Critical);
    assert!(v.exceeds_limit);

    let v = assess_compliance(60.0);
    assert_eq!(v.tier, ComplianceTier::Daytime);
    assert!(v.exceeds_limit);

    let v = assess_compliance(54.9);
    assert_eq!(v.tier, ComplianceTier::Safe);
    assert!(!v.exceeds_limit);
}

#[test]
fn pipeline_produces_a_complete_report() {
    let analyzer = NoiseAnalyzer::new(&EngineConfig::default());
    let input = FeatureInput::Frames(vec![
        FeatureFrame {
            energy: 0.82,
            zcr: 0.45,
            spectral_centroid: 0.6,
            spectral_rolloff: 0.68,
            mfcc_0: 0.05,
            mfcc_1: 0.2,
            mfcc_2: 0.1,
        },
        FeatureFrame {
            energy: 0.78,
            zcr: 0.5,
            spectral_centroid: 0.58,
            spectral_rolloff: 0.65,
            mfcc_0: 0.02,
            mfcc_1: 0.18,
            mfcc_2: 0.12,
        },
    ]);

    let report = analyzer.analyze(&input);
    assert!(!report.classification.synthetic);
    assert!((30.0..=120.0).contains(&report.noise_db));
    let sum: f32 = report.classification.ranked.iter().map(|r| r.confidence).sum();
    assert!((sum - 1.0).abs() < 1e-3);
    for pair in report.classification.ranked.windows(2) {
        assert!(pair[0].confidence >= pair[1].confidence);
    }
    assert_eq!(report.dominant_source, report.classification.top().map(|t| t.label));
    assert_eq!(report.compliance.tier, assess_compliance(report.noise_db).tier);

    let json = serde_json::to_value(&report).unwrap();
    for key in ["classification", "anomaly", "noise_db", "compliance"] {
        assert!(json.get(key).is_some(), "missing {key}");
    }
}

#[test]
fn pipeline_survives_empty_features() {
    let analyzer = NoiseAnalyzer::new(&EngineConfig::default());
    let report = analyzer.analyze(&FeatureInput::Samples(vec![]));
    assert!(report.classification.synthetic);
    assert_eq!(report.noise_db, 55.0);
    assert!(!report.anomaly.detected);
    assert_eq!(report.anomaly.score, 0.0);
    assert_eq!(report.compliance.tier, ComplianceTier::Daytime);
}

#[test]
fn frame_and_sample_payloads_classify_identically() {
    let clf = SourceClassifier::train(&ClassifierConfig::default());
    let frames = FeatureInput::Frames(vec![FeatureFrame {
        energy: 0.6,
        zcr: 0.2,
        spectral_centroid: 0.4,
        spectral_rolloff: 0.5,
        mfcc_0: -0.1,
        mfcc_1: 0.1,
        mfcc_2: 0.0,
    }]);
    let samples = FeatureInput::Samples(vec![0.6, 0.2, 0.4, 0.5, -0.1, 0.1, 0.0]);

    let a = clf.classify(&frames);
    let b = clf.classify(&samples);
    for (x, y) in a.ranked.iter().zip(&b.ranked) {
        assert_eq!(x.label, y.label);
        assert_eq!(x.confidence, y.confidence);
    }
}

#[test]
fn classifier_artifact_reload_reproduces_rankings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("classifier.json");

    let config = ClassifierConfig::default();
    let original = SourceClassifier::train(&config);
    original.save(&path).unwrap();

    let reload_config = ClassifierConfig {
        artifact_path: Some(path.clone()),
        ..ClassifierConfig::default()
    };
    let reloaded = SourceClassifier::load_or_train(&reload_config);
    let input = FeatureInput::Samples(vec![0.62, 0.28, 0.45, 0.52, -0.22, 0.1, 0.05]);
    let a = original.classify(&input);
    let b = reloaded.classify(&input);
    for (x, y) in a.ranked.iter().zip(&b.ranked) {
        assert_eq!(x.label, y.label);
        assert_eq!(x.confidence, y.confidence);
    }

    // A width mismatch discards the artifact and retrains at the new width.
    let mismatched = ClassifierConfig {
        input_dim: 9,
        artifact_path: Some(path),
        ..ClassifierConfig::default()
    };
    assert_eq!(SourceClassifier::load_or_train(&mismatched).input_dim(), 9);
}

#[test]
fn storage_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let store = NoiseStore::open(&dir.path().join("eco.db")).unwrap();

    let clf = SourceClassifier::train(&ClassifierConfig::default());
    let classification = clf.classify(&FeatureInput::Samples(vec![0.6; 13]));
    let row = RecordingRow {
        id: Uuid::new_v4(),
        latitude: Some(40.7128),
        longitude: Some(-74.0060),
        captured_at: Utc::now(),
        noise_level: 72.5,
        classification: classification.clone(),
        anomaly: Some(AnomalyReport::flagged(AnomalyKind::LoudMachinery, 0.5)),
    };
    store.insert_recording(&row).unwrap();

    let rows = store.recent_recordings(10).unwrap();
    assert_eq!(rows.len(), 1);
    let got = &rows[0];
    assert_eq!(got.id, row.id);
    assert_eq!(got.latitude, Some(40.7128));
    assert!((got.noise_level - 72.5).abs() < 1e-6);
    assert_eq!(got.classification.ranked.len(), classification.ranked.len());
    let anomaly = got.anomaly.as_ref().unwrap();
    assert_eq!(anomaly.kind, Some(AnomalyKind::LoudMachinery));
    assert_eq!(anomaly.severity, Severity::High);
}

#[test]
fn hotspots_need_three_loud_recordings_in_one_bin() {
    let dir = tempfile::tempdir().unwrap();
    let store = NoiseStore::open(&dir.path().join("eco.db")).unwrap();
    let clf = SourceClassifier::train(&ClassifierConfig::default());
    let classification = clf.classify(&FeatureInput::Samples(vec![0.6; 13]));

    let insert = |lat: f64, lng: f64, db: f32| {
        store
            .insert_recording(&RecordingRow {
                id: Uuid::new_v4(),
                latitude: Some(lat),
                longitude: Some(lng),
                captured_at: Utc::now(),
                noise_level: db,
                classification: classification.clone(),
                anomaly: None,
            })
            .unwrap();
    };

    // Four loud recordings in one ~100 m bin, average 85.
    for db in [82.0, 84.0, 86.0, 88.0] {
        insert(40.7589, -73.9851, db);
    }
    // Three in a quieter bin, average 72.
    for db in [71.0, 72.0, 73.0] {
        insert(40.7000, -73.9900, db);
    }
    // Only two loud ones here: below the recurrence cutoff.
    for db in [90.0, 91.0] {
        insert(40.8000, -73.9000, db);
    }
    // Below the dB threshold entirely.
    insert(40.7589, -73.9851, 65.0);

    let hotspots = store.noise_hotspots(70.0, 7).unwrap();
    assert_eq!(hotspots.len(), 2);
    assert!((hotspots[0].average_db - 85.0).abs() < 0.01);
    assert_eq!(hotspots[0].severity, HotspotSeverity::Critical);
    assert_eq!(hotspots[0].measurement_count, 4);
    assert!((hotspots[1].average_db - 72.0).abs() < 0.01);
    assert_eq!(hotspots[1].severity, HotspotSeverity::High);
    assert_eq!(hotspots[1].measurement_count, 3);
}

#[test]
fn historical_samples_bucket_by_hour_and_weekday() {
    let dir = tempfile::tempdir().unwrap();
    let store = NoiseStore::open(&dir.path().join("eco.db")).unwrap();
    let clf = SourceClassifier::train(&ClassifierConfig::default());
    let classification = clf.classify(&FeatureInput::Samples(vec![0.6; 13]));

    // 2026-08-17 is a Monday.
    let monday_8am = Utc.with_ymd_and_hms(2026, 8, 17, 8, 30, 0).unwrap();
    for db in [70.0, 74.0] {
        store
            .insert_recording(&RecordingRow {
                id: Uuid::new_v4(),
                latitude: Some(40.75),
                longitude: Some(-73.98),
                captured_at: monday_8am,
                noise_level: db,
                classification: classification.clone(),
                anomaly: None,
            })
            .unwrap();
    }
    // Well outside the 1 km radius.
    store
        .insert_recording(&RecordingRow {
            id: Uuid::new_v4(),
            latitude: Some(41.5),
            longitude: Some(-73.98),
            captured_at: monday_8am,
            noise_level: 95.0,
            classification: classification.clone(),
            anomaly: None,
        })
        .unwrap();

    let samples = store.historical_samples(40.75, -73.98, 1.0, 30).unwrap();
    assert_eq!(samples.len(), 2);
    for s in &samples {
        assert_eq!(s.hour, 8);
        assert_eq!(s.weekday, 0);
        assert!(s.noise_level >= 70.0 && s.noise_level <= 74.0);
    }
}

#[test]
fn retention_sweep_deletes_expired_rows() {
    let dir = tempfile::tempdir().unwrap();
    let store = NoiseStore::open(&dir.path().join("eco.db")).unwrap();
    let clf = SourceClassifier::train(&ClassifierConfig::default());
    let classification = clf.classify(&FeatureInput::Samples(vec![0.6; 13]));

    for _ in 0..2 {
        store
            .insert_recording(&RecordingRow {
                id: Uuid::new_v4(),
                latitude: None,
                longitude: None,
                captured_at: Utc::now(),
                noise_level: 60.0,
                classification: classification.clone(),
                anomaly: None,
            })
            .unwrap();
    }
    assert_eq!(store.recording_count().unwrap(), 2);

    // A zero-day cutoff expires everything inserted before this call.
    std::thread::sleep(std::time::Duration::from_millis(10));
    let pruned = store.prune_older_than(0).unwrap();
    assert_eq!(pruned, 2);
    assert_eq!(store.recording_count().unwrap(), 0);
}

#[test]
fn artifact_table_upserts_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let store = NoiseStore::open(&dir.path().join("eco.db")).unwrap();

    assert!(store.load_artifact("anomaly-snapshot").unwrap().is_none());
    store
        .save_artifact("anomaly-snapshot", 1, r#"{"x":1}"#)
        .unwrap();
    let (version, payload) = store.load_artifact("anomaly-snapshot").unwrap().unwrap();
    assert_eq!(version, 1);
    assert_eq!(payload, r#"{"x":1}"#);

    store
        .save_artifact("anomaly-snapshot", 2, r#"{"x":2}"#)
        .unwrap();
    let (version, payload) = store.load_artifact("anomaly-snapshot").unwrap().unwrap();
    assert_eq!(version, 2);
    assert_eq!(payload, r#"{"x":2}"#);
}
