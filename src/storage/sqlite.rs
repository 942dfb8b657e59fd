//! Recording and artifact persistence over rusqlite. Timestamps are stored
//! as millisecond-precision RFC 3339 text with a Z suffix, which keeps string
//! comparison consistent with time order.

use crate::anomaly::AnomalyReport;
use crate::classify::Classification;
use crate::error::Result;
use crate::forecast::HistoricalSample;
use chrono::{DateTime, Datelike, Duration, SecondsFormat, Timelike, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// One analyzed recording as persisted. Classification and anomaly land in
/// JSON columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingRow {
    pub id: Uuid,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub captured_at: DateTime<Utc>,
    pub noise_level: f32,
    pub classification: Classification,
    pub anomaly: Option<AnomalyReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotspotSeverity {
    Critical,
    High,
    Medium,
}

impl HotspotSeverity {
    fn from_avg(avg_db: f32) -> Self {
        if avg_db >= 80.0 {
            HotspotSeverity::Critical
        } else if avg_db >= 70.0 {
            HotspotSeverity::High
        } else {
            HotspotSeverity::Medium
        }
    }
}

/// A location bin whose recordings repeatedly exceed the query threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hotspot {
    pub latitude: f64,
    pub longitude: f64,
    pub average_db: f32,
    pub peak_db: f32,
    pub measurement_count: i64,
    pub severity: HotspotSeverity,
}

pub struct NoiseStore {
    conn: Mutex<Connection>,
}

impl NoiseStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS recordings (
                id TEXT PRIMARY KEY,
                latitude REAL,
                longitude REAL,
                captured_at TEXT NOT NULL,
                noise_level REAL NOT NULL,
                classification TEXT NOT NULL,
                anomaly TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_recordings_created ON recordings(created_at);
            CREATE TABLE IF NOT EXISTS model_artifacts (
                name TEXT PRIMARY KEY,
                version INTEGER NOT NULL,
                payload TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert one analyzed recording.
    pub fn insert_recording(&self, row: &RecordingRow) -> Result<()> {
        let classification = serde_json::to_string(&row.classification)?;
        let anomaly = match &row.anomaly {
            Some(a) => Some(serde_json::to_string(a)?),
            None => None,
        };
        self.conn.lock().unwrap().execute(
            "INSERT OR REPLACE INTO recordings
             (id, latitude, longitude, captured_at, noise_level, classification, anomaly, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                row.id.to_string(),
                row.latitude,
                row.longitude,
                fmt_ts(row.captured_at),
                row.noise_level,
                classification,
                anomaly,
                fmt_ts(Utc::now()),
            ],
        )?;
        Ok(())
    }

    /// Most recently inserted recordings, newest first.
    pub fn recent_recordings(&self, limit: usize) -> Result<Vec<RecordingRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, latitude, longitude, captured_at, noise_level, classification, anomaly
             FROM recordings ORDER BY created_at DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            let id: String = row.get(0)?;
            let captured: String = row.get(3)?;
            let classification: String = row.get(5)?;
            let anomaly: Option<String> = row.get(6)?;
            Ok(RecordingRow {
                id: parse_uuid(0, &id)?,
                latitude: row.get(1)?,
                longitude: row.get(2)?,
                captured_at: parse_ts(3, &captured)?,
                noise_level: row.get(4)?,
                classification: parse_json(5, &classification)?,
                anomaly: match anomaly {
                    Some(a) => Some(parse_json(6, &a)?),
                    None => None,
                },
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    /// Recordings near a location over the past `days`, bucketed by hour and
    /// weekday for the forecaster. The longitude window widens with latitude.
    pub fn historical_samples(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
        days: i64,
    ) -> Result<Vec<HistoricalSample>> {
        let lat_range = radius_km / 111.0;
        let lng_range = radius_km / (111.0 * latitude.to_radians().cos().abs().max(1e-6));
        let since = fmt_ts(Utc::now() - Duration::days(days));

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT captured_at, noise_level FROM recordings
             WHERE latitude BETWEEN ?1 AND ?2
               AND longitude BETWEEN ?3 AND ?4
               AND created_at > ?5
             ORDER BY captured_at DESC",
        )?;
        let rows = stmt.query_map(
            params![
                latitude - lat_range,
                latitude + lat_range,
                longitude - lng_range,
                longitude + lng_range,
                since
            ],
            |row| {
                let captured: String = row.get(0)?;
                let ts = parse_ts(0, &captured)?;
                Ok(HistoricalSample {
                    hour: ts.hour(),
                    weekday: ts.weekday().num_days_from_monday(),
                    noise_level: row.get(1)?,
                })
            },
        )?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    /// Persistent loud clusters: locations binned to ~100 m whose recordings
    /// exceed `threshold_db` at least three times within the window.
    pub fn noise_hotspots(&self, threshold_db: f32, days: i64) -> Result<Vec<Hotspot>> {
        let since = fmt_ts(Utc::now() - Duration::days(days));
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT latitude, longitude, AVG(noise_level) AS avg_db,
                    MAX(noise_level) AS peak_db, COUNT(*) AS n
             FROM recordings
             WHERE noise_level >= ?1 AND created_at > ?2
               AND latitude IS NOT NULL AND longitude IS NOT NULL
             GROUP BY ROUND(latitude, 3), ROUND(longitude, 3)
             HAVING COUNT(*) >= 3
             ORDER BY avg_db DESC
             LIMIT 20",
        )?;
        let rows = stmt.query_map(params![threshold_db, since], |row| {
            let avg: f64 = row.get(2)?;
            let peak: f64 = row.get(3)?;
            Ok(Hotspot {
                latitude: row.get(0)?,
                longitude: row.get(1)?,
                average_db: avg as f32,
                peak_db: peak as f32,
                measurement_count: row.get(4)?,
                severity: HotspotSeverity::from_avg(avg as f32),
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    /// Retention sweep: delete recordings inserted more than `days` ago.
    pub fn prune_older_than(&self, days: i64) -> Result<u64> {
        let cutoff = fmt_ts(Utc::now() - Duration::days(days));
        let n = self
            .conn
            .lock()
            .unwrap()
            .execute("DELETE FROM recordings WHERE created_at < ?1", params![cutoff])?;
        debug!(deleted = n, days, "retention sweep");
        Ok(n as u64)
    }

    pub fn recording_count(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let n = conn.query_row("SELECT COUNT(*) FROM recordings", [], |row| row.get(0))?;
        Ok(n)
    }

    /// Upsert a named model artifact, stored as JSON text.
    pub fn save_artifact(&self, name: &str, version: u32, payload: &str) -> Result<()> {
        self.conn.lock().unwrap().execute(
            "INSERT OR REPLACE INTO model_artifacts (name, version, payload, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![name, version, payload, fmt_ts(Utc::now())],
        )?;
        Ok(())
    }

    pub fn load_artifact(&self, name: &str) -> Result<Option<(u32, String)>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT version, payload FROM model_artifacts WHERE name = ?1",
                params![name],
                |row| Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        Ok(row)
    }
}

fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_uuid(idx: usize, s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_json<T: serde::de::DeserializeOwned>(idx: usize, s: &str) -> rusqlite::Result<T> {
    serde_json::from_str(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
