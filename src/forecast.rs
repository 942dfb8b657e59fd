//! Hour-by-hour noise forecasting from historical slot averages, a diurnal
//! fallback pattern, and weather/traffic adjustments.

use crate::compliance::{assess_compliance, ComplianceVerdict};
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

const MIN_FORECAST_DB: f32 = 35.0;
const MAX_FORECAST_DB: f32 = 100.0;
const DEFAULT_UNCERTAINTY_DB: f32 = 5.0;
const MAX_UNCERTAINTY_DB: f32 = 15.0;

/// Weather regimes with a known effect on propagated noise. Anything
/// unrecognized deserializes to `Unknown` and adjusts nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum Weather {
    Clear,
    Rain,
    HeavyRain,
    Snow,
    Wind,
    Fog,
    Unknown,
}

impl From<String> for Weather {
    fn from(s: String) -> Self {
        match s.as_str() {
            "clear" => Weather::Clear,
            "rain" => Weather::Rain,
            "heavy_rain" => Weather::HeavyRain,
            "snow" => Weather::Snow,
            "wind" => Weather::Wind,
            "fog" => Weather::Fog,
            _ => Weather::Unknown,
        }
    }
}

impl Default for Weather {
    fn default() -> Self {
        Weather::Clear
    }
}

impl Weather {
    /// dB shift: precipitation dampens, wind carries.
    fn adjustment_db(self) -> f32 {
        match self {
            Weather::Clear | Weather::Unknown => 0.0,
            Weather::Rain => -5.0,
            Weather::HeavyRain => -8.0,
            Weather::Snow => -3.0,
            Weather::Wind => 3.0,
            Weather::Fog => -2.0,
        }
    }
}

/// Noise source expected to dominate a forecast slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedSource {
    Traffic,
    UrbanActivity,
    Ambient,
    HumanActivity,
    Mixed,
}

/// One prior observation bucketed by local hour and weekday (Monday = 0).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalSample {
    pub hour: u32,
    pub weekday: u32,
    pub noise_level: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub predicted_db: f32,
    pub uncertainty: f32,
    pub confidence: f32,
    pub dominant_source: ExpectedSource,
    pub compliance: ComplianceVerdict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reliability {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastSummary {
    pub average_confidence: f32,
    pub average_uncertainty: f32,
    pub reliability: Reliability,
}

/// Forecast one point per hour starting at `start`.
pub fn hourly_forecast(
    start: DateTime<Utc>,
    horizon_hours: u32,
    weather: Weather,
    history: &[HistoricalSample],
) -> Vec<ForecastPoint> {
    (0..horizon_hours)
        .map(|i| forecast_point(start + Duration::hours(i as i64), weather, history))
        .collect()
}

/// Aggregate reliability over a forecast run.
pub fn forecast_summary(points: &[ForecastPoint]) -> ForecastSummary {
    if points.is_empty() {
        return ForecastSummary {
            average_confidence: 0.0,
            average_uncertainty: 0.0,
            reliability: Reliability::Low,
        };
    }
    let n = points.len() as f32;
    let avg_confidence = points.iter().map(|p| p.confidence).sum::<f32>() / n;
    let avg_uncertainty = points.iter().map(|p| p.uncertainty).sum::<f32>() / n;
    let reliability = if avg_confidence > 80.0 {
        Reliability::High
    } else if avg_confidence > 60.0 {
        Reliability::Medium
    } else {
        Reliability::Low
    };
    ForecastSummary {
        average_confidence: round1(avg_confidence),
        average_uncertainty: round2(avg_uncertainty),
        reliability,
    }
}

fn forecast_point(
    at: DateTime<Utc>,
    weather: Weather,
    history: &[HistoricalSample],
) -> ForecastPoint {
    let hour = at.hour();
    let weekday = at.weekday().num_days_from_monday();

    let base = historical_average(history, hour, weekday);
    let predicted = (base + weather.adjustment_db() + traffic_adjustment(hour, weekday))
        .clamp(MIN_FORECAST_DB, MAX_FORECAST_DB);
    let uncertainty = prediction_uncertainty(history, hour);

    ForecastPoint {
        timestamp: at,
        predicted_db: round1(predicted),
        uncertainty: round2(uncertainty),
        confidence: round1((1.0 - uncertainty / 20.0) * 100.0),
        dominant_source: dominant_source(hour, weekday),
        compliance: assess_compliance(predicted),
    }
}

/// Mean level over history entries in the same hour/weekday slot, or the
/// diurnal fallback when the slot has no coverage.
fn historical_average(history: &[HistoricalSample], hour: u32, weekday: u32) -> f32 {
    let mut sum = 0.0f32;
    let mut n = 0usize;
    for s in history {
        if s.hour == hour && s.weekday == weekday {
            sum += s.noise_level;
            n += 1;
        }
    }
    if n > 0 {
        sum / n as f32
    } else {
        default_pattern(hour, weekday)
    }
}

fn default_pattern(hour: u32, weekday: u32) -> f32 {
    if weekday >= 5 {
        if (6..=10).contains(&hour) {
            55.0
        } else if (10..=22).contains(&hour) {
            60.0
        } else {
            45.0
        }
    } else if (7..=9).contains(&hour) || (17..=19).contains(&hour) {
        75.0
    } else if (9..=17).contains(&hour) {
        65.0
    } else if hour >= 22 || hour <= 6 {
        50.0
    } else {
        58.0
    }
}

fn traffic_adjustment(hour: u32, weekday: u32) -> f32 {
    if weekday >= 5 {
        return -3.0;
    }
    if (7..=9).contains(&hour) || (17..=19).contains(&hour) {
        8.0
    } else if hour >= 22 || hour <= 6 {
        -5.0
    } else {
        0.0
    }
}

/// Population standard deviation of same-hour history, capped, with a fixed
/// default when fewer than two points cover the hour.
fn prediction_uncertainty(history: &[HistoricalSample], hour: u32) -> f32 {
    let levels: Vec<f32> = history
        .iter()
        .filter(|s| s.hour == hour)
        .map(|s| s.noise_level)
        .collect();
    if levels.len() < 2 {
        return DEFAULT_UNCERTAINTY_DB;
    }
    let mean = levels.iter().sum::<f32>() / levels.len() as f32;
    let variance =
        levels.iter().map(|x| (x - mean) * (x - mean)).sum::<f32>() / levels.len() as f32;
    variance.sqrt().min(MAX_UNCERTAINTY_DB)
}

fn dominant_source(hour: u32, weekday: u32) -> ExpectedSource {
    let weekend = weekday >= 5;
    if (7..=9).contains(&hour) || (17..=19).contains(&hour) {
        ExpectedSource::Traffic
    } else if (9..=17).contains(&hour) && !weekend {
        ExpectedSource::UrbanActivity
    } else if hour >= 22 || hour <= 6 {
        ExpectedSource::Ambient
    } else if weekend && (10..=22).contains(&hour) {
        ExpectedSource::HumanActivity
    } else {
        ExpectedSource::Mixed
    }
}

fn round1(x: f32) -> f32 {
    (x * 10.0).round() / 10.0
}

fn round2(x: f32) -> f32 {
    (x * 100.0).round() / 100.0
}
