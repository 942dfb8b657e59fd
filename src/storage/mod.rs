//! SQLite-backed persistence for analyzed recordings and model artifacts.

mod sqlite;

pub use sqlite::{Hotspot, HotspotSeverity, NoiseStore, RecordingRow};
