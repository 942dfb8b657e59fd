//! Structured logging setup and audit-line emission.

mod format;

pub use format::{AnalysisEvent, StructuredLogger};
