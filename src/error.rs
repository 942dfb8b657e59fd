//! Error taxonomy. Most failures inside the analysis core degrade to
//! documented fallback results; the variants here cover the few paths that
//! surface to callers (threshold validation, store and artifact I/O).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Detection threshold outside the accepted range.
    #[error("threshold must be between 0.0 and 1.0 (got {0})")]
    InvalidThreshold(f32),

    /// Training window has no varying dimension; a fit would score every
    /// sample identically.
    #[error("degenerate training window: no variance across {0} dimensions")]
    DegenerateFit(usize),

    /// Model artifact could not be encoded or decoded.
    #[error("artifact error: {0}")]
    Artifact(#[from] serde_json::Error),

    /// Local store failure.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
