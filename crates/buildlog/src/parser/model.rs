use serde::Serialize;
use thiserror::Error;

use crate::source::SourceError;
use crate::store::StoreError;

/// Why a single line had no effect. Never escapes the driver.
#[derive(Debug, Error)]
pub enum LineError {
    #[error("Line too large: {0} bytes (max: {1} bytes)")]
    LineTooLarge(usize, usize),

    #[error("No active step to attribute unindexed line to")]
    NoActiveStep,

    #[error("Malformed line: {0}")]
    Malformed(String),

    #[error("Line handling panicked")]
    Panicked,
}

impl LineError {
    /// Anomalies are well-formed lines the registry cannot place; everything
    /// else is a plain skip.
    pub fn is_anomaly(&self) -> bool {
        matches!(self, LineError::NoActiveStep)
    }
}

/// What a successfully handled line did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// A declared step started running under `index`
    Started { index: u32, step_slug: String },
    /// An active step's record changed
    Updated { index: u32 },
    /// The terminal `writing image` marker was captured
    ImageWritten(String),
    /// The line was recognized but matched nothing declared
    Ignored,
    /// Handled, but the line could not be tied to a declared step
    Anomaly(String),
}

/// Errors that end a parse and reach the caller.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Line source failed: {0}")]
    Source(#[from] SourceError),

    #[error("Persisting build state failed: {0}")]
    Store(#[from] StoreError),

    #[error("Unknown build candidate: {0}")]
    UnknownCandidate(String),
}

/// Per-invocation counters handed back to the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParseReport {
    /// Non-empty lines seen
    pub lines: u64,
    /// Lines dropped because they were malformed
    pub skipped: u64,
    /// Lines that referenced a step the registry could not resolve
    pub anomalies: u64,
    /// Successful store commits, including the final one
    pub flushes: u64,
    /// Mid-stream commits that failed and were deferred
    pub failed_flushes: u64,
    pub image_id: Option<String>,
}
