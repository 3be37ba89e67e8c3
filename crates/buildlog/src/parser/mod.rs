/// Build output parsing module
///
/// Turns the raw, line-oriented output of `docker build` (BuildKit plain
/// progress) into per-step state on a [`BuildCandidate`](crate::candidate::BuildCandidate).
///
/// # Architecture
///
/// - `ansi.rs`: Escape-code stripping and line normalization
/// - `classify.rs`: Splits a line into step index and remainder
/// - `flags.rs` / `command.rs`: Step-start announcements and command text
/// - `transition.rs`: Per-line step state transitions
/// - `throttle.rs`: Time-based flush throttling
/// - `driver.rs`: Consumes a line source and persists the result
/// - `metrics.rs`: Parsing counters
///
/// # Guarantees
///
/// - One bad line never stops the stream (per-line handling runs under `catch_unwind`)
/// - Binary safety (non-UTF8 is decoded lossily)
/// - Line size limits (oversized lines are skipped)
/// - Replaying the same output is idempotent

pub mod ansi;
pub mod classify;
pub mod command;
pub mod driver;
pub mod flags;
pub mod metrics;
pub mod model;
pub mod throttle;
pub mod transition;

// Re-export commonly used types
pub use ansi::normalize_line;
pub use driver::{parse_candidate, BuildOutputParser};
pub use metrics::ParsingMetrics;
pub use model::{LineError, ParseError, ParseReport};

// Constants
pub const MAX_LINE_SIZE: usize = 1_048_576; // 1MB
