//! Candidate — build candidate and step records, step lookup, per-candidate locking.

pub mod model;
pub mod registry;
pub mod lock;

pub use model::{BuildCandidate, BuildStep, StepStatus};
pub use registry::StepRegistry;
pub use lock::{CandidateGuard, CandidateLocks};
