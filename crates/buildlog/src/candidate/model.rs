use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a declared build step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StepStatus {
    /// Declared by the build plan, not yet observed in the output
    #[default]
    Pending,
    /// Start line observed, no terminal marker yet
    Running,
    /// `DONE` or `CACHED` observed
    Success,
    /// `ERROR` observed
    Failure,
}

/// One logical build step, declared before parsing starts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildStep {
    /// Index the build tool assigned in the output stream; unset until observed
    pub step_index: Option<u32>,
    pub stage_slug: String,
    pub step_slug: String,
    pub command: String,
    pub status: StepStatus,
    pub output: String,
    pub cached: bool,
    pub hash: Option<String>,
    /// Seconds, only set on `DONE`
    pub duration: Option<f64>,
}

impl BuildStep {
    pub fn declared(stage_slug: &str, step_slug: &str) -> Self {
        Self {
            stage_slug: stage_slug.to_string(),
            step_slug: step_slug.to_string(),
            ..Self::default()
        }
    }
}

/// One attempt at producing an image from a build plan.
///
/// Owned by the orchestration layer; the parser mutates it in place and
/// hands it to a [`crate::store::BuildStore`] for persistence.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildCandidate {
    pub name: String,
    pub build_steps: Vec<BuildStep>,
    /// Full normalized build output, one line per `\n`
    pub build_output: String,
    pub docker_image_id: Option<String>,
    /// Output comes from a remote builder that redelivers the whole log per poll
    pub is_remote: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

impl BuildCandidate {
    pub fn new(name: &str, build_steps: Vec<BuildStep>) -> Self {
        Self {
            name: name.to_string(),
            build_steps,
            ..Self::default()
        }
    }

    pub fn step(&self, step_slug: &str) -> Option<&BuildStep> {
        self.build_steps.iter().find(|s| s.step_slug == step_slug)
    }
}
