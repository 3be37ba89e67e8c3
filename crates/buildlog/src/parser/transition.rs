use crate::candidate::{BuildStep, StepStatus};

use super::classify::Classified;

const IMAGE_MARKER: &str = "writing image";
const HASH_PREFIX: &str = "sha256:";
const ERROR_PREFIX_LEN: usize = "ERROR: ".len();

/// Effect of one non-start line on an active step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepUpdate<'a> {
    /// Append a line to the step output
    Output(&'a str),
    /// Content digest reported by the builder
    Hash(&'a str),
    /// `DONE <secs>s`; duration is `None` when the token does not parse
    Done { duration: Option<f64> },
    Cached,
    /// `ERROR: ...`, carrying the message to append
    Error(&'a str),
}

/// Decide what a classified line does to its step.
pub fn decode_update<'a>(line: &Classified<'a>) -> StepUpdate<'a> {
    let text = line.remainder;
    if line.is_unusual() {
        return StepUpdate::Output(text);
    }

    if let Some(hash) = text.strip_prefix(HASH_PREFIX) {
        StepUpdate::Hash(hash)
    } else if text.starts_with("DONE") {
        StepUpdate::Done {
            duration: parse_duration(text),
        }
    } else if text == "CACHED" {
        StepUpdate::Cached
    } else if text.starts_with("ERROR") {
        StepUpdate::Error(text.get(ERROR_PREFIX_LEN..).unwrap_or(""))
    } else {
        // Continuation lines lead with the elapsed-time token
        let (_, output) = text.split_once(' ').unwrap_or((text, ""));
        StepUpdate::Output(output)
    }
}

/// `DONE 2.4s` -> 2.4
fn parse_duration(text: &str) -> Option<f64> {
    let token = text.split_whitespace().nth(1)?;
    let mut chars = token.chars();
    chars.next_back()?;
    chars.as_str().parse().ok()
}

pub fn apply_update(step: &mut BuildStep, update: StepUpdate<'_>) {
    match update {
        StepUpdate::Output(text) => append_line(step, text),
        StepUpdate::Hash(hash) => step.hash = Some(hash.to_string()),
        StepUpdate::Done { duration } => {
            step.status = StepStatus::Success;
            if duration.is_none() {
                tracing::warn!(
                    step_slug = %step.step_slug,
                    "DONE marker without a readable duration"
                );
            }
            step.duration = duration;
        }
        StepUpdate::Cached => {
            step.status = StepStatus::Success;
            step.cached = true;
        }
        StepUpdate::Error(message) => {
            step.status = StepStatus::Failure;
            append_line(step, message);
        }
    }
}

/// Mark a declared step as freshly running under `index`.
///
/// Output is reset here and only here, so a replayed log rebuilds it from
/// the step's own lines instead of duplicating them.
pub fn start_step(step: &mut BuildStep, index: u32, command: String) {
    step.step_index = Some(index);
    step.command = command;
    step.status = StepStatus::Running;
    step.output.clear();
}

fn append_line(step: &mut BuildStep, text: &str) {
    step.output.push_str(text);
    step.output.push('\n');
}

pub fn is_image_marker(remainder: &str) -> bool {
    remainder.starts_with(IMAGE_MARKER)
}

/// `writing image sha256:<digest> done` -> `<digest>`
pub fn parse_image_id(remainder: &str) -> Option<&str> {
    let token = remainder.split_whitespace().nth(2)?;
    let (_, digest) = token.split_once(':')?;
    (!digest.is_empty()).then_some(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::classify::Attribution;

    fn indexed(remainder: &str) -> Classified<'_> {
        Classified {
            index: 3,
            remainder,
            attribution: Attribution::Indexed,
        }
    }

    fn running() -> BuildStep {
        let mut step = BuildStep::declared("setup", "requirements");
        start_step(&mut step, 3, "pip install".to_string());
        step
    }

    fn apply(step: &mut BuildStep, remainder: &str) {
        let line = indexed(remainder);
        apply_update(step, decode_update(&line));
    }

    #[test]
    fn test_cached() {
        let mut step = running();
        apply(&mut step, "CACHED");
        assert_eq!(step.status, StepStatus::Success);
        assert!(step.cached);
        assert_eq!(step.hash, None);
        assert_eq!(step.duration, None);
    }

    #[test]
    fn test_done_with_duration() {
        let mut step = running();
        apply(&mut step, "DONE 2.4s");
        assert_eq!(step.status, StepStatus::Success);
        assert_eq!(step.duration, Some(2.4));
        assert!(!step.cached);
    }

    #[test]
    fn test_done_without_duration() {
        let mut step = running();
        apply(&mut step, "DONE");
        assert_eq!(step.status, StepStatus::Success);
        assert_eq!(step.duration, None);
    }

    #[test]
    fn test_error_strips_prefix_and_appends() {
        let mut step = running();
        apply(&mut step, "0.1 building");
        apply(&mut step, "ERROR: permission denied");
        assert_eq!(step.status, StepStatus::Failure);
        assert_eq!(step.output, "building\npermission denied\n");
    }

    #[test]
    fn test_short_error_line() {
        let mut step = running();
        apply(&mut step, "ERROR");
        assert_eq!(step.status, StepStatus::Failure);
        assert_eq!(step.output, "\n");
    }

    #[test]
    fn test_hash() {
        let mut step = running();
        apply(&mut step, "sha256:9f86d081884c7d65");
        assert_eq!(step.hash.as_deref(), Some("9f86d081884c7d65"));
        assert_eq!(step.status, StepStatus::Running);
    }

    #[test]
    fn test_continuation_drops_first_token() {
        let mut step = running();
        apply(&mut step, "1.024 Collecting frappe==15.0.0");
        apply(&mut step, "1.100");
        assert_eq!(step.output, "Collecting frappe==15.0.0\n\n");
    }

    #[test]
    fn test_unusual_line_is_appended_verbatim() {
        let mut step = running();
        let line = Classified {
            index: 3,
            remainder: "DONE but not really",
            attribution: Attribution::Fallback,
        };
        apply_update(&mut step, decode_update(&line));
        assert_eq!(step.status, StepStatus::Running);
        assert_eq!(step.output, "DONE but not really\n");
    }

    #[test]
    fn test_start_resets_output_only() {
        let mut step = running();
        step.output = "old\n".to_string();
        step.cached = true;
        start_step(&mut step, 9, "make".to_string());
        assert_eq!(step.step_index, Some(9));
        assert_eq!(step.status, StepStatus::Running);
        assert_eq!(step.output, "");
        assert!(step.cached);
    }

    #[test]
    fn test_image_id() {
        assert!(is_image_marker("writing image sha256:abcd1234 done"));
        assert_eq!(parse_image_id("writing image sha256:abcd1234 done"), Some("abcd1234"));
        assert_eq!(parse_image_id("writing image sha256:abcd1234"), Some("abcd1234"));
    }

    #[test]
    fn test_malformed_image_marker() {
        assert_eq!(parse_image_id("writing image"), None);
        assert_eq!(parse_image_id("writing image abcd1234"), None);
        assert_eq!(parse_image_id("writing image sha256:"), None);
    }
}
