//! Step-start recognition and command display text
//!
//! The build plan tags every `RUN` it wants tracked with an inline marker,
//! `` `#stage-<stage_slug>-<step_slug>` ``, which BuildKit echoes back in the
//! step announcement:
//!
//! ```text
//! #8 [stage-1 4/9] RUN --mount=type=cache,target=/root/.cache pip install x `#stage-setup-deps`
//! ```
//!
//! Only announcements carrying such a marker are step boundaries.

use std::ops::Range;

use super::flags::scan_directive;

const STAGE_PREFIX: &str = "[stage-";
const RUN_VERB: &str = "RUN";
const MARKER_PREFIX: &str = "#stage-";
const CONTINUATION: &str = " \\\n  ";

/// A recognized step announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepStart {
    pub stage_slug: String,
    pub step_slug: String,
    /// Human-readable command shown to operators
    pub command: String,
}

/// Slug marker located inside an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SlugMarker<'a> {
    /// Full marker text, including backticks when present
    text: &'a str,
    stage_slug: &'a str,
    step_slug: &'a str,
}

/// Recognize a step announcement and build its display command.
///
/// Returns `None` for anything that is not a marked `RUN` in a named stage;
/// those lines produce no transition.
pub fn parse_step_start(remainder: &str, app_fetch_stage: &str) -> Option<StepStart> {
    if !remainder.starts_with(STAGE_PREFIX) {
        return None;
    }
    let (_, instruction) = remainder.split_once(']')?;
    let instruction = instruction.trim();

    let directive = scan_directive(instruction);
    if directive.verb != RUN_VERB {
        return None;
    }

    let marker = find_slug_marker(instruction)?;

    let command = if marker.stage_slug == app_fetch_stage {
        fetch_command(marker.step_slug)
    } else {
        display_command(directive.body, marker.text)
    };

    Some(StepStart {
        stage_slug: marker.stage_slug.to_string(),
        step_slug: marker.step_slug.to_string(),
        command,
    })
}

/// The fetch stage's real command is plumbing; show what it means instead.
pub fn fetch_command(step_slug: &str) -> String {
    format!("bench get-app {step_slug}")
}

fn display_command(body: &str, marker: &str) -> String {
    let without_marker = body.replacen(marker, "", 1);
    break_chained_commands(without_marker.trim())
}

/// BuildKit joins chained sub-commands with runs of spaces; render each run
/// of three or more as a shell line continuation.
fn break_chained_commands(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut spaces = 0;

    for c in text.chars() {
        if c == ' ' {
            spaces += 1;
            continue;
        }
        push_spaces(&mut out, spaces);
        spaces = 0;
        out.push(c);
    }
    push_spaces(&mut out, spaces);
    out
}

fn push_spaces(out: &mut String, count: usize) {
    if count >= 3 {
        out.push_str(CONTINUATION);
    } else {
        out.extend(std::iter::repeat(' ').take(count));
    }
}

fn find_slug_marker(instruction: &str) -> Option<SlugMarker<'_>> {
    let start = instruction.find(MARKER_PREFIX)?;
    let slug_start = start + MARKER_PREFIX.len();
    let backticked = instruction[..start].ends_with('`');

    let range: Range<usize>;
    let slug_end;
    if backticked {
        let close = instruction[slug_start..].find('`')? + slug_start;
        slug_end = close;
        range = (start - 1)..(close + 1);
    } else {
        slug_end = instruction[slug_start..]
            .find(char::is_whitespace)
            .map(|i| i + slug_start)
            .unwrap_or(instruction.len());
        range = start..slug_end;
    }

    let (stage_slug, step_slug) = instruction[slug_start..slug_end].split_once('-')?;
    if stage_slug.is_empty() || step_slug.is_empty() {
        return None;
    }

    Some(SlugMarker {
        text: &instruction[range],
        stage_slug,
        step_slug,
    })
}
