use crate::candidate::StepRegistry;

use super::model::LineError;

/// How a line was tied to a step index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribution {
    /// The line carried its own `#<index>` prefix
    Indexed,
    /// No usable prefix; attributed to the latest active step
    Fallback,
}

/// A normalized line split into its step index and payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classified<'a> {
    pub index: u32,
    /// Text after the prefix, or the whole line for fallback attribution
    pub remainder: &'a str,
    pub attribution: Attribution,
}

impl Classified<'_> {
    /// "Unusual" lines have no index prefix of their own.
    pub fn is_unusual(&self) -> bool {
        self.attribution == Attribution::Fallback
    }
}

/// Split `#<digits> <rest>` into index and remainder.
///
/// Lines without that prefix belong to the most recently started step. When
/// no step has started yet there is nothing to attribute them to and the
/// line is rejected.
pub fn classify<'a>(line: &'a str, registry: &StepRegistry) -> Result<Classified<'a>, LineError> {
    if let Some((index, remainder)) = split_index_prefix(line) {
        return Ok(Classified {
            index,
            remainder,
            attribution: Attribution::Indexed,
        });
    }

    let index = registry.latest_index().ok_or(LineError::NoActiveStep)?;
    Ok(Classified {
        index,
        remainder: line,
        attribution: Attribution::Fallback,
    })
}

fn split_index_prefix(line: &str) -> Option<(u32, &str)> {
    let (prefix, rest) = line.split_once(char::is_whitespace)?;
    let digits = prefix.strip_prefix('#')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index = digits.parse().ok()?;
    let rest = rest.trim_start();
    if rest.is_empty() {
        return None;
    }
    Some((index, rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::BuildStep;

    fn registry_with(indices: &[u32]) -> StepRegistry {
        let steps: Vec<BuildStep> = indices
            .iter()
            .map(|i| BuildStep::declared("setup", &format!("step-{i}")))
            .collect();
        let mut registry = StepRegistry::new(&steps);
        for (pos, &index) in indices.iter().enumerate() {
            registry.activate(index, pos);
        }
        registry
    }

    #[test]
    fn test_indexed_line() {
        let registry = registry_with(&[]);
        let c = classify("#12 DONE 0.4s", &registry).unwrap();
        assert_eq!(c.index, 12);
        assert_eq!(c.remainder, "DONE 0.4s");
        assert!(!c.is_unusual());
    }

    #[test]
    fn test_indexed_line_keeps_inner_spacing() {
        let registry = registry_with(&[]);
        let c = classify("#3 0.215   a   b", &registry).unwrap();
        assert_eq!(c.remainder, "0.215   a   b");
    }

    #[test]
    fn test_unprefixed_line_falls_back_to_latest() {
        let registry = registry_with(&[2, 4]);
        let c = classify("Collecting frappe==15.0", &registry).unwrap();
        assert_eq!(c.index, 4);
        assert_eq!(c.remainder, "Collecting frappe==15.0");
        assert!(c.is_unusual());
    }

    #[test]
    fn test_bad_prefix_falls_back_with_whole_line() {
        let registry = registry_with(&[7]);
        for line in ["#abc something", "#12x DONE", "# comment", "#99999999999 DONE 1s", "#5"] {
            let c = classify(line, &registry).unwrap();
            assert_eq!(c.index, 7, "line {line:?}");
            assert_eq!(c.remainder, line);
            assert_eq!(c.attribution, Attribution::Fallback);
        }
    }

    #[test]
    fn test_fallback_without_active_step_is_rejected() {
        let registry = registry_with(&[]);
        let err = classify("stray output", &registry).unwrap_err();
        assert!(matches!(err, LineError::NoActiveStep));
    }
}
