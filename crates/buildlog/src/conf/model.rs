//! Model — BuildlogConfig and related structs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildlogConfig {
    /// Directory holding one `<candidate>.json` per build candidate
    pub state_dir: String,
    /// Candidate the replayed output belongs to
    pub candidate: String,
    /// Raw build output file; stdin when unset
    pub input_path: Option<String>,
    pub input_format: InputFormat,
    pub parser: ParserConfig,
}

/// How the input carries build output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    /// One build output line per input line (local build)
    #[default]
    Plain,
    /// A polled remote job payload whose `output` field holds the full log
    JobJson,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Minimum time between mid-stream flushes for local builds
    pub flush_interval_ms: u64,
    pub max_line_size: usize,
    /// Stage whose step commands are shown as `bench get-app <step>`
    pub app_fetch_stage: String,
}

impl Default for BuildlogConfig {
    fn default() -> Self {
        Self {
            state_dir: ".".to_string(),
            candidate: String::new(),
            input_path: None,
            input_format: InputFormat::Plain,
            parser: ParserConfig::default(),
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: 1000,
            max_line_size: crate::parser::MAX_LINE_SIZE,
            app_fetch_stage: "apps".to_string(),
        }
    }
}

impl ParserConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.flush_interval_ms == 0 {
            return Err("parser.flush_interval_ms must be > 0".to_string());
        }
        if self.max_line_size == 0 {
            return Err("parser.max_line_size must be > 0".to_string());
        }
        if self.app_fetch_stage.is_empty() {
            return Err("parser.app_fetch_stage must not be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_defaults() {
        let cfg = ParserConfig::default();
        assert_eq!(cfg.flush_interval(), Duration::from_secs(1));
        assert_eq!(cfg.max_line_size, 1_048_576);
        assert_eq!(cfg.app_fetch_stage, "apps");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_config_defaults() {
        let cfg = BuildlogConfig::default();
        assert_eq!(cfg.state_dir, ".");
        assert!(cfg.candidate.is_empty());
        assert_eq!(cfg.input_path, None);
        assert_eq!(cfg.input_format, InputFormat::Plain);
    }

    #[test]
    fn test_parser_validation() {
        let mut cfg = ParserConfig::default();
        cfg.flush_interval_ms = 0;
        assert!(cfg.validate().unwrap_err().contains("flush_interval_ms"));

        let mut cfg = ParserConfig::default();
        cfg.max_line_size = 0;
        assert!(cfg.validate().unwrap_err().contains("max_line_size"));

        let mut cfg = ParserConfig::default();
        cfg.app_fetch_stage.clear();
        assert!(cfg.validate().unwrap_err().contains("app_fetch_stage"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let cfg: BuildlogConfig = toml::from_str(
            r#"
            candidate = "dc-1"
            input_format = "job_json"

            [parser]
            flush_interval_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(cfg.candidate, "dc-1");
        assert_eq!(cfg.input_format, InputFormat::JobJson);
        assert_eq!(cfg.parser.flush_interval_ms, 250);
        assert_eq!(cfg.parser.app_fetch_stage, "apps");
        assert_eq!(cfg.state_dir, ".");
    }
}
