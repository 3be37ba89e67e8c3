//! Load — config loading from file and environment variables.

use std::path::Path;

use super::model::{BuildlogConfig, InputFormat};

const DEFAULT_CONFIG_FILE: &str = "/etc/buildlog/buildlog.toml";

impl BuildlogConfig {
    /// Load configuration from file or environment variables
    /// Priority: Environment Variables > Config File > Defaults
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = std::env::var("BUILDLOG_CONFIG_FILE")
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let mut config = if Path::new(&config_path).exists() {
            tracing::info!("Loading configuration from: {}", config_path);
            Self::from_file(&config_path)?
        } else {
            tracing::info!("Config file not found at {}, using environment variables", config_path);
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: BuildlogConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Override fields from `BUILDLOG_*` variables supplied by `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("BUILDLOG_STATE_DIR") {
            self.state_dir = dir;
        }
        if let Some(candidate) = lookup("BUILDLOG_CANDIDATE") {
            self.candidate = candidate;
        }
        if let Some(input) = lookup("BUILDLOG_INPUT") {
            self.input_path = Some(input).filter(|p| !p.is_empty() && p.as_str() != "-");
        }
        if let Some(format) = lookup("BUILDLOG_INPUT_FORMAT") {
            self.input_format = match format.as_str() {
                "plain" => InputFormat::Plain,
                "job_json" => InputFormat::JobJson,
                other => return Err(format!("unknown BUILDLOG_INPUT_FORMAT: {other}")),
            };
        }
        if let Some(ms) = lookup("BUILDLOG_FLUSH_INTERVAL_MS") {
            self.parser.flush_interval_ms = ms
                .parse()
                .map_err(|_| format!("BUILDLOG_FLUSH_INTERVAL_MS is not a number: {ms}"))?;
        }
        if let Some(size) = lookup("BUILDLOG_MAX_LINE_SIZE") {
            self.parser.max_line_size = size
                .parse()
                .map_err(|_| format!("BUILDLOG_MAX_LINE_SIZE is not a number: {size}"))?;
        }
        if let Some(stage) = lookup("BUILDLOG_APP_FETCH_STAGE") {
            self.parser.app_fetch_stage = stage;
        }
        Ok(())
    }

    /// Validate that configuration values are sane
    pub fn validate(&self) -> Result<(), String> {
        if self.candidate.is_empty() {
            return Err("candidate must not be empty".to_string());
        }
        if self.state_dir.is_empty() {
            return Err("state_dir must not be empty".to_string());
        }
        self.parser.validate()?;
        if let Some(path) = &self.input_path {
            if !Path::new(path).exists() {
                return Err(format!("input not found at: {}", path));
            }
        }
        Ok(())
    }
}
