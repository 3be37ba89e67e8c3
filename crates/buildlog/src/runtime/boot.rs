//! Boot — logging init and config load.

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::conf::BuildlogConfig;

/// Initialise the tracing / logging subsystem.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "buildlog=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Load and validate configuration.
pub fn boot() -> Result<BuildlogConfig, Box<dyn std::error::Error>> {
    info!("Starting buildlog v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file or env)
    let config = BuildlogConfig::load()?;
    config.validate().map_err(|e| {
        error!("Invalid configuration: {}", e);
        error!(
            "Set BUILDLOG_CANDIDATE, BUILDLOG_STATE_DIR, and BUILDLOG_INPUT environment variables"
        );
        e
    })?;

    info!(
        "Loaded configuration: candidate={}, state_dir={}, input={}",
        config.candidate,
        config.state_dir,
        config.input_path.as_deref().unwrap_or("stdin")
    );
    info!(
        "Parser: flush_interval={}ms, max_line_size={}, app_fetch_stage={}",
        config.parser.flush_interval_ms, config.parser.max_line_size, config.parser.app_fetch_stage
    );

    Ok(config)
}
