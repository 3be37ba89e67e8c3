//! Replay — feed one delivery of build output through the parser.

use std::future::Future;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::{AsyncReadExt, BufReader};
use tracing::{error, info};

use crate::candidate::CandidateLocks;
use crate::conf::{BuildlogConfig, InputFormat};
use crate::parser::{parse_candidate, ParseReport, ParsingMetrics};
use crate::runtime::stop::shutdown_signal;
use crate::source::{self, LineSource, SourceError};
use crate::store::JsonFileStore;

/// Parse the configured input into the configured candidate's state file,
/// stopping early (with a final flush) on Ctrl+C / SIGTERM.
pub async fn run(config: BuildlogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let metrics = Arc::new(ParsingMetrics::new());
    let report = replay(&config, Arc::clone(&metrics), shutdown_signal()).await?;

    info!("Parse report: {}", serde_json::to_string(&report)?);
    info!("Parsing metrics: {}", serde_json::to_string(&metrics.snapshot())?);
    Ok(())
}

/// Run one parse until the input ends or `shutdown` resolves.
pub async fn replay<S>(
    config: &BuildlogConfig,
    metrics: Arc<ParsingMetrics>,
    shutdown: S,
) -> Result<ParseReport, Box<dyn std::error::Error>>
where
    S: Future<Output = ()> + Send + 'static,
{
    let store = JsonFileStore::new(&config.state_dir);
    let locks = CandidateLocks::new();

    let source: LineSource = Box::pin(open_source(config).await?.take_until(shutdown));

    let (candidate, report) = parse_candidate(
        &store,
        &locks,
        &config.candidate,
        source,
        &config.parser,
        Some(metrics),
    )
    .await
    .map_err(|e| {
        error!("Failed to parse build output for {}: {}", config.candidate, e);
        e
    })?;

    info!(
        candidate = %candidate.name,
        image_id = candidate.docker_image_id.as_deref().unwrap_or("-"),
        "Build state written to {}",
        store.dir().display()
    );
    Ok(report)
}

async fn open_source(config: &BuildlogConfig) -> Result<LineSource, SourceError> {
    let max_line_size = config.parser.max_line_size;
    match config.input_format {
        InputFormat::Plain => Ok(match &config.input_path {
            Some(path) => {
                info!("Reading build output from {}", path);
                let file = tokio::fs::File::open(path).await?;
                source::from_reader(BufReader::new(file), max_line_size)
            }
            None => {
                info!("Reading build output from stdin");
                source::from_reader(BufReader::new(tokio::io::stdin()), max_line_size)
            }
        }),
        InputFormat::JobJson => {
            let mut payload = Vec::new();
            match &config.input_path {
                Some(path) => {
                    tokio::fs::File::open(path).await?.read_to_end(&mut payload).await?;
                }
                None => {
                    tokio::io::stdin().read_to_end(&mut payload).await?;
                }
            }
            source::from_job_payload(&payload)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{BuildCandidate, BuildStep, StepStatus};
    use crate::store::{persist, BuildStore};

    const LOG: &str = "\
#5 [stage-0 2/6] RUN apt-get install -y git `#stage-pre-packages`
#5 0.4 Reading package lists...
#5 DONE 1.5s
#8 writing image sha256:feedface done
";

    async fn setup(dir: &std::path::Path, is_remote: bool) -> BuildlogConfig {
        let store = JsonFileStore::new(dir);
        let steps = vec![BuildStep::declared("pre", "packages")];
        let mut candidate = BuildCandidate::new("dc-1", steps);
        candidate.is_remote = is_remote;
        persist(&store, &candidate).await.unwrap();

        BuildlogConfig {
            state_dir: dir.display().to_string(),
            candidate: "dc-1".to_string(),
            ..BuildlogConfig::default()
        }
    }

    #[tokio::test]
    async fn test_replay_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = setup(dir.path(), false).await;
        let input = dir.path().join("build.log");
        std::fs::write(&input, LOG).unwrap();
        config.input_path = Some(input.display().to_string());

        let metrics = Arc::new(ParsingMetrics::new());
        let report = replay(&config, Arc::clone(&metrics), std::future::pending())
            .await
            .unwrap();
        assert_eq!(report.lines, 4);
        assert_eq!(report.image_id.as_deref(), Some("feedface"));
        assert_eq!(metrics.snapshot().parses, 1);

        let saved = JsonFileStore::new(dir.path()).load("dc-1").await.unwrap().unwrap();
        let step = saved.step("packages").unwrap();
        assert_eq!(step.status, StepStatus::Success);
        assert_eq!(step.output, "Reading package lists...\n");
        assert_eq!(saved.docker_image_id.as_deref(), Some("feedface"));
    }

    #[tokio::test]
    async fn test_replay_skips_oversized_file_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = setup(dir.path(), false).await;
        config.parser.max_line_size = 64;
        let input = dir.path().join("build.log");
        let long = format!("#5 0.2 {}", "x".repeat(4096));
        std::fs::write(&input, format!("{}{long}\n", LOG)).unwrap();
        config.input_path = Some(input.display().to_string());

        let report = replay(&config, Arc::new(ParsingMetrics::new()), std::future::pending())
            .await
            .unwrap();
        assert_eq!(report.lines, 4);
        assert_eq!(report.skipped, 1);

        let saved = JsonFileStore::new(dir.path()).load("dc-1").await.unwrap().unwrap();
        assert_eq!(saved.step("packages").unwrap().output, "Reading package lists...\n");
        assert!(!saved.build_output.contains("xxxx"));
    }

    #[tokio::test]
    async fn test_replay_job_payload() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = setup(dir.path(), true).await;
        let input = dir.path().join("job.json");
        std::fs::write(&input, serde_json::json!({ "output": LOG }).to_string()).unwrap();
        config.input_path = Some(input.display().to_string());
        config.input_format = InputFormat::JobJson;

        replay(&config, Arc::new(ParsingMetrics::new()), std::future::pending())
            .await
            .unwrap();

        let saved = JsonFileStore::new(dir.path()).load("dc-1").await.unwrap().unwrap();
        assert_eq!(saved.step("packages").unwrap().duration, Some(1.5));
        assert!(saved.last_updated.is_some());
    }

    #[tokio::test]
    async fn test_replay_stops_on_shutdown_and_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = setup(dir.path(), false).await;
        let input = dir.path().join("build.log");
        std::fs::write(&input, LOG).unwrap();
        config.input_path = Some(input.display().to_string());

        let report = replay(&config, Arc::new(ParsingMetrics::new()), std::future::ready(()))
            .await
            .unwrap();
        assert_eq!(report.lines, 0);
        assert_eq!(report.flushes, 1);
    }

    #[tokio::test]
    async fn test_replay_unknown_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = setup(dir.path(), false).await;
        config.candidate = "dc-404".to_string();
        let input = dir.path().join("build.log");
        std::fs::write(&input, LOG).unwrap();
        config.input_path = Some(input.display().to_string());

        let err = replay(&config, Arc::new(ParsingMetrics::new()), std::future::pending())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("dc-404"));
    }
}
