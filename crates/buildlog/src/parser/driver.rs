use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chrono::Utc;
use futures_util::StreamExt;
use tracing::{debug, error, info, trace, warn};

use crate::candidate::{BuildCandidate, CandidateLocks, StepRegistry};
use crate::conf::ParserConfig;
use crate::source::LineSource;
use crate::store::{self, BuildStore};

use super::ansi::normalize_line;
use super::classify::{classify, Classified};
use super::command::parse_step_start;
use super::metrics::ParsingMetrics;
use super::model::{LineError, LineOutcome, ParseError, ParseReport};
use super::throttle::FlushThrottle;
use super::transition::{apply_update, decode_update, is_image_marker, parse_image_id, start_step};

/// Turns one delivery of raw `docker build` output into build step state.
///
/// A parser lives for exactly one invocation. Remote builders redeliver the
/// whole log on every poll, so each poll gets a fresh parser that replays
/// everything against the candidate's current persisted state; step output is
/// reset when a step's start line is seen, which makes the replay rebuild it
/// rather than duplicate it.
pub struct BuildOutputParser<'a> {
    candidate: &'a mut BuildCandidate,
    store: &'a dyn BuildStore,
    config: &'a ParserConfig,
    metrics: Option<Arc<ParsingMetrics>>,
    registry: StepRegistry,
    throttle: FlushThrottle,
    /// Every non-empty normalized line, each terminated by `\n`
    full_log: String,
    report: ParseReport,
}

impl<'a> BuildOutputParser<'a> {
    pub fn new(
        candidate: &'a mut BuildCandidate,
        store: &'a dyn BuildStore,
        config: &'a ParserConfig,
    ) -> Self {
        let registry = StepRegistry::new(&candidate.build_steps);
        let throttle = FlushThrottle::new(config.flush_interval(), candidate.is_remote);

        Self {
            candidate,
            store,
            config,
            metrics: None,
            registry,
            throttle,
            full_log: String::new(),
            report: ParseReport::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ParsingMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Consume `source` to the end and persist the result.
    ///
    /// Bad lines are logged and skipped. The final write always happens,
    /// even when the source fails part-way; a failed final write or a failed
    /// source is returned, with the parsed state left on the candidate so the
    /// caller can retry the write via [`store::persist`].
    pub async fn parse(mut self, mut source: LineSource) -> Result<ParseReport, ParseError> {
        let started = std::time::Instant::now();
        let mut source_error = None;

        while let Some(item) = source.next().await {
            match item {
                Ok(raw) => self.handle_raw_line(&raw).await,
                Err(e) => {
                    error!(candidate = %self.candidate.name, "Build output source failed: {}", e);
                    source_error = Some(e);
                    break;
                }
            }
        }

        let result = match (self.finish().await, source_error) {
            (Err(e), _) => Err(ParseError::from(e)),
            (Ok(()), Some(e)) => Err(ParseError::from(e)),
            (Ok(()), None) => Ok(self.report),
        };

        if let Some(metrics) = &self.metrics {
            let elapsed = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
            metrics.record_parse(result.is_ok(), elapsed);
        }
        result
    }

    async fn handle_raw_line(&mut self, raw: &[u8]) {
        if raw.len() > self.config.max_line_size {
            let error = LineError::LineTooLarge(raw.len(), self.config.max_line_size);
            self.record_failure(&error, "<oversized>");
            return;
        }
        let Some(line) = normalize_line(raw) else {
            return;
        };

        self.report.lines += 1;
        if let Some(metrics) = &self.metrics {
            metrics.record_line();
        }

        let outcome = isolate_panics(|| self.process_line(&line));
        self.full_log.push_str(&line);
        self.full_log.push('\n');

        match outcome {
            Ok(LineOutcome::Anomaly(reason)) => {
                self.report.anomalies += 1;
                if let Some(metrics) = &self.metrics {
                    metrics.record_anomaly();
                }
                warn!(
                    candidate = %self.candidate.name,
                    line = %line,
                    "Unresolvable build step: {}",
                    reason
                );
            }
            Ok(outcome) => trace!(line = %line, ?outcome, "processed build output line"),
            Err(e) => {
                self.record_failure(&e, &line);
                return;
            }
        }

        self.maybe_flush().await;
    }

    fn record_failure(&mut self, e: &LineError, line: &str) {
        if e.is_anomaly() {
            self.report.anomalies += 1;
            if let Some(metrics) = &self.metrics {
                metrics.record_anomaly();
            }
        } else {
            self.report.skipped += 1;
            if let Some(metrics) = &self.metrics {
                metrics.record_skipped();
            }
        }
        warn!(candidate = %self.candidate.name, line = %line, "Skipping build output line: {}", e);
    }

    fn process_line(&mut self, line: &str) -> Result<LineOutcome, LineError> {
        let classified = classify(line, &self.registry)?;

        if is_image_marker(classified.remainder) {
            let image_id = parse_image_id(classified.remainder)
                .ok_or_else(|| LineError::Malformed("unreadable image marker".to_string()))?;
            self.candidate.docker_image_id = Some(image_id.to_string());
            self.report.image_id = Some(image_id.to_string());
            return Ok(LineOutcome::ImageWritten(image_id.to_string()));
        }

        if let Some(pos) = self.registry.by_index(classified.index) {
            apply_update(&mut self.candidate.build_steps[pos], decode_update(&classified));
            return Ok(LineOutcome::Updated { index: classified.index });
        }

        Ok(self.start_step(&classified))
    }

    /// Handle the first line seen for an index: a step announcement if it
    /// carries a declared slug marker, otherwise nothing.
    fn start_step(&mut self, line: &Classified<'_>) -> LineOutcome {
        let Some(start) = parse_step_start(line.remainder, &self.config.app_fetch_stage) else {
            return LineOutcome::Ignored;
        };
        let Some(pos) = self.registry.by_slug(&start.step_slug) else {
            return LineOutcome::Anomaly(format!("step slug {:?} is not declared", start.step_slug));
        };
        if let Some(previous) = self.registry.active_index_of(pos) {
            return LineOutcome::Anomaly(format!(
                "step {:?} already running as #{}, ignoring start as #{}",
                start.step_slug, previous, line.index
            ));
        }

        debug!(
            candidate = %self.candidate.name,
            index = line.index,
            step_slug = %start.step_slug,
            stage_slug = %start.stage_slug,
            "build step started"
        );
        start_step(&mut self.candidate.build_steps[pos], line.index, start.command);
        self.registry.activate(line.index, pos);

        LineOutcome::Started {
            index: line.index,
            step_slug: start.step_slug,
        }
    }

    async fn maybe_flush(&mut self) {
        if !self.throttle.should_flush() {
            return;
        }

        self.candidate.build_output.clone_from(&self.full_log);
        match store::persist(self.store, self.candidate).await {
            Ok(()) => {
                self.throttle.mark_flushed();
                self.report.flushes += 1;
                if let Some(metrics) = &self.metrics {
                    metrics.record_flush(true);
                }
                debug!(
                    candidate = %self.candidate.name,
                    lines = self.report.lines,
                    "flushed build output"
                );
            }
            Err(e) => {
                self.report.failed_flushes += 1;
                if let Some(metrics) = &self.metrics {
                    metrics.record_flush(false);
                }
                error!(candidate = %self.candidate.name, "Deferring build output flush: {}", e);
            }
        }
    }

    /// Unconditional end-of-stream write.
    async fn finish(&mut self) -> Result<(), store::StoreError> {
        if self.candidate.is_remote {
            self.candidate.last_updated = Some(Utc::now());
        }
        self.candidate.build_output = std::mem::take(&mut self.full_log);

        let result = store::persist(self.store, self.candidate).await;
        if let Some(metrics) = &self.metrics {
            metrics.record_flush(result.is_ok());
        }
        match &result {
            Ok(()) => {
                self.report.flushes += 1;
                info!(
                    candidate = %self.candidate.name,
                    lines = self.report.lines,
                    skipped = self.report.skipped,
                    anomalies = self.report.anomalies,
                    "build output parsed"
                );
            }
            Err(e) => error!(
                candidate = %self.candidate.name,
                "Final build output flush failed: {}",
                e
            ),
        }
        result
    }
}

/// Run one line's handling, turning a panic into a skipped line.
fn isolate_panics<F>(handle: F) -> Result<LineOutcome, LineError>
where
    F: FnOnce() -> Result<LineOutcome, LineError>,
{
    panic::catch_unwind(AssertUnwindSafe(handle)).unwrap_or(Err(LineError::Panicked))
}

/// Parse one delivery of output for the named candidate.
///
/// Holds the candidate's lock across reading its current state, parsing,
/// and the final write, so concurrent deliveries for the same candidate
/// apply one after another. Returns the candidate as parsed, which is also
/// the state to re-persist if the final write failed.
pub async fn parse_candidate(
    store: &dyn BuildStore,
    locks: &CandidateLocks,
    name: &str,
    source: LineSource,
    config: &ParserConfig,
    metrics: Option<Arc<ParsingMetrics>>,
) -> Result<(BuildCandidate, ParseReport), ParseError> {
    let _guard = locks.acquire(name).await;

    let mut candidate = store
        .load(name)
        .await?
        .ok_or_else(|| ParseError::UnknownCandidate(name.to_string()))?;

    let mut parser = BuildOutputParser::new(&mut candidate, store, config);
    if let Some(metrics) = metrics {
        parser = parser.with_metrics(metrics);
    }
    let report = parser.parse(source).await?;
    Ok((candidate, report))
}
