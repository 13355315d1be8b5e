//! Offset collection and Prometheus rendering.
//!
//! Every scrape runs one full pass over the Kafka Connect API: list the
//! connectors, classify each one, fetch its offsets with the matching
//! schema and turn them into `kafka_connect_current_offset` samples.
//! Nothing is cached between passes.

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use prometheus::{Encoder, Registry, TextEncoder};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::client::{ClientError, ConnectApi, ConnectClient};
use crate::config::{ConfigError, FilterConfig, compile_patterns};
use crate::offsets::{ConnectorType, OffsetSample, normalize_sink, normalize_source};

/// Name of the exported offset gauge.
pub const OFFSET_METRIC: &str = "kafka_connect_current_offset";

const OFFSET_HELP: &str = "The current offset of the Kafka Connect connector";

/// Prefix for the exporter's own metrics.
const SELF_PREFIX: &str = "kafka_connect_exporter";

/// A per-connector failure. Never affects other connectors.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("Failed to fetch status for connector {connector}: {source}")]
    Status {
        connector: String,
        #[source]
        source: ClientError,
    },

    #[error("Failed to fetch offsets for connector {connector}: {source}")]
    Offsets {
        connector: String,
        #[source]
        source: ClientError,
    },
}

/// Why a connector produced no samples without failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Excluded by the connector filter.
    Filtered,
    /// Declared type was neither "source" nor "sink".
    UnknownType(String),
}

/// What happened to one connector during a scrape.
#[derive(Debug)]
pub enum ConnectorOutcome {
    /// Number of samples produced.
    Collected(usize),
    Skipped(SkipReason),
    Failed(CollectError),
}

/// Per-connector entry of a [`ScrapeResult`].
#[derive(Debug)]
pub struct ConnectorReport {
    pub name: String,
    pub outcome: ConnectorOutcome,
}

/// Everything one collection pass produced.
#[derive(Debug, Default)]
pub struct ScrapeResult {
    /// Samples in emission order: connectors in listing order, records in
    /// the order the API returned them.
    pub samples: Vec<OffsetSample>,
    /// One report per listed connector.
    pub connectors: Vec<ConnectorReport>,
    /// Set when the connector listing itself failed.
    pub list_error: Option<ClientError>,
}

impl ScrapeResult {
    /// Number of connectors that failed to classify or fetch.
    pub fn failed_count(&self) -> usize {
        self.connectors
            .iter()
            .filter(|c| matches!(c.outcome, ConnectorOutcome::Failed(_)))
            .count()
    }

    fn unknown_type_count(&self) -> usize {
        self.connectors
            .iter()
            .filter(|c| {
                matches!(
                    c.outcome,
                    ConnectorOutcome::Skipped(SkipReason::UnknownType(_))
                )
            })
            .count()
    }
}

/// Include/exclude filter on connector names.
pub struct ConnectorFilter {
    include: Vec<glob::Pattern>,
    exclude: Vec<glob::Pattern>,
}

impl ConnectorFilter {
    /// Create a new filter from configuration.
    pub fn new(config: &FilterConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            include: compile_patterns(&config.include_connectors)?,
            exclude: compile_patterns(&config.exclude_connectors)?,
        })
    }

    /// Check if a connector should be collected.
    pub fn should_include(&self, connector: &str) -> bool {
        if !self.include.is_empty() && !self.include.iter().any(|p| p.matches(connector)) {
            return false;
        }
        !self.exclude.iter().any(|p| p.matches(connector))
    }
}

impl Default for ConnectorFilter {
    /// Accept every connector.
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

/// Collector statistics, accumulated over the life of the process.
#[derive(Debug, Clone, Default)]
pub struct CollectorStats {
    /// Collection passes run.
    pub scrapes: u64,
    /// Passes where listing connectors failed.
    pub list_failures: u64,
    /// Connectors whose status or offsets could not be fetched.
    pub connector_failures: u64,
    /// Connectors skipped because of an unrecognized type.
    pub unknown_types: u64,
    /// Offset samples produced.
    pub samples: u64,
    /// Duration of the most recent pass.
    pub last_duration: Duration,
}

/// Collects connector offsets from a Kafka Connect API.
///
/// Safe to share between concurrent scrapes: each [`collect`](Self::collect)
/// call owns its own result, only the statistics are shared.
pub struct OffsetCollector<A> {
    api: A,
    filter: ConnectorFilter,
    stats: RwLock<CollectorStats>,
    /// Standard `process_*` metrics of the exporter itself.
    process: Registry,
}

/// Collector handle shared with the HTTP server.
pub type SharedCollector<A = ConnectClient> = Arc<OffsetCollector<A>>;

impl<A: ConnectApi> OffsetCollector<A> {
    /// Create a new offset collector. Fails on an invalid filter pattern.
    pub fn new(api: A, filter_config: &FilterConfig) -> Result<Self, ConfigError> {
        let process = Registry::new();
        register_process_metrics(&process);

        Ok(Self {
            api,
            filter: ConnectorFilter::new(filter_config)?,
            stats: RwLock::new(CollectorStats::default()),
            process,
        })
    }

    /// The underlying API client.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Run one full collection pass.
    ///
    /// Never fails: a listing failure yields an empty result, a connector
    /// failure only drops that connector's samples.
    pub async fn collect(&self) -> ScrapeResult {
        let started = Instant::now();
        let mut result = ScrapeResult::default();

        match self.api.list_connectors().await {
            Ok(names) => {
                debug!(count = names.len(), "Listed connectors");
                for name in names {
                    let outcome = match self.collect_connector(&name).await {
                        Ok(samples) => {
                            let count = samples.len();
                            result.samples.extend(samples);
                            ConnectorOutcome::Collected(count)
                        }
                        Err(ConnectorError::Skipped(reason)) => ConnectorOutcome::Skipped(reason),
                        Err(ConnectorError::Failed(e)) => {
                            warn!(connector = %name, error = %e, "Skipping connector");
                            ConnectorOutcome::Failed(e)
                        }
                    };
                    result.connectors.push(ConnectorReport { name, outcome });
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to list connectors");
                result.list_error = Some(e);
            }
        }

        self.record(&result, started.elapsed());
        result
    }

    /// Classify one connector and fetch its offsets.
    async fn collect_connector(&self, name: &str) -> Result<Vec<OffsetSample>, ConnectorError> {
        if !self.filter.should_include(name) {
            debug!(connector = %name, "Connector filtered out");
            return Err(ConnectorError::Skipped(SkipReason::Filtered));
        }

        let connector_type =
            self.api
                .connector_type(name)
                .await
                .map_err(|source| CollectError::Status {
                    connector: name.to_string(),
                    source,
                })?;

        let offsets_error = |source| CollectError::Offsets {
            connector: name.to_string(),
            source,
        };

        let samples = match &connector_type {
            ConnectorType::Source => {
                let records = self
                    .api
                    .source_offsets(name)
                    .await
                    .map_err(offsets_error)?;
                normalize_source(name, &records)
            }
            ConnectorType::Sink => {
                let records = self.api.sink_offsets(name).await.map_err(offsets_error)?;
                normalize_sink(name, &records)
            }
            ConnectorType::Unknown(kind) => {
                warn!(connector = %name, connector_type = %kind, "Unknown connector type");
                return Err(ConnectorError::Skipped(SkipReason::UnknownType(
                    kind.clone(),
                )));
            }
        };

        debug!(
            connector = %name,
            %connector_type,
            samples = samples.len(),
            "Collected connector offsets"
        );
        Ok(samples)
    }

    /// Check whether the Kafka Connect API currently answers.
    pub async fn is_upstream_ready(&self) -> bool {
        self.api.list_connectors().await.is_ok()
    }

    /// Run a collection pass and render it.
    pub async fn scrape(&self) -> String {
        let result = self.collect().await;
        self.render(&result)
    }

    fn record(&self, result: &ScrapeResult, elapsed: Duration) {
        let mut stats = self.stats.write();
        stats.scrapes += 1;
        if result.list_error.is_some() {
            stats.list_failures += 1;
        }
        stats.connector_failures += result.failed_count() as u64;
        stats.unknown_types += result.unknown_type_count() as u64;
        stats.samples += result.samples.len() as u64;
        stats.last_duration = elapsed;
    }

    /// Get collector statistics.
    pub fn stats(&self) -> CollectorStats {
        self.stats.read().clone()
    }

    /// Render a scrape result, the exporter's own counters and its process
    /// metrics in Prometheus exposition format.
    pub fn render(&self, result: &ScrapeResult) -> String {
        let mut output = Vec::with_capacity(result.samples.len() * 100 + 1024);

        write_offsets(&mut output, &result.samples);

        let stats = self.stats.read();
        writeln!(output).ok();
        write_self_metric(
            &mut output,
            "scrapes_total",
            "counter",
            "Collection passes run",
            stats.scrapes as f64,
        );
        write_self_metric(
            &mut output,
            "list_failures_total",
            "counter",
            "Collection passes where listing connectors failed",
            stats.list_failures as f64,
        );
        write_self_metric(
            &mut output,
            "connector_failures_total",
            "counter",
            "Connectors whose status or offsets could not be fetched",
            stats.connector_failures as f64,
        );
        write_self_metric(
            &mut output,
            "unknown_type_total",
            "counter",
            "Connectors skipped because of an unknown type",
            stats.unknown_types as f64,
        );
        write_self_metric(
            &mut output,
            "samples_total",
            "counter",
            "Offset samples produced",
            stats.samples as f64,
        );
        write_self_metric(
            &mut output,
            "last_scrape_duration_seconds",
            "gauge",
            "Duration of the most recent collection pass",
            stats.last_duration.as_secs_f64(),
        );
        drop(stats);

        let families = self.process.gather();
        if !families.is_empty() {
            writeln!(output).ok();
            if let Err(e) = TextEncoder::new().encode(&families, &mut output) {
                warn!(error = %e, "Failed to encode process metrics");
            }
        }

        String::from_utf8(output).unwrap_or_default()
    }
}

#[cfg(target_os = "linux")]
fn register_process_metrics(registry: &Registry) {
    let collector = prometheus::process_collector::ProcessCollector::for_self();
    if let Err(e) = registry.register(Box::new(collector)) {
        warn!(error = %e, "Failed to register process metrics");
    }
}

/// Process metrics are read from procfs, so other platforms export none.
#[cfg(not(target_os = "linux"))]
fn register_process_metrics(_registry: &Registry) {}

/// Internal per-connector result before it becomes a [`ConnectorOutcome`].
enum ConnectorError {
    Skipped(SkipReason),
    Failed(CollectError),
}

impl From<CollectError> for ConnectorError {
    fn from(e: CollectError) -> Self {
        ConnectorError::Failed(e)
    }
}

/// Write the offset gauge family. Omitted entirely when there are no samples.
pub fn write_offsets(output: &mut Vec<u8>, samples: &[OffsetSample]) {
    if samples.is_empty() {
        return;
    }

    writeln!(output, "# HELP {} {}", OFFSET_METRIC, OFFSET_HELP).ok();
    writeln!(output, "# TYPE {} gauge", OFFSET_METRIC).ok();

    for sample in samples {
        writeln!(
            output,
            "{}{} {}",
            OFFSET_METRIC,
            format_labels(&sample.labels()),
            format_value(sample.value)
        )
        .ok();
    }
}

fn write_self_metric(output: &mut Vec<u8>, name: &str, kind: &str, help: &str, value: f64) {
    writeln!(output, "# HELP {}_{} {}", SELF_PREFIX, name, help).ok();
    writeln!(output, "# TYPE {}_{} {}", SELF_PREFIX, name, kind).ok();
    writeln!(output, "{}_{} {}", SELF_PREFIX, name, format_value(value)).ok();
}

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Format a floating point value for Prometheus.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

/// Format labels for Prometheus exposition format.
fn format_labels(labels: &[(&str, &str)]) -> String {
    if labels.is_empty() {
        return String::new();
    }

    let parts: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect();

    format!("{{{}}}", parts.join(","))
}
