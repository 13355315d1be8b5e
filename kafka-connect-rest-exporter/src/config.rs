//! Exporter configuration: a JSON5 file, overridden from the command line.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 9840 is the registered default port for the Kafka Connect exporter.
pub const DEFAULT_PORT: u16 = 9840;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON5: {0}")]
    Syntax(#[from] json5::Error),

    #[error("connect.url: {0}")]
    ConnectUrl(String),

    #[error("connect.{0} must be at least one second")]
    ZeroTimeout(&'static str),

    #[error("prometheus.listen '{0}' is not a socket address")]
    Listen(String),

    #[error("prometheus.path '{0}' must start with '/'")]
    MetricsPath(String),

    #[error("Invalid connector pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    pub connect: ConnectConfig,
    pub prometheus: PrometheusConfig,
    pub filters: FilterConfig,
    pub logging: LoggingConfig,
}

/// Where and how to reach the Kafka Connect REST API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectConfig {
    /// Base URL, e.g. "http://localhost:8083". No default; usually given
    /// on the command line.
    pub url: String,
    /// Upper bound for one request, connect time included.
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: 10,
            connect_timeout_secs: 5,
        }
    }
}

impl ConnectConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let raw = self.url.trim();
        if raw.is_empty() {
            return Err(ConfigError::ConnectUrl(
                "the Kafka Connect API URL is required".to_string(),
            ));
        }
        let url = Url::parse(raw).map_err(|e| ConfigError::ConnectUrl(format!("{raw}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::ConnectUrl(format!(
                "{raw}: scheme must be http or https"
            )));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout("timeout_secs"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout("connect_timeout_secs"));
        }
        Ok(())
    }
}

/// The exporter's own HTTP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrometheusConfig {
    pub listen: String,
    pub path: String,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            listen: format!("0.0.0.0:{DEFAULT_PORT}"),
            path: "/metrics".to_string(),
        }
    }
}

impl PrometheusConfig {
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen
            .parse()
            .map_err(|_| ConfigError::Listen(self.listen.clone()))
    }

    /// Replace only the port of the listen address, keeping its host.
    /// An unparseable address falls back to all interfaces.
    pub fn set_port(&mut self, port: u16) {
        let addr = match self.listen_addr() {
            Ok(mut addr) => {
                addr.set_port(port);
                addr
            }
            Err(_) => SocketAddr::from(([0, 0, 0, 0], port)),
        };
        self.listen = addr.to_string();
    }
}

/// Glob patterns selecting which connectors are polled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Empty means every connector.
    pub include_connectors: Vec<String>,
    pub exclude_connectors: Vec<String>,
}

/// Compile glob patterns, failing on the first invalid one.
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<glob::Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p).map_err(|source| ConfigError::Pattern {
                pattern: p.clone(),
                source,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level for the exporter's own targets; `RUST_LOG` still applies on top.
    /// Defaults to "info".
    pub level: Option<String>,
    /// Emit one JSON object per line instead of human-readable text.
    pub json: bool,
}

impl ExporterConfig {
    /// Read a JSON5 file. The result is not validated, since the command
    /// line may still supply the connect URL.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(json5::from_str(&content)?)
    }

    /// Parse and validate a JSON5 document.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.connect.validate()?;
        self.prometheus.listen_addr()?;
        if !self.prometheus.path.starts_with('/') {
            return Err(ConfigError::MetricsPath(self.prometheus.path.clone()));
        }
        compile_patterns(&self.filters.include_connectors)?;
        compile_patterns(&self.filters.exclude_connectors)?;
        Ok(())
    }
}
