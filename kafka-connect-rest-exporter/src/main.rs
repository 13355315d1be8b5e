//! Prometheus exporter for Kafka Connect connector offsets.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use kafka_connect_rest_exporter::{
    ConnectClient, ExporterConfig, HttpServer, OffsetCollector, SharedCollector,
};

/// Prometheus exporter for Kafka Connect connector offsets.
#[derive(Parser, Debug)]
#[command(name = "kafka-connect-rest-exporter")]
#[command(about = "Export Kafka Connect connector offsets as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Base URL of the Kafka Connect REST API (overrides config).
    #[arg(value_name = "CONNECT_API")]
    connect_api: Option<String>,

    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// Port to bind the metrics server to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// HTTP listen address (overrides config and --port).
    #[arg(long)]
    listen: Option<String>,

    /// Timeout for each Kafka Connect request in seconds (overrides config).
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    /// Apply command line overrides on top of the file configuration.
    fn apply(self, config: &mut ExporterConfig) {
        if let Some(url) = self.connect_api {
            config.connect.url = url;
        }
        if let Some(port) = self.port {
            config.prometheus.set_port(port);
        }
        if let Some(listen) = self.listen {
            config.prometheus.listen = listen;
        }
        if let Some(timeout) = self.timeout_secs {
            config.connect.timeout_secs = timeout;
        }
        if let Some(level) = self.log_level {
            config.logging.level = Some(level);
        }
    }
}

fn init_logging(config: &ExporterConfig) -> anyhow::Result<()> {
    let log_level = config
        .logging
        .level
        .as_deref()
        .unwrap_or("info")
        .parse()
        .unwrap_or(Level::INFO);
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("kafka_connect_rest_exporter={}", log_level).parse()?)
        .add_directive(format!("tower_http={}", log_level).parse()?);

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };
    args.apply(&mut config);
    config.validate()?;

    init_logging(&config)?;

    info!(
        connect_api = %config.connect.url,
        "Starting Kafka Connect Prometheus Exporter"
    );

    // Refuse to serve without a reachable Kafka Connect API
    let client = ConnectClient::connect(&config.connect)
        .await
        .map_err(|e| anyhow::anyhow!("Error connecting to Kafka Connect API: {}", e))?;

    let collector: SharedCollector = Arc::new(OffsetCollector::new(client, &config.filters)?);

    let listen_addr = config.prometheus.listen_addr()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_server = HttpServer::new(
        collector.clone(),
        listen_addr,
        config.prometheus.path.clone(),
    );
    let mut http_task = tokio::spawn(async move { http_server.run(shutdown_rx).await });

    // Wait for shutdown signal, or for the server to die on its own
    tokio::select! {
        result = &mut http_task => {
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    error!("HTTP server error: {}", e);
                    Err(e)
                }
                Err(e) => Err(anyhow::anyhow!("HTTP server task failed: {}", e)),
            };
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    shutdown_tx.send(true)?;

    let _ = tokio::time::timeout(Duration::from_secs(5), http_task).await;

    let stats = collector.stats();
    info!(
        scrapes = stats.scrapes,
        list_failures = stats.list_failures,
        connector_failures = stats.connector_failures,
        samples = stats.samples,
        "Final statistics"
    );

    info!("Exporter stopped");
    Ok(())
}

#[cfg(unix)]
async fn terminate() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
