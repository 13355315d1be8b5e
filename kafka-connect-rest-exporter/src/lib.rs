//! Prometheus exporter for Kafka Connect connector offsets.
//!
//! On every scrape the exporter walks the Kafka Connect REST API and
//! republishes each connector's committed offsets as the
//! `kafka_connect_current_offset` gauge.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  Kafka Connect   │<────│    Collector    │<────│   HTTP Server   │
//! │  REST API        │     │ (per scrape)    │     │   (/metrics)    │
//! └──────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! For each connector listed by `GET /connectors`, the collector reads
//! `GET /connectors/{name}/status` to learn whether it is a source or a
//! sink, then reads `GET /connectors/{name}/offsets` with the schema for
//! that type. Failures are confined to the connector they happen on.
//!
//! # Usage
//!
//! ```bash
//! kafka-connect-rest-exporter --port 9840 http://localhost:8083
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod client;
pub mod collector;
pub mod config;
pub mod http;
pub mod offsets;

#[cfg(test)]
pub(crate) mod mock;

pub use client::{ClientError, ConnectApi, ConnectClient};
pub use collector::{OffsetCollector, ScrapeResult, SharedCollector};
pub use config::ExporterConfig;
pub use http::HttpServer;
pub use offsets::{ConnectorType, OffsetSample};
