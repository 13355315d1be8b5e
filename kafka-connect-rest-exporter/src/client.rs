//! Client for the Kafka Connect REST API.
//!
//! Only the read side of the control plane is used: connector listing,
//! connector status and committed offsets. Every call issues exactly one
//! request with no retries or caching; a failed call is reported to the
//! caller and retried naturally on the next scrape.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ConnectConfig;
use crate::offsets::{
    ConnectorStatus, ConnectorType, SinkOffsetRecord, SinkOffsetsResponse, SourceOffsetRecord,
    SourceOffsetsResponse,
};

/// Errors from the Kafka Connect REST API.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid Kafka Connect API URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("Request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected status {status} from {path}")]
    Status { path: String, status: StatusCode },

    #[error("Failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Read operations the offset collector needs from Kafka Connect.
pub trait ConnectApi: Send + Sync {
    /// `GET /connectors`
    fn list_connectors(&self) -> impl Future<Output = Result<Vec<String>, ClientError>> + Send;

    /// `GET /connectors/{name}/status`, reduced to the declared type.
    fn connector_type(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<ConnectorType, ClientError>> + Send;

    /// `GET /connectors/{name}/offsets` read as source offsets.
    fn source_offsets(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Vec<SourceOffsetRecord>, ClientError>> + Send;

    /// `GET /connectors/{name}/offsets` read as sink offsets.
    fn sink_offsets(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Vec<SinkOffsetRecord>, ClientError>> + Send;
}

/// HTTP client bound to one Kafka Connect cluster.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ConnectClient {
    client: Client,
    base_url: Url,
}

impl ConnectClient {
    /// Build a client without contacting the API.
    pub fn new(config: &ConnectConfig) -> Result<Self, ClientError> {
        let raw = config.url.trim();
        let base_url = Url::parse(raw).map_err(|e| ClientError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl {
                url: raw.to_string(),
                reason: "expected an http or https base URL".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self { client, base_url })
    }

    /// Build a client and check that the API answers.
    ///
    /// Used at startup so the exporter never serves without a reachable
    /// data source.
    pub async fn connect(config: &ConnectConfig) -> Result<Self, ClientError> {
        let client = Self::new(config)?;
        client.check_connection().await?;
        info!(url = %client.base_url, "Connected to Kafka Connect API");
        Ok(client)
    }

    /// The base URL all endpoints are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Check connectivity with `GET /connectors`.
    pub async fn check_connection(&self) -> Result<(), ClientError> {
        let url = self.endpoint(&["connectors"])?;
        let path = url.path().to_string();

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                path: path.clone(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Status { path, status });
        }
        Ok(())
    }

    /// Resolve path segments against the base URL.
    ///
    /// Each segment is percent-encoded, so a connector name containing `/`
    /// stays a single segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl {
                url: self.base_url.to_string(),
                reason: "URL cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ClientError> {
        let url = self.endpoint(segments)?;
        let path = url.path().to_string();
        debug!(%path, "GET");

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                path: path.clone(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Status { path, status });
        }

        let body = resp
            .bytes()
            .await
            .map_err(|source| ClientError::Transport {
                path: path.clone(),
                source,
            })?;

        serde_json::from_slice(&body).map_err(|source| ClientError::Decode { path, source })
    }
}

impl ConnectApi for ConnectClient {
    async fn list_connectors(&self) -> Result<Vec<String>, ClientError> {
        self.get_json(&["connectors"]).await
    }

    async fn connector_type(&self, name: &str) -> Result<ConnectorType, ClientError> {
        let status: ConnectorStatus = self.get_json(&["connectors", name, "status"]).await?;
        Ok(status.kind())
    }

    async fn source_offsets(&self, name: &str) -> Result<Vec<SourceOffsetRecord>, ClientError> {
        let resp: SourceOffsetsResponse = self.get_json(&["connectors", name, "offsets"]).await?;
        Ok(resp.into_records())
    }

    async fn sink_offsets(&self, name: &str) -> Result<Vec<SinkOffsetRecord>, ClientError> {
        let resp: SinkOffsetsResponse = self.get_json(&["connectors", name, "offsets"]).await?;
        Ok(resp.into_records())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> ConnectConfig {
        ConnectConfig {
            url: url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_endpoint_paths() {
        let client = ConnectClient::new(&config("http://localhost:8083")).unwrap();

        assert_eq!(
            client.endpoint(&["connectors"]).unwrap().as_str(),
            "http://localhost:8083/connectors"
        );
        assert_eq!(
            client
                .endpoint(&["connectors", "mirror-source", "offsets"])
                .unwrap()
                .path(),
            "/connectors/mirror-source/offsets"
        );
    }

    #[test]
    fn test_endpoint_trailing_slash_and_prefix() {
        let client = ConnectClient::new(&config("http://localhost:8083/")).unwrap();
        assert_eq!(
            client.endpoint(&["connectors"]).unwrap().path(),
            "/connectors"
        );

        let client = ConnectClient::new(&config("https://gateway/kafka-connect/")).unwrap();
        assert_eq!(
            client.endpoint(&["connectors", "c1", "status"]).unwrap().path(),
            "/kafka-connect/connectors/c1/status"
        );
    }

    #[test]
    fn test_endpoint_escapes_connector_name() {
        let client = ConnectClient::new(&config("http://localhost:8083")).unwrap();
        let url = client
            .endpoint(&["connectors", "team/a b", "status"])
            .unwrap();

        assert_eq!(url.path(), "/connectors/team%2Fa%20b/status");
    }

    #[test]
    fn test_new_rejects_invalid_url() {
        assert!(matches!(
            ConnectClient::new(&config("not a url")),
            Err(ClientError::InvalidUrl { .. })
        ));
        assert!(matches!(
            ConnectClient::new(&config("ftp://localhost:8083")),
            Err(ClientError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn test_connect_fails_when_unreachable() {
        // Port 9 (discard) is essentially never served on loopback
        let result = ConnectClient::connect(&ConnectConfig {
            url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            connect_timeout_secs: 1,
        })
        .await;

        assert!(matches!(result, Err(ClientError::Transport { .. })));
    }
}
