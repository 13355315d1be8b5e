//! In-memory Kafka Connect API for unit tests.

use std::collections::HashMap;

use parking_lot::Mutex;
use reqwest::StatusCode;

use crate::client::{ClientError, ConnectApi};
use crate::offsets::{ConnectorType, SinkOffsetRecord, SourceOffsetRecord};

/// Scripted connectors. A connector without a status entry fails its status
/// call; one without offsets fails its offsets call.
pub struct MockConnectApi {
    connectors: Option<Vec<String>>,
    types: HashMap<String, ConnectorType>,
    source: HashMap<String, Vec<SourceOffsetRecord>>,
    sink: HashMap<String, Vec<SinkOffsetRecord>>,
    requests: Mutex<Vec<String>>,
}

fn server_error(path: String) -> ClientError {
    ClientError::Status {
        path,
        status: StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl MockConnectApi {
    pub fn new() -> Self {
        Self {
            connectors: Some(Vec::new()),
            types: HashMap::new(),
            source: HashMap::new(),
            sink: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// An API whose connector listing always fails.
    pub fn failing_list() -> Self {
        Self {
            connectors: None,
            ..Self::new()
        }
    }

    fn add(mut self, name: &str, kind: Option<ConnectorType>) -> Self {
        if let Some(connectors) = self.connectors.as_mut() {
            connectors.push(name.to_string());
        }
        if let Some(kind) = kind {
            self.types.insert(name.to_string(), kind);
        }
        self
    }

    pub fn source(mut self, name: &str, records: Vec<SourceOffsetRecord>) -> Self {
        self.source.insert(name.to_string(), records);
        self.add(name, Some(ConnectorType::Source))
    }

    pub fn sink(mut self, name: &str, records: Vec<SinkOffsetRecord>) -> Self {
        self.sink.insert(name.to_string(), records);
        self.add(name, Some(ConnectorType::Sink))
    }

    /// A connector declaring an arbitrary type string.
    pub fn typed(self, name: &str, kind: &str) -> Self {
        self.add(name, Some(ConnectorType::from_status(Some(kind))))
    }

    pub fn broken_status(self, name: &str) -> Self {
        self.add(name, None)
    }

    pub fn broken_offsets(self, name: &str, kind: ConnectorType) -> Self {
        self.add(name, Some(kind))
    }

    /// Requests seen so far, e.g. `["list", "status:c1", "offsets:c1"]`.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    fn log(&self, request: String) {
        self.requests.lock().push(request);
    }
}

impl ConnectApi for MockConnectApi {
    async fn list_connectors(&self) -> Result<Vec<String>, ClientError> {
        self.log("list".to_string());
        self.connectors
            .clone()
            .ok_or_else(|| server_error("/connectors".to_string()))
    }

    async fn connector_type(&self, name: &str) -> Result<ConnectorType, ClientError> {
        self.log(format!("status:{}", name));
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| server_error(format!("/connectors/{}/status", name)))
    }

    async fn source_offsets(&self, name: &str) -> Result<Vec<SourceOffsetRecord>, ClientError> {
        self.log(format!("offsets:{}", name));
        self.source
            .get(name)
            .cloned()
            .ok_or_else(|| server_error(format!("/connectors/{}/offsets", name)))
    }

    async fn sink_offsets(&self, name: &str) -> Result<Vec<SinkOffsetRecord>, ClientError> {
        self.log(format!("offsets:{}", name));
        self.sink
            .get(name)
            .cloned()
            .ok_or_else(|| server_error(format!("/connectors/{}/offsets", name)))
    }
}
