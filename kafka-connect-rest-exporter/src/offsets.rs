//! Kafka Connect offset shapes and their mapping to metric samples.
//!
//! Source and sink connectors report committed offsets with different
//! partition/offset keys. Each shape gets its own response schema; the caller
//! picks one after classifying the connector, so no payload is ever inspected
//! at runtime to guess which shape it is.

use serde::Deserialize;

/// Connector kind as reported by `GET /connectors/{name}/status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorType {
    Source,
    Sink,
    /// Any other declared type, or an empty string if the field was missing.
    Unknown(String),
}

impl ConnectorType {
    /// Classify a raw `type` field value.
    pub fn from_status(value: Option<&str>) -> Self {
        match value {
            Some("source") => ConnectorType::Source,
            Some("sink") => ConnectorType::Sink,
            Some(other) => ConnectorType::Unknown(other.to_string()),
            None => ConnectorType::Unknown(String::new()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ConnectorType::Source => "source",
            ConnectorType::Sink => "sink",
            ConnectorType::Unknown(s) => s,
        }
    }
}

impl std::fmt::Display for ConnectorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `GET /connectors/{name}/status`. Only the type is used.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectorStatus {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub connector_type: Option<String>,
}

impl ConnectorStatus {
    pub fn kind(&self) -> ConnectorType {
        ConnectorType::from_status(self.connector_type.as_deref())
    }
}

/// Committed offset of a source connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOffsetRecord {
    pub cluster: String,
    pub topic: String,
    pub partition: i64,
    pub offset: i64,
}

/// Committed offset of a sink connector. Sinks consume from Kafka itself,
/// so there is no upstream cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkOffsetRecord {
    pub topic: String,
    pub partition: i64,
    pub offset: i64,
}

// -- Kafka Connect offsets response bodies --

#[derive(Debug, Deserialize)]
struct SourcePartition {
    cluster: String,
    partition: i64,
    topic: String,
}

#[derive(Debug, Deserialize)]
struct SourceOffset {
    offset: i64,
}

#[derive(Debug, Deserialize)]
struct SourceOffsetEntry {
    partition: SourcePartition,
    offset: SourceOffset,
}

/// `GET /connectors/{name}/offsets` for a source connector.
#[derive(Debug, Deserialize)]
pub struct SourceOffsetsResponse {
    offsets: Vec<SourceOffsetEntry>,
}

impl SourceOffsetsResponse {
    pub fn into_records(self) -> Vec<SourceOffsetRecord> {
        self.offsets
            .into_iter()
            .map(|e| SourceOffsetRecord {
                cluster: e.partition.cluster,
                topic: e.partition.topic,
                partition: e.partition.partition,
                offset: e.offset.offset,
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct SinkPartition {
    kafka_partition: i64,
    kafka_topic: String,
}

#[derive(Debug, Deserialize)]
struct SinkOffset {
    kafka_offset: i64,
}

#[derive(Debug, Deserialize)]
struct SinkOffsetEntry {
    partition: SinkPartition,
    offset: SinkOffset,
}

/// `GET /connectors/{name}/offsets` for a sink connector.
#[derive(Debug, Deserialize)]
pub struct SinkOffsetsResponse {
    offsets: Vec<SinkOffsetEntry>,
}

impl SinkOffsetsResponse {
    pub fn into_records(self) -> Vec<SinkOffsetRecord> {
        self.offsets
            .into_iter()
            .map(|e| SinkOffsetRecord {
                topic: e.partition.kafka_topic,
                partition: e.partition.kafka_partition,
                offset: e.offset.kafka_offset,
            })
            .collect()
    }
}

/// One `kafka_connect_current_offset` series value.
///
/// All four labels are always present; `cluster` is the empty string for
/// sink connectors so existing dashboards keep matching.
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetSample {
    pub connector: String,
    pub cluster: String,
    pub topic: String,
    pub partition: String,
    pub value: f64,
}

impl OffsetSample {
    /// Label pairs in exposition order.
    pub fn labels(&self) -> [(&'static str, &str); 4] {
        [
            ("connector", self.connector.as_str()),
            ("cluster", self.cluster.as_str()),
            ("topic", self.topic.as_str()),
            ("partition", self.partition.as_str()),
        ]
    }
}

/// Map source offsets onto samples, preserving order.
pub fn normalize_source(connector: &str, records: &[SourceOffsetRecord]) -> Vec<OffsetSample> {
    records
        .iter()
        .map(|r| OffsetSample {
            connector: connector.to_string(),
            cluster: r.cluster.clone(),
            topic: r.topic.clone(),
            partition: r.partition.to_string(),
            value: r.offset as f64,
        })
        .collect()
}

/// Map sink offsets onto samples, preserving order.
pub fn normalize_sink(connector: &str, records: &[SinkOffsetRecord]) -> Vec<OffsetSample> {
    records
        .iter()
        .map(|r| OffsetSample {
            connector: connector.to_string(),
            cluster: String::new(),
            topic: r.topic.clone(),
            partition: r.partition.to_string(),
            value: r.offset as f64,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_type_from_status() {
        assert_eq!(
            ConnectorType::from_status(Some("source")),
            ConnectorType::Source
        );
        assert_eq!(ConnectorType::from_status(Some("sink")), ConnectorType::Sink);
        assert_eq!(
            ConnectorType::from_status(Some("transform")),
            ConnectorType::Unknown("transform".to_string())
        );
        assert_eq!(
            ConnectorType::from_status(None),
            ConnectorType::Unknown(String::new())
        );
        // Matching is exact
        assert_eq!(
            ConnectorType::from_status(Some("Source")),
            ConnectorType::Unknown("Source".to_string())
        );
    }

    #[test]
    fn test_status_without_type_is_unknown() {
        let status: ConnectorStatus = serde_json::from_str(r#"{"name": "c1"}"#).unwrap();
        assert_eq!(status.kind(), ConnectorType::Unknown(String::new()));
    }

    #[test]
    fn test_status_ignores_extra_fields() {
        let json = r#"{
            "name": "mirror",
            "connector": {"state": "RUNNING", "worker_id": "10.0.0.1:8083"},
            "tasks": [{"id": 0, "state": "RUNNING", "worker_id": "10.0.0.1:8083"}],
            "type": "source"
        }"#;
        let status: ConnectorStatus = serde_json::from_str(json).unwrap();
        assert_eq!(status.name.as_deref(), Some("mirror"));
        assert_eq!(status.kind(), ConnectorType::Source);
    }

    #[test]
    fn test_source_offsets_response() {
        let json = r#"{"offsets": [
            {"partition": {"cluster": "k1", "partition": 0, "topic": "t1"}, "offset": {"offset": 100}},
            {"partition": {"cluster": "k1", "partition": 3, "topic": "t1"}, "offset": {"offset": 7}}
        ]}"#;
        let resp: SourceOffsetsResponse = serde_json::from_str(json).unwrap();
        let records = resp.into_records();

        assert_eq!(
            records,
            vec![
                SourceOffsetRecord {
                    cluster: "k1".into(),
                    topic: "t1".into(),
                    partition: 0,
                    offset: 100
                },
                SourceOffsetRecord {
                    cluster: "k1".into(),
                    topic: "t1".into(),
                    partition: 3,
                    offset: 7
                },
            ]
        );
    }

    #[test]
    fn test_sink_offsets_response() {
        let json = r#"{"offsets": [
            {"partition": {"kafka_partition": 1, "kafka_topic": "t2"}, "offset": {"kafka_offset": 55}}
        ]}"#;
        let resp: SinkOffsetsResponse = serde_json::from_str(json).unwrap();

        assert_eq!(
            resp.into_records(),
            vec![SinkOffsetRecord {
                topic: "t2".into(),
                partition: 1,
                offset: 55
            }]
        );
    }

    #[test]
    fn test_sink_body_does_not_parse_as_source() {
        let json = r#"{"offsets": [
            {"partition": {"kafka_partition": 1, "kafka_topic": "t2"}, "offset": {"kafka_offset": 55}}
        ]}"#;
        assert!(serde_json::from_str::<SourceOffsetsResponse>(json).is_err());
    }

    #[test]
    fn test_normalize_source() {
        let records = vec![SourceOffsetRecord {
            cluster: "k1".into(),
            topic: "t1".into(),
            partition: 0,
            offset: 100,
        }];
        let samples = normalize_source("c1", &records);

        assert_eq!(
            samples,
            vec![OffsetSample {
                connector: "c1".into(),
                cluster: "k1".into(),
                topic: "t1".into(),
                partition: "0".into(),
                value: 100.0,
            }]
        );
    }

    #[test]
    fn test_normalize_sink_has_empty_cluster() {
        let records = vec![
            SinkOffsetRecord {
                topic: "t2".into(),
                partition: 1,
                offset: 55,
            },
            SinkOffsetRecord {
                topic: "t2".into(),
                partition: 12,
                offset: 0,
            },
        ];
        let samples = normalize_sink("c2", &records);

        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|s| s.cluster.is_empty()));
        assert_eq!(samples[0].partition, "1");
        assert_eq!(samples[0].value, 55.0);
        assert_eq!(samples[1].partition, "12");
        assert_eq!(samples[1].value, 0.0);
    }

    #[test]
    fn test_partition_label_is_plain_decimal() {
        for (partition, expected) in [(0, "0"), (3, "3"), (10, "10"), (1024, "1024")] {
            let records = vec![SinkOffsetRecord {
                topic: "t".into(),
                partition,
                offset: 1,
            }];
            assert_eq!(normalize_sink("c", &records)[0].partition, expected);
        }
    }

    #[test]
    fn test_normalize_preserves_order() {
        let records: Vec<_> = [5, 2, 9, 2]
            .into_iter()
            .map(|p| SourceOffsetRecord {
                cluster: "k".into(),
                topic: "t".into(),
                partition: p,
                offset: p * 10,
            })
            .collect();
        let partitions: Vec<_> = normalize_source("c", &records)
            .into_iter()
            .map(|s| s.partition)
            .collect();

        assert_eq!(partitions, vec!["5", "2", "9", "2"]);
    }

    #[test]
    fn test_sample_labels_order() {
        let sample = OffsetSample {
            connector: "c".into(),
            cluster: "".into(),
            topic: "t".into(),
            partition: "4".into(),
            value: 1.0,
        };
        let names: Vec<_> = sample.labels().iter().map(|(k, _)| *k).collect();
        assert_eq!(names, vec!["connector", "cluster", "topic", "partition"]);
    }
}
