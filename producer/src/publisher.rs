use std::time::Duration;

use async_trait::async_trait;
use common_kafka::config::KafkaConfig;
use common_kafka::kafka_producer::{
    create_kafka_producer, send_keyed_payloads_to_kafka, KafkaContext, KeyedPayload,
};
use rdkafka::error::KafkaError;
use rdkafka::metadata::Metadata;
use rdkafka::producer::{FutureProducer, Producer};
use rdkafka::types::RDKafkaRespErr;
use thiserror::Error;
use tracing::{error, info};

/// One entry of a batch publish call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishEntry {
    pub data: Vec<u8>,
    pub partition_key: String,
}

/// A single record the stream did not accept.
#[derive(Error, Debug)]
#[error("record was not accepted by the stream: {0}")]
pub struct PublishError(pub String);

/// The batch publish call as a whole could not be carried out.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to reach the stream transport: {0}")]
    Unreachable(#[from] KafkaError),
    #[error("stream {topic} is not available: {reason}")]
    TopicUnavailable { topic: String, reason: String },
    #[error("stream transport task failed: {0}")]
    TaskFailed(String),
}

/// Capability to publish a batch of records onto a named stream.
#[async_trait]
pub trait StreamPublisher: Send + Sync {
    /// Publish `entries` in one call.
    ///
    /// On success the returned vector holds one result per entry, in input order.
    async fn publish(
        &self,
        stream: &str,
        entries: Vec<PublishEntry>,
    ) -> Result<Vec<Result<(), PublishError>>, TransportError>;
}

/// `StreamPublisher` writing to Kafka topics, the partition key becoming the message key.
#[derive(Clone)]
pub struct KafkaPublisher {
    producer: FutureProducer<KafkaContext>,
    metadata_timeout: Duration,
}

impl KafkaPublisher {
    pub async fn new(config: &KafkaConfig) -> Result<KafkaPublisher, KafkaError> {
        info!("connecting to Kafka brokers at {}...", config.kafka_hosts);
        let producer = create_kafka_producer(config).await?;

        Ok(Self::from_producer(
            producer,
            Duration::from_millis(u64::from(config.kafka_metadata_timeout_ms)),
        ))
    }

    pub fn from_producer(
        producer: FutureProducer<KafkaContext>,
        metadata_timeout: Duration,
    ) -> KafkaPublisher {
        KafkaPublisher {
            producer,
            metadata_timeout,
        }
    }

    /// Make sure the brokers answer for `topic`, and know it, before queueing the batch.
    async fn check_topic(&self, topic: &str) -> Result<(), TransportError> {
        let producer = self.producer.clone();
        let requested = topic.to_owned();
        let timeout = self.metadata_timeout;

        let metadata: Metadata = tokio::task::spawn_blocking(move || {
            producer.client().fetch_metadata(Some(&requested), timeout)
        })
        .await
        .map_err(|e| TransportError::TaskFailed(e.to_string()))??;

        topic_status(
            topic,
            metadata.topics().iter().map(|t| (t.name(), t.error())),
        )
    }
}

/// Brokers answer a metadata request for an unknown topic with a per-topic error code
/// rather than a failed request.
fn topic_status<'a>(
    topic: &str,
    mut topics: impl Iterator<Item = (&'a str, Option<RDKafkaRespErr>)>,
) -> Result<(), TransportError> {
    match topics.find(|(name, _)| *name == topic) {
        Some((_, None)) => Ok(()),
        Some((_, Some(code))) => Err(TransportError::TopicUnavailable {
            topic: topic.to_owned(),
            reason: format!("{:?}", code),
        }),
        None => Err(TransportError::TopicUnavailable {
            topic: topic.to_owned(),
            reason: "missing from broker metadata".to_owned(),
        }),
    }
}

#[async_trait]
impl StreamPublisher for KafkaPublisher {
    async fn publish(
        &self,
        stream: &str,
        entries: Vec<PublishEntry>,
    ) -> Result<Vec<Result<(), PublishError>>, TransportError> {
        self.check_topic(stream).await?;

        let payloads = entries.into_iter().map(|entry| KeyedPayload {
            key: Some(entry.partition_key),
            payload: entry.data,
        });

        let results = send_keyed_payloads_to_kafka(&self.producer, stream, payloads)
            .await
            .into_iter()
            .map(|result| {
                result.map_err(|e| {
                    error!("failed to produce record: {}", e);
                    PublishError(e.to_string())
                })
            })
            .collect();

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_kafka::test::create_mock_kafka;
    use rdkafka::types::RDKafkaApiKey;

    fn entries(ids: &[u32]) -> Vec<PublishEntry> {
        ids.iter()
            .map(|id| PublishEntry {
                data: format!("{{\"id\":{},\"name\":\"Stout\"}}", id).into_bytes(),
                partition_key: id.to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn kafka_publisher_reports_per_record_results() {
        // We test both cases in a single test to amortize the startup cost of the producer.
        let (cluster, producer) = create_mock_kafka().await;
        let publisher = KafkaPublisher::from_producer(producer, Duration::from_secs(5));

        let results = publisher
            .publish("beers-stream", entries(&[1, 2, 3]))
            .await
            .expect("transport failed");
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.is_ok()));

        // Unretriable broker error on the next produce request
        let err = [RDKafkaRespErr::RD_KAFKA_RESP_ERR_MSG_SIZE_TOO_LARGE; 1];
        cluster.request_errors(RDKafkaApiKey::Produce, &err);

        let results = publisher
            .publish("beers-stream", entries(&[4]))
            .await
            .expect("transport failed");
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[tokio::test]
    async fn kafka_publisher_fails_the_whole_call_when_brokers_are_gone() {
        let (cluster, producer) = create_mock_kafka().await;
        let publisher = KafkaPublisher::from_producer(producer, Duration::from_millis(500));
        drop(cluster);

        match publisher.publish("beers-stream", entries(&[1, 2])).await {
            Err(TransportError::Unreachable(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn it_accepts_a_known_topic() {
        let topics = [("other-stream", None), ("beers-stream", None)];

        assert!(topic_status("beers-stream", topics.into_iter()).is_ok());
    }

    #[test]
    fn it_rejects_topics_the_brokers_report_as_unknown() {
        let topics = [(
            "beers-stream",
            Some(RDKafkaRespErr::RD_KAFKA_RESP_ERR_UNKNOWN_TOPIC_OR_PART),
        )];

        match topic_status("beers-stream", topics.into_iter()) {
            Err(TransportError::TopicUnavailable { topic, reason }) => {
                assert_eq!(topic, "beers-stream");
                assert!(reason.contains("UNKNOWN_TOPIC_OR_PART"), "{}", reason);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn it_rejects_topics_missing_from_metadata() {
        assert!(matches!(
            topic_status("beers-stream", std::iter::empty()),
            Err(TransportError::TopicUnavailable { .. })
        ));
    }
}
