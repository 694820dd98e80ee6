use metrics::counter;
use tracing::{error, info, warn};

use crate::error::ProducerError;
use crate::publisher::{PublishEntry, StreamPublisher};
use crate::record::parse_batch;
use crate::source::RecordSource;

/// Outcome of a successful invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishResult {
    pub published: usize,
}

/// Pulls a batch from a `RecordSource` and publishes it onto a stream, keyed by record id.
pub struct Producer<S, P> {
    source: S,
    publisher: P,
    stream: String,
}

impl<S: RecordSource, P: StreamPublisher> Producer<S, P> {
    pub fn new(source: S, publisher: P, stream: &str) -> Self {
        Self {
            source,
            publisher,
            stream: stream.to_owned(),
        }
    }

    /// Run one invocation: a single fetch followed by at most one publish call.
    ///
    /// Nothing is published when the fetch fails or returns an invalid payload. Records the
    /// transport refused are reported through `ProducerError::PartialPublishFailure` and are
    /// not retried here.
    pub async fn fetch_and_publish(&self) -> Result<PublishResult, ProducerError> {
        let body = self.source.fetch().await?;
        let records = parse_batch(&body)?;

        if records.is_empty() {
            info!("source returned no records, nothing to publish");
            return Ok(PublishResult { published: 0 });
        }

        let total = records.len();
        let entries = records
            .iter()
            .map(|record| PublishEntry {
                data: record.data(),
                partition_key: record.partition_key.clone(),
            })
            .collect();

        let results = self.publisher.publish(&self.stream, entries).await?;

        let failed: Vec<usize> = results
            .iter()
            .enumerate()
            .filter_map(|(index, result)| match result {
                Ok(_) => None,
                Err(e) => {
                    warn!(
                        index,
                        partition_key = %records[index].partition_key,
                        "record was not published: {}",
                        e
                    );
                    Some(index)
                }
            })
            .collect();

        let published = total - failed.len();
        counter!("producer_records_published_total").increment(published as u64);

        if !failed.is_empty() {
            counter!("producer_publish_failures_total").increment(failed.len() as u64);
            error!(
                "{} out of {} records failed to publish to {}",
                failed.len(),
                total,
                self.stream
            );
            return Err(ProducerError::PartialPublishFailure { failed, total });
        }

        info!("published {} records to {}", published, self.stream);
        Ok(PublishResult { published })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::publisher::{PublishError, TransportError};

    struct StaticSource {
        response: Result<String, String>,
    }

    #[async_trait]
    impl RecordSource for StaticSource {
        async fn fetch(&self) -> Result<String, ProducerError> {
            self.response
                .clone()
                .map_err(ProducerError::SourceUnavailable)
        }
    }

    #[derive(Clone, Default)]
    struct MemoryPublisher {
        calls: Arc<Mutex<Vec<(String, Vec<PublishEntry>)>>>,
        reject: Vec<usize>,
    }

    impl MemoryPublisher {
        fn calls(&self) -> Vec<(String, Vec<PublishEntry>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StreamPublisher for MemoryPublisher {
        async fn publish(
            &self,
            stream: &str,
            entries: Vec<PublishEntry>,
        ) -> Result<Vec<Result<(), PublishError>>, TransportError> {
            let results = (0..entries.len())
                .map(|i| {
                    if self.reject.contains(&i) {
                        Err(PublishError("throughput exceeded".to_owned()))
                    } else {
                        Ok(())
                    }
                })
                .collect();
            self.calls
                .lock()
                .unwrap()
                .push((stream.to_owned(), entries));
            Ok(results)
        }
    }

    /// Fails every call as a whole, the way an unreachable broker does.
    #[derive(Clone, Default)]
    struct UnreachablePublisher {
        calls: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl StreamPublisher for UnreachablePublisher {
        async fn publish(
            &self,
            _stream: &str,
            _entries: Vec<PublishEntry>,
        ) -> Result<Vec<Result<(), PublishError>>, TransportError> {
            *self.calls.lock().unwrap() += 1;
            Err(TransportError::TaskFailed("broker connection refused".to_owned()))
        }
    }

    fn source(body: &str) -> StaticSource {
        StaticSource {
            response: Ok(body.to_owned()),
        }
    }

    #[tokio::test]
    async fn it_publishes_every_record_keyed_by_id() {
        let publisher = MemoryPublisher::default();
        let producer = Producer::new(
            source(r#"[{"id":1,"name":"Stout"},{"id":2,"name":"Porter"}]"#),
            publisher.clone(),
            "beers-stream",
        );

        let result = producer
            .fetch_and_publish()
            .await
            .expect("invocation failed");

        assert_eq!(result, PublishResult { published: 2 });
        let calls = publisher.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "beers-stream");
        assert_eq!(
            calls[0].1,
            vec![
                PublishEntry {
                    data: br#"{"id":1,"name":"Stout"}"#.to_vec(),
                    partition_key: "1".to_owned(),
                },
                PublishEntry {
                    data: br#"{"id":2,"name":"Porter"}"#.to_vec(),
                    partition_key: "2".to_owned(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn it_does_not_publish_when_the_source_is_unavailable() {
        let publisher = MemoryPublisher::default();
        let producer = Producer::new(
            StaticSource {
                response: Err("source responded with 500".to_owned()),
            },
            publisher.clone(),
            "beers-stream",
        );

        match producer.fetch_and_publish().await {
            Err(ProducerError::SourceUnavailable(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(publisher.calls().is_empty());
    }

    #[tokio::test]
    async fn it_does_not_publish_an_invalid_payload() {
        let publisher = MemoryPublisher::default();
        let producer = Producer::new(
            source(r#"[{"id":1,"name":"Stout"},{"name":"Nameless"}]"#),
            publisher.clone(),
            "beers-stream",
        );

        match producer.fetch_and_publish().await {
            Err(ProducerError::InvalidSourcePayload(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(publisher.calls().is_empty());
    }

    #[tokio::test]
    async fn it_skips_the_publish_call_for_an_empty_batch() {
        let publisher = MemoryPublisher::default();
        let producer = Producer::new(source("[]"), publisher.clone(), "beers-stream");

        let result = producer
            .fetch_and_publish()
            .await
            .expect("invocation failed");

        assert_eq!(result.published, 0);
        assert!(publisher.calls().is_empty());
    }

    #[tokio::test]
    async fn it_reports_partial_publish_failures() {
        let publisher = MemoryPublisher {
            reject: vec![0, 2],
            ..Default::default()
        };
        let producer = Producer::new(
            source(r#"[{"id":1,"name":"A"},{"id":2,"name":"B"},{"id":3,"name":"C"}]"#),
            publisher.clone(),
            "beers-stream",
        );

        match producer.fetch_and_publish().await {
            Err(ProducerError::PartialPublishFailure { failed, total }) => {
                assert_eq!(failed, vec![0, 2]);
                assert_eq!(total, 3);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        // The whole batch went out in a single call, with no retry
        assert_eq!(publisher.calls().len(), 1);
        assert_eq!(publisher.calls()[0].1.len(), 3);
    }

    #[tokio::test]
    async fn it_propagates_transport_failures_unchanged() {
        let publisher = UnreachablePublisher::default();
        let producer = Producer::new(
            source(r#"[{"id":1,"name":"A"},{"id":2,"name":"B"}]"#),
            publisher.clone(),
            "beers-stream",
        );

        match producer.fetch_and_publish().await {
            Err(ProducerError::Transport(TransportError::TaskFailed(reason))) => {
                assert_eq!(reason, "broker connection refused");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        // One call, no retry and no per-record fallback
        assert_eq!(*publisher.calls.lock().unwrap(), 1);
    }
}
