//! Periodically fetch a batch of records from the source API and publish it to Kafka.
use std::time::Duration;

use envconfig::Envconfig;
use eyre::Result;
use metrics::counter;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use ingest_producer::config::Config;
use ingest_producer::error::ProducerError;
use ingest_producer::handlers;
use ingest_producer::producer::{Producer, PublishResult};
use ingest_producer::publisher::{KafkaPublisher, StreamPublisher};
use ingest_producer::source::{HttpSource, RecordSource};

fn setup_tracing() {
    let log_layer = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(log_layer).init();
}

fn record_outcome(result: &Result<PublishResult, ProducerError>) {
    match result {
        Ok(result) => {
            counter!("producer_invocations_total", "outcome" => "ok").increment(1);
            info!("invocation published {} records", result.published);
        }
        Err(e) => {
            counter!("producer_invocations_total", "outcome" => e.kind()).increment(1);
            error!("invocation failed: {}", e);
        }
    }
}

async fn invocation_loop<S: RecordSource, P: StreamPublisher>(
    producer: Producer<S, P>,
    interval_secs: u64,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;
        // A failed invocation is not retried, the next tick is a fresh one
        record_outcome(&producer.fetch_and_publish().await);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_tracing();

    let config = Config::init_from_env()?;

    let source = HttpSource::new(&config.source_url, config.source_timeout_ms.0)?;
    let publisher = KafkaPublisher::new(&config.kafka).await?;
    let producer = Producer::new(source, publisher, config.stream_name.as_str());

    if config.producer_interval_secs == 0 {
        let result = producer.fetch_and_publish().await;
        record_outcome(&result);
        result?;
        return Ok(());
    }

    let recorder_handle = if config.export_prometheus {
        Some(common_metrics::setup_metrics_recorder()?)
    } else {
        None
    };
    let app = handlers::app(recorder_handle);
    let bind = config.bind();
    info!("listening on {}", bind);

    tokio::select! {
        res = common_metrics::serve(app, &bind) => {
            if let Err(e) = res {
                error!("failed to start ingest-producer http server, {}", e);
                return Err(e.into());
            }
        }
        _ = invocation_loop(producer, config.producer_interval_secs) => {
            error!("ingest-producer invocation loop exited");
        }
    }

    Ok(())
}
