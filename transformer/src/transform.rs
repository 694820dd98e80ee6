use base64::engine::general_purpose;
use base64::Engine;
use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::{OutcomeRecord, StreamRecord};
use crate::decode::{decode, DecodeError};
use crate::normalize::{normalize, ValidationError};

/// Why a single record could not be transformed.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Decode, normalize and re-encode the payload of one stream record.
pub fn transform_record(data: &str) -> Result<String, TransformError> {
    let record = decode(data.as_bytes())?;
    let line = normalize(&record)?;

    Ok(general_purpose::STANDARD.encode(line.into_bytes()))
}

/// Transform a batch, one outcome per input record and in the same order.
///
/// A record that fails to decode or validate is reported as `ProcessingFailed` and does not
/// affect the rest of the batch.
pub fn transform(batch: Vec<StreamRecord>) -> Vec<OutcomeRecord> {
    histogram!("transformer_batch_size").record(batch.len() as f64);

    batch
        .into_iter()
        .map(|record| match transform_record(&record.data) {
            Ok(data) => {
                counter!("transformer_records_total", "result" => "ok").increment(1);
                debug!(record_id = %record.record_id, "transformed record");
                OutcomeRecord::ok(record.record_id, data)
            }
            Err(e) => {
                counter!("transformer_records_total", "result" => "processing_failed").increment(1);
                warn!(record_id = %record.record_id, "failed to transform record: {}", e);
                OutcomeRecord::failed(record.record_id)
            }
        })
        .collect()
}
