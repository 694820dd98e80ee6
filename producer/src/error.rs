use thiserror::Error;

use crate::publisher::TransportError;

/// Enumeration of errors that end a producer invocation.
#[derive(Error, Debug)]
pub enum ProducerError {
    #[error("record source is unavailable: {0}")]
    SourceUnavailable(String),
    #[error("record source returned an invalid payload: {0}")]
    InvalidSourcePayload(String),
    #[error("{} out of {total} records could not be published", .failed.len())]
    PartialPublishFailure { failed: Vec<usize>, total: usize },
    #[error("stream transport error: {0}")]
    Transport(#[from] TransportError),
}

impl ProducerError {
    /// Short label used to tag metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProducerError::SourceUnavailable(_) => "source_unavailable",
            ProducerError::InvalidSourcePayload(_) => "invalid_source_payload",
            ProducerError::PartialPublishFailure { .. } => "partial_publish_failure",
            ProducerError::Transport(_) => "transport",
        }
    }
}
