use axum::Json;
use tracing::debug;

use crate::api::{TransformRequest, TransformResponse};
use crate::transform::transform;

pub async fn post(Json(payload): Json<TransformRequest>) -> Json<TransformResponse> {
    debug!(records = payload.records.len(), "received transform batch");

    Json(TransformResponse {
        records: transform(payload.records),
    })
}
