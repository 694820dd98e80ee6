use serde::{Deserialize, Serialize};

/// A record handed to us by the delivery pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StreamRecord {
    /// Transport-assigned, echoed back untouched.
    #[serde(rename = "recordId")]
    pub record_id: String,
    /// Base64 text of the record as it was published.
    pub data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum OutcomeStatus {
    Ok,
    ProcessingFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OutcomeRecord {
    #[serde(rename = "recordId")]
    pub record_id: String,
    #[serde(rename = "result")]
    pub status: OutcomeStatus,
    /// Base64 text of the CSV line, only set when `status` is `Ok`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl OutcomeRecord {
    pub fn ok(record_id: String, data: String) -> Self {
        Self {
            record_id,
            status: OutcomeStatus::Ok,
            data: Some(data),
        }
    }

    pub fn failed(record_id: String) -> Self {
        Self {
            record_id,
            status: OutcomeStatus::ProcessingFailed,
            data: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TransformRequest {
    pub records: Vec<StreamRecord>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TransformResponse {
    pub records: Vec<OutcomeRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failed_outcomes_carry_no_data() {
        let record_id = "49546986683135544286507457936321625675700192471156785154";
        let value = serde_json::to_value(OutcomeRecord::failed(record_id.to_owned())).unwrap();

        assert_eq!(
            value,
            json!({
                "recordId": record_id,
                "result": "ProcessingFailed",
            })
        );
    }

    #[test]
    fn requests_ignore_unknown_keys() {
        let request: TransformRequest = serde_json::from_value(json!({
            "invocationId": "invocation-1",
            "deliveryStreamArn": "stream",
            "records": [{
                "recordId": "1",
                "approximateArrivalTimestamp": 1495072949453_i64,
                "data": "e30=",
            }],
        }))
        .unwrap();

        assert_eq!(
            request.records,
            vec![StreamRecord {
                record_id: "1".to_owned(),
                data: "e30=".to_owned(),
            }]
        );
    }
}
