use std::collections::HashMap;
use std::fmt;

use aws_lambda_events::encodings::Base64Data;
use aws_lambda_events::event::firehose::{
    KinesisFirehoseResponse, KinesisFirehoseResponseRecord, KinesisFirehoseResponseRecordMetadata,
};
use base64::prelude::*;
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use tracing::{debug, info, warn};

use crate::error::ProcessError;
use crate::events::{StreamEvent, StreamRecord};

pub const RESULT_OK: &str = "Ok";
pub const RESULT_PROCESSING_FAILED: &str = "ProcessingFailed";

const LOG_TYPE_FIELD: &str = "logType";
const DURATION_FIELD: &str = "Duration";
const CONNECTED_FIELD: &str = "ConnectedToSystemTimestamp";
const DISCONNECT_FIELD: &str = "DisconnectTimestamp";

/// Coarse tag attached to contact center records.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogType {
    #[serde(rename = "agent-events")]
    AgentEvents,
    #[serde(rename = "ctr-events")]
    CtrEvents,
}

impl LogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogType::AgentEvents => "agent-events",
            LogType::CtrEvents => "ctr-events",
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn has_field(event: &Map<String, Value>, field: &str) -> bool {
    event.get(field).is_some_and(|v| !v.is_null())
}

/// Agent events carry `EventType`; contact trace records carry
/// `AWSContactTraceRecordVersion`. `EventType` is checked first.
pub fn classify(event: &Map<String, Value>) -> Option<LogType> {
    if has_field(event, "EventType") {
        return Some(LogType::AgentEvents);
    }

    if has_field(event, "AWSContactTraceRecordVersion") {
        return Some(LogType::CtrEvents);
    }

    None
}

// RFC 3339 strings or epoch milliseconds
fn parse_timestamp(value: &Value) -> Option<DateTime<FixedOffset>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s).ok(),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|dt| dt.fixed_offset()),
        _ => None,
    }
}

/// Seconds between connection and disconnect. May be negative.
pub fn compute_duration(event: &Map<String, Value>) -> Option<Number> {
    let connected = parse_timestamp(event.get(CONNECTED_FIELD)?)?;
    let disconnected = parse_timestamp(event.get(DISCONNECT_FIELD)?)?;

    let millis = (disconnected - connected).num_milliseconds();
    if millis % 1000 == 0 {
        Some(Number::from(millis / 1000))
    } else {
        Number::from_f64(millis as f64 / 1000.0)
    }
}

fn decode_payload(record: &StreamRecord) -> Result<Map<String, Value>, ProcessError> {
    let decode_error = |reason: String| ProcessError::Decode {
        record_id: record.record_id.clone(),
        reason,
    };

    let bytes = BASE64_STANDARD
        .decode(record.data.trim())
        .map_err(|e| decode_error(format!("invalid base64 - {}", e)))?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(decode_error(format!(
            "expected a json object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(decode_error(format!("invalid json - {}", e))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Tags the decoded record in place.
pub fn normalize(event: &mut Map<String, Value>) {
    match classify(event) {
        Some(log_type) => {
            event.insert(LOG_TYPE_FIELD.to_string(), log_type.as_str().into());
        }
        None => {
            event.remove(LOG_TYPE_FIELD);
        }
    }

    if let Some(duration) = compute_duration(event) {
        event.insert(DURATION_FIELD.to_string(), Value::Number(duration));
    }
}

fn try_process_record(record: &StreamRecord) -> Result<Vec<u8>, ProcessError> {
    let mut event = decode_payload(record)?;
    normalize(&mut event);
    debug!(record_id = %record.record_id, "normalized record: {:?}", event);
    Ok(serde_json::to_vec(&event)?)
}

fn response_record(record_id: &str, result: &str, data: Vec<u8>) -> KinesisFirehoseResponseRecord {
    KinesisFirehoseResponseRecord {
        record_id: Some(record_id.to_string()),
        result: Some(result.to_string()),
        data: Base64Data(data),
        metadata: KinesisFirehoseResponseRecordMetadata {
            partition_keys: HashMap::new(),
        },
    }
}

/// Normalizes one record. A record that cannot be decoded is handed back
/// as `ProcessingFailed` so the rest of the batch still flows. Its decoded
/// bytes are returned unchanged; when the payload is not valid base64 the raw
/// text is returned instead, which Firehose receives base64 encoded.
pub fn process_record(record: &StreamRecord) -> KinesisFirehoseResponseRecord {
    match try_process_record(record) {
        Ok(data) => response_record(&record.record_id, RESULT_OK, data),
        Err(error) => {
            warn!(%error, "failed to normalize stream record");
            let original = BASE64_STANDARD
                .decode(record.data.trim())
                .unwrap_or_else(|_| record.data.clone().into_bytes());
            response_record(&record.record_id, RESULT_PROCESSING_FAILED, original)
        }
    }
}

pub fn transform_stream_event(event: StreamEvent) -> KinesisFirehoseResponse {
    info!(total_records = event.records.len(), "stream transform start");

    let records: Vec<KinesisFirehoseResponseRecord> =
        event.records.iter().map(process_record).collect();

    let failed = records
        .iter()
        .filter(|r| r.result.as_deref() == Some(RESULT_PROCESSING_FAILED))
        .count();
    info!(
        total_records = records.len(),
        failed_records = failed,
        "stream transform complete"
    );

    KinesisFirehoseResponse { records }
}
