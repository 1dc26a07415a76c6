use aws_lambda_events::event::s3::S3Event;
use serde::de::{self, Deserialize, Deserializer};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// S3 notification carrying stored conversation analysis documents, plus the
/// optional `isTest` flag used for dry-run invocations.
#[derive(Debug, Clone)]
pub struct ConversationAnalysisEvent {
    pub s3: S3Event,
    pub dry_run: bool,
}

impl<'de> Deserialize<'de> for ConversationAnalysisEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw_value: Value = Deserialize::deserialize(deserializer)?;
        debug!("raw_value: {:?}", raw_value);

        let dry_run = raw_value.get("isTest").is_some_and(is_truthy);
        let s3 = S3Event::deserialize(&raw_value).map_err(|e| {
            de::Error::custom(format!("unsupported event type: {e} - {raw_value}"))
        })?;

        Ok(ConversationAnalysisEvent { s3, dry_run })
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "false" && s != "0",
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Response returned to the invoker once a conversation batch has been handled.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvocationResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

impl InvocationResponse {
    pub fn ok() -> Self {
        InvocationResponse { status_code: 200 }
    }
}

/// Firehose transformation batch. Only the fields the normalizer reads are
/// modelled; `data` is kept encoded so a bad record can be isolated.
#[derive(serde::Deserialize, Debug, Clone, Default)]
pub struct StreamEvent {
    #[serde(default)]
    pub records: Vec<StreamRecord>,
}

#[derive(serde::Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct StreamRecord {
    pub record_id: String,
    pub data: String,
}
