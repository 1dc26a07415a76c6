use thiserror::Error;

/// Failures raised while turning incoming records into outgoing events.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to retrieve s3://{bucket}/{key} - {reason}")]
    Retrieval {
        bucket: String,
        key: String,
        reason: String,
    },
    #[error("conversation analysis document s3://{bucket}/{key} has an unexpected shape - {source}")]
    Shape {
        bucket: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("s3 event record is missing its {0}")]
    MissingLocation(&'static str),
    #[error("s3 event record location {value} cannot be decoded - {reason}")]
    InvalidLocation { value: String, reason: String },
    #[error("failed to reach metrics collector - {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to serialize events - {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to decode stream record {record_id} - {reason}")]
    Decode { record_id: String, reason: String },
}
