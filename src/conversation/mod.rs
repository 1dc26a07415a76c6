use std::future::Future;

use aws_config::SdkConfig;
use aws_lambda_events::event::s3::{S3Event, S3EventRecord};
use lambda_runtime::{Error, LambdaEvent};
use tracing::{debug, info};

use crate::clients::AwsClients;
use crate::conversation::process::DocumentLocation;
use crate::error::ProcessError;
use crate::events::{ConversationAnalysisEvent, InvocationResponse};

pub mod collector;
pub mod config;
pub mod document;
pub mod process;

/// State built once per cold start and shared by every invocation.
pub struct Runtime {
    pub clients: AwsClients,
    pub collector: collector::Collector,
    pub config: config::Config,
}

/// Cold start for the conversation analysis function. Collector config is
/// read first, so a missing account id or insert key fails before
/// `load_aws_config` runs and before any client exists.
pub async fn init<F, Fut>(load_aws_config: F) -> Result<Runtime, Error>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = SdkConfig>,
{
    let mut config = config::Config::load_from_env()?;

    let aws_config = load_aws_config().await;
    let clients = AwsClients::new(&aws_config);

    // if the insert key provided is an ARN, get the key from Secrets Manager
    let api_key_value = config.api_key.token().to_string();
    if api_key_value.starts_with("arn:aws:secretsmanager:") {
        config.api_key = config::get_api_key_from_secrets_manager(&aws_config, api_key_value)
            .await
            .map_err(|e| e.to_string())?;
    };

    let collector = collector::Collector::new(&config);
    info!(endpoint = collector.uri(), "collector configured");

    Ok(Runtime {
        clients,
        collector,
        config,
    })
}

// lambda handler
pub async fn handler(
    clients: &AwsClients,
    collector: &collector::Collector,
    config: &config::Config,
    evt: LambdaEvent<ConversationAnalysisEvent>,
) -> Result<InvocationResponse, Error> {
    info!("Handling lambda invocation");
    debug!("Handling event payload: {:?}", evt.payload);

    let ConversationAnalysisEvent { s3, dry_run } = evt.payload;
    let locations = handle_s3_event(s3)?;
    let record_count = locations.len();

    let events = process::collect_events(&clients.s3, config, locations).await?;

    info!(
        records = record_count,
        events = events.len(),
        dry_run,
        "conversation analysis batch extracted"
    );

    if dry_run {
        info!("dry run invocation, skipping publish to {}", collector.uri());
    } else {
        collector.publish(&events).await?;
    }

    Ok(InvocationResponse::ok())
}

pub fn handle_s3_event(s3_event: S3Event) -> Result<Vec<DocumentLocation>, ProcessError> {
    debug!("S3 Event: {:?}", s3_event);
    s3_event.records.iter().map(document_location).collect()
}

fn document_location(record: &S3EventRecord) -> Result<DocumentLocation, ProcessError> {
    let bucket = record
        .s3
        .bucket
        .name
        .as_deref()
        .ok_or(ProcessError::MissingLocation("bucket name"))?;
    let key = record
        .s3
        .object
        .key
        .as_deref()
        .ok_or(ProcessError::MissingLocation("object key"))?;

    Ok(DocumentLocation {
        bucket: decode_component(bucket)?,
        key: decode_component(key)?,
    })
}

// s3 notifications encode spaces as '+'
fn decode_component(value: &str) -> Result<String, ProcessError> {
    percent_encoding::percent_decode_str(&value.replace('+', " "))
        .decode_utf8()
        .map(|decoded| decoded.to_string())
        .map_err(|e| ProcessError::InvalidLocation {
            value: value.to_string(),
            reason: format!("not valid utf-8 once decoded - {}", e),
        })
}
