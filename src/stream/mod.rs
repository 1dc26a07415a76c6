use aws_lambda_events::event::firehose::KinesisFirehoseResponse;
use lambda_runtime::{Error, LambdaEvent};
use tracing::{debug, info};

use crate::events::StreamEvent;

pub mod process;

// stream record handler
pub async fn handler(evt: LambdaEvent<StreamEvent>) -> Result<KinesisFirehoseResponse, Error> {
    info!("Handling lambda invocation");
    debug!("Handling event payload: {:?}", evt.payload);
    Ok(process::transform_stream_event(evt.payload))
}
