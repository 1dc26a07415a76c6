use aws_config::BehaviorVersion;
use connect_analytics_shipper::events::{ConversationAnalysisEvent, StreamEvent};
use connect_analytics_shipper::{conversation, stream, FunctionMode};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    connect_analytics_shipper::set_up_logging();

    info!(
        "Initializing {} version {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let mode = FunctionMode::load_from_env()?;
    info!("function mode: {}", mode);

    match mode {
        FunctionMode::ConversationAnalysis => {
            let runtime = conversation::init(|| {
                aws_config::load_defaults(BehaviorVersion::v2023_11_09())
            })
            .await?;

            run(service_fn(
                |request: LambdaEvent<ConversationAnalysisEvent>| {
                    conversation::handler(
                        &runtime.clients,
                        &runtime.collector,
                        &runtime.config,
                        request,
                    )
                },
            ))
            .await
        }
        FunctionMode::EventStream => {
            run(service_fn(|request: LambdaEvent<StreamEvent>| stream::handler(request))).await
        }
    }
}
