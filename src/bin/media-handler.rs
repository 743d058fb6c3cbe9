use lambda_runtime::{service_fn, LambdaEvent};
use media_stream_handlers::{
    api::{self, ResolverResponse},
    utils::setup_tracing,
};
use serde_json::Value;
use tracing::{error, info_span, Instrument};

type E = Box<dyn std::error::Error + Sync + Send + 'static>;

#[tokio::main]
async fn main() -> Result<(), E> {
    setup_tracing();

    lambda_runtime::run(service_fn(handler)).await?;

    Ok(())
}

async fn handler(event: LambdaEvent<Value>) -> Result<ResolverResponse, E> {
    let (payload, context) = event.into_parts();
    let span = info_span!("invocation", correlation_id = %context.request_id);

    api::handle_media_event(payload)
        .instrument(span)
        .await
        .map_err(|err| {
            error!(request_id = %context.request_id, error = %err, "invocation failed");
            E::from(err)
        })
}
