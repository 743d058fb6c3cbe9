use aws_sdk_ssm::Client;
use http::Method;
use lambda_http::{service_fn, Request};
use media_stream_handlers::{
    api,
    config::WebhookConfig,
    middleware::{Chain, CorrelationId, LogEvent},
    router::FunctionUrlRouter,
    store::SsmParameterStore,
    utils::{setup_sdk_config, setup_tracing},
};
use tracing::info;

type E = Box<dyn std::error::Error + Sync + Send + 'static>;

#[tokio::main]
async fn main() -> Result<(), E> {
    setup_tracing();

    let config = WebhookConfig::from_env()?;
    let sdk_config = setup_sdk_config().await;
    let store = SsmParameterStore::new(Client::new(&sdk_config));

    let mut router = FunctionUrlRouter::new();
    router.insert(Method::GET, "/", api::index_page)?;
    router.insert(Method::POST, "/incoming-call", |r| {
        api::handle_incoming_call(&store, &config, r)
    })?;

    let chain = Chain::new().with(CorrelationId).with(LogEvent);

    info!(
        system_name = %config.system_name,
        env_type = %config.env_type,
        "webhook handler starting"
    );
    lambda_http::run(service_fn(|request: Request| chain.handle(&router, request))).await?;

    Ok(())
}
