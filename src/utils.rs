use std::time;

use aws_config::{meta::region::RegionProviderChain, BehaviorVersion, SdkConfig};
use aws_smithy_types::timeout::TimeoutConfig;
use http::{header::CONTENT_TYPE, HeaderValue};
use lambda_http::{http::StatusCode, Response};
use serde_json::json;

pub const APPLICATION_JSON: &str = "application/json";
pub const APPLICATION_XML: &str = "application/xml";

pub fn setup_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .json()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to set tracing subscriber");
}

pub async fn setup_sdk_config() -> SdkConfig {
    let region_provider = RegionProviderChain::default_provider().or_else("us-east-1");
    let timeout_config = TimeoutConfig::builder()
        .operation_timeout(time::Duration::from_secs(2))
        .operation_attempt_timeout(time::Duration::from_secs(2))
        .read_timeout(time::Duration::from_secs(2))
        .connect_timeout(time::Duration::from_secs(2))
        .build();

    aws_config::defaults(BehaviorVersion::latest())
        .region(region_provider)
        .timeout_config(timeout_config)
        .load()
        .await
}

pub fn response(status_code: StatusCode, body: String) -> Response<String> {
    with_content_type(status_code, APPLICATION_JSON, body)
}

pub fn xml_response(status_code: StatusCode, body: String) -> Response<String> {
    with_content_type(status_code, APPLICATION_XML, body)
}

/// Error envelope used for every failed webhook request.
pub fn message_response(status_code: StatusCode, message: &str) -> Response<String> {
    response(status_code, json!({ "message": message }).to_string())
}

fn with_content_type(
    status_code: StatusCode,
    content_type: &'static str,
    body: String,
) -> Response<String> {
    let mut resp = Response::new(body);
    *resp.status_mut() = status_code;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    resp
}
