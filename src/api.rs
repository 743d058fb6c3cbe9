use http::{header::CONTENT_TYPE, HeaderMap, StatusCode};
use lambda_http::{request::RequestContext, Request, RequestExt};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use crate::{
    config::WebhookConfig,
    errors::Error,
    router::HandlerResponse,
    signature::{parse_form, RequestValidator, SIGNATURE_HEADER},
    store::{fetch_parameters, table_handle, ParameterStore},
    twiml::{Noun, VoiceResponse},
    utils::{response, xml_response},
};

pub const GREETING: &str = "Please wait while we connect your call to the AI voice assistant, \
                            powered by Twilio and the OpenAI Realtime API";
pub const PROMPT: &str = "OK. you can start talking!";

/// Envelope returned by the endpoint resolver.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResolverResponse {
    pub status_code: u16,
    pub body: String,
}

/// Builds `https://{domain}/{stage}` from the invoking event.
pub fn resolve_endpoint(event: &Value) -> Result<ResolverResponse, Error> {
    let domain = required_field(event, "domain")?;
    let stage = required_field(event, "stage")?;

    let endpoint_url = format!("https://{}/{}", domain, stage);
    Ok(ResolverResponse {
        status_code: StatusCode::OK.as_u16(),
        body: json!({ "message": format!("Endpoint URL: {}", endpoint_url) }).to_string(),
    })
}

fn required_field<'a>(event: &'a Value, name: &str) -> Result<&'a str, Error> {
    event
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::input(format!("missing required field '{}'", name)))
}

/// Media handler entry point.
///
/// The table handle is warmed after the endpoint is resolved; it never
/// decides the outcome of the invocation.
#[instrument(skip_all)]
pub async fn handle_media_event(event: Value) -> Result<ResolverResponse, Error> {
    let resolved = resolve_endpoint(&event)?;
    match table_handle().await {
        Ok(table) => info!(table_name = table.table_name(), "Event received"),
        Err(err) => warn!(error = %err, "table handle unavailable"),
    }
    Ok(resolved)
}

#[instrument(skip_all)]
pub async fn index_page(_event: Request) -> HandlerResponse {
    Ok(response(
        StatusCode::OK,
        json!({ "message": "The function is running!" }).to_string(),
    ))
}

/// Answers an incoming Twilio call with TwiML connecting it to the media stream.
#[instrument(skip_all)]
pub async fn handle_incoming_call<S: ParameterStore + Sync>(
    store: &S,
    config: &WebhookConfig,
    event: Request,
) -> HandlerResponse {
    let keys = config.parameter_keys();
    let parameters = fetch_parameters(store, &keys).await?;

    validate_twilio_signature(parameters.get(&keys.twilio_auth_token)?, &event)?;
    respond_to_call(parameters.get(&keys.media_api_url)?)
}

pub fn respond_to_call(media_api_url: &str) -> HandlerResponse {
    // <Say> punctuation to improve text-to-speech flow
    let twiml = VoiceResponse::new()
        .say(GREETING)
        .pause(1)
        .say(PROMPT)
        .connect(vec![Noun::Stream {
            url: media_api_url.to_owned(),
        }]);

    Ok(xml_response(StatusCode::OK, twiml.to_string()))
}

pub fn validate_twilio_signature(token: &str, event: &Request) -> Result<(), Error> {
    let signature = match event
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|s| !s.is_empty())
    {
        Some(signature) => signature,
        None => return Err(Error::auth(format!("Missing {} header", SIGNATURE_HEADER))),
    };

    // full public URL as Twilio signs it, then the bare host + path form
    let candidates = [signed_url(event)?, signed_descriptor(event)?];
    let params = signed_params(event);
    let validator = RequestValidator::new(token);

    let body: &[u8] = event.body();
    if !candidates
        .iter()
        .any(|url| validator.validate(url, &params, body, signature))
    {
        warn!(url = %candidates[0], "signature mismatch");
        return Err(Error::auth("Invalid Twilio request signature"));
    }

    Ok(())
}

/// The public URL Twilio posted to: request context domain (or `Host`),
/// path and raw query.
pub fn signed_url(event: &Request) -> Result<String, Error> {
    let mut url = format!("https://{}", signed_descriptor(event)?);
    if let Some(query) = event.uri().query().filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(query);
    }
    Ok(url)
}

/// Target host + path, without scheme or query.
pub fn signed_descriptor(event: &Request) -> Result<String, Error> {
    Ok(format!("{}{}", request_host(event)?, event.uri().path()))
}

fn request_host(event: &Request) -> Result<String, Error> {
    let from_context = match event.request_context_ref() {
        Some(RequestContext::ApiGatewayV2(ctx)) => ctx.domain_name.clone(),
        _ => None,
    };
    from_context
        .or_else(|| host_header(event.headers()))
        .or_else(|| event.uri().host().map(str::to_owned))
        .ok_or_else(|| Error::unexpected("cannot determine request host"))
}

fn host_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(http::header::HOST)?
        .to_str()
        .ok()
        .map(str::to_owned)
}

/// POST parameters covered by the signature.
///
/// Form bodies contribute every field; JSON object bodies their top-level
/// members. Anything else is signed over the URL alone.
pub fn signed_params(event: &Request) -> Vec<(String, String)> {
    let content_type = event
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .unwrap_or("");
    let body: &[u8] = event.body();

    if content_type.starts_with("application/x-www-form-urlencoded") {
        return parse_form(&String::from_utf8_lossy(body));
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(members)) => members
            .into_iter()
            .flat_map(|(name, value)| {
                json_values(value)
                    .into_iter()
                    .map(move |v| (name.clone(), v))
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn json_values(value: Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s],
        Value::Array(items) => items.into_iter().flat_map(json_values).collect(),
        other => vec![other.to_string()],
    }
}
