//! Ordered interceptors wrapped around the router.
//!
//! `before` hooks run in registration order, `after` hooks in reverse, so the
//! first interceptor registered is the outermost one.

use http::{HeaderValue, Method, Response};
use lambda_http::{request::RequestContext, Request, RequestExt};
use tracing::{error, info, info_span, warn, Instrument};

use crate::{
    errors::Error,
    router::{FunctionUrlRouter, HandlerResponse},
    utils::message_response,
};

type E = Box<dyn std::error::Error + Sync + Send + 'static>;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Correlation id attached to the request by [`CorrelationId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestCorrelation(pub String);

/// What remains known about a request once it has been handed to the router.
#[derive(Debug, Clone)]
pub struct RequestSummary {
    pub method: Method,
    pub path: String,
    pub correlation_id: Option<String>,
}

impl RequestSummary {
    fn of(request: &Request) -> Self {
        RequestSummary {
            method: request.method().clone(),
            path: request.uri().path().to_owned(),
            correlation_id: request
                .extensions()
                .get::<RequestCorrelation>()
                .map(|c| c.0.clone()),
        }
    }
}

pub trait Middleware: Send + Sync {
    fn before(&self, _request: &mut Request) {}

    fn after(&self, _summary: &RequestSummary, _response: &mut Response<String>) {}
}

/// Tags each request with the platform request id and echoes it back.
pub struct CorrelationId;

impl CorrelationId {
    fn extract(request: &Request) -> Option<String> {
        let from_context = match request.request_context_ref() {
            Some(RequestContext::ApiGatewayV2(ctx)) => ctx.request_id.clone(),
            _ => None,
        };

        from_context.or_else(|| {
            ["x-amzn-requestid", "x-amzn-trace-id"]
                .iter()
                .find_map(|name| request.headers().get(*name)?.to_str().ok())
                .map(str::to_owned)
        })
    }
}

impl Middleware for CorrelationId {
    fn before(&self, request: &mut Request) {
        if let Some(id) = CorrelationId::extract(request) {
            request.extensions_mut().insert(RequestCorrelation(id));
        }
    }

    fn after(&self, summary: &RequestSummary, response: &mut Response<String>) {
        let Some(id) = &summary.correlation_id else {
            return;
        };
        if let Ok(value) = HeaderValue::from_str(id) {
            response.headers_mut().insert(CORRELATION_HEADER, value);
        }
    }
}

/// Logs request shape on the way in and the status on the way out.
///
/// Header values and bodies are never logged; they may carry signatures.
pub struct LogEvent;

impl Middleware for LogEvent {
    fn before(&self, request: &mut Request) {
        let header_names: Vec<&str> = request.headers().keys().map(|k| k.as_str()).collect();
        info!(
            method = %request.method(),
            path = %request.uri().path(),
            headers = ?header_names,
            "Event received"
        );
    }

    fn after(&self, summary: &RequestSummary, response: &mut Response<String>) {
        info!(
            method = %summary.method,
            path = %summary.path,
            status = response.status().as_u16(),
            "response sent"
        );
    }
}

#[derive(Default)]
pub struct Chain {
    layers: Vec<Box<dyn Middleware>>,
}

impl Chain {
    pub fn new() -> Self {
        Chain::default()
    }

    pub fn with(mut self, layer: impl Middleware + 'static) -> Self {
        self.layers.push(Box::new(layer));
        self
    }

    pub async fn handle(
        &self,
        router: &FunctionUrlRouter<'_>,
        mut request: Request,
    ) -> Result<Response<String>, E> {
        for layer in &self.layers {
            layer.before(&mut request);
        }

        let summary = RequestSummary::of(&request);
        let span = info_span!(
            "request",
            correlation_id = summary.correlation_id.as_deref().unwrap_or("-")
        );

        let result: HandlerResponse = router.handle(request).instrument(span.clone()).await;
        let mut response = span.in_scope(|| match result {
            Ok(response) => response,
            Err(err) => error_response(&err),
        });

        span.in_scope(|| {
            for layer in self.layers.iter().rev() {
                layer.after(&summary, &mut response);
            }
        });

        Ok(response)
    }
}

/// Logs `err` and turns it into the JSON error envelope.
pub fn error_response(err: &Error) -> Response<String> {
    if err.is_client_fault() {
        warn!(error = %err, "request rejected");
    } else {
        error!(error = %err, "request failed");
    }
    message_response(err.status_code(), &err.to_string())
}
