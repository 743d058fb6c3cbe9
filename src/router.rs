use std::{collections::HashMap, future::Future};

use futures::{future::BoxFuture, FutureExt};
use http::{Method, Response, StatusCode};
use lambda_http::Request;
use matchit::{InsertError, Router};
use tracing::debug;

use crate::{errors::Error, utils::message_response};

pub type HandlerResponse = Result<Response<String>, Error>;

pub type BoxedHandler<'a> = Box<dyn Fn(Request) -> BoxFuture<'a, HandlerResponse> + Send + Sync + 'a>;

/// specialises the matchit.Router to dispatch Lambda function URL requests by method and path.
#[derive(Default)]
pub struct FunctionUrlRouter<'b> {
    routers: HashMap<Method, Router<BoxedHandler<'b>>>,
}

impl<'c> FunctionUrlRouter<'c> {
    pub fn new() -> Self {
        FunctionUrlRouter::default()
    }

    pub fn insert<F, Fut>(
        &mut self,
        method: Method,
        route: impl Into<String>,
        handler: F,
    ) -> Result<(), InsertError>
    where
        F: 'c + Send + Sync + (Fn(Request) -> Fut),
        Fut: 'c + Send + Future<Output = HandlerResponse>,
    {
        self.routers.entry(method).or_insert_with(Router::new).insert(
            route,
            Box::new(move |request| handler(request).boxed()),
        )
    }

    pub async fn handle(&self, request: Request) -> HandlerResponse {
        let router = match self.routers.get(request.method()) {
            Some(router) => router,
            None => return not_found(request),
        };

        let path = request.uri().path().to_owned();
        let handler = match router.at(&path) {
            Ok(matched) => matched.value,
            Err(_) => return not_found(request),
        };

        debug!(method = %request.method(), path = %path, "route matched");
        handler(request).await
    }
}

pub fn not_found(event: Request) -> HandlerResponse {
    Ok(message_response(
        StatusCode::NOT_FOUND,
        &format!("endpoint {} not found", event.uri().path()),
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use lambda_http::Body;

    use super::*;
    use crate::utils::response;

    async fn accepted(_: Request) -> HandlerResponse {
        Ok(response(StatusCode::ACCEPTED, String::from("{}")))
    }

    async fn ok(_: Request) -> HandlerResponse {
        Ok(response(StatusCode::OK, String::from("{}")))
    }

    fn request(method: Method, uri: &str) -> Request {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::Empty)
            .unwrap()
    }

    #[tokio::test]
    async fn dispatches_by_method_and_path() {
        let mut router = FunctionUrlRouter::new();
        router.insert(Method::GET, "/", ok).unwrap();
        router.insert(Method::POST, "/incoming-call", accepted).unwrap();

        let index = router
            .handle(request(Method::GET, "https://x.lambda-url.us-east-1.on.aws/"))
            .await
            .unwrap();
        assert_eq!(index.status(), StatusCode::OK);

        let call = router
            .handle(request(Method::POST, "https://x.lambda-url.us-east-1.on.aws/incoming-call"))
            .await
            .unwrap();
        assert_eq!(call.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn dispatches_to_capturing_closures() {
        let calls = Arc::new(AtomicUsize::new(0));

        let mut router = FunctionUrlRouter::new();
        let counter = calls.clone();
        router
            .insert(Method::POST, "/incoming-call", move |req| {
                counter.fetch_add(1, Ordering::SeqCst);
                accepted(req)
            })
            .unwrap();

        router
            .handle(request(Method::POST, "https://x.example/incoming-call"))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn duplicate_routes_are_rejected() {
        let mut router = FunctionUrlRouter::new();
        router.insert(Method::GET, "/", ok).unwrap();
        assert!(router.insert(Method::GET, "/", ok).is_err());
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() {
        let mut router = FunctionUrlRouter::new();
        router.insert(Method::POST, "/incoming-call", accepted).unwrap();

        let wrong_method = router
            .handle(request(Method::GET, "https://x.example/incoming-call"))
            .await
            .unwrap();
        assert_eq!(wrong_method.status(), StatusCode::NOT_FOUND);

        let wrong_path = router
            .handle(request(Method::POST, "https://x.example/nope"))
            .await
            .unwrap();
        assert_eq!(wrong_path.status(), StatusCode::NOT_FOUND);
        assert_eq!(wrong_path.body(), r#"{"message":"endpoint /nope not found"}"#);
    }
}
