//! Request dispatch.
//!
//! [`Router::handle`] resolves a request, runs the resulting chain and turns its
//! completion signals into a single response:
//!
//! - a committed response is returned as soon as it is available, the chain may still be
//!   running; a fault it reports afterwards is logged
//! - a chain that settles without responding yields a 500, or its fault when
//!   `catch_errors` is off
//! - an unmatched request runs the not-found handler, with a generated 404 if that
//!   handler fails to respond

use crate::chain::{compose, Next};
use crate::context::{Completion, RouteContext};
use crate::data::DataBag;
use crate::error::ChainError;
use crate::handler::{HandlerResult, RouteHandler};
use crate::method::normalize;
use crate::request::{PathParams, Request};
use crate::responder::{make_error, Response};
use crate::router::{Resolution, Router};
use async_trait::async_trait;
use http::header::{HeaderValue, ALLOW};
use http::{Method, StatusCode};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// The default not-found handler: `404 Not found {METHOD} {path}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFound;

#[async_trait]
impl RouteHandler for NotFound {
    async fn handle(&self, ctx: RouteContext) -> HandlerResult {
        ctx.commit_response(not_found(ctx.method(), ctx.uri().path()))?;
        Ok(())
    }
}

impl Router {
    /// Routes `request` and waits for its response.
    ///
    /// An `Err` is only returned when `catch_errors` is off and the chain failed
    /// without responding.
    pub async fn handle(&self, request: Request) -> Result<Response, ChainError> {
        let method = normalize(request.method());
        let path = request.uri().path().to_owned();

        match self.resolve(&method, &path) {
            Resolution::Matched(found) => {
                debug!(%method, path = %path, depth = found.depth(), "route matched");
                let chain = compose(&found.middleware, found.handler, Arc::new(found.params));
                self.run(chain, Arc::new(request)).await
            }
            Resolution::MethodNotAllowed(allowed) if self.config.method_not_allowed() => {
                debug!(%method, path = %path, "method not allowed");
                Ok(method_not_allowed(&allowed))
            }
            Resolution::MethodNotAllowed(_) | Resolution::NotFound => {
                debug!(%method, path = %path, "no route matched");
                Ok(self.run_not_found(method, path, request).await)
            }
        }
    }

    async fn run(&self, chain: Next, request: Arc<Request>) -> Result<Response, ChainError> {
        let completion = chain(DataBag::default(), request);

        if let Some(response) = completion.response().await {
            watch_after_response(completion);
            return Ok(response);
        }

        let fault = match completion.settled().await {
            Err(fault) => fault,
            Ok(()) => ChainError::HandlerDidNotRespond,
        };
        if self.config.catch_errors() {
            error!(cause = %fault, "request failed without a response, responding with 500");
            Ok(make_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"))
        } else {
            Err(fault)
        }
    }

    async fn run_not_found(&self, method: Method, path: String, request: Request) -> Response {
        let chain = compose(&[], Arc::clone(&self.not_found), Arc::new(PathParams::empty()));
        let completion = chain(DataBag::default(), Arc::new(request));

        if let Some(response) = completion.response().await {
            watch_after_response(completion);
            return response;
        }

        if let Err(fault) = completion.settled().await {
            warn!(cause = %fault, "not found handler failed, using the default response");
        }
        not_found(&method, &path)
    }
}

fn watch_after_response(completion: Completion) {
    tokio::spawn(async move {
        if let Err(fault) = completion.settled().await {
            error!(cause = %fault, "fault raised after the response was committed");
        }
    });
}

fn not_found(method: &Method, path: &str) -> Response {
    make_error(StatusCode::NOT_FOUND, format!("Not found {method} {path}"))
}

fn method_not_allowed(allowed: &[Method]) -> Response {
    let mut response = make_error(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    let names: Vec<_> = allowed.iter().map(Method::as_str).collect();
    if let Ok(value) = HeaderValue::from_str(&names.join(", ")) {
        response.headers_mut().insert(ALLOW, value);
    }
    response
}
