//! Per-layer lifecycle state.
//!
//! Every layer of a chain (each middleware and the terminal handler) runs with its own
//! context. A context carries two independent completion signals:
//!
//! - the **response** signal resolves when the layer commits a response, or with `None`
//!   when the layer settles without one
//! - the **settlement** signal resolves when the layer's work is finished, successfully
//!   or with a [`ChainError`]
//!
//! They are decoupled on purpose: a handler may respond early and keep working, and its
//! settlement only resolves once that work is done.
//!
//! When a body returns without settling explicitly the chain settles it:
//!
//! | body outcome                      | settlement                              |
//! |-----------------------------------|-----------------------------------------|
//! | handler `Ok`, responded           | `Ok`                                    |
//! | handler `Ok`, did not respond     | [`ChainError::HandlerDidNotRespond`]    |
//! | body `Err(e)`                     | `Err(e)`                                |
//! | body panicked                     | [`ChainError::Panicked`]                |
//! | [`ChainError::ControlFlowBreak`]  | `Ok` if the layer responded             |
//!
//! Middleware settlement additionally depends on `proceed`, see [`MiddlewareContext`].

mod middleware;

pub use middleware::MiddlewareContext;

use crate::data::DataBag;
use crate::error::{BodyError, BoxError, ChainError};
use crate::request::{PathParams, Request};
use crate::responder::{Responder, Response};
use crate::signal::Signal;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, Method, Uri};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, warn};

/// How a layer's invocation ended.
pub type Settlement = Result<(), ChainError>;

/// The pair of signals a layer exposes to whoever started it.
///
/// Only the starting side holds one: taking the response is destructive.
#[derive(Clone, Default)]
pub(crate) struct Completion {
    response: Signal<Option<Response>>,
    settlement: Signal<Settlement>,
}

impl Completion {
    /// Waits for the layer's response and takes it.
    ///
    /// Resolves with `None` when the layer settled without responding, or when the
    /// response has already been taken.
    pub(crate) async fn response(&self) -> Option<Response> {
        self.response.take().await
    }

    /// Waits for the layer to settle.
    pub(crate) async fn settled(&self) -> Settlement {
        self.settlement.read().await
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.settlement.is_written()
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("response", &self.response)
            .field("settlement", &self.settlement.peek())
            .finish()
    }
}

/// The context handed to a [`RouteHandler`](crate::RouteHandler).
///
/// Cloning is cheap, all clones refer to the same layer.
#[derive(Clone)]
pub struct RouteContext {
    inner: Arc<Inner>,
}

struct Inner {
    request: Arc<Request>,
    params: Arc<PathParams>,
    data: DataBag,
    completion: Completion,
    responded: AtomicBool,
}

impl RouteContext {
    pub(crate) fn new(request: Arc<Request>, params: Arc<PathParams>, data: DataBag) -> Self {
        Self {
            inner: Arc::new(Inner {
                request,
                params,
                data,
                completion: Completion::default(),
                responded: AtomicBool::new(false),
            }),
        }
    }

    pub fn request(&self) -> &Request {
        &self.inner.request
    }

    pub(crate) fn request_arc(&self) -> Arc<Request> {
        Arc::clone(&self.inner.request)
    }

    pub fn method(&self) -> &Method {
        self.inner.request.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.request.uri()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.request.headers()
    }

    pub fn params(&self) -> &PathParams {
        &self.inner.params
    }

    pub(crate) fn params_arc(&self) -> Arc<PathParams> {
        Arc::clone(&self.inner.params)
    }

    /// Shorthand for `self.params().get(name)`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.inner.params.get(name)
    }

    pub fn data(&self) -> &DataBag {
        &self.inner.data
    }

    /// Deserializes the query string. A missing query string reads as empty.
    pub fn query<T: DeserializeOwned>(&self) -> Result<T, serde_qs::Error> {
        serde_qs::from_str(self.uri().query().unwrap_or_default())
    }

    /// Consumes the request body as UTF-8 text.
    pub async fn text(&self) -> Result<String, BodyError> {
        let bytes = self.request().body().bytes().await?;
        String::from_utf8(bytes.into()).map_err(|_| BodyError::NotUtf8)
    }

    /// Consumes the request body as JSON. The content type must be JSON as well.
    pub async fn json<T: DeserializeOwned>(&self) -> Result<T, BodyError> {
        let is_json = self
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<mime::Mime>().ok())
            .is_some_and(|media| {
                media.type_() == mime::APPLICATION
                    && (media.subtype() == mime::JSON || media.suffix() == Some(mime::JSON))
            });
        if !is_json {
            return Err(BodyError::NotJson);
        }

        let bytes = self.request().body().bytes().await?;
        serde_json::from_slice(&bytes).map_err(BodyError::json)
    }

    pub(crate) fn completion(&self) -> &Completion {
        &self.inner.completion
    }

    /// Commits `response` as this layer's response.
    ///
    /// Fails with [`ChainError::ResponseAlreadyCommitted`] on a second commit and with
    /// [`ChainError::ContextSettled`] once the layer has settled without a response.
    pub fn commit_response(&self, response: Response) -> Result<(), ChainError> {
        let committed = self
            .inner
            .completion
            .response
            .write_then(Some(response), || self.inner.responded.store(true, Ordering::Release));
        if committed.is_err() {
            let fault = if self.is_responded() {
                ChainError::ResponseAlreadyCommitted
            } else {
                ChainError::ContextSettled
            };
            warn!(cause = %fault, uri = %self.uri(), "response rejected");
            return Err(fault);
        }
        Ok(())
    }

    /// Converts `responder` and commits it.
    pub fn respond<R: Responder>(&self, responder: R) -> Result<(), ChainError> {
        self.commit_response(responder.into_response())
    }

    /// Marks the invocation as finished before the body returns.
    pub fn settle_ok(&self) {
        self.settle(Ok(()));
    }

    /// Marks the invocation as failed before the body returns.
    pub fn settle_err<E: Into<BoxError>>(&self, error: E) {
        self.settle(Err(ChainError::from_boxed(error.into())));
    }

    pub fn is_responded(&self) -> bool {
        self.inner.responded.load(Ordering::Acquire)
    }

    pub fn is_settled(&self) -> bool {
        self.inner.completion.is_settled()
    }

    /// Resolves the settlement signal, first closing the response signal.
    ///
    /// Only the first settlement counts. A failure reported after that has nowhere left
    /// to go and is logged.
    pub(crate) fn settle(&self, result: Settlement) {
        self.settle_with(|_| result);
    }

    /// Settles with the outcome `decide` picks once it is known for good whether the
    /// layer responded.
    pub(crate) fn settle_with<F>(&self, decide: F)
    where
        F: FnOnce(bool) -> Settlement,
    {
        // closing the response signal fixes the answer, no commit can land after it
        let responded = self.inner.completion.response.write(None).is_err() && self.is_responded();

        let result = match decide(responded) {
            Err(ChainError::ControlFlowBreak) if responded => Ok(()),
            other => other,
        };

        if let Err(Err(fault)) = self.inner.completion.settlement.write(result) {
            error!(cause = %fault, uri = %self.uri(), "fault raised after the context settled");
        }
    }
}

impl fmt::Debug for RouteContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteContext")
            .field("method", self.method())
            .field("uri", self.uri())
            .field("params", self.params())
            .field("data", self.data())
            .field("responded", &self.is_responded())
            .field("settled", &self.is_settled())
            .finish()
    }
}
