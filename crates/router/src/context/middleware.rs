use crate::chain::Next;
use crate::context::{Completion, RouteContext, Settlement};
use crate::data::Data;
use crate::error::ChainError;
use crate::request::Request;
use crate::responder::Response;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

/// The context handed to a [`Middleware`](crate::Middleware).
///
/// It derefs to [`RouteContext`] for request access and for responding, and adds the
/// means to run the rest of the chain.
///
/// A middleware body that returns without settling explicitly is settled as follows:
///
/// - it never proceeded: `Ok` if it responded, otherwise
///   [`ChainError::MiddlewareDidNotProceed`]
/// - it proceeded but never awaited the downstream settlement: the middleware settles
///   once the downstream does, with the downstream error if there was one
/// - it awaited the downstream settlement: `Ok` if it responded
///
/// Any case where nobody responded ends with the downstream error or
/// [`ChainError::HandlerDidNotRespond`].
#[derive(Clone)]
pub struct MiddlewareContext {
    route: RouteContext,
    link: Arc<Link>,
}

struct Link {
    next: Next,
    downstream: Mutex<Option<Completion>>,
    awaited: AtomicBool,
}

impl MiddlewareContext {
    pub(crate) fn new(route: RouteContext, next: Next) -> Self {
        Self { route, link: Arc::new(Link { next, downstream: Mutex::new(None), awaited: AtomicBool::new(false) }) }
    }

    /// Runs the rest of the chain and waits for its response.
    ///
    /// `data` is added to what the next layer sees, and `request` replaces the request
    /// it sees when given. Resolves with `None` when the downstream settled without
    /// responding, its settlement then tells why.
    ///
    /// May be called once. The downstream starts when the returned future is first polled.
    pub async fn proceed(&self, data: Data, request: Option<Request>) -> Result<Option<Response>, ChainError> {
        let downstream = self.start_downstream(data, request)?;
        Ok(downstream.response().await)
    }

    /// Waits for the downstream to settle and reports how it ended.
    ///
    /// Once called, the middleware takes responsibility for the downstream outcome: its
    /// own settlement no longer inherits a downstream error.
    pub async fn await_downstream_settled(&self) -> Result<Settlement, ChainError> {
        let downstream = self.downstream().ok_or(ChainError::ProceedNotYetCalled)?;
        let settlement = downstream.settled().await;
        self.link.awaited.store(true, Ordering::Release);
        Ok(settlement)
    }

    /// Proceeds and commits the downstream response as this layer's response, if there
    /// is one. Returns whether a response was forwarded.
    pub async fn pass(&self, data: Data, request: Option<Request>) -> Result<bool, ChainError> {
        match self.proceed(data, request).await? {
            Some(response) => {
                self.commit_response(response)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Proceeds and insists on a response.
    ///
    /// When the downstream settles without one, its error is returned, or
    /// [`ChainError::HandlerDidNotRespond`] if it settled cleanly.
    pub async fn expect_response(&self, data: Data, request: Option<Request>) -> Result<Response, ChainError> {
        if let Some(response) = self.proceed(data, request).await? {
            return Ok(response);
        }
        self.await_downstream_settled().await??;
        Err(ChainError::HandlerDidNotRespond)
    }

    /// [`expect_response`](Self::expect_response), then commits the response here.
    pub async fn expect_and_respond(&self, data: Data, request: Option<Request>) -> Result<(), ChainError> {
        let response = self.expect_response(data, request).await?;
        self.commit_response(response)
    }

    /// Returns true once [`proceed`](Self::proceed) has started the downstream.
    pub fn has_proceeded(&self) -> bool {
        self.downstream().is_some()
    }

    fn downstream(&self) -> Option<Completion> {
        self.link.downstream.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn start_downstream(&self, data: Data, request: Option<Request>) -> Result<Completion, ChainError> {
        let mut slot = self.link.downstream.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            warn!(uri = %self.uri(), "proceed called more than once");
            return Err(ChainError::TooManyProceedCalls);
        }

        let data = self.data().extend(data)?;
        let request = request.map(Arc::new).unwrap_or_else(|| self.request_arc());
        let downstream = (self.link.next)(data, request);
        *slot = Some(downstream.clone());
        Ok(downstream)
    }

    /// Settles a body that returned `Ok` without settling itself.
    pub(crate) async fn settle_implicitly(&self) {
        if self.is_settled() {
            return;
        }

        let downstream = match self.downstream() {
            Some(downstream) => Some(downstream.settled().await),
            None => None,
        };
        let awaited = self.link.awaited.load(Ordering::Acquire);

        self.settle_with(|responded| match downstream {
            None if responded => Ok(()),
            None => Err(ChainError::MiddlewareDidNotProceed),
            Some(_) if responded && awaited => Ok(()),
            Some(result) if responded => result,
            Some(result) => result.and(Err(ChainError::HandlerDidNotRespond)),
        });
    }
}

impl Deref for MiddlewareContext {
    type Target = RouteContext;

    fn deref(&self) -> &Self::Target {
        &self.route
    }
}

impl fmt::Debug for MiddlewareContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareContext")
            .field("route", &self.route)
            .field("proceeded", &self.has_proceeded())
            .field("awaited", &self.link.awaited.load(Ordering::Relaxed))
            .finish()
    }
}
