//! Middleware composition.
//!
//! A matched route runs as a chain: the middleware collected from the enclosing
//! namespaces, outermost first, ending in the route handler. [`compose`] folds that list
//! into a single [`Next`] entry point. Every layer runs in its own task so that a layer
//! can respond and keep working while the layers above it move on.

use crate::context::{Completion, MiddlewareContext, RouteContext};
use crate::data::DataBag;
use crate::error::ChainError;
use crate::handler::{HandlerResult, Middleware, RouteHandler};
use crate::request::{PathParams, Request};
use async_trait::async_trait;
use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::debug;

/// Starts the remainder of a chain and returns its completion signals.
pub(crate) type Next = Arc<dyn Fn(DataBag, Arc<Request>) -> Completion + Send + Sync>;

pub(crate) fn compose(
    middleware: &[Arc<dyn Middleware>],
    handler: Arc<dyn RouteHandler>,
    params: Arc<PathParams>,
) -> Next {
    middleware.iter().rev().fold(terminal(handler, Arc::clone(&params)), |next, middleware| {
        layer(Arc::clone(middleware), Arc::clone(&params), next)
    })
}

fn terminal(handler: Arc<dyn RouteHandler>, params: Arc<PathParams>) -> Next {
    Arc::new(move |data: DataBag, request: Arc<Request>| {
        let ctx = RouteContext::new(request, Arc::clone(&params), data);
        let completion = ctx.completion().clone();
        tokio::spawn(run_handler(Arc::clone(&handler), ctx));
        completion
    })
}

fn layer(middleware: Arc<dyn Middleware>, params: Arc<PathParams>, next: Next) -> Next {
    Arc::new(move |data: DataBag, request: Arc<Request>| {
        let route = RouteContext::new(request, Arc::clone(&params), data);
        let ctx = MiddlewareContext::new(route, Arc::clone(&next));
        let completion = ctx.completion().clone();
        tokio::spawn(run_middleware(Arc::clone(&middleware), ctx));
        completion
    })
}

async fn run_handler(handler: Arc<dyn RouteHandler>, ctx: RouteContext) {
    let outcome = AssertUnwindSafe(handler.handle(ctx.clone())).catch_unwind().await;
    debug!(uri = %ctx.uri(), ok = matches!(outcome, Ok(Ok(()))), "handler finished");
    match outcome {
        Ok(Ok(())) => ctx.settle_with(|responded| if responded { Ok(()) } else { Err(ChainError::HandlerDidNotRespond) }),
        Ok(Err(e)) => ctx.settle(Err(ChainError::from_boxed(e))),
        Err(panic) => ctx.settle(Err(ChainError::panicked(panic))),
    }
}

async fn run_middleware(middleware: Arc<dyn Middleware>, ctx: MiddlewareContext) {
    let outcome = AssertUnwindSafe(middleware.handle(ctx.clone())).catch_unwind().await;
    debug!(uri = %ctx.uri(), ok = matches!(outcome, Ok(Ok(()))), "middleware finished");
    match outcome {
        Ok(Ok(())) => ctx.settle_implicitly().await,
        Ok(Err(e)) => ctx.settle(Err(ChainError::from_boxed(e))),
        Err(panic) => ctx.settle(Err(ChainError::panicked(panic))),
    }
}

/// Applies `middleware` directly to `handler`, producing a handler.
///
/// The result behaves like a one-middleware chain registered in place of `handler`:
/// the wrapped pair sees the caller's params and data, and its response and settlement
/// become the caller's.
pub fn wrap<M, H>(middleware: M, handler: H) -> Wrapped
where
    M: Middleware,
    H: RouteHandler,
{
    Wrapped { middleware: Arc::new(middleware), handler: Arc::new(handler) }
}

pub struct Wrapped {
    middleware: Arc<dyn Middleware>,
    handler: Arc<dyn RouteHandler>,
}

#[async_trait]
impl RouteHandler for Wrapped {
    async fn handle(&self, ctx: RouteContext) -> HandlerResult {
        let next = compose(&[Arc::clone(&self.middleware)], Arc::clone(&self.handler), ctx.params_arc());
        let inner = next(ctx.data().clone(), ctx.request_arc());

        if let Some(response) = inner.response().await {
            ctx.commit_response(response)?;
        }
        inner.settled().await?;
        Ok(())
    }
}

impl fmt::Debug for Wrapped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wrapped").finish_non_exhaustive()
    }
}
