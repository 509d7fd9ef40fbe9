use crate::context::{MiddlewareContext, RouteContext};
use crate::error::BoxError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// What a handler or middleware body returns.
///
/// `Ok(())` means the body finished; whether that counts as success is decided by
/// whether it responded. See [`RouteContext`] for the settlement rules.
pub type HandlerResult = Result<(), BoxError>;

/// The terminal element of a chain.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RouteHandler: Send + Sync + 'static {
    async fn handle(&self, ctx: RouteContext) -> HandlerResult;
}

/// A non-terminal chain element, able to run code before and after the rest of the chain.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, ctx: MiddlewareContext) -> HandlerResult;
}

#[async_trait]
impl<H: RouteHandler + ?Sized> RouteHandler for Arc<H> {
    async fn handle(&self, ctx: RouteContext) -> HandlerResult {
        (**self).handle(ctx).await
    }
}

#[async_trait]
impl<H: RouteHandler + ?Sized> RouteHandler for Box<H> {
    async fn handle(&self, ctx: RouteContext) -> HandlerResult {
        (**self).handle(ctx).await
    }
}

#[async_trait]
impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    async fn handle(&self, ctx: MiddlewareContext) -> HandlerResult {
        (**self).handle(ctx).await
    }
}

/// an async Fn holder acting as a [`RouteHandler`]
pub struct FnHandler<F> {
    f: F,
}

pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(RouteContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> RouteHandler for FnHandler<F>
where
    F: Fn(RouteContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, ctx: RouteContext) -> HandlerResult {
        (self.f)(ctx).await
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").field("f", &std::any::type_name::<F>()).finish()
    }
}

/// an async Fn holder acting as a [`Middleware`]
pub struct FnMiddleware<F> {
    f: F,
}

pub fn middleware_fn<F, Fut>(f: F) -> FnMiddleware<F>
where
    F: Fn(MiddlewareContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    FnMiddleware { f }
}

#[async_trait]
impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(MiddlewareContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, ctx: MiddlewareContext) -> HandlerResult {
        (self.f)(ctx).await
    }
}

impl<F> fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMiddleware").field("f", &std::any::type_name::<F>()).finish()
    }
}
