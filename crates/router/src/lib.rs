//! An in-process HTTP request router with a two-signal request lifecycle.
//!
//! Requests are matched against a tree of namespaces and run through the middleware
//! collected on the way down before reaching a route handler. Each layer of that chain
//! reports two things independently: its response, and when its work has settled.
//! This lets a handler respond early and keep working, and lets middleware observe both
//! moments.
//!
//! ```no_run
//! use micro_router::{handler_fn, HandlerResult, RouteContext, Router};
//!
//! async fn hello(ctx: RouteContext) -> HandlerResult {
//!     let name = ctx.param("name").unwrap_or("world").to_owned();
//!     ctx.respond(format!("hello {name}"))?;
//!     Ok(())
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let mut builder = Router::builder();
//! builder.get("/hello/{name}", handler_fn(hello))?;
//! let router = builder.build();
//!
//! let request = http::Request::builder().uri("/hello/ann").body(Default::default())?;
//! let response = router.handle(request).await?;
//! assert_eq!(response.status(), 200);
//! # Ok(())
//! # }
//! ```

mod body;
mod chain;
mod config;
mod context;
mod data;
mod dispatcher;
mod error;
mod handler;
mod method;
mod request;
mod responder;

pub mod pattern;
pub mod router;
pub mod signal;

pub use body::RequestBody;
pub use body::ResponseBody;
pub use chain::wrap;
pub use chain::Wrapped;
pub use config::DuplicateRoutePolicy;
pub use config::RouterConfig;
pub use context::MiddlewareContext;
pub use context::RouteContext;
pub use context::Settlement;
pub use data::Data;
pub use data::DataBag;
pub use dispatcher::NotFound;
pub use error::BodyError;
pub use error::BoxError;
pub use error::ChainError;
pub use error::RouteError;
pub use handler::handler_fn;
pub use handler::middleware_fn;
pub use handler::FnHandler;
pub use handler::FnMiddleware;
pub use handler::HandlerResult;
pub use handler::Middleware;
pub use handler::RouteHandler;
pub use method::IntoMethodSet;
pub use method::MethodSet;
pub use request::with_body;
pub use request::PathParams;
pub use request::Request;
pub use responder::json_response;
pub use responder::make_error;
pub use responder::make_redirect;
pub use responder::Responder;
pub use responder::Response;
pub use pattern::Pattern;
pub use router::MethodMap;
pub use router::Resolution;
pub use router::Router;
pub use signal::Signal;
