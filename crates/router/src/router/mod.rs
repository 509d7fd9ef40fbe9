//! The router graph.
//!
//! A [`Router`] is a tree of namespaces. Each namespace owns an ordered list of
//! middleware, an ordered list of routes and an ordered list of child namespaces keyed
//! by a path prefix. Resolving a request walks the tree:
//!
//! 1. every child namespace whose prefix matches is tried in registration order, with
//!    the rest of the path; the first one that yields a match wins
//! 2. otherwise the namespace's own routes are scanned in registration order
//!
//! The middleware of a match is the concatenation of the middleware of every namespace
//! on the way down, outermost first. Path parameters accumulate the same way.

mod scope;

pub use scope::{MethodMap, RouterBuilder, Scope};

use crate::config::RouterConfig;
use crate::handler::{Middleware, RouteHandler};
use crate::method::{normalize, MethodSet};
use crate::pattern::{normalize_path, PathMatcher, PrefixMatch};
use crate::request::PathParams;
use http::Method;
use std::fmt;
use std::sync::Arc;

pub struct Router {
    pub(crate) root: Namespace,
    pub(crate) not_found: Arc<dyn RouteHandler>,
    pub(crate) config: RouterConfig,
}

#[derive(Default)]
pub(crate) struct Namespace {
    middleware: Vec<Arc<dyn Middleware>>,
    routes: Vec<Route>,
    children: Vec<(Arc<dyn PathMatcher>, Namespace)>,
}

struct Route {
    matcher: Arc<dyn PathMatcher>,
    methods: MethodSet,
    handler: Arc<dyn RouteHandler>,
}

/// A resolved route: its handler, the captured parameters and the middleware that
/// encloses it.
pub struct RouteMatch {
    pub(crate) handler: Arc<dyn RouteHandler>,
    pub(crate) params: PathParams,
    pub(crate) middleware: Vec<Arc<dyn Middleware>>,
}

/// The outcome of resolving a method and path.
#[derive(Debug)]
pub enum Resolution {
    Matched(RouteMatch),
    /// The path exists, but only for the listed methods.
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

impl Router {
    /// Resolves a request method and path.
    pub fn resolve(&self, method: &Method, path: &str) -> Resolution {
        self.root.resolve(&normalize(method), normalize_path(path))
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").field("root", &self.root).field("config", &self.config).finish()
    }
}

impl Namespace {
    fn resolve(&self, method: &Method, path: &str) -> Resolution {
        let mut allowed = Vec::new();

        for (prefix, child) in &self.children {
            let Some(PrefixMatch { params, rest }) = prefix.match_prefix(path) else {
                continue;
            };
            match child.resolve(method, &rest) {
                Resolution::Matched(found) => return Resolution::Matched(self.enclose(params, found)),
                Resolution::MethodNotAllowed(methods) => extend_unique(&mut allowed, &methods),
                Resolution::NotFound => {}
            }
        }

        for route in &self.routes {
            let Some(params) = route.matcher.match_exact(path) else {
                continue;
            };
            if route.methods.contains(method) {
                return Resolution::Matched(RouteMatch {
                    handler: Arc::clone(&route.handler),
                    params,
                    middleware: self.middleware.clone(),
                });
            }
            extend_unique(&mut allowed, route.methods.methods());
        }

        if allowed.is_empty() { Resolution::NotFound } else { Resolution::MethodNotAllowed(allowed) }
    }

    fn enclose(&self, params: PathParams, found: RouteMatch) -> RouteMatch {
        let mut middleware = self.middleware.clone();
        middleware.extend(found.middleware);
        RouteMatch { handler: found.handler, params: params.merge(found.params), middleware }
    }

    pub(crate) fn route_count(&self) -> usize {
        self.routes.len() + self.children.iter().map(|(_, child)| child.route_count()).sum::<usize>()
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let routes: Vec<_> = self.routes.iter().map(|r| format!("{} {}", r.methods, r.matcher.source())).collect();
        let children: Vec<_> = self.children.iter().map(|(prefix, child)| (prefix.source(), child)).collect();
        f.debug_struct("Namespace")
            .field("middleware", &self.middleware.len())
            .field("routes", &routes)
            .field("children", &children)
            .finish()
    }
}

impl RouteMatch {
    pub fn params(&self) -> &PathParams {
        &self.params
    }

    /// How many middleware layers enclose the handler.
    pub fn depth(&self) -> usize {
        self.middleware.len()
    }
}

impl fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMatch").field("params", &self.params).field("depth", &self.depth()).finish()
    }
}

fn extend_unique(allowed: &mut Vec<Method>, methods: &[Method]) {
    for method in methods {
        if !allowed.contains(method) {
            allowed.push(method.clone());
        }
    }
}
