use super::{Namespace, Route, Router};
use crate::config::{DuplicateRoutePolicy, RouterConfig};
use crate::dispatcher::NotFound;
use crate::error::RouteError;
use crate::handler::{Middleware, RouteHandler};
use crate::method::{IntoMethodSet, MethodSet};
use crate::pattern::{IntoMatcher, PathMatcher};
use http::Method;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::{debug, warn};

/// Registration handle for one namespace.
///
/// Middleware must be registered before anything else: once a route or a child
/// namespace has been added the scope is locked and
/// [`use_middleware`](Self::use_middleware) fails with
/// [`RouteError::LockedNamespace`].
pub struct Scope {
    node: Namespace,
    label: String,
    inherited: Vec<String>,
    policy: DuplicateRoutePolicy,
    locked: bool,
}

macro_rules! method_route {
    ($name:ident, $method:ident) => {
        #[doc = concat!("Registers `handler` for ", stringify!($method), " requests on `pattern`.")]
        pub fn $name<P, H>(&mut self, pattern: P, handler: H) -> Result<&mut Self, RouteError>
        where
            P: IntoMatcher,
            H: RouteHandler,
        {
            self.route(Method::$method, pattern, handler)
        }
    };
}

impl Scope {
    fn new(label: String, inherited: Vec<String>, policy: DuplicateRoutePolicy) -> Self {
        Self { node: Namespace::default(), label, inherited, policy, locked: false }
    }

    /// Appends a middleware to this namespace.
    pub fn use_middleware<M: Middleware>(&mut self, middleware: M) -> Result<&mut Self, RouteError> {
        if self.locked {
            return Err(RouteError::locked_namespace(&self.label));
        }
        self.node.middleware.push(Arc::new(middleware));
        Ok(self)
    }

    /// Registers `handler` for `methods` on `pattern`.
    pub fn route<S, P, H>(&mut self, methods: S, pattern: P, handler: H) -> Result<&mut Self, RouteError>
    where
        S: IntoMethodSet,
        P: IntoMatcher,
        H: RouteHandler,
    {
        let methods = methods.into_method_set()?;
        let matcher = pattern.into_matcher()?;
        self.insert(methods, matcher, Arc::new(handler))?;
        Ok(self)
    }

    /// Registers `handler` for one method, the dynamic counterpart of [`get`](Self::get)
    /// and friends.
    pub fn on<P, H>(&mut self, method: Method, pattern: P, handler: H) -> Result<&mut Self, RouteError>
    where
        P: IntoMatcher,
        H: RouteHandler,
    {
        self.route(method, pattern, handler)
    }

    /// Registers `handler` for every method on `pattern`.
    pub fn any<P, H>(&mut self, pattern: P, handler: H) -> Result<&mut Self, RouteError>
    where
        P: IntoMatcher,
        H: RouteHandler,
    {
        self.route(MethodSet::Any, pattern, handler)
    }

    /// Registers every handler of `map` on `pattern`.
    pub fn route_map<P: IntoMatcher>(&mut self, pattern: P, map: MethodMap) -> Result<&mut Self, RouteError> {
        let matcher = pattern.into_matcher()?;
        for (method, handler) in map.entries {
            self.insert(method.into_method_set()?, Arc::clone(&matcher), handler)?;
        }
        Ok(self)
    }

    /// Adds a child namespace under `prefix` and lets `build` populate it.
    ///
    /// The child sees its own middleware after this namespace's middleware, and
    /// requests reach it with `prefix` stripped from the path.
    pub fn namespace<P, F>(&mut self, prefix: P, build: F) -> Result<&mut Self, RouteError>
    where
        P: IntoMatcher,
        F: FnOnce(&mut Scope) -> Result<(), RouteError>,
    {
        let prefix = prefix.into_matcher()?;
        self.check_params(prefix.as_ref())?;

        let mut inherited = self.inherited.clone();
        inherited.extend(prefix.param_names().iter().cloned());

        let mut child = Scope::new(self.join(prefix.source()), inherited, self.policy);
        build(&mut child)?;

        debug!(namespace = %child.label, routes = child.node.route_count(), "namespace registered");
        self.locked = true;
        self.node.children.push((prefix, child.node));
        Ok(self)
    }

    method_route!(get, GET);
    method_route!(post, POST);
    method_route!(put, PUT);
    method_route!(delete, DELETE);
    method_route!(patch, PATCH);
    method_route!(head, HEAD);
    method_route!(options, OPTIONS);
    method_route!(trace, TRACE);
    method_route!(connect, CONNECT);

    fn insert(
        &mut self,
        methods: MethodSet,
        matcher: Arc<dyn PathMatcher>,
        handler: Arc<dyn RouteHandler>,
    ) -> Result<(), RouteError> {
        self.check_params(matcher.as_ref())?;

        let duplicate = self
            .node
            .routes
            .iter()
            .filter(|route| route.matcher.shape() == matcher.shape())
            .find_map(|route| route.methods.overlap(&methods));
        if let Some(overlap) = duplicate {
            let pattern = self.join(matcher.source());
            match self.policy {
                DuplicateRoutePolicy::Reject => return Err(RouteError::duplicate_route(overlap, pattern)),
                DuplicateRoutePolicy::Warn => warn!(methods = %overlap, pattern = %pattern, "duplicate route registered"),
            }
        }

        self.locked = true;
        self.node.routes.push(Route { matcher, methods, handler });
        Ok(())
    }

    fn check_params(&self, matcher: &dyn PathMatcher) -> Result<(), RouteError> {
        match matcher.param_names().iter().find(|name| self.inherited.contains(*name)) {
            Some(name) => Err(RouteError::duplicate_param(name, self.join(matcher.source()))),
            None => Ok(()),
        }
    }

    fn join(&self, source: &str) -> String {
        match (self.label.as_str(), source) {
            ("/", source) => source.to_owned(),
            (label, "/") => label.to_owned(),
            (label, source) => format!("{label}{source}"),
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope").field("label", &self.label).field("locked", &self.locked).field("node", &self.node).finish()
    }
}

/// Handlers keyed by method, registered on one pattern with
/// [`Scope::route_map`].
#[derive(Default)]
pub struct MethodMap {
    entries: Vec<(Method, Arc<dyn RouteHandler>)>,
}

impl MethodMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<H: RouteHandler>(mut self, method: Method, handler: H) -> Self {
        self.entries.push((method, Arc::new(handler)));
        self
    }
}

impl fmt::Debug for MethodMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter().map(|(method, _)| method)).finish()
    }
}

/// Assembles a [`Router`].
///
/// The builder derefs to the root [`Scope`], so routes, middleware and namespaces are
/// registered on it directly.
pub struct RouterBuilder {
    root: Scope,
    not_found: Option<Arc<dyn RouteHandler>>,
    config: RouterConfig,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        Self::builder_with(RouterConfig::default())
    }

    pub fn builder_with(config: RouterConfig) -> RouterBuilder {
        RouterBuilder {
            root: Scope::new("/".to_owned(), Vec::new(), config.duplicate_routes()),
            not_found: None,
            config,
        }
    }
}

impl RouterBuilder {
    /// Replaces the handler for requests that match no route.
    pub fn not_found<H: RouteHandler>(&mut self, handler: H) -> &mut Self {
        self.not_found = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> Router {
        let root = self.root.node;
        debug!(routes = root.route_count(), "router built");
        Router { root, not_found: self.not_found.unwrap_or_else(|| Arc::new(NotFound)), config: self.config }
    }
}

impl Deref for RouterBuilder {
    type Target = Scope;

    fn deref(&self) -> &Self::Target {
        &self.root
    }
}

impl DerefMut for RouterBuilder {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.root
    }
}

impl fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterBuilder").field("root", &self.root).field("config", &self.config).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RouteContext;
    use crate::handler::{handler_fn, HandlerResult};
    use crate::router::Resolution;

    async fn ok(ctx: RouteContext) -> HandlerResult {
        ctx.respond(())?;
        Ok(())
    }

    fn depth(router: &Router, method: Method, path: &str) -> Option<usize> {
        match router.resolve(&method, path) {
            Resolution::Matched(found) => Some(found.depth()),
            _ => None,
        }
    }

    #[test]
    fn methods_and_trailing_slash() {
        let mut builder = Router::builder();
        builder.get("/path", handler_fn(ok)).unwrap();
        builder.on(Method::from_bytes(b"purge").unwrap(), "/cache", handler_fn(ok)).unwrap();
        let router = builder.build();

        assert!(matches!(router.resolve(&Method::GET, "/path/"), Resolution::Matched(_)));
        assert!(matches!(router.resolve(&Method::from_bytes(b"PURGE").unwrap(), "/cache"), Resolution::Matched(_)));
        assert!(matches!(router.resolve(&Method::POST, "/path"), Resolution::MethodNotAllowed(m) if m == [Method::GET]));
        assert!(matches!(router.resolve(&Method::GET, "/nope"), Resolution::NotFound));
    }

    #[test]
    fn namespaces_stack_params_and_middleware() {
        let pass = crate::handler::middleware_fn(|ctx: crate::MiddlewareContext| async move {
            ctx.pass(Default::default(), None).await?;
            Ok(())
        });

        let mut builder = Router::builder();
        builder.use_middleware(pass).unwrap();
        builder
            .namespace("/users/{user}", |users| {
                users.get("/", handler_fn(ok))?;
                users.namespace("/posts", |posts| {
                    posts.get("/{post:number}", handler_fn(ok))?;
                    Ok(())
                })?;
                Ok(())
            })
            .unwrap();
        let router = builder.build();

        let Resolution::Matched(found) = router.resolve(&Method::GET, "/users/ann/posts/3") else {
            panic!("expected a match");
        };
        assert_eq!(found.params().get("user"), Some("ann"));
        assert_eq!(found.params().get("post"), Some("3"));
        assert_eq!(found.depth(), 1);

        assert_eq!(depth(&router, Method::GET, "/users/ann"), Some(1));
        assert_eq!(depth(&router, Method::GET, "/users/ann/posts/x"), None);
    }

    #[test]
    fn unmatched_namespace_falls_through() {
        let mut builder = Router::builder();
        builder
            .namespace("/", |root| {
                root.get("/a", handler_fn(ok))?;
                Ok(())
            })
            .unwrap();
        builder.get("/b", handler_fn(ok)).unwrap();
        let router = builder.build();

        assert_eq!(depth(&router, Method::GET, "/a"), Some(0));
        assert_eq!(depth(&router, Method::GET, "/b"), Some(0));
    }

    #[test]
    fn middleware_after_route_is_locked() {
        let mut builder = Router::builder();
        builder.get("/", handler_fn(ok)).unwrap();
        let result = builder.use_middleware(crate::handler::middleware_fn(|_ctx: crate::MiddlewareContext| async move {
            Ok(())
        }));
        assert!(matches!(result, Err(RouteError::LockedNamespace { prefix }) if prefix == "/"));
    }

    #[test]
    fn duplicates_follow_policy() {
        let mut builder = Router::builder();
        builder.get("/x", handler_fn(ok)).unwrap();
        builder.post("/x", handler_fn(ok)).unwrap();
        let result = builder.route([Method::PUT, Method::GET], "/x/", handler_fn(ok));
        assert!(matches!(result, Err(RouteError::DuplicateRoute { method, pattern }) if method == "GET" && pattern == "/x"));

        let mut builder = Router::builder_with(RouterConfig::default().with_duplicate_routes(DuplicateRoutePolicy::Warn));
        builder.get("/x", handler_fn(ok)).unwrap();
        assert!(builder.get("/x", handler_fn(ok)).is_ok());
    }

    #[test]
    fn renamed_params_are_still_duplicates() {
        let mut builder = Router::builder();
        builder.get("/book/{id}", handler_fn(ok)).unwrap();
        let result = builder.get("/book/{bookId}", handler_fn(ok));
        assert!(matches!(result, Err(RouteError::DuplicateRoute { method, pattern }) if method == "GET" && pattern == "/book/{bookId}"));

        // a numeric segment matches a narrower set of paths
        assert!(builder.get("/book/{id:number}", handler_fn(ok)).is_ok());
        assert!(builder.get("/book/{page:number}/", handler_fn(ok)).is_err());
    }

    #[test]
    fn repeated_param_names_are_rejected() {
        let mut builder = Router::builder();
        let result = builder.namespace("/orgs/{id}", |orgs| {
            orgs.get("/repos/{id}", handler_fn(ok))?;
            Ok(())
        });
        assert!(matches!(result, Err(RouteError::DuplicateParam { name, pattern }) if name == "id" && pattern == "/orgs/{id}/repos/{id}"));
    }

    #[test]
    fn method_map_registers_each_method() {
        let mut builder = Router::builder();
        builder.route_map("/item", MethodMap::new().on(Method::GET, handler_fn(ok)).on(Method::DELETE, handler_fn(ok))).unwrap();
        let router = builder.build();

        assert!(matches!(router.resolve(&Method::DELETE, "/item"), Resolution::Matched(_)));
        assert!(matches!(
            router.resolve(&Method::PUT, "/item"),
            Resolution::MethodNotAllowed(m) if m == [Method::GET, Method::DELETE]
        ));
    }
}
