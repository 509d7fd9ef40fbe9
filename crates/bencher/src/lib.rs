use http::Method;
use micro_router::{handler_fn, middleware_fn, Data, HandlerResult, MiddlewareContext, RouteContext, RouteError, Router};

#[derive(Debug, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    method: Method,
    path: &'static str,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, method: Method, path: &'static str) -> Self {
        Self { name, group, method, path }
    }

    pub fn shallow(name: &'static str, method: Method, path: &'static str) -> Self {
        Self::new(name, TestGroup::Shallow, method, path)
    }

    pub fn nested(name: &'static str, method: Method, path: &'static str) -> Self {
        Self::new(name, TestGroup::Nested, method, path)
    }

    pub fn missing(name: &'static str, method: Method, path: &'static str) -> Self {
        Self::new(name, TestGroup::Missing, method, path)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &'static str {
        self.path
    }

    pub fn request(&self) -> micro_router::Request {
        let mut request = http::Request::new(micro_router::RequestBody::empty());
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = http::Uri::from_static(self.path);
        request
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Shallow,
    Nested,
    Missing,
}

pub fn test_cases() -> Vec<TestCase> {
    vec![
        TestCase::shallow("root", Method::GET, "/"),
        TestCase::shallow("static", Method::GET, "/health"),
        TestCase::nested("param", Method::GET, "/api/v1/users/42"),
        TestCase::nested("deep", Method::PUT, "/api/v1/users/42/posts/7"),
        TestCase::nested("wildcard", Method::GET, "/assets/css/site/main.css"),
        TestCase::missing("unknown", Method::GET, "/api/v1/nothing/here"),
    ]
}

async fn ok(ctx: RouteContext) -> HandlerResult {
    ctx.respond(())?;
    Ok(())
}

async fn forward(ctx: MiddlewareContext) -> HandlerResult {
    ctx.expect_and_respond(Data::new(), None).await?;
    Ok(())
}

/// A router shaped like a small api: a few top-level routes and two levels of
/// namespaces with a middleware on each.
pub fn sample_router() -> Result<Router, RouteError> {
    let mut builder = Router::builder();
    builder.get("/", handler_fn(ok))?;
    builder.get("/health", handler_fn(ok))?;
    builder.get("/assets/{*file}", handler_fn(ok))?;
    builder.namespace("/api/{version}", |api| {
        api.use_middleware(middleware_fn(forward))?;
        api.get("/status", handler_fn(ok))?;
        api.namespace("/users", |users| {
            users.use_middleware(middleware_fn(forward))?;
            users.get("/", handler_fn(ok))?;
            users.post("/", handler_fn(ok))?;
            users.get("/{id:number}", handler_fn(ok))?;
            users.route([Method::PUT, Method::PATCH], "/{id:number}/posts/{post}", handler_fn(ok))?;
            Ok(())
        })?;
        Ok(())
    })?;
    Ok(builder.build())
}
