use http::{Method, StatusCode};
use micro_router::{
    handler_fn, json_response, make_error, middleware_fn, Data, HandlerResult, MiddlewareContext, RequestBody,
    RouteContext, Router,
};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Serialize)]
struct Profile<'a> {
    user: &'a str,
    id: u32,
}

// logs when the response is ready and again once every layer below has finished
async fn access_log(ctx: MiddlewareContext) -> HandlerResult {
    let started = Instant::now();
    let responded = ctx.pass(Data::new(), None).await?;
    info!(uri = %ctx.uri(), responded, elapsed = ?started.elapsed(), "response ready");

    let settlement = ctx.await_downstream_settled().await?;
    info!(uri = %ctx.uri(), ok = settlement.is_ok(), elapsed = ?started.elapsed(), "request settled");
    Ok(())
}

async fn authenticate(ctx: MiddlewareContext) -> HandlerResult {
    match ctx.headers().get("x-user").and_then(|value| value.to_str().ok()) {
        Some(user) => {
            let user = user.to_owned();
            ctx.expect_and_respond(Data::new().with("user", user), None).await?;
        }
        None => ctx.commit_response(make_error(StatusCode::UNAUTHORIZED, "missing x-user"))?,
    }
    Ok(())
}

async fn hello(ctx: RouteContext) -> HandlerResult {
    ctx.respond("hello world")?;
    Ok(())
}

async fn profile(ctx: RouteContext) -> HandlerResult {
    let user = ctx.data().get::<String>("user").map_or("anonymous", String::as_str);
    let id = ctx.params().parse("id").unwrap_or_default();
    ctx.commit_response(json_response(&Profile { user, id })?)?;
    Ok(())
}

async fn report(ctx: RouteContext) -> HandlerResult {
    ctx.respond((StatusCode::ACCEPTED, "report queued"))?;
    // keeps working after the caller already has its response
    tokio::time::sleep(Duration::from_millis(50)).await;
    info!("report generated");
    Ok(())
}

fn request(method: Method, uri: &str, user: Option<&str>) -> micro_router::Request {
    let mut builder = http::Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user", user);
    }
    builder.body(RequestBody::empty()).expect("valid request")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut builder = Router::builder();
    builder.use_middleware(middleware_fn(access_log))?;
    builder.get("/", handler_fn(hello))?;
    builder.namespace("/api", |api| {
        api.use_middleware(middleware_fn(authenticate))?;
        api.get("/profile/{id:number}", handler_fn(profile))?;
        api.post("/reports", handler_fn(report))?;
        Ok(())
    })?;
    let router = builder.build();

    let requests = [
        request(Method::GET, "/", None),
        request(Method::GET, "/api/profile/7", Some("ann")),
        request(Method::GET, "/api/profile/7", None),
        request(Method::POST, "/api/reports", Some("bob")),
        request(Method::GET, "/nowhere", None),
    ];

    for request in requests {
        let uri = request.uri().clone();
        let response = router.handle(request).await?;
        let status = response.status();
        let body = response.into_body().into_bytes().await?;
        info!(%uri, %status, body = %String::from_utf8_lossy(&body), "dispatched");
    }

    // let the report handler finish its background work
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}
