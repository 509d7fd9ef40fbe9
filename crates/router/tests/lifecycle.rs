use http::{Method, StatusCode};
use micro_router::{
    handler_fn, middleware_fn, with_body, ChainError, Data, HandlerResult, MiddlewareContext, Request, RequestBody,
    Response, RouteContext, Router, RouterConfig,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

fn request(method: Method, uri: &str) -> Request {
    http::Request::builder().method(method).uri(uri).body(RequestBody::empty()).unwrap()
}

async fn text(response: Response) -> String {
    String::from_utf8(response.into_body().into_bytes().await.unwrap().to_vec()).unwrap()
}

async fn hi(ctx: RouteContext) -> HandlerResult {
    ctx.respond("hi")?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn direct_hit() {
    let mut builder = Router::builder();
    builder.get("/hello", handler_fn(hi)).unwrap();
    let router = builder.build();

    let response = router.handle(request(Method::GET, "/hello")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "hi");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn middleware_short_circuit() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut builder = Router::builder();
    builder
        .use_middleware(middleware_fn(|ctx: MiddlewareContext| async move {
            ctx.respond((StatusCode::PAYMENT_REQUIRED, "pay first"))?;
            Ok(())
        }))
        .unwrap();
    builder
        .get(
            "/paid",
            handler_fn(move |ctx: RouteContext| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    ctx.respond("content")?;
                    Ok(())
                }
            }),
        )
        .unwrap();
    let router = builder.build();

    let response = router.handle(request(Method::GET, "/paid")).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn missing_response() {
    let silent = || handler_fn(|_ctx: RouteContext| async move { Ok(()) });

    let mut builder = Router::builder();
    builder.get("/quiet", silent()).unwrap();
    let response = builder.build().handle(request(Method::GET, "/quiet")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let mut builder = Router::builder_with(RouterConfig::default().with_catch_errors(false));
    builder.get("/quiet", silent()).unwrap();
    let fault = builder.build().handle(request(Method::GET, "/quiet")).await.unwrap_err();
    assert!(matches!(fault, ChainError::HandlerDidNotRespond));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn namespace_middleware_ordering() {
    let mut builder = Router::builder();
    builder
        .namespace("/outer", |outer| {
            outer.use_middleware(middleware_fn(|ctx: MiddlewareContext| async move {
                ctx.expect_and_respond(Data::new().with("a", 1_i32), None).await?;
                Ok(())
            }))?;
            outer.namespace("/inner", |inner| {
                inner.use_middleware(middleware_fn(|ctx: MiddlewareContext| async move {
                    let a = ctx.data().get::<i32>("a").copied().ok_or("a is missing")?;
                    ctx.expect_and_respond(Data::new().with("b", a + 1), None).await?;
                    Ok(())
                }))?;
                inner.get("/leaf", handler_fn(|ctx: RouteContext| async move {
                    let a = ctx.data().get::<i32>("a").copied();
                    let b = ctx.data().get::<i32>("b").copied();
                    ctx.respond(format!("a={a:?} b={b:?}"))?;
                    Ok(())
                }))?;
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();
    let router = builder.build();

    let response = router.handle(request(Method::GET, "/outer/inner/leaf")).await.unwrap();
    assert_eq!(text(response).await, "a=Some(1) b=Some(2)");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn post_response_continuation() {
    let release = Arc::new(Notify::new());
    let finished = Arc::new(AtomicBool::new(false));

    let gate = Arc::clone(&release);
    let done = Arc::clone(&finished);
    let mut builder = Router::builder();
    builder
        .post(
            "/jobs",
            handler_fn(move |ctx: RouteContext| {
                let gate = Arc::clone(&gate);
                let done = Arc::clone(&done);
                async move {
                    ctx.respond((StatusCode::ACCEPTED, "queued"))?;
                    gate.notified().await;
                    done.store(true, Ordering::SeqCst);
                    Err("job failed after the response".into())
                }
            }),
        )
        .unwrap();
    let router = builder.build();

    let response = router.handle(request(Method::POST, "/jobs")).await.unwrap();
    assert!(!finished.load(Ordering::SeqCst));

    release.notify_one();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(finished.load(Ordering::SeqCst));

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(text(response).await, "queued");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn layers_run_in_order() {
    type Trace = Arc<Mutex<Vec<&'static str>>>;
    let trace: Trace = Arc::default();

    fn recording(trace: &Trace, name: &'static str, after: &'static str) -> impl micro_router::Middleware {
        let trace = Arc::clone(trace);
        middleware_fn(move |ctx: MiddlewareContext| {
            let trace = Arc::clone(&trace);
            async move {
                trace.lock().unwrap().push(name);
                ctx.pass(Data::new(), None).await?;
                ctx.await_downstream_settled().await??;
                trace.lock().unwrap().push(after);
                Ok(())
            }
        })
    }

    let mut builder = Router::builder();
    builder.use_middleware(recording(&trace, "m0 before", "m0 after")).unwrap();
    builder.use_middleware(recording(&trace, "m1 before", "m1 after")).unwrap();
    let handler_trace = Arc::clone(&trace);
    builder
        .get(
            "/",
            handler_fn(move |ctx: RouteContext| {
                let trace = Arc::clone(&handler_trace);
                async move {
                    ctx.respond("traced")?;
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    trace.lock().unwrap().push("h");
                    Ok(())
                }
            }),
        )
        .unwrap();
    let router = builder.build();

    for _ in 0..3 {
        trace.lock().unwrap().clear();
        let response = router.handle(request(Method::GET, "/")).await.unwrap();
        assert_eq!(text(response).await, "traced");

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(*trace.lock().unwrap(), ["m0 before", "m1 before", "h", "m1 after", "m0 after"]);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn second_commit_does_not_replace_response() {
    let mut builder = Router::builder();
    builder
        .get(
            "/twice",
            handler_fn(|ctx: RouteContext| async move {
                ctx.respond("first")?;
                let second = ctx.respond("second");
                assert!(matches!(second, Err(ChainError::ResponseAlreadyCommitted)));
                Ok(())
            }),
        )
        .unwrap();
    let router = builder.build();

    let response = router.handle(request(Method::GET, "/twice")).await.unwrap();
    assert_eq!(text(response).await, "first");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn unmatched_requests_reach_not_found_handler() {
    let registered = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&registered);

    let mut builder = Router::builder();
    builder
        .get(
            "/books/{id:number}",
            handler_fn(move |ctx: RouteContext| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    ctx.respond(())?;
                    Ok(())
                }
            }),
        )
        .unwrap();
    builder.not_found(handler_fn(|ctx: RouteContext| async move {
        ctx.respond((StatusCode::NOT_FOUND, format!("no page at {}", ctx.uri().path())))?;
        Ok(())
    }));
    let router = builder.build();

    for path in ["/books/abc", "/books", "/books/1/extra", "/authors"] {
        let response = router.handle(request(Method::GET, path)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(text(response).await, format!("no page at {path}"));
    }

    let response = router.handle(request(Method::GET, "/books/12/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(registered.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn control_flow_break_after_response_is_silent() {
    let settled_ok = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&settled_ok);

    let mut builder = Router::builder();
    builder
        .use_middleware(middleware_fn(move |ctx: MiddlewareContext| {
            let flag = Arc::clone(&flag);
            async move {
                ctx.pass(Data::new(), None).await?;
                flag.store(ctx.await_downstream_settled().await?.is_ok(), Ordering::SeqCst);
                Ok(())
            }
        }))
        .unwrap();
    builder
        .get(
            "/stop",
            handler_fn(|ctx: RouteContext| async move {
                ctx.respond("stopped")?;
                Err(ChainError::ControlFlowBreak.into())
            }),
        )
        .unwrap();
    let router = builder.build();

    let response = router.handle(request(Method::GET, "/stop")).await.unwrap();
    assert_eq!(text(response).await, "stopped");
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(settled_ok.load(Ordering::SeqCst));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn middleware_can_replace_the_request() {
    let mut builder = Router::builder();
    builder
        .use_middleware(middleware_fn(|ctx: MiddlewareContext| async move {
            let body = ctx.text().await?;
            let replaced = with_body(ctx.request(), RequestBody::from(body.to_uppercase()));
            ctx.expect_and_respond(Data::new(), Some(replaced)).await?;
            Ok(())
        }))
        .unwrap();
    builder
        .post(
            "/echo",
            handler_fn(|ctx: RouteContext| async move {
                let body = ctx.text().await?;
                ctx.respond(body)?;
                Ok(())
            }),
        )
        .unwrap();
    let router = builder.build();

    let request = http::Request::builder().method(Method::POST).uri("/echo").body(RequestBody::from("shout")).unwrap();
    let response = router.handle(request).await.unwrap();
    assert_eq!(text(response).await, "SHOUT");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timeout_middleware_races_proceed() {
    let mut builder = Router::builder();
    builder
        .use_middleware(middleware_fn(|ctx: MiddlewareContext| async move {
            match tokio::time::timeout(Duration::from_millis(20), ctx.proceed(Data::new(), None)).await {
                Ok(Ok(Some(response))) => ctx.commit_response(response)?,
                Ok(Ok(None)) => ctx.respond(StatusCode::BAD_GATEWAY)?,
                Ok(Err(fault)) => return Err(fault.into()),
                Err(_) => ctx.respond((StatusCode::GATEWAY_TIMEOUT, "too slow"))?,
            }
            Ok(())
        }))
        .unwrap();
    builder
        .get(
            "/slow",
            handler_fn(|ctx: RouteContext| async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                let _ = ctx.respond("eventually");
                Ok(())
            }),
        )
        .unwrap();
    builder.get("/fast", handler_fn(hi)).unwrap();
    let router = builder.build();

    let response = router.handle(request(Method::GET, "/slow")).await.unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

    let response = router.handle(request(Method::GET, "/fast")).await.unwrap();
    assert_eq!(text(response).await, "hi");
}
