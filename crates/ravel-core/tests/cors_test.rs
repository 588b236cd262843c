//! CORS behavior over the wire: preflights, rejections, and error
//! responses that must still carry CORS headers.

use serde_json::json;
use ravel_core::prelude::*;
use ravel_core::testing::TestServer;
use ravel_core::BoxFuture;

fn cors_app(origin: CorsOrigin) -> App {
    let mut app = App::new();
    app.config_mut().cors.enabled = true;
    app.config_mut().cors.origin = origin;
    app
}

#[tokio::test]
async fn preflight_from_unlisted_origin_is_403() {
    let app = cors_app(CorsOrigin::List(vec!["https://allowed.com".to_string()]));
    let server = TestServer::start(app).await;

    let res = server
        .send_raw(b"OPTIONS /x HTTP/1.1\r\nHost: h\r\nOrigin: https://evil.com\r\n\r\n")
        .await;

    assert_eq!(res.status, 403);
    assert_eq!(
        res.body_str(),
        r#"{"error":"CORS: Origin not allowed","origin":"https://evil.com"}"#
    );
    assert_eq!(res.header("access-control-allow-origin"), None);
}

#[tokio::test]
async fn preflight_from_allowed_origin_short_circuits() {
    let mut app = cors_app(CorsOrigin::List(vec!["https://app.example".to_string()]));
    // A registered OPTIONS route must NOT run: the gate answers first.
    app.options("/x", |_ctx: &mut Context| -> BoxFuture<'_, HandlerResult> {
        Box::pin(async { Ok(Some(Payload::Text("user route".to_string()))) })
    })
    .unwrap();
    let server = TestServer::start(app).await;

    let res = server
        .send_raw(b"OPTIONS /x HTTP/1.1\r\nHost: h\r\nOrigin: https://app.example\r\n\r\n")
        .await;

    assert_eq!(res.status, 204);
    assert!(res.body.is_empty());
    assert_eq!(
        res.header("access-control-allow-origin"),
        Some("https://app.example")
    );
    assert_eq!(
        res.header("access-control-allow-methods"),
        Some("GET, HEAD, POST, PUT, PATCH, DELETE, OPTIONS")
    );
    assert_eq!(res.header("access-control-max-age"), Some("86400"));
}

#[tokio::test]
async fn preflight_continue_dispatches_user_options_route() {
    let mut app = cors_app(CorsOrigin::Any);
    app.config_mut().cors.preflight_continue = true;
    app.options("/x", |_ctx: &mut Context| -> BoxFuture<'_, HandlerResult> {
        Box::pin(async { Ok(Some(Payload::Text("user route".to_string())))  })
    })
    .unwrap();
    let server = TestServer::start(app).await;

    let res = server
        .send_raw(b"OPTIONS /x HTTP/1.1\r\nHost: h\r\nOrigin: https://a.example\r\n\r\n")
        .await;

    assert_eq!(res.body_str(), "user route");
    assert_eq!(res.header("access-control-allow-origin"), Some("*"));
}

#[tokio::test]
async fn simple_request_gets_origin_echoed() {
    let mut app = cors_app(CorsOrigin::Exact("https://app.example".to_string()));
    app.get("/data", |_ctx: &mut Context| -> BoxFuture<'_, HandlerResult> {
        Box::pin(async { Ok(Some(Payload::Json(json!({"ok": true})))) })
    })
    .unwrap();
    let server = TestServer::start(app).await;

    let res = server
        .send_raw(b"GET /data HTTP/1.1\r\nHost: h\r\nOrigin: https://app.example\r\n\r\n")
        .await;

    assert_eq!(res.status, 200);
    assert_eq!(
        res.header("access-control-allow-origin"),
        Some("https://app.example")
    );
    assert_eq!(res.header("access-control-allow-credentials"), Some("false"));
}

#[tokio::test]
async fn unauthorized_simple_request_runs_without_cors_headers() {
    let mut app = cors_app(CorsOrigin::Exact("https://app.example".to_string()));
    app.get("/data", |_ctx: &mut Context| -> BoxFuture<'_, HandlerResult> {
        Box::pin(async { Ok(Some(Payload::Text("served".to_string())))  })
    })
    .unwrap();
    let server = TestServer::start(app).await;

    let res = server
        .send_raw(b"GET /data HTTP/1.1\r\nHost: h\r\nOrigin: https://other.example\r\n\r\n")
        .await;

    assert_eq!(res.status, 200);
    assert_eq!(res.body_str(), "served");
    assert_eq!(res.header("access-control-allow-origin"), None);
}

#[tokio::test]
async fn error_responses_keep_cors_headers() {
    let mut app = cors_app(CorsOrigin::Any);
    app.get("/err", |_ctx: &mut Context| -> BoxFuture<'_, HandlerResult> {
        Box::pin(async { Err(RavelError::Handler("down".to_string())) })
    })
    .unwrap();
    let server = TestServer::start(app).await;

    let res = server
        .send_raw(b"GET /err HTTP/1.1\r\nHost: h\r\nOrigin: https://a.example\r\n\r\n")
        .await;

    assert_eq!(res.status, 500);
    assert_eq!(res.header("access-control-allow-origin"), Some("*"));
}

#[tokio::test]
async fn wildcard_with_credentials_fails_the_request() {
    let mut app = cors_app(CorsOrigin::Any);
    app.config_mut().cors.credentials = true;
    app.get("/data", |_ctx: &mut Context| -> BoxFuture<'_, HandlerResult> {
        Box::pin(async { Ok(Some(Payload::Text("never".to_string())))  })
    })
    .unwrap();
    let server = TestServer::start(app).await;

    let res = server
        .send_raw(b"GET /data HTTP/1.1\r\nHost: h\r\nOrigin: https://a.example\r\n\r\n")
        .await;

    // The configuration error surfaces on the first request.
    assert_eq!(res.status, 500);
    assert_eq!(
        res.body_str(),
        r#"{"success":false,"message":"Internal Server Error"}"#
    );
}

#[tokio::test]
async fn head_request_with_cors_gets_headers() {
    let mut app = cors_app(CorsOrigin::Any);
    app.get("/data", |_ctx: &mut Context| -> BoxFuture<'_, HandlerResult> {
        Box::pin(async { Ok(Some(Payload::Json(json!({"ok": true})))) })
    })
    .unwrap();
    let server = TestServer::start(app).await;

    let res = server
        .send_raw(b"HEAD /data HTTP/1.1\r\nHost: h\r\nOrigin: https://a.example\r\n\r\n")
        .await;

    assert_eq!(res.status, 200);
    assert!(res.body.is_empty());
    assert_eq!(res.header("access-control-allow-origin"), Some("*"));
}
