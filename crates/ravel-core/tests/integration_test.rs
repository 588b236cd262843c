//! End-to-end tests over raw TCP against a live server.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::json;
use ravel_core::prelude::*;
use ravel_core::testing::TestServer;
use ravel_core::BoxFuture;

#[tokio::test]
async fn param_extraction() {
    let mut app = App::new();
    app.get("/users/:userId/posts/:postId", |ctx: &mut Context| {
        Box::pin(async move {
            let user = ctx.request.param("userId").unwrap_or_default();
            let post = ctx.request.param("postId").unwrap_or_default();
            Ok(Some(Payload::Json(json!({
                "userId": user,
                "postId": post,
            }))))
        })
    })
    .unwrap();

    let server = TestServer::start(app).await;
    let res = server
        .send_raw(b"GET /users/123/posts/456 HTTP/1.1\r\nHost: h\r\n\r\n")
        .await;

    assert_eq!(res.status, 200);
    assert_eq!(res.body_str(), r#"{"userId":"123","postId":"456"}"#);
    assert_eq!(res.header("content-type"), Some("application/json"));
}

fn api_data_handler(_ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move { Ok(Some(Payload::Json(json!({"data": "test"})))) })
}

#[tokio::test]
async fn head_is_derived_from_get() {
    let mut app = App::new();
    app.get("/api/data", api_data_handler).unwrap();

    let server = TestServer::start(app).await;
    let res = server
        .send_raw(b"HEAD /api/data HTTP/1.1\r\nHost: h\r\n\r\n")
        .await;

    assert_eq!(res.status, 200);
    assert_eq!(res.header("content-type"), Some("application/json"));
    assert_eq!(res.header("content-length"), Some("0"));
    assert!(res.body.is_empty());
}

#[tokio::test]
async fn unmatched_path_is_404() {
    let server = TestServer::start(App::new()).await;
    let res = server.get("/missing").await;

    assert_eq!(res.status, 404);
    assert_eq!(
        res.body_str(),
        r#"{"success":false,"message":"404 Not Found"}"#
    );
}

fn exploding_handler(_ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move { Err(RavelError::Handler("exploded".to_string())) })
}

#[tokio::test]
async fn throwing_handler_is_500() {
    let mut app = App::new();
    app.get("/err", exploding_handler).unwrap();

    let server = TestServer::start(app).await;
    let res = server.get("/err").await;

    assert_eq!(res.status, 500);
    assert_eq!(
        res.body_str(),
        r#"{"success":false,"message":"Internal Server Error"}"#
    );
}

fn noop_handler(_ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async { Ok(None) })
}

#[tokio::test]
async fn duplicate_parameterized_route_conflicts() {
    let mut app = App::new();
    app.get("/users/:id", noop_handler).unwrap();
    let err = app.get("/users/:userId", noop_handler).unwrap_err();
    assert!(err.to_string().contains("already exists for method GET"));
}

static HOOK_ORDER: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

fn hook_push(tag: &'static str) -> impl Fn(&mut Context) -> BoxFuture<'_, RavelResult<()>> {
    move |_ctx: &mut Context| {
        Box::pin(async move {
            HOOK_ORDER.lock().unwrap().push(tag);
            Ok(())
        })
    }
}

fn hook_order_handler(_ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        HOOK_ORDER.lock().unwrap().push("handler");
        Ok(Some(Payload::Text("ok".to_string())))
    })
}

#[tokio::test]
async fn hook_execution_order() {
    let mut app = App::new();
    app.before_all(hook_push("Gb1"));
    app.before_all(hook_push("Gb2"));
    app.after_all(hook_push("Ga1"));
    app.after_all(hook_push("Ga2"));

    {
        let mut grp = app.group("/grp");
        grp.before(hook_push("GRb"));
        grp.after(hook_push("GRa"));
        grp.route(
            Method::Get,
            "/t",
            hook_order_handler,
            RouteOptions::default()
                .before(hook_push("Rb"))
                .after(hook_push("Ra")),
        )
        .unwrap();
    }

    let server = TestServer::start(app).await;
    let res = server.get("/grp/t").await;
    assert_eq!(res.status, 200);

    let order = HOOK_ORDER.lock().unwrap().clone();
    assert_eq!(
        order,
        vec!["Gb1", "Gb2", "GRb", "Rb", "handler", "Ra", "GRa", "Ga1", "Ga2"]
    );
}

static DOS_HANDLER_RAN: AtomicBool = AtomicBool::new(false);

fn dos_handler(_ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async {
        DOS_HANDLER_RAN.store(true, Ordering::SeqCst);
        Ok(Some(Payload::Text("ran".to_string())))
    })
}

#[tokio::test]
async fn json_dos_limit_rejects_before_handler() {
    let mut app = App::new();
    app.config_mut().body_parser.json.max_string_length = 100;
    app.post("/x", dos_handler).unwrap();

    let server = TestServer::start(app).await;
    let body = format!(r#"{{"data":"{}"}}"#, "x".repeat(1000));
    let res = server
        .request(
            "POST",
            "/x",
            &[("Content-Type", "application/json")],
            body.as_bytes(),
        )
        .await;

    assert_eq!(res.status, 500);
    assert_eq!(
        res.body_str(),
        r#"{"success":false,"message":"Internal Server Error"}"#
    );
    assert!(!DOS_HANDLER_RAN.load(Ordering::SeqCst));
}

fn fine_handler(_ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async { Ok(Some(Payload::Text("fine".to_string()))) })
}

#[tokio::test]
async fn every_response_carries_defaults() {
    let mut app = App::new();
    app.get("/ok", fine_handler).unwrap();

    let server = TestServer::start(app).await;
    for path in ["/ok", "/nope"] {
        let res = server.get(path).await;
        assert_eq!(res.header("x-content-type-options"), Some("nosniff"));
        assert_eq!(res.header("x-frame-options"), Some("DENY"));
        assert_eq!(res.header("x-xss-protection"), Some("1; mode=block"));
        assert_eq!(
            res.header("referrer-policy"),
            Some("strict-origin-when-cross-origin")
        );
        assert!(res.header("date").unwrap().ends_with("GMT"));
        let declared: usize = res.header("content-length").unwrap().parse().unwrap();
        assert_eq!(declared, res.body.len());
        for value in res.headers.values() {
            assert!(!value.contains('\r') && !value.contains('\n'));
        }
    }
}

fn not_found_custom(ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        ctx.response.set_status(404)?;
        Ok(Some(Payload::Json(json!({"custom": "lost"}))))
    })
}

fn error_custom(ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        ctx.response.set_status(503)?;
        Ok(Some(Payload::Json(json!({"custom": "broken"}))))
    })
}

fn nope_handler(_ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async { Err(RavelError::Handler("nope".to_string())) })
}

#[tokio::test]
async fn custom_not_found_and_error_handlers() {
    let mut app = App::new();
    app.on_not_found(not_found_custom);
    app.on_error(error_custom);
    app.get("/err", nope_handler).unwrap();

    let server = TestServer::start(app).await;

    let res = server.get("/gone").await;
    assert_eq!(res.status, 404);
    assert_eq!(res.body_str(), r#"{"custom":"lost"}"#);

    let res = server.get("/err").await;
    assert_eq!(res.status, 503);
    assert_eq!(res.body_str(), r#"{"custom":"broken"}"#);
}

#[tokio::test]
async fn url_encoded_body_round_trip() {
    let mut app = App::new();
    app.post("/form", |ctx: &mut Context| {
        Box::pin(async move {
            let value = match &ctx.request.body {
                RequestBody::Form(fields) => fields.get("note").cloned().unwrap_or_default(),
                other => panic!("expected form body, got {other:?}"),
            };
            Ok(Some(Payload::Text(value)))
        })
    })
    .unwrap();

    let server = TestServer::start(app).await;
    let res = server
        .request(
            "POST",
            "/form",
            &[("Content-Type", "application/x-www-form-urlencoded")],
            b"note=hello+there%21&other=1",
        )
        .await;

    assert_eq!(res.status, 200);
    assert_eq!(res.body_str(), "hello there!");
}

#[tokio::test]
async fn multipart_upload_round_trip() {
    let mut app = App::new();
    app.post("/upload", |ctx: &mut Context| {
        Box::pin(async move {
            let (fields, files) = match &ctx.request.body {
                RequestBody::Multipart(form) => (form.fields.len(), form.files.clone()),
                other => panic!("expected multipart body, got {other:?}"),
            };
            let file = &files[0];
            Ok(Some(Payload::Json(json!({
                "fields": fields,
                "filename": file.filename,
                "size": file.size,
                "contentType": file.content_type,
            }))))
        })
    })
    .unwrap();

    let server = TestServer::start(app).await;
    let boundary = "----ravelboundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"caption\"\r\n\r\n\
         a photo\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n\
         Content-Type: text/plain\r\n\r\n\
         file-content\r\n\
         --{boundary}--\r\n"
    );
    let res = server
        .request(
            "POST",
            "/upload",
            &[(
                "Content-Type",
                &format!("multipart/form-data; boundary={boundary}"),
            )],
            body.as_bytes(),
        )
        .await;

    assert_eq!(res.status, 200);
    let json = res.json();
    assert_eq!(json["fields"], 1);
    assert_eq!(json["filename"], "a.txt");
    assert_eq!(json["size"], 12);
    assert_eq!(json["contentType"], "text/plain");
}

#[tokio::test]
async fn query_and_client_ip() {
    let mut app = App::new();
    app.config_mut().proxy_hops = 1;
    app.get("/who", |ctx: &mut Context| {
        Box::pin(async move {
            Ok(Some(Payload::Json(json!({
                "q": ctx.request.query_value("q").unwrap_or_default(),
                "ip": ctx.request.client_ip,
            }))))
        })
    })
    .unwrap();

    let server = TestServer::start(app).await;
    let res = server
        .send_raw(
            b"GET /who?q=hello%20world HTTP/1.1\r\nHost: h\r\nX-Forwarded-For: 203.0.113.9, 10.0.0.1\r\n\r\n",
        )
        .await;

    assert_eq!(res.status, 200);
    let json = res.json();
    assert_eq!(json["q"], "hello world");
    assert_eq!(json["ip"], "10.0.0.1");
}

#[tokio::test]
async fn sloppy_paths_are_normalized() {
    let mut app = App::new();
    app.get("/users/:id", |ctx: &mut Context| {
        Box::pin(async move {
            let id = ctx.request.param("id").unwrap_or_default().to_string();
            Ok(Some(Payload::Text(id)))
        })
    })
    .unwrap();

    let server = TestServer::start(app).await;
    let res = server.get("//users///7/").await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body_str(), "7");
}

fn hooked_header(ctx: &mut Context) -> BoxFuture<'_, RavelResult<()>> {
    Box::pin(async move {
        ctx.response.add_header("X-Hooked", "yes")?;
        Ok(())
    })
}

fn loud_handler(_ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async { Ok(Some(Payload::Text("loud".to_string()))) })
}

fn quiet_handler(_ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async { Ok(Some(Payload::Text("quiet".to_string()))) })
}

#[tokio::test]
async fn global_hook_filters_are_honored() {
    let mut app = App::new();
    app.before_all_filtered(hooked_header, HookFilter::exclude(&["/quiet"]));
    app.get("/loud", loud_handler).unwrap();
    app.get("/quiet", quiet_handler).unwrap();

    let server = TestServer::start(app).await;
    let res = server.get("/loud").await;
    assert_eq!(res.header("x-hooked"), Some("yes"));
    let res = server.get("/quiet").await;
    assert_eq!(res.header("x-hooked"), None);
}

#[tokio::test]
async fn body_larger_than_one_segment_is_read_fully() {
    let mut app = App::new();
    app.post("/big", |ctx: &mut Context| {
        Box::pin(async move {
            let len = match &ctx.request.body {
                RequestBody::Text(t) => t.len(),
                other => panic!("expected text body, got {other:?}"),
            };
            Ok(Some(Payload::Text(len.to_string())))
        })
    })
    .unwrap();

    let server = TestServer::start(app).await;
    let big = "z".repeat(100_000);
    let res = server
        .request("POST", "/big", &[("Content-Type", "text/plain")], big.as_bytes())
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body_str(), "100000");
}
