//! A small in-memory todo API on the raw Ravel engine.
//!
//! ```bash
//! cargo run --example todo_app
//! curl -s localhost:5000/api/todos
//! curl -s -X POST localhost:5000/api/todos -H 'Content-Type: application/json' -d '{"title":"write docs"}'
//! curl -s localhost:5000/api/todos/1
//! ```

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use ravel_core::prelude::*;
use ravel_core::BoxFuture;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);
static TODOS: Mutex<Vec<(u64, String)>> = Mutex::new(Vec::new());

fn welcome_handler(_ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        Ok(Some(Payload::Json(json!({
            "message": "ravel todo example",
            "endpoints": ["/api/todos", "/api/todos/:id"],
        }))))
    })
}

fn list_todos_handler(_ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let todos = TODOS.lock().unwrap();
        let items: Vec<_> = todos
            .iter()
            .map(|(id, title)| json!({ "id": id, "title": title }))
            .collect();
        Ok(Some(Payload::Json(json!(items))))
    })
}

fn request_logger(ctx: &mut Context) -> BoxFuture<'_, RavelResult<()>> {
    Box::pin(async move {
        tracing::info!(
            method = %ctx.request.method,
            path = %ctx.request.path,
            ip = %ctx.request.client_ip,
            "request"
        );
        Ok(())
    })
}

fn get_todo_handler(ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let id: u64 = ctx
            .request
            .param("id")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let todos = TODOS.lock().unwrap();
        match todos.iter().find(|(tid, _)| *tid == id) {
            Some((id, title)) => Ok(Some(Payload::Json(
                json!({ "id": id, "title": title }),
            ))),
            None => {
                ctx.response.set_status(404)?;
                Ok(Some(Payload::Json(json!({ "error": "todo not found" }))))
            }
        }
    })
}

fn create_todo_handler(ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let title = match &ctx.request.body {
            RequestBody::Json(v) => v["title"].as_str().unwrap_or("untitled").to_string(),
            _ => {
                ctx.response.set_status(400)?;
                return Ok(Some(Payload::Json(json!({ "error": "expected JSON" }))));
            }
        };
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        TODOS.lock().unwrap().push((id, title.clone()));
        ctx.response.set_status(201)?;
        Ok(Some(Payload::Json(json!({ "id": id, "title": title }))))
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let mut app = App::from_env();
    app.config_mut().cors.enabled = true;

    app.before_all(request_logger);

    app.get("/", welcome_handler)?;

    let mut api = app.group("/api");

    api.get("/todos", list_todos_handler)?;

    api.get("/todos/:id", get_todo_handler)?;

    api.post("/todos", create_todo_handler)?;

    drop(api);
    app.listen().await?;
    Ok(())
}
