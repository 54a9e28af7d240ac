use super::*;
use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, put},
    Json, Router,
};
use serde_json::{json, Value};
use shared::domain::{TaskPriority, TaskStatus};
use tokio::{net::TcpListener, sync::Mutex as AsyncMutex};

#[derive(Clone, Default)]
struct Captured {
    query: Arc<AsyncMutex<Option<HashMap<String, String>>>>,
    auth_header: Arc<AsyncMutex<Option<String>>>,
    body: Arc<AsyncMutex<Option<Value>>>,
    path_id: Arc<AsyncMutex<Option<String>>>,
}

fn task_json(id: &str) -> Value {
    json!({
        "_id": id,
        "title": format!("task {id}"),
        "status": "pending",
        "priority": "medium",
        "createdAt": "2024-06-01T10:00:00Z"
    })
}

async fn record_auth(captured: &Captured, headers: &HeaderMap) {
    *captured.auth_header.lock().await = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(String::from);
}

async fn handle_list(
    State(captured): State<Captured>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Json<Value> {
    *captured.query.lock().await = Some(params);
    record_auth(&captured, &headers).await;
    Json(json!({
        "data": {
            "tasks": [task_json("a1"), task_json("a2")],
            "pagination": { "total": 14, "pages": 2 }
        }
    }))
}

async fn handle_create(
    State(captured): State<Captured>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    record_auth(&captured, &headers).await;
    *captured.body.lock().await = Some(body);
    Json(json!({ "data": { "task": task_json("created-1") } }))
}

async fn handle_update(
    State(captured): State<Captured>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    *captured.path_id.lock().await = Some(id.clone());
    *captured.body.lock().await = Some(body);
    Json(json!({ "data": { "task": task_json(&id) } }))
}

async fn handle_delete(State(captured): State<Captured>, Path(id): Path<String>) -> StatusCode {
    *captured.path_id.lock().await = Some(id);
    StatusCode::OK
}

async fn spawn_api_server() -> Result<(String, Captured)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let captured = Captured::default();
    let app = Router::new()
        .route("/tasks", get(handle_list).post(handle_create))
        .route("/tasks/:id", put(handle_update).delete(handle_delete))
        .with_state(captured.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), captured))
}

async fn spawn_rejecting_server(status: StatusCode, body: Value) -> Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new().fallback(move || {
        let body = body.clone();
        async move { (status, Json(body)) }
    });
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

#[tokio::test]
async fn list_sends_only_set_filters_and_bearer_token() {
    let (server_url, captured) = spawn_api_server().await.expect("spawn server");
    let store = HttpTaskStore::new(server_url, AuthSession::with_token("tok-123"));

    let page = store
        .list(&TaskListQuery {
            page: 1,
            limit: 10,
            status: Some(TaskStatus::Pending),
            priority: None,
            search: None,
        })
        .await
        .expect("list");

    let params = captured.query.lock().await.clone().expect("query captured");
    assert_eq!(params.get("page").map(String::as_str), Some("1"));
    assert_eq!(params.get("limit").map(String::as_str), Some("10"));
    assert_eq!(params.get("status").map(String::as_str), Some("pending"));
    assert!(!params.contains_key("priority"));
    assert!(!params.contains_key("search"));

    let auth = captured.auth_header.lock().await.clone();
    assert_eq!(auth.as_deref(), Some("Bearer tok-123"));

    assert_eq!(page.items.len(), 2);
    assert_eq!(page.total_count, 14);
    assert_eq!(page.page_count, 2);
}

#[tokio::test]
async fn anonymous_requests_carry_no_authorization_header() {
    let (server_url, captured) = spawn_api_server().await.expect("spawn server");
    let store = HttpTaskStore::new(server_url, AuthSession::new());

    store
        .list(&TaskListQuery {
            page: 1,
            limit: 10,
            status: None,
            priority: None,
            search: None,
        })
        .await
        .expect("list");

    assert_eq!(captured.auth_header.lock().await.clone(), None);
}

#[tokio::test]
async fn create_posts_only_provided_fields() {
    let (server_url, captured) = spawn_api_server().await.expect("spawn server");
    let store = HttpTaskStore::new(server_url, AuthSession::with_token("tok"));

    let task = store
        .create(&NewTask::titled("buy milk"))
        .await
        .expect("create");
    assert_eq!(task.id.0, "created-1");

    let body = captured.body.lock().await.clone().expect("body captured");
    assert_eq!(body, json!({ "title": "buy milk" }));
}

#[tokio::test]
async fn update_puts_patch_to_the_task_path() {
    let (server_url, captured) = spawn_api_server().await.expect("spawn server");
    let store = HttpTaskStore::new(server_url, AuthSession::with_token("tok"));

    let patch = TaskPatch {
        status: Some(TaskStatus::Completed),
        priority: Some(TaskPriority::High),
        ..TaskPatch::default()
    };
    let task = store
        .update(&TaskId("t-9".to_string()), &patch)
        .await
        .expect("update");
    assert_eq!(task.id.0, "t-9");

    assert_eq!(captured.path_id.lock().await.as_deref(), Some("t-9"));
    let body = captured.body.lock().await.clone().expect("body captured");
    assert_eq!(body, json!({ "status": "completed", "priority": "high" }));
}

#[tokio::test]
async fn delete_hits_the_task_path() {
    let (server_url, captured) = spawn_api_server().await.expect("spawn server");
    let store = HttpTaskStore::new(server_url, AuthSession::with_token("tok"));

    store
        .delete(&TaskId("t-3".to_string()))
        .await
        .expect("delete");
    assert_eq!(captured.path_id.lock().await.as_deref(), Some("t-3"));
}

#[tokio::test]
async fn server_error_message_is_surfaced() {
    let server_url = spawn_rejecting_server(
        StatusCode::NOT_FOUND,
        json!({ "success": false, "message": "Task not found" }),
    )
    .await
    .expect("spawn server");
    let store = HttpTaskStore::new(server_url, AuthSession::with_token("tok"));

    let err = store
        .delete(&TaskId("gone".to_string()))
        .await
        .expect_err("must fail");
    assert!(err.to_string().contains("Task not found"), "got: {err}");
}

#[tokio::test]
async fn opaque_error_bodies_fall_back_to_the_status() {
    let server_url = spawn_rejecting_server(StatusCode::BAD_GATEWAY, json!("oops"))
        .await
        .expect("spawn server");
    let store = HttpTaskStore::new(server_url, AuthSession::new());

    let err = store
        .list(&TaskListQuery {
            page: 1,
            limit: 10,
            status: None,
            priority: None,
            search: None,
        })
        .await
        .expect_err("must fail");
    assert!(err.to_string().contains("502"), "got: {err}");
}

#[test]
fn server_url_trailing_slashes_are_trimmed() {
    assert_eq!(
        trim_trailing_slash("http://api.local/".to_string()),
        "http://api.local"
    );
    assert_eq!(
        trim_trailing_slash("http://api.local".to_string()),
        "http://api.local"
    );
}
