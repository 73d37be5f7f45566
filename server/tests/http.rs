//! Router-level end-to-end tests: tool execution, auth gating, and the
//! browser proxy round trip.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use openlink_server::{AppState, build_router};
use openlink_types::Config;

const TOKEN: &str = "test-token";

fn test_state(root: &std::path::Path) -> Arc<AppState> {
    Arc::new(AppState::new(Config {
        root_dir: root.to_path_buf(),
        timeout: 10,
        port: 0,
        token: TOKEN.to_string(),
        default_prompt: Some("prompt head\n{{SYSTEM_INFO}}\n".to_string()),
    }))
}

fn get(path: &str, authed: bool) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(path);
    if authed {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {TOKEN}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(path: &str, body: Value, authed: bool) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if authed {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {TOKEN}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn exec(app: &Router, name: &str, args: Value) -> Value {
    let response = app
        .clone()
        .oneshot(post_json("/exec", json!({"name": name, "args": args}), true))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

#[tokio::test]
async fn health_bypasses_auth() {
    let root = tempfile::tempdir().unwrap();
    let app = build_router(test_state(root.path()));
    let response = app.oneshot(get("/health", false)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["dir"].as_str().unwrap().contains(
        root.path().file_name().unwrap().to_str().unwrap()
    ));
    assert!(!body["version"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn auth_endpoint_validates_tokens() {
    let root = tempfile::tempdir().unwrap();
    let app = build_router(test_state(root.path()));

    let ok = app
        .clone()
        .oneshot(post_json("/auth", json!({"token": TOKEN}), false))
        .await
        .unwrap();
    assert_eq!(body_json(ok).await["valid"], true);

    let bad = app
        .oneshot(post_json("/auth", json!({"token": "wrong"}), false))
        .await
        .unwrap();
    assert_eq!(body_json(bad).await["valid"], false);
}

#[tokio::test]
async fn config_requires_bearer_token() {
    let root = tempfile::tempdir().unwrap();
    let app = build_router(test_state(root.path()));

    let denied = app.clone().oneshot(get("/config", false)).await.unwrap();
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

    let allowed = app.oneshot(get("/config", true)).await.unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);
    let body = body_json(allowed).await;
    assert!(body["rootDir"].is_string());
    assert_eq!(body["timeout"], 10);
}

#[tokio::test]
async fn wrong_token_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let app = build_router(test_state(root.path()));
    let request = Request::builder()
        .method("GET")
        .uri("/config")
        .header(header::AUTHORIZATION, "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tools_are_listed() {
    let root = tempfile::tempdir().unwrap();
    let app = build_router(test_state(root.path()));
    let response = app.oneshot(get("/tools", true)).await.unwrap();
    let body = body_json(response).await;
    let names: Vec<&str> = body["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"exec_cmd"));
    assert!(names.contains(&"edit"));
    assert!(names.contains(&"web_fetch"));
}

#[tokio::test]
async fn exec_runs_a_shell_command() {
    let root = tempfile::tempdir().unwrap();
    let app = build_router(test_state(root.path()));
    let body = exec(&app, "exec_cmd", json!({"command": "echo hello"})).await;
    assert_eq!(body["status"], "success");
    assert!(body["output"].as_str().unwrap().contains("hello"));
}

#[tokio::test]
async fn exec_blocks_dangerous_commands() {
    let root = tempfile::tempdir().unwrap();
    let app = build_router(test_state(root.path()));
    let body = exec(&app, "exec_cmd", json!({"command": "sudo rm -rf /"})).await;
    assert_eq!(body["status"], "error");
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .contains("dangerous command blocked")
    );
}

#[tokio::test]
async fn exec_edit_rewrites_the_file() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("f.txt"), "hello world").unwrap();
    let app = build_router(test_state(root.path()));

    let body = exec(
        &app,
        "edit",
        json!({"path": "f.txt", "old_string": "world", "new_string": "go"}),
    )
    .await;
    assert_eq!(body["status"], "success", "error: {}", body["error"]);
    let content = std::fs::read_to_string(root.path().join("f.txt")).unwrap();
    assert_eq!(content, "hello go");
}

#[tokio::test]
async fn exec_invalid_json_is_bad_request() {
    let root = tempfile::tempdir().unwrap();
    let app = build_router(test_state(root.path()));
    let request = Request::builder()
        .method("POST")
        .uri("/exec")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn prompt_substitutes_system_info() {
    let root = tempfile::tempdir().unwrap();
    let app = build_router(test_state(root.path()));
    let response = app.oneshot(get("/prompt", true)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.starts_with("prompt head"));
    assert!(!text.contains("{{SYSTEM_INFO}}"));
    assert!(text.contains("- OS: "));
    assert!(text.contains("Initial reply:"));
}

#[tokio::test]
async fn files_endpoint_filters_and_skips_vendored_dirs() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("main.rs"), "").unwrap();
    std::fs::create_dir(root.path().join("node_modules")).unwrap();
    std::fs::write(root.path().join("node_modules/dep.js"), "").unwrap();

    let app = build_router(test_state(root.path()));
    let response = app
        .clone()
        .oneshot(get("/files?q=main", true))
        .await
        .unwrap();
    let body = body_json(response).await;
    let files = body["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0], "main.rs");

    let all = app.oneshot(get("/files", true)).await.unwrap();
    let body = body_json(all).await;
    let files: Vec<&str> = body["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f.as_str().unwrap())
        .collect();
    assert!(!files.iter().any(|f| f.contains("node_modules")));
}

#[tokio::test]
async fn messages_without_subscriber_is_overloaded_503() {
    let root = tempfile::tempdir().unwrap();
    let app = build_router(test_state(root.path()));
    let response = app
        .oneshot(post_json(
            "/v1/messages",
            json!({"model": "m", "max_tokens": 16, "messages": [{"role": "user", "content": "hi"}]}),
            true,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["type"], "error");
    assert_eq!(body["error"]["type"], "overloaded_error");
    assert_eq!(body["error"]["message"], "browser extension not connected");
}

#[tokio::test]
async fn chat_without_subscriber_is_503() {
    let root = tempfile::tempdir().unwrap();
    let app = build_router(test_state(root.path()));
    let response = app
        .oneshot(post_json(
            "/v1/chat/completions",
            json!({"messages": [{"role": "user", "content": "hi"}]}),
            true,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn sse_stream_opens_with_connected_event() {
    let root = tempfile::tempdir().unwrap();
    let app = build_router(test_state(root.path()));
    let response = app.oneshot(get("/v1/sse", true)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );
    let mut body = response.into_body();
    let frame = body.frame().await.unwrap().unwrap();
    let data = frame.into_data().unwrap();
    let text = String::from_utf8(data.to_vec()).unwrap();
    assert!(text.contains("event: connected"));
    assert!(text.contains("data: {}"));
}

#[tokio::test]
async fn chat_round_trip_through_bridge() {
    let root = tempfile::tempdir().unwrap();
    let state = test_state(root.path());
    let app = build_router(state.clone());

    let (_guard, mut events) = state.bridge.clone().subscribe().split();

    let chat_app = app.clone();
    let chat = tokio::spawn(async move {
        chat_app
            .oneshot(post_json(
                "/v1/chat/completions",
                json!({"messages": [{"role": "user", "content": "hi"}]}),
                true,
            ))
            .await
            .unwrap()
    });

    let event = events.recv().await.expect("proxy_request event");
    assert_eq!(event.prompt, "[User]: hi");

    let reply = app
        .oneshot(post_json(
            "/v1/reply",
            json!({"request_id": event.request_id, "content": "pong"}),
            true,
        ))
        .await
        .unwrap();
    assert_eq!(reply.status(), StatusCode::OK);
    assert_eq!(body_json(reply).await["ok"], true);

    let response = chat.await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["id"].as_str().unwrap().starts_with("chatcmpl-"));
    assert_eq!(body["choices"][0]["message"]["content"], "pong");
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
    assert_eq!(body["model"], "browser-proxy");
}

#[tokio::test]
async fn unknown_reply_id_is_not_found() {
    let root = tempfile::tempdir().unwrap();
    let app = build_router(test_state(root.path()));
    let response = app
        .oneshot(post_json(
            "/v1/reply",
            json!({"request_id": "deadbeef", "content": "x"}),
            true,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn skills_endpoint_lists_discovered_skills() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join(".skills/helper");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("SKILL.md"),
        "---\nname: helper\ndescription: helps out\n---\nbody",
    )
    .unwrap();

    let app = build_router(test_state(root.path()));
    let response = app.oneshot(get("/skills", true)).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["skills"][0]["name"], "helper");
    assert_eq!(body["skills"][0]["description"], "helps out");
}
