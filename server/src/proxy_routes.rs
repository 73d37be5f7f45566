//! Chat bridge routes: the two compatibility endpoints, the extension's SSE
//! stream, and the reply entry point.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::Stream;
use futures::stream::{self, StreamExt};
use serde_json::json;
use tokio_stream::wrappers::ReceiverStream;

use openlink_proxy::gateway;
use openlink_proxy::{BridgeError, RequestFormat};
use openlink_types::{ChatRequest, MessagesRequest, ProxyReply};

use crate::AppState;

const BRIDGE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

pub async fn openai_chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Response {
    let prompt = gateway::flatten_messages(&request.messages);

    let mut proxy_request = match state.bridge.submit(RequestFormat::OpenAi, prompt) {
        Ok(req) => req,
        Err(BridgeError::NoClient) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"error": "browser extension not connected"})),
            )
                .into_response();
        }
        Err(err) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": err.to_string()})),
            )
                .into_response();
        }
    };
    tracing::info!(id = %proxy_request.id, prompt_len = proxy_request.prompt.len(), "openai chat queued");

    match state.bridge.wait_reply(&mut proxy_request, BRIDGE_TIMEOUT).await {
        Ok(reply) => Json(gateway::openai_response(
            &proxy_request.id,
            &request.model,
            &reply,
        ))
        .into_response(),
        Err(BridgeError::Timeout) => (
            StatusCode::GATEWAY_TIMEOUT,
            Json(json!({"error": "browser did not reply in time"})),
        )
            .into_response(),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "browser extension disconnected"})),
        )
            .into_response(),
    }
}

fn anthropic_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({
            "type": "error",
            "error": {"type": "overloaded_error", "message": message},
        })),
    )
        .into_response()
}

pub async fn anthropic_messages(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MessagesRequest>,
) -> Response {
    let prompt = gateway::anthropic_prompt(&request);

    let mut proxy_request = match state.bridge.submit(RequestFormat::Anthropic, prompt) {
        Ok(req) => req,
        Err(BridgeError::NoClient) => {
            return anthropic_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "browser extension not connected",
            );
        }
        Err(err) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": err.to_string()})),
            )
                .into_response();
        }
    };
    tracing::info!(id = %proxy_request.id, prompt_len = proxy_request.prompt.len(), "anthropic chat queued");

    match state.bridge.wait_reply(&mut proxy_request, BRIDGE_TIMEOUT).await {
        Ok(reply) => Json(gateway::anthropic_response(
            &proxy_request.id,
            &request.model,
            &reply,
        ))
        .into_response(),
        Err(BridgeError::Timeout) => anthropic_error(StatusCode::GATEWAY_TIMEOUT, "timeout"),
        Err(_) => anthropic_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "browser extension disconnected",
        ),
    }
}

/// The extension's long-lived push stream. Dropping the connection drops the
/// subscriber guard, which unregisters and fans out disconnect signals.
pub async fn sse_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (guard, events) = state.bridge.clone().subscribe().split();
    tracing::info!("SSE client connected");

    let connected = stream::once(async { Ok(Event::default().event("connected").data("{}")) });
    let proxied = ReceiverStream::new(events).map(move |event| {
        // The guard lives inside this closure; the stream's drop is the
        // disconnect signal.
        let _ = &guard;
        let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        tracing::debug!(request_id = %event.request_id, "SSE push");
        Ok(Event::default().event("proxy_request").data(data))
    });

    Sse::new(connected.chain(proxied)).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("heartbeat"),
    )
}

pub async fn proxy_reply(
    State(state): State<Arc<AppState>>,
    Json(reply): Json<ProxyReply>,
) -> Response {
    if reply.request_id.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "request_id required"})),
        )
            .into_response();
    }

    let content_len = reply.content.len();
    if state.bridge.deliver(&reply.request_id, reply.content) {
        tracing::info!(request_id = %reply.request_id, content_len, "reply delivered");
        Json(json!({"ok": true})).into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "request not found or already expired"})),
        )
            .into_response()
    }
}
