//! HTTP surface: router assembly, shared state, and serving.

pub mod auth;
mod handlers;
mod proxy_routes;

use std::sync::Arc;

use axum::Router;
use axum::http::Method;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};

use openlink_engine::Executor;
use openlink_proxy::Manager;
use openlink_types::Config;

pub struct AppState {
    pub config: Arc<Config>,
    pub executor: Executor,
    pub bridge: Arc<Manager>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        Self {
            executor: Executor::new(config.clone()),
            bridge: Arc::new(Manager::new()),
            config,
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/auth", post(handlers::check_token))
        .route("/config", get(handlers::show_config))
        .route("/tools", get(handlers::list_tools))
        .route("/exec", post(handlers::exec_tool))
        .route("/prompt", get(handlers::prompt))
        .route("/skills", get(handlers::list_skills))
        .route("/files", get(handlers::list_files))
        .route("/v1/chat/completions", post(proxy_routes::openai_chat))
        .route("/v1/messages", post(proxy_routes::anthropic_messages))
        .route("/v1/sse", get(proxy_routes::sse_stream))
        .route("/v1/reply", post(proxy_routes::proxy_reply))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_token,
        ))
        .layer(cors)
        .with_state(state)
}

/// Bind the loopback listener and serve until shutdown.
pub async fn serve(config: Config) -> std::io::Result<()> {
    let addr = format!("127.0.0.1:{}", config.port);
    let state = Arc::new(AppState::new(config));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, root = %state.config.root_dir.display(), "openlink listening");
    axum::serve(listener, build_router(state)).await
}
