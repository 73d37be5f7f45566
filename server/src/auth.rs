//! Bearer-token gate and token storage under `~/.openlink/settings.json`.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
struct Settings {
    #[serde(default)]
    token: String,
}

/// Routes that stay reachable without a token: liveness and the token
/// check itself.
const PUBLIC_PATHS: &[&str] = &["/health", "/auth"];

pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

pub async fn require_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if PUBLIC_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    let authorized = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| constant_time_eq(token, &state.config.token));

    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            axum::Json(serde_json::json!({"error": "unauthorized"})),
        )
            .into_response();
    }
    next.run(request).await
}

fn settings_path() -> io::Result<(PathBuf, PathBuf)> {
    let home = dirs::home_dir()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "home directory unavailable"))?;
    let dir = home.join(".openlink");
    let file = dir.join("settings.json");
    Ok((dir, file))
}

/// Read the stored token, or generate one and persist it (dir 0700,
/// file 0600 on unix).
pub fn load_or_create_token() -> io::Result<String> {
    let (dir, file) = settings_path()?;

    if let Ok(raw) = std::fs::read_to_string(&file) {
        if let Ok(settings) = serde_json::from_str::<Settings>(&raw) {
            if !settings.token.is_empty() {
                return Ok(settings.token);
            }
        }
    }

    let token = generate_token();
    std::fs::create_dir_all(&dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))?;
    }
    let body = serde_json::to_string_pretty(&Settings {
        token: token.clone(),
    })?;
    std::fs::write(&file, body)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(token)
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
