//! Tool-surface handlers: health, auth check, config, tools, exec, prompt,
//! skills, and the file index.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ignore::WalkBuilder;
use serde::Deserialize;
use serde_json::{Value, json};

use openlink_engine::skills;
use openlink_types::{ToolRequest, ToolResponse};

use crate::AppState;
use crate::auth::constant_time_eq;

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "dir": state.config.root_dir.display().to_string(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Deserialize)]
pub struct AuthBody {
    #[serde(default)]
    token: String,
}

pub async fn check_token(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AuthBody>,
) -> Json<Value> {
    let valid = constant_time_eq(&body.token, &state.config.token);
    Json(json!({ "valid": valid }))
}

pub async fn show_config(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "rootDir": state.config.root_dir.display().to_string(),
        "timeout": state.config.timeout,
    }))
}

pub async fn list_tools(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "tools": state.executor.list_tools() }))
}

/// Models that collapse newlines to tabs produce unmatchable edit
/// arguments; expand them at the transport boundary. The engine's own
/// tab-newline replacer is an independent second net.
fn fix_tab_newlines(value: &str) -> String {
    if value.contains('\n') || !value.contains('\t') {
        return value.to_string();
    }
    value.replace('\t', "\n\t")
}

pub async fn exec_tool(
    State(state): State<Arc<AppState>>,
    Json(mut request): Json<ToolRequest>,
) -> Json<ToolResponse> {
    tracing::info!(tool = %request.name, "exec request");

    if request.name == "edit" {
        for key in ["old_string", "new_string"] {
            if let Some(Value::String(s)) = request.args.get(key) {
                let fixed = fix_tab_newlines(s);
                if fixed != *s {
                    request.args.insert(key.to_string(), Value::String(fixed));
                }
            }
        }
    }

    let budget = Duration::from_secs(state.config.timeout);
    let response = match tokio::time::timeout(budget, state.executor.execute(&request)).await {
        Ok(response) => response,
        Err(_) => ToolResponse::error("execution timeout"),
    };

    tracing::debug!(
        tool = %request.name,
        status = %response.status,
        output_len = response.output.len(),
        "exec finished"
    );
    Json(response)
}

fn build_system_info(root_dir: &Path) -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());
    format!(
        "- OS: {}/{}\n- Working directory: {}\n- Hostname: {}\n- Current time: {}",
        std::env::consts::OS,
        std::env::consts::ARCH,
        root_dir.display(),
        host,
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
    )
}

const GREETING_FOOTER: &str = "\n\nInitial reply:\nHello, I'm openlink. What can I do for you?";

pub async fn prompt(State(state): State<Arc<AppState>>) -> Response {
    let prompt_file = state.config.root_dir.join("prompts").join("init_prompt.txt");
    let template = match std::fs::read_to_string(&prompt_file) {
        Ok(content) => content,
        Err(_) => match &state.config.default_prompt {
            Some(default) => default.clone(),
            None => {
                return (
                    StatusCode::NOT_FOUND,
                    Json(json!({"error": "init_prompt.txt not found"})),
                )
                    .into_response();
            }
        },
    };

    let mut body = template.replace("{{SYSTEM_INFO}}", &build_system_info(&state.config.root_dir));

    let skills = skills::load_infos(&state.config.root_dir);
    if !skills.is_empty() {
        body.push_str("\n\n## Available Skills\n\n");
        for skill in &skills {
            body.push_str(&format!("- **{}**: {}\n", skill.name, skill.description));
        }
    }
    body.push_str(GREETING_FOOTER);

    body.into_response()
}

pub async fn list_skills(State(state): State<Arc<AppState>>) -> Json<Value> {
    let items: Vec<Value> = skills::load_infos(&state.config.root_dir)
        .into_iter()
        .map(|skill| json!({"name": skill.name, "description": skill.description}))
        .collect();
    Json(json!({ "skills": items }))
}

#[derive(Deserialize)]
pub struct FilesQuery {
    #[serde(default)]
    q: String,
}

const FILE_LIMIT: usize = 50;
const SKIP_DIRS: &[&str] = &[".git", "node_modules", ".next", "dist", "build", "vendor"];

pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FilesQuery>,
) -> Response {
    let needle = query.q.to_lowercase();
    if needle.len() > 200 {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "q too long"}))).into_response();
    }

    let Ok(root_real) = std::fs::canonicalize(&state.config.root_dir) else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "invalid root"})),
        )
            .into_response();
    };

    let mut files: Vec<String> = Vec::new();
    let walker = WalkBuilder::new(&state.config.root_dir)
        .standard_filters(false)
        .filter_entry(|entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            if !is_dir {
                return true;
            }
            entry
                .file_name()
                .to_str()
                .map(|name| !SKIP_DIRS.contains(&name))
                .unwrap_or(true)
        })
        .build();

    for entry in walker {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        // Symlinked files must still resolve inside the root.
        let Ok(real) = std::fs::canonicalize(entry.path()) else {
            continue;
        };
        if !real.starts_with(&root_real) {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(&state.config.root_dir)
            .unwrap_or(entry.path())
            .display()
            .to_string();
        if needle.is_empty() || rel.to_lowercase().contains(&needle) {
            files.push(rel);
        }
        if files.len() >= FILE_LIMIT {
            break;
        }
    }

    Json(json!({ "files": files })).into_response()
}
