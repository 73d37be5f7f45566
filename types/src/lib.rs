//! Core domain types for openlink.
//!
//! This crate contains pure domain types with no IO, no async, and minimal
//! dependencies. Everything here can be used from any layer of the
//! application.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Dynamically typed tool argument mapping, as it arrives off the wire.
pub type ArgMap = serde_json::Map<String, Value>;

/// Immutable service configuration, shared by reference across subsystems.
#[derive(Debug, Clone)]
pub struct Config {
    /// Absolute sandbox root. All relative tool paths resolve under it.
    pub root_dir: PathBuf,
    /// Per-execution wall-clock budget, in seconds.
    pub timeout: u64,
    /// Listen port (loopback only).
    pub port: u16,
    /// Bearer token protecting every non-public route.
    pub token: String,
    /// Fallback for `GET /prompt` when `prompts/init_prompt.txt` is absent.
    pub default_prompt: Option<String>,
}

/// A tool invocation as posted to `POST /exec`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    pub name: String,
    #[serde(default)]
    pub args: ArgMap,
}

/// The uniform tool outcome returned to `/exec` callers.
///
/// Tool-domain failures are carried here with `status: "error"`; the HTTP
/// layer reserves non-200 codes for transport-level problems.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    pub status: String,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub error: String,
}

impl ToolResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            output: String::new(),
            error: message.into(),
        }
    }
}

/// Descriptor of a registered tool, as listed by `GET /tools`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    /// JSON Schema describing the tool's parameters.
    #[serde(skip_serializing_if = "Value::is_null", default)]
    pub parameters: Value,
}

// ── Browser proxy wire types ────────────────────────────────────────────────

/// Event pushed to the browser extension over `GET /v1/sse`.
///
/// Carries only what the extension needs to impersonate the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxySseEvent {
    pub request_id: String,
    pub prompt: String,
}

/// Reply posted back by the extension on `POST /v1/reply`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyReply {
    pub request_id: String,
    pub content: String,
}

// ── OpenAI-compatible chat shapes ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: ChatUsage,
}

// ── Anthropic-compatible message shapes ─────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagesRequest {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub max_tokens: u32,
    pub messages: Vec<AnthropicMessage>,
    #[serde(default)]
    pub system: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnthropicUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub role: String,
    pub content: Vec<ContentBlock>,
    pub model: String,
    pub stop_reason: String,
    /// Always serialized, `null` in practice; clients expect the key.
    pub stop_sequence: Option<String>,
    pub usage: AnthropicUsage,
}
