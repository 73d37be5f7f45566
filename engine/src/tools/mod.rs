//! Tool capability contract: the `Tool` trait, the registry, and the
//! execution context shared by every builtin.

pub mod command_filter;
pub mod edit;
pub mod exec;
pub mod fs;
pub mod listing;
pub mod meta;
pub mod sandbox;
pub mod truncate;
pub mod webfetch;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use jsonschema::JSONSchema;
use serde_json::Value;

use openlink_types::{ArgMap, Config, ToolInfo};

/// Tool execution future type alias.
pub type ToolFut<'a> = Pin<Box<dyn Future<Output = ToolResult> + Send + 'a>>;

/// Per-call execution context: the raw argument mapping plus the shared
/// immutable configuration.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub args: &'a ArgMap,
    pub config: &'a Config,
}

/// Error types for registration and argument validation.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{message}")]
    BadArgs { message: String },
    #[error("dangerous command blocked")]
    DangerousCommand,
    #[error("duplicate tool registered: {name}")]
    DuplicateTool { name: String },
}

impl ToolError {
    pub fn bad_args(message: impl Into<String>) -> Self {
        Self::BadArgs {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Success,
    Error,
}

impl ToolStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolStatus::Success => "success",
            ToolStatus::Error => "error",
        }
    }
}

/// Outcome of a single tool execution.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub status: ToolStatus,
    pub output: String,
    pub error: String,
    /// Advisory: the controller should pause its stream and wait for the
    /// user (set by `question`). Not consumed by the dispatcher itself.
    pub stop_stream: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ToolResult {
    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }

    #[must_use]
    pub fn with_stop_stream(mut self) -> Self {
        self.stop_stream = true;
        self
    }
}

/// Stamps the start of an execution; finishing it produces the `ToolResult`.
pub struct ResultTimer {
    started_at: DateTime<Utc>,
}

impl ResultTimer {
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
        }
    }

    pub fn success(self, output: impl Into<String>) -> ToolResult {
        self.finish(ToolStatus::Success, output.into(), String::new())
    }

    pub fn failure(self, error: impl Into<String>) -> ToolResult {
        self.finish(ToolStatus::Error, String::new(), error.into())
    }

    /// Failure that still carries partial output (e.g. a command that wrote
    /// to stdout before exiting non-zero).
    pub fn failure_with_output(
        self,
        error: impl Into<String>,
        output: impl Into<String>,
    ) -> ToolResult {
        self.finish(ToolStatus::Error, output.into(), error.into())
    }

    fn finish(self, status: ToolStatus, output: String, error: String) -> ToolResult {
        ToolResult {
            status,
            output,
            error,
            stop_stream: false,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

/// The capability every registered tool implements.
///
/// `parameters()` returns a JSON Schema for the argument mapping; the default
/// `validate` compiles and applies it. Tools with domain rules (dangerous
/// commands, filename filters) override `validate` with explicit checks.
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn parameters(&self) -> Value;

    fn validate(&self, args: &ArgMap) -> Result<(), ToolError> {
        validate_schema(&self.parameters(), args)
    }

    fn execute<'a>(&'a self, ctx: Context<'a>) -> ToolFut<'a>;
}

/// Validate an argument mapping against a JSON schema.
pub fn validate_schema(schema: &Value, args: &ArgMap) -> Result<(), ToolError> {
    let compiled = JSONSchema::compile(schema).map_err(|e| ToolError::BadArgs {
        message: format!("invalid tool schema: {e}"),
    })?;
    let instance = Value::Object(args.clone());
    if let Err(errors) = compiled.validate(&instance) {
        let message = errors
            .map(|err| err.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ToolError::BadArgs { message });
    }
    Ok(())
}

/// Immutable-after-construction name registry. Exact-case lookup is the
/// contract; the lowercase alias is a dispatcher fallback.
#[derive(Default)]
pub struct Registry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl Registry {
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::DuplicateTool { name });
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn list(&self) -> Vec<ToolInfo> {
        let mut infos: Vec<ToolInfo> = self
            .tools
            .values()
            .map(|tool| ToolInfo {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// ── Argument coercion helpers ───────────────────────────────────────────────

pub fn arg_str<'a>(args: &'a ArgMap, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

pub fn arg_bool(args: &ArgMap, key: &str) -> bool {
    args.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// JSON numbers arrive as floats; admit only non-negative integral values.
pub fn arg_usize(args: &ArgMap, key: &str) -> Option<usize> {
    let n = args.get(key)?.as_f64()?;
    if n.fract() != 0.0 || n < 0.0 || n > usize::MAX as f64 {
        return None;
    }
    Some(n as usize)
}
