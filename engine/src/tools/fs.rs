//! File read/write/list tools.

use super::sandbox::resolve_tool_path;
use super::truncate::truncate;
use super::{Context, ResultTimer, Tool, ToolFut, arg_str, arg_usize};

pub struct ReadFileTool;
pub struct WriteFileTool;
pub struct ListDirTool;

impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read file contents"
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "file path" },
                "offset": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "1-based line to start reading from"
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "maximum number of lines to return"
                }
            },
            "required": ["path"]
        })
    }

    fn execute<'a>(&'a self, ctx: Context<'a>) -> ToolFut<'a> {
        Box::pin(async move {
            let timer = ResultTimer::start();
            let path = arg_str(ctx.args, "path").unwrap_or_default();

            let resolved = match resolve_tool_path(path, &ctx.config.root_dir) {
                Ok(p) => p,
                Err(err) => return timer.failure(err.to_string()),
            };

            let content = match tokio::fs::read_to_string(&resolved).await {
                Ok(content) => content,
                Err(err) => return timer.failure(err.to_string()),
            };

            let offset = arg_usize(ctx.args, "offset");
            let limit = arg_usize(ctx.args, "limit");
            let sliced = match (offset, limit) {
                (None, None) => content,
                (offset, limit) => {
                    let skip = offset.unwrap_or(1).saturating_sub(1);
                    let take = limit.unwrap_or(usize::MAX);
                    content
                        .split('\n')
                        .skip(skip)
                        .take(take)
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            };

            let (output, _) = truncate(&sliced);
            timer.success(output)
        })
    }
}

impl Tool for WriteFileTool {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn description(&self) -> &'static str {
        "Write content to a file, creating parent directories"
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "file path" },
                "content": { "type": "string", "description": "content to write" },
                "mode": {
                    "type": "string",
                    "enum": ["overwrite", "append"],
                    "description": "write mode (default overwrite)"
                }
            },
            "required": ["path", "content"]
        })
    }

    fn execute<'a>(&'a self, ctx: Context<'a>) -> ToolFut<'a> {
        Box::pin(async move {
            let timer = ResultTimer::start();
            let path = arg_str(ctx.args, "path").unwrap_or_default();
            let content = arg_str(ctx.args, "content").unwrap_or_default();
            let append = arg_str(ctx.args, "mode") == Some("append");

            let resolved = match resolve_tool_path(path, &ctx.config.root_dir) {
                Ok(p) => p,
                Err(err) => return timer.failure(err.to_string()),
            };

            if let Some(parent) = resolved.parent() {
                if let Err(err) = tokio::fs::create_dir_all(parent).await {
                    return timer.failure(err.to_string());
                }
            }

            let written = if append {
                use tokio::io::AsyncWriteExt;
                let file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&resolved)
                    .await;
                match file {
                    Ok(mut file) => file.write_all(content.as_bytes()).await,
                    Err(err) => Err(err),
                }
            } else {
                tokio::fs::write(&resolved, content).await
            };

            match written {
                Ok(()) => timer.success(format!(
                    "Wrote {} bytes to {}",
                    content.len(),
                    resolved.display()
                )),
                Err(err) => timer.failure(err.to_string()),
            }
        })
    }
}

impl Tool for ListDirTool {
    fn name(&self) -> &'static str {
        "list_dir"
    }

    fn description(&self) -> &'static str {
        "List directory contents"
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "directory path to list" }
            },
            "required": ["path"]
        })
    }

    fn execute<'a>(&'a self, ctx: Context<'a>) -> ToolFut<'a> {
        Box::pin(async move {
            let timer = ResultTimer::start();
            let path = arg_str(ctx.args, "path").unwrap_or_default();

            let resolved = match resolve_tool_path(path, &ctx.config.root_dir) {
                Ok(p) => p,
                Err(err) => return timer.failure(err.to_string()),
            };

            let mut entries = match std::fs::read_dir(&resolved) {
                Ok(entries) => entries
                    .filter_map(Result::ok)
                    .map(|entry| {
                        let mut name = entry.file_name().to_string_lossy().into_owned();
                        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                            name.push('/');
                        }
                        name
                    })
                    .collect::<Vec<_>>(),
                Err(err) => return timer.failure(err.to_string()),
            };
            entries.sort_unstable();

            let output = if entries.is_empty() {
                "empty".to_string()
            } else {
                entries.join("\n")
            };
            timer.success(output)
        })
    }
}
