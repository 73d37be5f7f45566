//! Tool dispatch: lookup, validate, execute, project.

use std::sync::Arc;

use openlink_types::{Config, ToolInfo, ToolRequest, ToolResponse};

use crate::tools::edit::EditTool;
use crate::tools::exec::ExecCmdTool;
use crate::tools::fs::{ListDirTool, ReadFileTool, WriteFileTool};
use crate::tools::listing::{GlobTool, GrepTool};
use crate::tools::meta::{QuestionTool, SkillTool, TodoWriteTool};
use crate::tools::webfetch::WebFetchTool;
use crate::tools::{Context, Registry, Tool};

pub struct Executor {
    config: Arc<Config>,
    registry: Registry,
}

impl Executor {
    /// Tools are registered once and live for the process lifetime.
    pub fn new(config: Arc<Config>) -> Self {
        let mut registry = Registry::default();
        let tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(ExecCmdTool),
            Arc::new(ListDirTool),
            Arc::new(ReadFileTool),
            Arc::new(WriteFileTool),
            Arc::new(GlobTool),
            Arc::new(GrepTool),
            Arc::new(EditTool),
            Arc::new(WebFetchTool),
            Arc::new(QuestionTool),
            Arc::new(SkillTool),
            Arc::new(TodoWriteTool),
        ];
        for tool in tools {
            registry
                .register(tool)
                .expect("builtin tool names are unique");
        }
        Self { config, registry }
    }

    pub async fn execute(&self, req: &ToolRequest) -> ToolResponse {
        tracing::info!(tool = %req.name, "executing tool");

        let tool = self
            .registry
            .get(&req.name)
            .or_else(|| self.registry.get(&req.name.to_lowercase()));
        let Some(tool) = tool else {
            return ToolResponse::error(format!(
                "tool '{}' does not exist; available tools: {}",
                req.name,
                self.registry.names().join(", ")
            ));
        };

        if let Err(err) = tool.validate(&req.args) {
            tracing::debug!(tool = %req.name, %err, "validation rejected");
            return ToolResponse::error(format!("validation failed: {err}"));
        }

        let result = tool
            .execute(Context {
                args: &req.args,
                config: &self.config,
            })
            .await;
        if !result.is_success() {
            tracing::warn!(tool = %req.name, error = %result.error, "tool failed");
        }

        ToolResponse {
            status: result.status.as_str().to_string(),
            output: result.output,
            error: result.error,
        }
    }

    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.registry.list()
    }
}
