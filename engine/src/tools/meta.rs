//! Controller-facing tools: user questions, the task list, and skill files.

use std::fmt::Write as _;

use serde_json::Value;

use super::sandbox::safe_path;
use super::{Context, ResultTimer, Tool, ToolError, ToolFut, arg_str};

pub struct QuestionTool;
pub struct TodoWriteTool;
pub struct SkillTool;

impl Tool for QuestionTool {
    fn name(&self) -> &'static str {
        "question"
    }

    fn description(&self) -> &'static str {
        "Ask the user a question and wait for input"
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "question": { "type": "string", "description": "the question to ask" },
                "options": {
                    "type": "array",
                    "description": "list of choices to present"
                }
            },
            "required": ["question"]
        })
    }

    fn validate(&self, args: &openlink_types::ArgMap) -> Result<(), ToolError> {
        if arg_str(args, "question").is_none_or(str::is_empty) {
            return Err(ToolError::bad_args("question is required"));
        }
        Ok(())
    }

    fn execute<'a>(&'a self, ctx: Context<'a>) -> ToolFut<'a> {
        Box::pin(async move {
            let timer = ResultTimer::start();
            let question = arg_str(ctx.args, "question").unwrap_or_default();
            let options = ctx
                .args
                .get("options")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            let mut text = format!("[input required]\n\n{question}");
            if !options.is_empty() {
                text.push_str("\n\nOptions:");
                for (i, option) in options.iter().enumerate() {
                    let label = match option {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    let _ = write!(text, "\n  {}. {}", i + 1, label);
                }
                text.push_str("\n\nEnter your choice or answer:");
            }

            timer.success(text).with_stop_stream()
        })
    }
}

impl Tool for TodoWriteTool {
    fn name(&self) -> &'static str {
        "todo_write"
    }

    fn description(&self) -> &'static str {
        "Write the task list to .todos.json"
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "todos": {
                    "type": "array",
                    "description": "full list of todo items to save"
                }
            },
            "required": ["todos"]
        })
    }

    fn execute<'a>(&'a self, ctx: Context<'a>) -> ToolFut<'a> {
        Box::pin(async move {
            let timer = ResultTimer::start();
            let todos = ctx.args.get("todos").cloned().unwrap_or(Value::Null);

            let data = match serde_json::to_string_pretty(&todos) {
                Ok(data) => data,
                Err(err) => return timer.failure(err.to_string()),
            };
            let path = ctx.config.root_dir.join(".todos.json");
            if let Err(err) = tokio::fs::write(&path, data).await {
                return timer.failure(err.to_string());
            }

            let count = todos.as_array().map(Vec::len).unwrap_or(0);
            timer.success(format!("Saved {count} todos"))
        })
    }
}

impl Tool for SkillTool {
    fn name(&self) -> &'static str {
        "skill"
    }

    fn description(&self) -> &'static str {
        "Load a skill file from the .skills/ directory"
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "skill": {
                    "type": "string",
                    "description": "skill name to load; omit to list available skills"
                }
            }
        })
    }

    fn execute<'a>(&'a self, ctx: Context<'a>) -> ToolFut<'a> {
        Box::pin(async move {
            let timer = ResultTimer::start();
            let name = arg_str(ctx.args, "skill").unwrap_or_default();

            if name.is_empty() {
                return list_skills(timer, ctx);
            }

            let rel = format!(".skills/{name}.md");
            let resolved = match safe_path(&ctx.config.root_dir, &rel) {
                Ok(p) => p,
                Err(err) => return timer.failure(err.to_string()),
            };

            match std::fs::read_to_string(&resolved) {
                Ok(content) => timer.success(content),
                Err(_) => list_skills(timer, ctx),
            }
        })
    }
}

fn list_skills(timer: ResultTimer, ctx: Context<'_>) -> super::ToolResult {
    let dir = ctx.config.root_dir.join(".skills");
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(_) => {
            return timer.failure(
                "no .skills directory found; create .skills/ under the root and add .md files",
            );
        }
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|e| {
            e.file_name()
                .to_str()
                .and_then(|n| n.strip_suffix(".md"))
                .map(str::to_string)
        })
        .collect();
    names.sort_unstable();
    timer.success(format!("Available skills: {}", names.join(", ")))
}

#[cfg(test)]
mod tests {
    use openlink_types::{ArgMap, Config};
    use serde_json::json;

    use super::*;

    fn test_config(root: &std::path::Path) -> Config {
        Config {
            root_dir: root.to_path_buf(),
            timeout: 10,
            port: 0,
            token: "t".into(),
            default_prompt: None,
        }
    }

    fn args(pairs: &[(&str, serde_json::Value)]) -> ArgMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn question_renders_options_and_stops_stream() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        let q_args = args(&[
            ("question", json!("Which one?")),
            ("options", json!(["first", "second"])),
        ]);
        let result = QuestionTool
            .execute(Context { args: &q_args, config: &config })
            .await;
        assert!(result.output.contains("Which one?"));
        assert!(result.output.contains("1. first"));
        assert!(result.output.contains("2. second"));
        assert!(result.stop_stream);
    }

    #[tokio::test]
    async fn todo_write_persists_pretty_json() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        let todo_args = args(&[(
            "todos",
            json!([{"id": 1, "title": "write tests", "done": false}]),
        )]);
        let result = TodoWriteTool
            .execute(Context { args: &todo_args, config: &config })
            .await;
        assert!(result.is_success(), "todo_write failed: {}", result.error);
        assert_eq!(result.output, "Saved 1 todos");

        let saved = std::fs::read_to_string(root.path().join(".todos.json")).unwrap();
        assert!(saved.contains("  \"id\": 1") || saved.contains("\"id\": 1"));
        assert!(saved.contains('\n'));
    }

    #[tokio::test]
    async fn skill_loads_named_file() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        std::fs::create_dir_all(root.path().join(".skills")).unwrap();
        std::fs::write(root.path().join(".skills/review.md"), "# Review checklist").unwrap();

        let skill_args = args(&[("skill", json!("review"))]);
        let result = SkillTool
            .execute(Context { args: &skill_args, config: &config })
            .await;
        assert_eq!(result.output, "# Review checklist");
    }

    #[tokio::test]
    async fn skill_unknown_name_lists_available() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        std::fs::create_dir_all(root.path().join(".skills")).unwrap();
        std::fs::write(root.path().join(".skills/review.md"), "x").unwrap();

        let skill_args = args(&[("skill", json!("missing"))]);
        let result = SkillTool
            .execute(Context { args: &skill_args, config: &config })
            .await;
        assert!(result.output.contains("Available skills: review"));
    }

    #[tokio::test]
    async fn skill_without_directory_errors() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        let result = SkillTool
            .execute(Context { args: &ArgMap::new(), config: &config })
            .await;
        assert!(!result.is_success());
        assert!(result.error.contains(".skills"));
    }
}
