//! Shell command execution inside the sandbox root.

use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::Command;

use super::command_filter::is_dangerous_command;
use super::truncate::truncate;
use super::{Context, ResultTimer, Tool, ToolError, ToolFut, arg_str};

pub struct ExecCmdTool;

fn command_arg<'a>(args: &'a openlink_types::ArgMap) -> Option<&'a str> {
    arg_str(args, "command").or_else(|| arg_str(args, "cmd"))
}

fn shell() -> (String, &'static str) {
    if cfg!(windows) {
        let comspec = std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string());
        (comspec, "/C")
    } else {
        ("sh".to_string(), "-c")
    }
}

impl Tool for ExecCmdTool {
    fn name(&self) -> &'static str {
        "exec_cmd"
    }

    fn description(&self) -> &'static str {
        "Execute shell command in sandbox"
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "shell command to execute" }
            },
            "required": ["command"]
        })
    }

    fn validate(&self, args: &openlink_types::ArgMap) -> Result<(), ToolError> {
        let Some(command) = command_arg(args) else {
            return Err(ToolError::bad_args("command is required"));
        };
        if command.is_empty() {
            return Err(ToolError::bad_args("command is required"));
        }
        if is_dangerous_command(command) {
            return Err(ToolError::DangerousCommand);
        }
        Ok(())
    }

    fn execute<'a>(&'a self, ctx: Context<'a>) -> ToolFut<'a> {
        Box::pin(async move {
            let timer = ResultTimer::start();
            let command_line = command_arg(ctx.args).unwrap_or_default().to_string();

            let (shell_bin, shell_flag) = shell();
            let mut command = Command::new(shell_bin);
            command
                .arg(shell_flag)
                .arg(&command_line)
                .current_dir(&ctx.config.root_dir)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());

            #[cfg(unix)]
            {
                // Own process group, so the timeout kill takes grandchildren too.
                unsafe {
                    command.pre_exec(|| {
                        libc::setsid();
                        Ok(())
                    });
                }
            }

            let child = match command.spawn() {
                Ok(child) => child,
                Err(err) => return timer.failure(err.to_string()),
            };
            let mut guard = ChildGuard::new(child);

            let deadline = std::time::Duration::from_secs(ctx.config.timeout);
            let waited = tokio::time::timeout(deadline, collect_output(&mut guard)).await;

            match waited {
                Err(_) => {
                    drop(guard);
                    timer.failure("execution timeout")
                }
                // Guard stays armed: a child whose pipes failed gets killed.
                Ok(Err(err)) => timer.failure(err.to_string()),
                Ok(Ok((status, combined))) => {
                    guard.disarm();
                    let (output, _) = truncate(&combined);
                    if !status.success() {
                        let code = status.code().unwrap_or(-1);
                        return timer.failure_with_output(format!("exit status {code}"), output);
                    }
                    let output = if output.is_empty() {
                        "empty".to_string()
                    } else {
                        output
                    };
                    timer.success(format!("command: {command_line}\n\n{output}"))
                }
            }
        })
    }
}

async fn collect_output(
    guard: &mut ChildGuard,
) -> std::io::Result<(std::process::ExitStatus, String)> {
    let child = guard.child_mut();
    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();

    let stdout_read = async {
        let mut buf = Vec::new();
        if let Some(stream) = stdout.as_mut() {
            stream.read_to_end(&mut buf).await?;
        }
        std::io::Result::Ok(buf)
    };
    let stderr_read = async {
        let mut buf = Vec::new();
        if let Some(stream) = stderr.as_mut() {
            stream.read_to_end(&mut buf).await?;
        }
        std::io::Result::Ok(buf)
    };

    let (out, err) = tokio::join!(stdout_read, stderr_read);
    let status = guard.child_mut().wait().await?;

    let mut combined = String::from_utf8_lossy(&out?).into_owned();
    combined.push_str(&String::from_utf8_lossy(&err?));
    Ok((status, combined))
}

/// Kills the child's process group on drop unless disarmed.
struct ChildGuard {
    child: Option<tokio::process::Child>,
}

impl ChildGuard {
    fn new(child: tokio::process::Child) -> Self {
        Self { child: Some(child) }
    }

    fn child_mut(&mut self) -> &mut tokio::process::Child {
        self.child.as_mut().expect("child present")
    }

    fn disarm(&mut self) {
        self.child = None;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        #[cfg(unix)]
        {
            if let Some(pid) = child.id() {
                unsafe {
                    libc::killpg(pid as i32, libc::SIGKILL);
                }
            }
        }
        #[cfg(windows)]
        {
            let _ = child.start_kill();
        }
    }
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
    async fn echoes_output() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        let args = args(&[("command", json!("echo hello"))]);
        let tool = ExecCmdTool;
        let result = tool.execute(Context { args: &args, config: &config }).await;
        assert!(result.is_success(), "error: {}", result.error);
        assert!(result.output.contains("hello"));
        assert!(result.output.starts_with("command: echo hello"));
    }

    #[tokio::test]
    async fn runs_in_root_dir() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        let args = args(&[("command", json!("pwd"))]);
        let result = ExecCmdTool
            .execute(Context { args: &args, config: &config })
            .await;
        let canonical = std::fs::canonicalize(root.path()).unwrap();
        assert!(result.output.contains(canonical.to_str().unwrap()));
    }

    #[tokio::test]
    async fn nonzero_exit_is_an_error_with_output() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        let args = args(&[("command", json!("echo partial && exit 3"))]);
        let result = ExecCmdTool
            .execute(Context { args: &args, config: &config })
            .await;
        assert!(!result.is_success());
        assert!(result.error.contains("3"));
        assert!(result.output.contains("partial"));
    }

    #[tokio::test]
    async fn timeout_kills_the_command() {
        let root = tempfile::tempdir().unwrap();
        let mut config = test_config(root.path());
        config.timeout = 1;
        let args = args(&[("command", json!("sleep 30"))]);
        let started = std::time::Instant::now();
        let result = ExecCmdTool
            .execute(Context { args: &args, config: &config })
            .await;
        assert!(!result.is_success());
        assert_eq!(result.error, "execution timeout");
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }

    #[test]
    fn validate_blocks_dangerous_commands() {
        let tool = ExecCmdTool;
        let err = tool
            .validate(&args(&[("command", json!("sudo rm -rf /"))]))
            .unwrap_err();
        assert_eq!(err.to_string(), "dangerous command blocked");
    }

    #[test]
    fn validate_accepts_cmd_alias() {
        let tool = ExecCmdTool;
        assert!(tool.validate(&args(&[("cmd", json!("ls"))])).is_ok());
        assert!(tool.validate(&ArgMap::new()).is_err());
    }
}
