//! Shell execution tool.
//!
//! Commands are checked against a [`CommandPolicy`] and run through the
//! [`CommandRunner`], which enforces the timeout and kills the whole
//! process group afterwards. A `cwd` argument is validated by the
//! [`PathGuard`] like any other path.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clawgate_types::ToolError;
use clawgate_types::security::CommandPolicy;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::command_runner::{CommandError, CommandRequest, CommandRunner};
use crate::file_tools::{optional_u64, required_str};
use crate::path_guard::{Operation, PathGuard};
use crate::registry::Tool;

/// Execute shell commands with safety guardrails.
pub struct ShellExecTool {
    policy: CommandPolicy,
    runner: CommandRunner,
    guard: Arc<PathGuard>,
    working_dir: Option<String>,
}

impl ShellExecTool {
    pub fn new(policy: CommandPolicy, runner: CommandRunner, guard: Arc<PathGuard>) -> Self {
        Self {
            policy,
            runner,
            guard,
            working_dir: None,
        }
    }

    /// Directory used when the caller does not pass `cwd`.
    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn resolve_cwd(&self, requested: Option<&str>) -> Result<Option<PathBuf>, ToolError> {
        let Some(raw) = requested.or(self.working_dir.as_deref()) else {
            return Ok(self.guard.policy().base_dir.clone());
        };
        let resolved = self.guard.validate(raw, Operation::List)?;
        if !resolved.exists {
            return Err(ToolError::NotFound(resolved.path.display().to_string()));
        }
        if !resolved.is_dir {
            return Err(ToolError::Failed(format!(
                "working directory is not a directory: {}",
                resolved.path.display()
            )));
        }
        Ok(Some(resolved.path))
    }
}

fn parse_env(args: &Value) -> Result<Vec<(String, String)>, ToolError> {
    match args.get("env") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => Ok((k.clone(), s.clone())),
                other => Ok((k.clone(), other.to_string())),
            })
            .collect(),
        Some(_) => Err(ToolError::InvalidArgs("env must be an object".into())),
    }
}

#[async_trait]
impl Tool for ShellExecTool {
    fn name(&self) -> &str {
        "exec_shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its output. Enforces a timeout and rejects dangerous commands."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "timeout": {
                    "type": "number",
                    "description": format!(
                        "Timeout in seconds (default {}, max {})",
                        self.runner.clamp_timeout(None),
                        self.runner.max_timeout_secs()
                    )
                },
                "cwd": {
                    "type": "string",
                    "description": "Working directory"
                },
                "env": {
                    "type": "object",
                    "description": "Extra environment variables"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let command = required_str(&args, "command")?;
        if command.trim().is_empty() {
            return Err(ToolError::InvalidArgs("command is empty".into()));
        }
        let timeout = optional_u64(&args, "timeout")?;
        let env = parse_env(&args)?;

        if let Err(e) = self.policy.validate(command) {
            warn!(command, error = %e, "command rejected by security policy");
            return Err(ToolError::PermissionDenied(e.to_string()));
        }

        let cwd = self.resolve_cwd(args.get("cwd").and_then(Value::as_str))?;

        let mut request = CommandRequest::shell(command);
        request.timeout_secs = timeout;
        request.cwd = cwd;
        request.env = env;

        debug!(command, timeout = self.runner.clamp_timeout(timeout), "executing shell command");

        let output = self.runner.run(request).await.map_err(|e| match e {
            CommandError::TimedOut { secs, .. } => ToolError::TimedOut {
                operation: "exec_shell".into(),
                secs,
            },
            other => other.into(),
        })?;

        Ok(json!({
            "exit_code": output.exit_code,
            "stdout": output.stdout,
            "stderr": output.stderr,
            "stdout_truncated": output.stdout_truncated,
            "stderr_truncated": output.stderr_truncated,
            "duration_ms": output.elapsed.as_millis() as u64,
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
