//! execute_command tool - Run an allow-listed diagnostic command

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use serde_json::{Value, json};
use tokio::process::Command;

use super::{Arguments, ParamKind, Parameter, ParameterSchema, Tool, ToolContext, ToolError, truncate_text};

/// Read-only and diagnostic programs the model may run
pub const ALLOWED_COMMANDS: &[&str] = &[
    "dir", "ls", "pwd", "whoami", "date", "echo", "ping", "ipconfig", "ifconfig", "netstat", "ps", "df", "du", "free",
    "uptime", "uname",
];

const MAX_OUTPUT_CHARS: usize = 30_000;

pub struct ExecuteCommandTool;

#[async_trait]
impl Tool for ExecuteCommandTool {
    fn name(&self) -> &'static str {
        "execute_command"
    }

    fn description(&self) -> &'static str {
        "Run a read-only diagnostic command (ls, pwd, whoami, date, echo, ping, ps, df, du, free, uptime, uname, ...). \
         The command runs without a shell."
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new(vec![
            Parameter::new("command", ParamKind::String, "Command line, e.g. 'df -h'").required(),
            Parameter::new("timeout", ParamKind::Number, "Timeout in seconds (default: 10)"),
        ])
    }

    async fn execute(&self, args: &Arguments, ctx: &ToolContext) -> Result<Value, ToolError> {
        let command = args.str("command")?;
        let (program, rest) = split_command(command)?;

        // Checked before anything is spawned
        if !is_allowed(program) {
            return Err(ToolError::CommandNotAllowed {
                program: program.to_string(),
            });
        }

        let timeout = resolve_timeout(
            args.opt_f64("timeout"),
            ctx.limits.command_timeout,
            ctx.limits.max_command_timeout,
        );

        info!("Running command: {}", command);
        let output = run_program(program, &rest, &ctx.working_dir, timeout).await?;

        Ok(json!({
            "command": command,
            "return_code": output.code,
            "stdout": truncate_text(&output.stdout, MAX_OUTPUT_CHARS),
            "stderr": truncate_text(&output.stderr, MAX_OUTPUT_CHARS),
            "success": output.code == Some(0),
        }))
    }
}

fn split_command(command: &str) -> Result<(&str, Vec<&str>), ToolError> {
    let mut parts = command.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| ToolError::InvalidArguments("command must not be empty".to_string()))?;
    Ok((program, parts.collect()))
}

/// Requested seconds if positive and finite, else the default; never above `max`
fn resolve_timeout(requested: Option<f64>, default: Duration, max: Duration) -> Duration {
    match requested.filter(|t| t.is_finite() && *t > 0.0) {
        Some(secs) if secs >= max.as_secs_f64() => max,
        Some(secs) => Duration::from_secs_f64(secs),
        None => default.min(max),
    }
}

/// Exact match on a bare program name, lowercased, ignoring a `.exe` suffix
///
/// Anything with a path component is refused so only programs found on
/// `PATH` can run.
fn is_allowed(program: &str) -> bool {
    if program.contains(['/', '\\', ':']) {
        return false;
    }
    let name = program.to_lowercase();
    let name = name.strip_suffix(".exe").unwrap_or(&name);
    ALLOWED_COMMANDS.contains(&name)
}

#[derive(Debug)]
struct ProgramOutput {
    code: Option<i32>,
    stdout: String,
    stderr: String,
}

/// Spawn without a shell and kill the child if the timeout fires
async fn run_program(program: &str, args: &[&str], dir: &Path, timeout: Duration) -> Result<ProgramOutput, ToolError> {
    let child = Command::new(program)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ToolError::io(format!("spawn {}", program), e))?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| {
            debug!("Command {} timed out after {:?}", program, timeout);
            ToolError::Timeout { after: timeout }
        })?
        .map_err(|e| ToolError::io(format!("wait for {}", program), e))?;

    Ok(ProgramOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
