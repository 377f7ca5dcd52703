//! write_file tool - Write or append text outside system directories

use async_trait::async_trait;
use serde_json::{Value, json};

use super::path_policy::check_write_target;
use super::{Arguments, ParamKind, Parameter, ParameterSchema, Tool, ToolContext, ToolError};

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn description(&self) -> &'static str {
        "Write text to a file, replacing or appending. System directories are off limits."
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new(vec![
            Parameter::new("path", ParamKind::String, "File path (relative paths use the working directory)")
                .required(),
            Parameter::new("content", ParamKind::String, "Text to write").required(),
            Parameter::new("mode", ParamKind::String, "'write' replaces the file, 'append' adds to it (default: write)")
                .one_of(&["write", "append"]),
        ])
    }

    async fn execute(&self, args: &Arguments, ctx: &ToolContext) -> Result<Value, ToolError> {
        let raw = args.str("path")?;
        let content = args.str("content")?;
        let mode = args.opt_str("mode").unwrap_or("write");

        let path = check_write_target(ctx, raw).await?;

        ctx.fs
            .write(&path, content.as_bytes(), mode == "append")
            .await
            .map_err(|e| ToolError::io(format!("write {}", raw), e))?;

        let size = ctx
            .fs
            .metadata(&path)
            .await
            .map_err(|e| ToolError::io(format!("stat {}", raw), e))?
            .len;

        Ok(json!({
            "path": path.display().to_string(),
            "bytes_written": content.len(),
            "file_size_bytes": size,
            "mode": mode,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn run(ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        WriteFileTool.execute(&Arguments::from_value(args), ctx).await
    }

    #[tokio::test]
    async fn test_write_then_append() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path());

        let payload = run(&ctx, json!({"path": "notes/a.txt", "content": "héllo"})).await.unwrap();
        assert_eq!(payload["bytes_written"], 6);
        assert_eq!(payload["mode"], "write");

        let payload = run(&ctx, json!({"path": "notes/a.txt", "content": "!", "mode": "append"}))
            .await
            .unwrap();
        assert_eq!(payload["file_size_bytes"], 7);

        let written = std::fs::read_to_string(dir.path().join("notes/a.txt")).unwrap();
        assert_eq!(written, "héllo!");
    }

    #[tokio::test]
    async fn test_write_denied() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path());

        for path in ["/etc/cron.d/job", "/proc/sys/kernel/x", r"C:\Windows\evil.dll"] {
            let err = run(&ctx, json!({"path": path, "content": "x"})).await.unwrap_err();
            assert!(matches!(err, ToolError::Denied { .. }), "{} should be denied", path);
        }
    }
}
