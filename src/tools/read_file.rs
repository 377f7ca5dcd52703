//! read_file tool - Read the first lines of a text file

use std::io::ErrorKind;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::path_policy::resolve;
use super::{Arguments, ParamKind, Parameter, ParameterSchema, Tool, ToolContext, ToolError};

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read the contents of a text file (files over 1 MiB are refused)"
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new(vec![
            Parameter::new("path", ParamKind::String, "File path (relative paths use the working directory)")
                .required(),
            Parameter::new("lines", ParamKind::Integer, "Maximum number of lines to read (default: 100)"),
        ])
    }

    async fn execute(&self, args: &Arguments, ctx: &ToolContext) -> Result<Value, ToolError> {
        let raw = args.str("path")?;
        let max_lines = args
            .opt_u64("lines")
            .map(|l| l as usize)
            .filter(|l| *l > 0)
            .unwrap_or(ctx.limits.default_read_lines);
        let path = resolve(&ctx.working_dir, raw);

        let meta = ctx.fs.metadata(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => ToolError::NotFound { path: raw.to_string() },
            _ => ToolError::io(format!("stat {}", raw), e),
        })?;
        if !meta.is_file {
            return Err(ToolError::InvalidArguments(format!("not a file: {}", raw)));
        }

        // Size is checked before a single byte is read
        let limit = ctx.limits.max_read_bytes;
        if meta.len > limit {
            return Err(ToolError::TooLarge {
                path: raw.to_string(),
                size: meta.len,
                limit,
            });
        }

        let bytes = ctx
            .fs
            .read(&path)
            .await
            .map_err(|e| ToolError::io(format!("read {}", raw), e))?;
        let text = String::from_utf8_lossy(&bytes);

        let lines: Vec<&str> = text.split_inclusive('\n').take(max_lines).collect();

        Ok(json!({
            "path": path.display().to_string(),
            "content": lines.concat(),
            "lines_read": lines.len(),
            "file_size_bytes": meta.len,
            "encoding": "utf-8",
        }))
    }
}
