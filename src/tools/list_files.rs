//! list_files tool - List a directory's contents

use std::io::ErrorKind;
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use log::debug;
use serde_json::{Value, json};

use super::path_policy::resolve;
use super::{Arguments, ParamKind, Parameter, ParameterSchema, Tool, ToolContext, ToolError};

pub struct ListFilesTool;

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &'static str {
        "list_files"
    }

    fn description(&self) -> &'static str {
        "List files and directories at a path"
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new(vec![
            Parameter::new("path", ParamKind::String, "Directory path (relative paths use the working directory)")
                .required(),
        ])
    }

    async fn execute(&self, args: &Arguments, ctx: &ToolContext) -> Result<Value, ToolError> {
        let raw = args.str("path")?;
        let path = resolve(&ctx.working_dir, raw);

        let meta = ctx.fs.metadata(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => ToolError::NotFound { path: raw.to_string() },
            _ => ToolError::io(format!("stat {}", raw), e),
        })?;
        if !meta.is_dir {
            return Err(ToolError::InvalidArguments(format!("not a directory: {}", raw)));
        }

        let entries = ctx
            .fs
            .read_dir(&path)
            .await
            .map_err(|e| ToolError::io(format!("list {}", raw), e))?;

        let mut items: Vec<(bool, String, Value)> = entries
            .into_iter()
            .filter_map(|entry| {
                let Some(meta) = entry.meta else {
                    debug!("Skipping inaccessible entry {}", entry.name);
                    return None;
                };
                let item = json!({
                    "name": entry.name,
                    "type": if meta.is_dir { "directory" } else { "file" },
                    "size_bytes": if meta.is_dir { None } else { Some(meta.len) },
                    "modified": meta.modified.map(format_time),
                });
                Some((!meta.is_dir, entry.name.to_lowercase(), item))
            })
            .collect();

        // Directories first, then by case-insensitive name
        items.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
        let items: Vec<Value> = items.into_iter().map(|(_, _, item)| item).collect();

        Ok(json!({
            "path": path.display().to_string(),
            "total_items": items.len(),
            "items": items,
        }))
    }
}

fn format_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time).format("%Y-%m-%d %H:%M:%S").to_string()
}
