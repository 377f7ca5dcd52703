//! get_process_list tool - Top processes by CPU

use async_trait::async_trait;
use log::debug;
use serde_json::{Value, json};

use super::{Arguments, ParamKind, Parameter, ParameterSchema, Tool, ToolContext, ToolError};

pub struct ProcessListTool;

#[async_trait]
impl Tool for ProcessListTool {
    fn name(&self) -> &'static str {
        "get_process_list"
    }

    fn description(&self) -> &'static str {
        "List running processes sorted by CPU usage, optionally filtered by name"
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new(vec![
            Parameter::new("filter_name", ParamKind::String, "Only processes whose name contains this text"),
            Parameter::new("limit", ParamKind::Integer, "Maximum number of processes (default: 20)"),
        ])
    }

    async fn execute(&self, args: &Arguments, ctx: &ToolContext) -> Result<Value, ToolError> {
        let filter = args.opt_str("filter_name").filter(|f| !f.is_empty());
        let needle = filter.map(str::to_lowercase);
        let limit = args
            .opt_u64("limit")
            .map(|l| l as usize)
            .filter(|l| *l > 0)
            .unwrap_or(ctx.limits.process_limit);

        let mut skipped = 0usize;
        let mut processes: Vec<_> = ctx
            .telemetry
            .processes()
            .await?
            .into_iter()
            .filter_map(|sample| match sample {
                Ok(p) => Some(p),
                Err(e) => {
                    skipped += 1;
                    debug!("Skipping process: {}", e);
                    None
                }
            })
            .filter(|p| needle.as_ref().is_none_or(|n| p.name.to_lowercase().contains(n)))
            .collect();

        if skipped > 0 {
            debug!("Skipped {} vanished or inaccessible processes", skipped);
        }

        processes.sort_by(|a, b| b.cpu_percent.total_cmp(&a.cpu_percent));
        processes.truncate(limit);

        let listed: Vec<Value> = processes
            .iter()
            .map(|p| {
                json!({
                    "pid": p.pid,
                    "name": p.name,
                    "cpu_percent": p.cpu_percent,
                    "memory_percent": p.memory_percent,
                })
            })
            .collect();

        Ok(json!({
            "total_found": listed.len(),
            "processes": listed,
            "filter": filter,
        }))
    }
}
