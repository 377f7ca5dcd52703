//! get_system_info tool - CPU, memory and disk snapshot

use async_trait::async_trait;
use chrono::Local;
use serde_json::{Value, json};

use super::{Arguments, ParameterSchema, Tool, ToolContext, ToolError};
use crate::host::SystemSnapshot;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

pub struct SystemInfoTool;

#[async_trait]
impl Tool for SystemInfoTool {
    fn name(&self) -> &'static str {
        "get_system_info"
    }

    fn description(&self) -> &'static str {
        "Get operating system, CPU, memory and disk usage information"
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::empty()
    }

    async fn execute(&self, _args: &Arguments, ctx: &ToolContext) -> Result<Value, ToolError> {
        let snapshot = ctx.telemetry.system_snapshot().await?;
        Ok(render(&snapshot))
    }
}

fn gib(bytes: u64) -> f64 {
    (bytes as f64 / GIB * 100.0).round() / 100.0
}

fn render(s: &SystemSnapshot) -> Value {
    json!({
        "os": s.os,
        "os_version": s.os_version,
        "cpu": {
            "usage_percent": s.cpu.usage_percent,
            "cores": s.cpu.cores,
            "frequency_mhz": s.cpu.frequency_mhz,
        },
        "memory": {
            "total_gb": gib(s.memory.total_bytes),
            "used_gb": gib(s.memory.used_bytes()),
            "available_gb": gib(s.memory.available_bytes),
            "usage_percent": s.memory.usage_percent(),
        },
        "disk": {
            "total_gb": gib(s.disk.total_bytes),
            "used_gb": gib(s.disk.used_bytes()),
            "free_gb": gib(s.disk.free_bytes),
            "usage_percent": s.disk.usage_percent(),
        },
        "boot_time": s
            .boot_time
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()),
    })
}
