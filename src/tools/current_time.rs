//! get_current_time tool - Current time in an IANA timezone

use std::fmt::Write as _;

use async_trait::async_trait;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, TimeZone};
use chrono_tz::Tz;
use serde_json::{Value, json};

use super::{Arguments, ParamKind, Parameter, ParameterSchema, Tool, ToolContext, ToolError};

const DEFAULT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &'static str {
        "get_current_time"
    }

    fn description(&self) -> &'static str {
        "Get the current date and time, optionally in a given timezone and strftime format"
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new(vec![
            Parameter::new("timezone", ParamKind::String, "IANA timezone name, e.g. 'Europe/Warsaw' (default: local)"),
            Parameter::new("format", ParamKind::String, "strftime format (default: '%Y-%m-%d %H:%M:%S')"),
        ])
    }

    async fn execute(&self, args: &Arguments, ctx: &ToolContext) -> Result<Value, ToolError> {
        let format = args.opt_str("format").filter(|f| !f.is_empty()).unwrap_or(DEFAULT_FORMAT);
        let items = parse_format(format)?;
        let now = ctx.clock.now();

        match args.opt_str("timezone").map(str::trim).filter(|tz| !tz.is_empty()) {
            Some(name) => {
                let tz: Tz = name
                    .parse()
                    .map_err(|_| ToolError::InvalidArguments(format!("unknown timezone '{}'", name)))?;
                render(&now.with_timezone(&tz), &items, name)
            }
            None => render(&now.with_timezone(&Local), &items, "local"),
        }
    }
}

/// Reject bad format strings up front; chrono panics on them at display time
fn parse_format(format: &str) -> Result<Vec<Item<'_>>, ToolError> {
    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(ToolError::InvalidArguments(format!("invalid time format '{}'", format)));
    }
    Ok(items)
}

fn render<Tz2>(time: &DateTime<Tz2>, items: &[Item<'_>], zone: &str) -> Result<Value, ToolError>
where
    Tz2: TimeZone,
    Tz2::Offset: std::fmt::Display,
{
    let mut current_time = String::new();
    write!(current_time, "{}", time.format_with_items(items.iter()))
        .map_err(|_| ToolError::InvalidArguments("time format could not be rendered".to_string()))?;

    Ok(json!({
        "current_time": current_time,
        "timestamp": time.timestamp_millis() as f64 / 1000.0,
        "timezone": zone,
        "weekday": time.format("%A").to_string(),
        "iso_format": time.to_rfc3339(),
    }))
}
