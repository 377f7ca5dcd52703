use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod cli;

use cli::Cli;
use cli::commands::Commands;
use toolchat::ToolchatError;
use toolchat::config::Config;
use toolchat::host::EnvCredentials;
use toolchat::llm::{Message, ModelClient, WorkersAiClient, known_models};
use toolchat::orchestrator::{AuditEntry, ChatRequest, Orchestrator};
use toolchat::tools::{ToolContext, ToolRegistry, ToolResult, truncate_text};

fn setup_logging(level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("toolchat")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("toolchat.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG wins over the configured level
    let env = env_logger::Env::default().default_filter_or(level.unwrap_or("info"));
    env_logger::Builder::from_env(env)
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn build_registry(config: &Config) -> Result<ToolRegistry> {
    let working_dir = config.tools.working_dir().context("Failed to resolve working directory")?;
    let ctx = ToolContext::new(working_dir).with_limits(config.tools.limits());
    Ok(ToolRegistry::standard(ctx))
}

fn build_client(config: &Config) -> toolchat::Result<WorkersAiClient> {
    Ok(WorkersAiClient::from_credentials(
        &EnvCredentials,
        &config.model.account_id_env,
        &config.model.api_token_env,
        config.model.client_config(),
    )?)
}

/// Parse `--args`; absent means no arguments
fn parse_tool_args(raw: Option<&str>) -> toolchat::Result<Map<String, Value>> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(ToolchatError::InvalidRequest(format!(
            "--args must be a JSON object, got {}",
            other
        ))),
    }
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
        println!("  model: {}", config.model.model);
        println!("  max rounds: {}", config.chat.max_tool_rounds);
    }

    match &cli.command {
        Commands::Chat {
            message,
            system,
            tools,
            max_tokens,
            temperature,
            rounds,
            json,
        } => {
            let mut messages = Vec::new();
            if let Some(system) = system {
                messages.push(Message::system(system));
            }
            messages.push(Message::user(message.join(" ")));

            let request = ChatRequest {
                messages,
                tools: tools.clone(),
                max_tokens: *max_tokens,
                temperature: *temperature,
                max_tool_rounds: *rounds,
            };
            handle_chat_command(request, *json, config).await
        }
        Commands::Tools { json } => handle_tools_command(*json, config),
        Commands::Tool { name, args } => handle_tool_command(name, args.as_deref(), config).await,
        Commands::Probe => handle_probe_command(config).await,
        Commands::Models => handle_models_command(config),
    }
}

async fn handle_chat_command(request: ChatRequest, json: bool, config: &Config) -> Result<()> {
    info!("Chat request with {} messages", request.messages.len());

    let registry = Arc::new(build_registry(config)?);
    let client = Arc::new(build_client(config).context("Failed to configure inference client")?);
    let orchestrator = Orchestrator::with_config(client, registry, config.chat.orchestrator_config());

    // Ctrl-C stops the run at the next round boundary
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match orchestrator.run_with_cancel(request, cancel).await {
        Ok(run) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&run)?);
                return Ok(());
            }
            print_audit_trail(&run.audit_trail);
            println!("{}", run.response);
            println!(
                "{}",
                format!("({} rounds, {} tokens)", run.rounds, run.usage.total()).dimmed()
            );
            Ok(())
        }
        Err(failure) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&failure)?);
            } else {
                print_audit_trail(&failure.audit_trail);
                eprintln!("{} [{}] {}", "Run failed:".red(), failure.kind(), failure.error);
            }
            Err(ToolchatError::Run(failure.error).into())
        }
    }
}

fn print_audit_trail(trail: &[AuditEntry]) {
    for entry in trail {
        let args = Value::Object(entry.arguments.clone());
        let marker = if entry.result.is_success() {
            "ok".green()
        } else {
            "error".red()
        };
        println!(
            "{} {}({}) {} {}",
            format!("[round {}]", entry.round).dimmed(),
            entry.tool_name.cyan(),
            args,
            marker,
            truncate_text(&entry.result.summary(), 200).dimmed()
        );
    }
}

fn handle_tools_command(json: bool, config: &Config) -> Result<()> {
    let registry = build_registry(config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&registry.catalog())?);
        return Ok(());
    }

    println!("{} {}", "Available tools:".green(), registry.len());
    for descriptor in registry.list_descriptors(None) {
        println!("  {} - {}", descriptor.name.cyan(), descriptor.description);
        for param in descriptor.parameters.params() {
            let required = if param.required { " (required)" } else { "" };
            println!(
                "      {}: {}{} - {}",
                param.name,
                param.kind.as_str(),
                required,
                param.description
            );
        }
    }
    Ok(())
}

async fn handle_tool_command(name: &str, args: Option<&str>, config: &Config) -> Result<()> {
    info!("Direct tool execution: {}", name);

    let arguments = parse_tool_args(args)?;

    let registry = build_registry(config)?;
    let result = registry.execute(name, arguments).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    match result {
        ToolResult::Success { .. } => Ok(()),
        ToolResult::Failure { error } => Err(eyre!("Tool {} failed: {}", name, error)),
    }
}

async fn handle_probe_command(config: &Config) -> Result<()> {
    let client = build_client(config).context("Failed to configure inference client")?;
    println!("{} {}", "Probing:".cyan(), client.endpoint_url());

    match client.probe().await {
        Ok(reply) => {
            println!("{} {} replied: {}", "Connected:".green(), client.model(), reply.trim());
            Ok(())
        }
        Err(e) => {
            eprintln!("{} [{}] {}", "Connection failed:".red(), e.kind(), e);
            Err(ToolchatError::Model(e).into())
        }
    }
}

fn handle_models_command(config: &Config) -> Result<()> {
    println!("{}", "Known models:".green());
    for model in known_models() {
        let marker = if model.id == config.model.model { "*" } else { " " };
        println!("{} {} - {} ({})", marker, model.id.cyan(), model.name, model.description);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging with the configured level
    setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tool_args() {
        assert!(parse_tool_args(None).unwrap().is_empty());

        let args = parse_tool_args(Some(r#"{"expression": "1+1"}"#)).unwrap();
        assert_eq!(args["expression"], "1+1");

        assert!(matches!(parse_tool_args(Some("[1, 2]")), Err(ToolchatError::InvalidRequest(_))));
        assert!(matches!(parse_tool_args(Some("{oops")), Err(ToolchatError::Json(_))));
    }
}
