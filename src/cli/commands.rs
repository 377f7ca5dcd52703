//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - chat: run one tool-augmented conversation
//! - tools: list the tool catalog
//! - tool: run a single tool directly
//! - probe: check the inference endpoint
//! - models: list known model identifiers

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Toolchat - tool-augmented conversations with a hosted language model
#[derive(Parser, Debug)]
#[command(name = "toolchat")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a message and let the model use tools until it answers
    Chat {
        /// Message text (words are joined with spaces)
        #[arg(required = true)]
        message: Vec<String>,

        /// Optional system prompt
        #[arg(short, long)]
        system: Option<String>,

        /// Comma-separated tool names to enable (default: all)
        #[arg(short, long, value_delimiter = ',')]
        tools: Option<Vec<String>>,

        /// Maximum tokens per model reply
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Sampling temperature
        #[arg(long)]
        temperature: Option<f32>,

        /// Maximum number of model rounds
        #[arg(short, long)]
        rounds: Option<u32>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List available tools
    Tools {
        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },

    /// Execute one tool directly, without the model
    Tool {
        /// Tool name
        name: String,

        /// Arguments as a JSON object
        #[arg(short, long)]
        args: Option<String>,
    },

    /// Test the connection to the inference endpoint
    Probe,

    /// List known model identifiers
    Models,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_chat() {
        let cli = Cli::try_parse_from([
            "toolchat",
            "chat",
            "what",
            "is",
            "2+2",
            "--tools",
            "calculate,get_current_time",
            "--rounds",
            "2",
        ])
        .unwrap();

        match cli.command {
            Commands::Chat {
                message, tools, rounds, json, ..
            } => {
                assert_eq!(message.join(" "), "what is 2+2");
                assert_eq!(
                    tools,
                    Some(vec!["calculate".to_string(), "get_current_time".to_string()])
                );
                assert_eq!(rounds, Some(2));
                assert!(!json);
            }
            other => panic!("expected chat, got {:?}", other),
        }
    }

    #[test]
    fn test_chat_requires_message() {
        assert!(Cli::try_parse_from(["toolchat", "chat"]).is_err());
    }

    #[test]
    fn test_parse_tool() {
        let cli = Cli::try_parse_from(["toolchat", "tool", "calculate", "--args", r#"{"expression":"1+1"}"#]).unwrap();
        match cli.command {
            Commands::Tool { name, args } => {
                assert_eq!(name, "calculate");
                assert_eq!(args.as_deref(), Some(r#"{"expression":"1+1"}"#));
            }
            other => panic!("expected tool, got {:?}", other),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["toolchat", "probe", "--verbose", "--config", "/tmp/t.yml"]).unwrap();
        assert!(cli.is_verbose());
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/t.yml")));
        assert!(matches!(cli.command, Commands::Probe));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["toolchat"]).is_err());
    }
}
