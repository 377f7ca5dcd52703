//! CLI module for toolchat - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for chatting, tool
//! inspection and endpoint checks.

pub mod commands;

pub use commands::Cli;
