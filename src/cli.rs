//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// MCP server for Blogger - read, search and publish posts
#[derive(Parser, Debug)]
#[command(name = "blogger-mcp")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "BLOGGER_MCP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "BLOGGER_MCP_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "BLOGGER_MCP_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the MCP server on stdio (default)
    Serve,

    /// OAuth token management
    #[command(subcommand)]
    Auth(AuthCommand),

    /// Print the tool definitions as JSON
    Tools,
}

/// OAuth subcommands
#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Run the browser consent flow and store the token
    Login,

    /// Revoke the stored token and delete it
    Logout,

    /// Show whether a token is stored and whether it has expired
    Status,
}
