//! Blogger MCP - Blogger tools for Model Context Protocol clients
//!
//! Serves blog and post tools over stdio, with API key reads and OAuth writes.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use blogger_mcp::{
    cli::{AuthCommand, Cli, Command},
    config::Config,
    oauth::{OAuthClient, SystemBrowser, TokenStore},
    server::{Server, oauth_http_client, tools},
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup tracing
    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    match cli.command {
        Some(Command::Tools) => print_tools(),
        Some(Command::Auth(auth_cmd)) => run_auth_command(cli.config.as_deref(), auth_cmd).await,
        Some(Command::Serve) | None => run_server(cli.config.as_deref()).await,
    }
}

fn load_config(path: Option<&Path>) -> Option<Config> {
    match Config::load(path) {
        Ok(config) => Some(config),
        Err(e) => {
            error!("Failed to load configuration: {e}");
            None
        }
    }
}

/// Print tool definitions
fn print_tools() -> ExitCode {
    match serde_json::to_string_pretty(&tools::definitions()) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to serialize tools: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Run the stdio server
async fn run_server(config_path: Option<&Path>) -> ExitCode {
    let Some(config) = load_config(config_path) else {
        return ExitCode::FAILURE;
    };

    if let Err(e) = config.validate() {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    let server = match Server::new(&config) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create server: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.run().await {
        error!("Server error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Server shutdown complete");
    ExitCode::SUCCESS
}

/// Run an `auth` subcommand
async fn run_auth_command(config_path: Option<&Path>, cmd: AuthCommand) -> ExitCode {
    let Some(config) = load_config(config_path) else {
        return ExitCode::FAILURE;
    };

    let login = match cmd {
        AuthCommand::Status => return auth_status(&TokenStore::new(&config.oauth.token_file)),
        AuthCommand::Login => true,
        AuthCommand::Logout => false,
    };

    let client = match oauth_http_client()
        .and_then(|http| OAuthClient::new(&config.oauth, http, Arc::new(SystemBrowser)))
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if login {
        match client.authorize().await {
            Ok(_) => {
                println!("Authorized. Token saved to {}", client.store().path().display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Authorization failed: {e}");
                ExitCode::FAILURE
            }
        }
    } else {
        match client.revoke().await {
            Ok(()) => {
                println!("Logged out");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Logout failed: {e}");
                ExitCode::FAILURE
            }
        }
    }
}

fn auth_status(store: &TokenStore) -> ExitCode {
    let path = store.path().display();
    match store.load() {
        None => println!("Not authenticated (no token at {path})"),
        Some(token) if token.is_expired() => {
            let refresh = if token.has_refresh_token() {
                "will refresh on next use"
            } else {
                "consent required on next use"
            };
            println!("Token at {path} is expired ({refresh})");
        }
        Some(token) => match token.time_until_expiry() {
            Some(left) => println!("Authenticated; token at {path} expires in {}s", left.as_secs()),
            None => println!("Authenticated; token at {path} has no expiry"),
        },
    }
    ExitCode::SUCCESS
}
