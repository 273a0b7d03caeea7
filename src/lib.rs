//! Blogger MCP Server Library
//!
//! Exposes Blogger blog and post operations as MCP tools over stdio.
//!
//! # Features
//!
//! - **Read tools**: blog info, post listing, search and retrieval with an API key or OAuth
//! - **Write tools**: create, update and delete posts with OAuth
//! - **OAuth**: interactive browser consent with a loopback callback, token persistence
//!   and transparent refresh
//!
//! # Protocol Version
//!
//! Implements MCP protocol versions 2024-11-05 through 2025-06-18 over stdio.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod blogger;
pub mod cli;
pub mod config;
pub mod error;
pub mod oauth;
pub mod protocol;
pub mod server;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Server name reported in `initialize`
pub const SERVER_NAME: &str = "blogger-mcp";

/// Setup tracing/logging
///
/// Logs always go to stderr; stdout carries the protocol.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| Error::Internal(format!("Failed to install subscriber: {e}")))?;
        }
        _ => {
            subscriber
                .with(fmt::layer().with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| Error::Internal(format!("Failed to install subscriber: {e}")))?;
        }
    }

    Ok(())
}
