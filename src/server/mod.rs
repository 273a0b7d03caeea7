//! MCP tool server
//!
//! Wires configuration, credentials and the Blogger client into a stdio
//! JSON-RPC loop.

pub mod dispatch;
pub mod format;
pub mod schema_validator;
pub mod stdio;
pub mod tools;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::info;

pub use dispatch::ToolDispatcher;
pub use stdio::StdioServer;

use crate::Result;
use crate::blogger::BloggerClient;
use crate::config::Config;
use crate::oauth::{CredentialResolver, SystemBrowser};

/// Timeout for OAuth token, refresh and revoke requests
const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Build the HTTP client used for the OAuth endpoints
pub fn oauth_http_client() -> Result<Client> {
    Ok(Client::builder().timeout(TOKEN_REQUEST_TIMEOUT).build()?)
}

/// The stdio tool server
pub struct Server {
    stdio: StdioServer,
}

impl Server {
    /// Build the server from configuration
    pub fn new(config: &Config) -> Result<Self> {
        let content = BloggerClient::new(&config.blogger)?;
        let credentials =
            CredentialResolver::from_config(config, oauth_http_client()?, Arc::new(SystemBrowser))?;

        info!(
            api_key = config.api_key.is_some(),
            oauth = credentials.oauth().is_some(),
            "Credentials configured"
        );

        let dispatcher = ToolDispatcher::new(Arc::new(credentials), Arc::new(content));
        Ok(Self {
            stdio: StdioServer::new(dispatcher),
        })
    }

    /// Serve on stdin/stdout until stdin closes
    pub async fn run(self) -> Result<()> {
        info!(version = env!("CARGO_PKG_VERSION"), "Starting Blogger MCP server on stdio");
        self.stdio
            .serve(tokio::io::stdin(), tokio::io::stdout())
            .await
    }
}
