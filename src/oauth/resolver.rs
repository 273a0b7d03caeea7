//! Credential resolution
//!
//! Decides, per operation, whether to use the static API key or an OAuth
//! token, refreshing or running the consent flow when needed.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::client::{BrowserLauncher, OAuthClient};
use super::storage::TokenSet;
use crate::config::Config;
use crate::{Error, Result};

/// What an operation needs to be allowed to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRequirement {
    /// Public data; API key or OAuth
    Read,
    /// Private data or mutation; OAuth only
    Write,
}

/// A credential usable for one Blogger API call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Static API key, sent as the `key` query parameter
    ApiKey(String),
    /// OAuth token set, sent as a bearer token
    OAuth(TokenSet),
}

impl Credential {
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ApiKey(_) => "api_key",
            Self::OAuth(_) => "oauth",
        }
    }
}

/// Source of credentials for tool handlers
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Produce a credential satisfying `requirement`
    async fn resolve(&self, requirement: AuthRequirement) -> Result<Credential>;

    /// Try `primary`; on any failure, try `secondary` exactly once
    async fn resolve_with_fallback(
        &self,
        primary: AuthRequirement,
        secondary: AuthRequirement,
    ) -> Result<Credential> {
        match self.resolve(primary).await {
            Ok(credential) => Ok(credential),
            Err(e) => {
                warn!(
                    error = %e,
                    ?primary,
                    ?secondary,
                    "Credential resolution failed, falling back"
                );
                self.resolve(secondary).await
            }
        }
    }
}

/// Resolves credentials from the configured API key and OAuth client
#[derive(Debug)]
pub struct CredentialResolver {
    api_key: Option<String>,
    oauth: Option<OAuthClient>,
    /// Serializes OAuth resolution so at most one consent flow runs
    oauth_lock: Mutex<()>,
}

impl CredentialResolver {
    /// Create a resolver from already-built parts
    pub fn new(api_key: Option<String>, oauth: Option<OAuthClient>) -> Self {
        Self {
            api_key,
            oauth,
            oauth_lock: Mutex::new(()),
        }
    }

    /// Build a resolver from configuration.
    ///
    /// The OAuth client is only created when both client ID and secret are set.
    pub fn from_config(
        config: &Config,
        http_client: Client,
        launcher: Arc<dyn BrowserLauncher>,
    ) -> Result<Self> {
        let oauth = if config.oauth.is_configured() {
            Some(OAuthClient::new(&config.oauth, http_client, launcher)?)
        } else {
            None
        };
        Ok(Self::new(config.api_key.clone(), oauth))
    }

    /// The OAuth client, if configured
    pub fn oauth(&self) -> Option<&OAuthClient> {
        self.oauth.as_ref()
    }

    async fn resolve_oauth(&self) -> Result<TokenSet> {
        let client = self.oauth.as_ref().ok_or_else(|| {
            Error::AuthUnavailable("OAuth required, not configured".to_string())
        })?;

        // A waiter re-reads the token state below and reuses a token the previous flow obtained
        let _guard = self.oauth_lock.lock().await;

        let token = client.current_token().or_else(|| {
            let stored = client.store().load();
            if let Some(ref t) = stored {
                client.set_token(t.clone());
            }
            stored
        });

        match token {
            None => {
                info!("No OAuth token available, starting consent flow");
                client.authorize().await
            }
            Some(token) if token.is_expired() => {
                if token.has_refresh_token() {
                    match client.refresh(&token).await {
                        Ok(refreshed) => return Ok(refreshed),
                        Err(e) => {
                            warn!(error = %e, "Token refresh failed, starting consent flow");
                        }
                    }
                } else {
                    info!("Expired token has no refresh token, starting consent flow");
                }
                client.authorize().await
            }
            Some(token) => Ok(token),
        }
    }
}

#[async_trait]
impl CredentialSource for CredentialResolver {
    async fn resolve(&self, requirement: AuthRequirement) -> Result<Credential> {
        let credential = match requirement {
            AuthRequirement::Write => Credential::OAuth(self.resolve_oauth().await?),
            AuthRequirement::Read => {
                if let Some(key) = &self.api_key {
                    Credential::ApiKey(key.clone())
                } else if self.oauth.is_some() {
                    Credential::OAuth(self.resolve_oauth().await?)
                } else {
                    return Err(Error::AuthUnavailable(
                        "No API key or OAuth client configured".to_string(),
                    ));
                }
            }
        };

        debug!(?requirement, kind = credential.kind(), "Resolved credential");
        Ok(credential)
    }
}
