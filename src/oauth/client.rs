//! OAuth Client
//!
//! Google OAuth 2.0 authorization-code client with PKCE, token refresh and
//! revocation. Holds the live in-memory token for the process.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use parking_lot::RwLock;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use url::Url;

use super::callback::{self, CallbackServer, CodeExchanger};
use super::storage::{TokenSet, TokenStore};
use crate::config::OAuthConfig;
use crate::{Error, Result};

/// Lifecycle of an interactive consent flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    /// No flow running
    Idle,
    /// Listener up, waiting for the browser redirect
    AwaitingCallback,
    /// Last flow produced a token set
    Completed,
    /// Last flow was denied, failed to exchange, or timed out
    Failed,
}

/// Opens the consent URL for the user
pub trait BrowserLauncher: Send + Sync {
    /// Open `url`; an error makes the caller print the URL instead
    fn open(&self, url: &str) -> Result<()>;
}

/// Launches the system browser
#[derive(Debug, Default)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> Result<()> {
        open::that(url).map_err(Error::Io)
    }
}

/// OAuth client for the Blogger scope
#[derive(Clone)]
pub struct OAuthClient {
    /// HTTP client for token requests
    http_client: Client,

    /// Endpoints, scope and callback settings
    config: Arc<OAuthConfig>,

    /// Client credentials
    client_id: Arc<str>,
    client_secret: Arc<str>,

    /// Token storage
    store: TokenStore,

    /// Current token (live copy)
    current_token: Arc<RwLock<Option<TokenSet>>>,

    /// State of the most recent consent flow
    flow_state: Arc<RwLock<FlowState>>,

    launcher: Arc<dyn BrowserLauncher>,
}

impl fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClient")
            .field("client_id", &self.client_id)
            .field("token_file", &self.store.path())
            .field("flow_state", &*self.flow_state.read())
            .finish_non_exhaustive()
    }
}

/// OAuth token response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: Option<String>,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
}

impl TokenResponse {
    fn into_token_set(self) -> TokenSet {
        TokenSet {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            scope: self.scope,
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expiry_date: self
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        }
    }
}

impl OAuthClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthUnavailable`] when the client ID or secret is missing.
    pub fn new(
        config: &OAuthConfig,
        http_client: Client,
        launcher: Arc<dyn BrowserLauncher>,
    ) -> Result<Self> {
        let (Some(client_id), Some(client_secret)) =
            (config.client_id.as_deref(), config.client_secret.as_deref())
        else {
            return Err(Error::AuthUnavailable(
                "OAuth required, not configured".to_string(),
            ));
        };

        Ok(Self {
            http_client,
            client_id: Arc::from(client_id),
            client_secret: Arc::from(client_secret),
            store: TokenStore::new(config.token_file.clone()),
            config: Arc::new(config.clone()),
            current_token: Arc::new(RwLock::new(None)),
            flow_state: Arc::new(RwLock::new(FlowState::Idle)),
            launcher,
        })
    }

    /// Token storage backing this client
    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Live in-memory token, if any
    pub fn current_token(&self) -> Option<TokenSet> {
        self.current_token.read().clone()
    }

    /// Replace the live token without persisting it
    pub fn set_token(&self, token: TokenSet) {
        *self.current_token.write() = Some(token);
    }

    /// State of the most recent consent flow
    pub fn flow_state(&self) -> FlowState {
        *self.flow_state.read()
    }

    /// Persist a token set (best effort), then make it the live token
    fn persist_and_apply(&self, token: &TokenSet) {
        if let Err(e) = self.store.save(token) {
            warn!(error = %e, "Failed to persist OAuth token; continuing with in-memory token");
        }
        self.set_token(token.clone());
    }

    /// Build the consent URL
    pub fn authorization_url(
        &self,
        redirect_uri: &str,
        state: &str,
        code_challenge: &str,
    ) -> Result<Url> {
        let mut auth_url = Url::parse(&self.config.auth_url)
            .map_err(|e| Error::Config(format!("Invalid auth endpoint: {e}")))?;

        auth_url
            .query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &self.config.scope)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", state)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "S256");

        Ok(auth_url)
    }

    /// Run the interactive consent flow.
    ///
    /// On success the token set has already been persisted and applied.
    pub async fn authorize(&self) -> Result<TokenSet> {
        *self.flow_state.write() = FlowState::Idle;

        let (code_verifier, code_challenge) = generate_pkce();
        let state = generate_state();

        let listener = callback::bind_loopback(self.config.callback_port).await?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://localhost:{port}{}", self.config.callback_path);

        let auth_url = self.authorization_url(&redirect_uri, &state, &code_challenge)?;

        let exchanger = Arc::new(FlowExchange {
            client: self.clone(),
            redirect_uri,
            code_verifier,
        });
        let server = CallbackServer::start(listener, &self.config.callback_path, state, exchanger)?;
        *self.flow_state.write() = FlowState::AwaitingCallback;

        info!(port, "Opening browser for Blogger authorization");
        if let Err(e) = self.launcher.open(auth_url.as_str()) {
            warn!(error = %e, "Failed to open browser automatically");
            eprintln!("\nPlease authorize Blogger access by visiting:\n{auth_url}\n");
        }

        let outcome = server.wait(self.config.flow_timeout).await;

        *self.flow_state.write() = if outcome.is_ok() {
            FlowState::Completed
        } else {
            FlowState::Failed
        };
        match &outcome {
            Ok(_) => info!("OAuth authorization completed"),
            Err(e) => warn!(error = %e, "OAuth authorization failed"),
        }
        outcome
    }

    /// Exchange an authorization code for tokens
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> Result<TokenSet> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", &*self.client_id),
            ("client_secret", &*self.client_secret),
            ("code_verifier", code_verifier),
        ];

        let response = self
            .http_client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::AuthFlowFailed(format!("Token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::AuthFlowFailed(format!(
                "Token exchange failed: HTTP {status} - {body}"
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::AuthFlowFailed(format!("Failed to parse token response: {e}")))?;

        debug!(
            has_refresh_token = token_response.refresh_token.is_some(),
            "Exchanged authorization code"
        );
        Ok(token_response.into_token_set())
    }

    /// Refresh an expired token set.
    ///
    /// The refreshed set keeps the previous refresh token when the response
    /// omits one, and is persisted and applied before it is returned.
    pub async fn refresh(&self, previous: &TokenSet) -> Result<TokenSet> {
        let refresh_token = previous
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::AuthUnavailable("No refresh token available".to_string()))?;

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &*self.client_id),
            ("client_secret", &*self.client_secret),
        ];

        let response = self
            .http_client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::AuthFlowFailed(format!("Token refresh failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::AuthFlowFailed(format!(
                "Token refresh failed: HTTP {status} - {body}"
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::AuthFlowFailed(format!("Failed to parse refresh response: {e}")))?;

        let token = token_response
            .into_token_set()
            .keeping_refresh_token(previous);
        self.persist_and_apply(&token);

        info!(expires_in = ?token.time_until_expiry(), "Token refreshed successfully");
        Ok(token)
    }

    /// Revoke the current token and forget it locally.
    ///
    /// A failed revocation request is logged; local state is cleared regardless.
    pub async fn revoke(&self) -> Result<()> {
        let token = self.current_token().or_else(|| self.store.load());

        if let Some(token) = token {
            // Revoking the refresh token also invalidates its access tokens
            let value = token
                .refresh_token
                .filter(|t| !t.is_empty())
                .unwrap_or(token.access_token);

            match self
                .http_client
                .post(&self.config.revoke_url)
                .form(&[("token", value.as_str())])
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    info!("OAuth token revoked");
                }
                Ok(response) => {
                    warn!(status = %response.status(), "Token revocation rejected");
                }
                Err(e) => {
                    warn!(error = %e, "Token revocation request failed");
                }
            }
        } else {
            debug!("No OAuth token to revoke");
        }

        *self.current_token.write() = None;
        self.store.clear()
    }
}

/// Completes one consent flow from inside the callback handler
struct FlowExchange {
    client: OAuthClient,
    redirect_uri: String,
    code_verifier: String,
}

#[async_trait]
impl CodeExchanger for FlowExchange {
    async fn exchange(&self, code: &str) -> Result<TokenSet> {
        let token = self
            .client
            .exchange_code(code, &self.redirect_uri, &self.code_verifier)
            .await?;
        self.client.persist_and_apply(&token);
        Ok(token)
    }
}

/// Generate PKCE code verifier and challenge
fn generate_pkce() -> (String, String) {
    let verifier_bytes: [u8; 32] = rand::rng().random();
    let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    let challenge = URL_SAFE_NO_PAD.encode(hasher.finalize());

    (verifier, challenge)
}

/// Generate a random state parameter
fn generate_state() -> String {
    let state_bytes: [u8; 16] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(state_bytes)
}
