//! OAuth Callback Server
//!
//! A transient loopback HTTP listener that receives the authorization code
//! after browser consent. The handler exchanges the code itself and then
//! completes the pending flow through a single-slot channel; the listener
//! is stopped on every exit path.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    extract::{Query, State},
    response::{Html, IntoResponse},
    routing::get,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::storage::TokenSet;
use crate::{Error, Result};

/// How long graceful shutdown may take before the listener task is aborted
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Turns an authorization code into a token set.
///
/// Implementations persist and apply the tokens before returning.
#[async_trait]
pub trait CodeExchanger: Send + Sync {
    /// Exchange `code` for tokens
    async fn exchange(&self, code: &str) -> Result<TokenSet>;
}

/// OAuth callback query parameters
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    /// Authorization code
    pub code: Option<String>,

    /// State parameter (for CSRF protection)
    pub state: Option<String>,

    /// Error code
    pub error: Option<String>,

    /// Error description
    pub error_description: Option<String>,
}

/// State shared with the callback handler
struct CallbackState {
    expected_state: String,
    exchanger: Arc<dyn CodeExchanger>,
    tx: Option<oneshot::Sender<Result<TokenSet>>>,
}

/// Bind the loopback listener for the consent callback.
///
/// Port `0` picks a free port.
pub async fn bind_loopback(port: u16) -> Result<TcpListener> {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    TcpListener::bind(addr).await.map_err(|e| {
        Error::AuthFlowFailed(format!(
            "Failed to bind OAuth callback listener on {addr}: {e}"
        ))
    })
}

/// A running callback listener tied to one pending authorization
pub struct CallbackServer {
    addr: SocketAddr,
    rx: oneshot::Receiver<Result<TokenSet>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl CallbackServer {
    /// Start serving `path` on an already-bound listener
    pub fn start(
        listener: TcpListener,
        path: &str,
        expected_state: String,
        exchanger: Arc<dyn CodeExchanger>,
    ) -> Result<Self> {
        if !path.starts_with('/') {
            return Err(Error::Config(format!(
                "OAuth callback path must start with '/': {path}"
            )));
        }

        let addr = listener.local_addr()?;
        let (tx, rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let state = Arc::new(Mutex::new(CallbackState {
            expected_state,
            exchanger,
            tx: Some(tx),
        }));

        let app = Router::new()
            .route(path, get(handle_callback))
            .with_state(state);

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                warn!(error = %e, "OAuth callback listener error");
            }
        });

        info!(%addr, "OAuth callback listener started");

        Ok(Self {
            addr,
            rx,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for the flow to complete, then stop the listener.
    ///
    /// The listener is stopped whether the flow succeeded, failed or timed out.
    pub async fn wait(mut self, timeout: Duration) -> Result<TokenSet> {
        let outcome = match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::AuthFlowFailed(
                "OAuth callback listener stopped unexpectedly".to_string(),
            )),
            Err(_) => Err(Error::AuthFlowFailed(format!(
                "Timed out after {}s waiting for authorization",
                timeout.as_secs()
            ))),
        };

        self.shutdown().await;
        outcome
    }

    async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
                task.abort();
                let _ = task.await;
            }
        }
        debug!(addr = %self.addr, "OAuth callback listener stopped");
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Handle the OAuth callback
async fn handle_callback(
    State(state): State<Arc<Mutex<CallbackState>>>,
    Query(params): Query<CallbackParams>,
) -> impl IntoResponse {
    debug!(
        has_code = params.code.is_some(),
        error = ?params.error,
        "Received OAuth callback"
    );

    // Held across the exchange so a concurrent callback cannot exchange twice
    let mut state = state.lock().await;

    let Some(tx) = state.tx.take() else {
        return Html(error_page(
            "already_handled",
            "This authorization request has already been completed.",
        ));
    };

    let (outcome, page) = match evaluate(&state, params).await {
        Ok(token) => (Ok(token), success_page()),
        Err((code, err)) => {
            let page = error_page(&code, &err.to_string());
            (Err(err), page)
        }
    };

    let _ = tx.send(outcome);
    Html(page)
}

async fn evaluate(
    state: &CallbackState,
    params: CallbackParams,
) -> std::result::Result<TokenSet, (String, Error)> {
    if let Some(error) = params.error {
        if let Some(description) = params.error_description {
            debug!(%error, %description, "Provider rejected authorization");
        }
        let err = Error::AuthFlowFailed(format!("OAuth error: {error}"));
        return Err((error, err));
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return Err((
            "missing_code".to_string(),
            Error::AuthFlowFailed("No authorization code received".to_string()),
        ));
    };

    if let Some(received) = params.state {
        if received != state.expected_state {
            return Err((
                "state_mismatch".to_string(),
                Error::AuthFlowFailed("State mismatch in OAuth callback".to_string()),
            ));
        }
    }

    match state.exchanger.exchange(&code).await {
        Ok(token) => Ok(token),
        Err(err @ Error::AuthFlowFailed(_)) => Err(("exchange_failed".to_string(), err)),
        Err(other) => Err((
            "exchange_failed".to_string(),
            Error::AuthFlowFailed(other.to_string()),
        )),
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn success_page() -> String {
    r#"<!DOCTYPE html>
<html>
<head>
    <title>Blogger Authorization Successful</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            display: flex;
            justify-content: center;
            align-items: center;
            height: 100vh;
            margin: 0;
            background: #f57c00;
            color: white;
        }
        .container { text-align: center; padding: 2rem; }
        h1 { margin: 0 0 0.5rem 0; }
        p { margin: 0; opacity: 0.9; }
    </style>
</head>
<body>
    <div class="container">
        <h1>Authorization Successful</h1>
        <p>Blogger access was granted. You can close this window and return to your MCP client.</p>
    </div>
    <script>setTimeout(() => window.close(), 3000);</script>
</body>
</html>"#
        .to_string()
}

fn error_page(error: &str, description: &str) -> String {
    let error = html_escape(error);
    let description = html_escape(description);
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Blogger Authorization Failed</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            display: flex;
            justify-content: center;
            align-items: center;
            height: 100vh;
            margin: 0;
            background: #c0392b;
            color: white;
        }}
        .container {{ text-align: center; padding: 2rem; max-width: 400px; }}
        h1 {{ margin: 0 0 0.5rem 0; }}
        p {{ margin: 0; opacity: 0.9; }}
        .error-code {{ font-family: monospace; margin-top: 1rem; opacity: 0.7; }}
    </style>
</head>
<body>
    <div class="container">
        <h1>Authorization Failed</h1>
        <p>{description}</p>
        <p class="error-code">Error: {error}</p>
    </div>
</body>
</html>"#
    )
}
