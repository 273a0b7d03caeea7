//! OAuth 2.0 for the Blogger API
//!
//! Implements the Google authorization-code flow with PKCE and a loopback
//! callback, persists the token set, refreshes it on expiry, and resolves
//! per-operation credentials.
//!
//! Features:
//! - Browser-based consent with a transient callback listener
//! - Token storage compatible with Google's `tokens.json` format
//! - Automatic refresh with refresh-token preservation
//! - API key / OAuth selection with a one-shot fallback

mod callback;
mod client;
mod resolver;
mod storage;

pub use callback::{CallbackParams, CallbackServer, CodeExchanger, bind_loopback};
pub use client::{BrowserLauncher, FlowState, OAuthClient, SystemBrowser};
pub use resolver::{AuthRequirement, Credential, CredentialResolver, CredentialSource};
pub use storage::{TokenSet, TokenStore};
