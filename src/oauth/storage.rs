//! OAuth Token Storage
//!
//! Persists the single Blogger token set to disk for reuse across restarts.
//! The file uses Google's token JSON field names, so a `tokens.json` written
//! by other Google client libraries loads as-is.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// OAuth token set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    /// Access token
    pub access_token: String,

    /// Refresh token; long-lived and kept across refreshes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Granted scopes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Token type (usually "Bearer")
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Expiry instant, stored as epoch milliseconds
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiry_date: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenSet {
    /// Check if the token is expired now
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Check expiry against a given instant.
    ///
    /// Expired means `now >= expiry_date`; no expiry means never expires.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date.is_some_and(|expiry| now >= expiry)
    }

    /// Time until expiration
    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.expiry_date
            .and_then(|expiry| (expiry - Utc::now()).to_std().ok())
    }

    /// Whether a non-empty refresh token is present
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Carry `previous`'s refresh token over when this set lacks one.
    ///
    /// Refresh responses usually omit the refresh token.
    #[must_use]
    pub fn keeping_refresh_token(mut self, previous: &TokenSet) -> Self {
        if !self.has_refresh_token() {
            self.refresh_token.clone_from(&previous.refresh_token);
        }
        self
    }
}

/// Single-slot token store backed by one JSON file
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Create a store for the given file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored token set.
    ///
    /// A missing or unparsable file yields `None`.
    pub fn load(&self) -> Option<TokenSet> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No stored tokens found");
            return None;
        }

        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<TokenSet>(&content) {
                Ok(token) => {
                    if token.is_expired() {
                        debug!(path = %self.path.display(), "Stored token is expired");
                    } else {
                        info!(expires_in = ?token.time_until_expiry(), "Loaded stored token");
                    }
                    Some(token)
                }
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "Failed to parse stored token");
                    None
                }
            },
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read token file");
                None
            }
        }
    }

    /// Overwrite the stored token set
    pub fn save(&self, token: &TokenSet) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Internal(format!("Failed to create token dir: {e}")))?;
        }

        let content = serde_json::to_string_pretty(token)
            .map_err(|e| Error::Internal(format!("Failed to serialize token: {e}")))?;

        fs::write(&self.path, content)
            .map_err(|e| Error::Internal(format!("Failed to write token file: {e}")))?;

        // Owner read/write only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            let _ = fs::set_permissions(&self.path, perms);
        }

        info!(path = %self.path.display(), "Saved OAuth token");
        Ok(())
    }

    /// Delete the stored token set; a missing file is not an error
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .map_err(|e| Error::Internal(format!("Failed to delete token file: {e}")))?;
            info!(path = %self.path.display(), "Deleted OAuth token");
        }

        Ok(())
    }
}
