//! Configuration management

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Conventional variable holding the Blogger API key
pub const API_KEY_VAR: &str = "BLOGGER_API_KEY";
/// Conventional variable holding the Google OAuth client ID
pub const CLIENT_ID_VAR: &str = "GOOGLE_CLIENT_ID";
/// Conventional variable holding the Google OAuth client secret
pub const CLIENT_SECRET_VAR: &str = "GOOGLE_CLIENT_SECRET";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Environment files to load after the config is read.
    /// Loaded in order; files that don't exist are skipped.
    pub env_files: Vec<String>,
    /// Blogger API key for read-only access
    pub api_key: Option<String>,
    /// OAuth client configuration
    pub oauth: OAuthConfig,
    /// Blogger API client configuration
    pub blogger: BloggerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            env_files: vec![".env".to_string()],
            api_key: None,
            oauth: OAuthConfig::default(),
            blogger: BloggerConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        figment = figment.merge(Env::prefixed("BLOGGER_MCP_").split("__"));

        let mut config = Self::from_figment(&figment)?;

        // .env may carry the conventional variables
        config.load_env_files();
        config.apply_conventional_env(|key| std::env::var(key).ok());

        Ok(config)
    }

    /// Extract a configuration from an already-assembled figment
    ///
    /// Blank credentials are treated as unset.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let mut config: Self = figment.extract().map_err(|e| Error::Config(e.to_string()))?;
        config.api_key = non_blank(config.api_key.take());
        config.oauth.client_id = non_blank(config.oauth.client_id.take());
        config.oauth.client_secret = non_blank(config.oauth.client_secret.take());
        Ok(config)
    }

    /// Load environment files into the process environment.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let path = Path::new(path_str);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => {
                        tracing::info!("Loaded env file: {path_str}");
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load env file {path_str}: {e}");
                    }
                }
            } else {
                tracing::debug!("Env file not found (skipped): {path_str}");
            }
        }
    }

    /// Fill unset credentials from the conventional variables
    /// (`BLOGGER_API_KEY`, `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`).
    ///
    /// Values already set by the config file or `BLOGGER_MCP_*` win.
    /// Empty values are treated as unset.
    pub fn apply_conventional_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| non_blank(lookup(key));

        if self.api_key.is_none() {
            self.api_key = get(API_KEY_VAR);
        }
        if self.oauth.client_id.is_none() {
            self.oauth.client_id = get(CLIENT_ID_VAR);
        }
        if self.oauth.client_secret.is_none() {
            self.oauth.client_secret = get(CLIENT_SECRET_VAR);
        }
    }

    /// Check that at least one credential kind is configured.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when neither an API key nor a complete
    /// OAuth client pair is present.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.is_none() && !self.oauth.is_configured() {
            return Err(Error::Config(format!(
                "Either {API_KEY_VAR} or both {CLIENT_ID_VAR} and {CLIENT_SECRET_VAR} must be set"
            )));
        }
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// OAuth client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Client ID
    pub client_id: Option<String>,
    /// Client secret
    pub client_secret: Option<String>,
    /// Authorization endpoint
    pub auth_url: String,
    /// Token endpoint
    pub token_url: String,
    /// Revocation endpoint
    pub revoke_url: String,
    /// Scope requested during consent
    pub scope: String,
    /// Loopback port for the consent callback (0 picks a free port)
    pub callback_port: u16,
    /// Path of the consent callback
    pub callback_path: String,
    /// How long to wait for the browser callback
    #[serde(with = "humantime_serde")]
    pub flow_timeout: Duration,
    /// Token file location
    pub token_file: PathBuf,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            revoke_url: "https://oauth2.googleapis.com/revoke".to_string(),
            scope: "https://www.googleapis.com/auth/blogger".to_string(),
            callback_port: 3000,
            callback_path: "/oauth/callback".to_string(),
            flow_timeout: Duration::from_secs(5 * 60),
            token_file: PathBuf::from("tokens.json"),
        }
    }
}

impl OAuthConfig {
    /// Whether both client ID and secret are present
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }
}

/// Blogger API client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BloggerConfig {
    /// API base URL
    pub base_url: String,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for BloggerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.googleapis.com/blogger/v3".to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Serde helpers for human-readable durations ("30s", "5m", "100ms")
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    /// Serialize Duration to a whole-second string (e.g., "30s")
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the serializer fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    /// Deserialize a duration string; a bare number is taken as seconds
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if the string cannot be parsed as a duration.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let s = s.trim();

        // "ms" must be checked before "m" and "s"
        if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(serde::de::Error::custom)
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(serde::de::Error::custom)
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        }
    }
}
