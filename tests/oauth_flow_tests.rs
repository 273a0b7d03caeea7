//! End-to-end OAuth tests
//!
//! Runs the consent flow, refresh and credential resolution against a local
//! fake of Google's token endpoint. The "browser" follows the consent URL's
//! redirect straight to the callback listener.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{Form, Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use chrono::Utc;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;

use blogger_mcp::Error;
use blogger_mcp::config::OAuthConfig;
use blogger_mcp::oauth::{
    AuthRequirement, BrowserLauncher, Credential, CredentialResolver, CredentialSource, FlowState,
    OAuthClient, TokenSet, TokenStore,
};

// ── Fake token endpoint ─────────────────────────────────────────────────────

#[derive(Default)]
struct TokenEndpoint {
    code_grants: AtomicUsize,
    refresh_grants: AtomicUsize,
    revocations: AtomicUsize,
    reject_codes: bool,
    reject_refreshes: bool,
    last_form: Mutex<HashMap<String, String>>,
}

async fn token(
    State(endpoint): State<Arc<TokenEndpoint>>,
    Form(form): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    let grant = form.get("grant_type").cloned().unwrap_or_default();
    *endpoint.last_form.lock() = form;

    match grant.as_str() {
        "authorization_code" => {
            endpoint.code_grants.fetch_add(1, Ordering::SeqCst);
            if endpoint.reject_codes {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": "invalid_grant"})),
                );
            }
            (
                StatusCode::OK,
                Json(json!({
                    "access_token": "fresh-access",
                    "refresh_token": "fresh-refresh",
                    "expires_in": 3600,
                    "token_type": "Bearer",
                    "scope": "https://www.googleapis.com/auth/blogger"
                })),
            )
        }
        "refresh_token" => {
            endpoint.refresh_grants.fetch_add(1, Ordering::SeqCst);
            if endpoint.reject_refreshes {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": "invalid_grant"})),
                );
            }
            (
                StatusCode::OK,
                Json(json!({"access_token": "refreshed-access", "expires_in": 3600})),
            )
        }
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "unsupported_grant_type"})),
        ),
    }
}

async fn revoke(State(endpoint): State<Arc<TokenEndpoint>>) -> StatusCode {
    endpoint.revocations.fetch_add(1, Ordering::SeqCst);
    StatusCode::OK
}

async fn start_token_endpoint(endpoint: Arc<TokenEndpoint>) -> SocketAddr {
    let app = Router::new()
        .route("/token", post(token))
        .route("/revoke", post(revoke))
        .with_state(endpoint);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

// ── Scripted browser ────────────────────────────────────────────────────────

/// What the simulated user does on the consent page
#[derive(Clone, Copy)]
enum Consent {
    Grant,
    Deny,
    ReturnWithoutCode,
    Ignore,
}

struct ScriptedBrowser {
    consent: Consent,
    opened: AtomicUsize,
    last_url: Mutex<Option<Url>>,
}

impl ScriptedBrowser {
    fn new(consent: Consent) -> Arc<Self> {
        Arc::new(Self {
            consent,
            opened: AtomicUsize::new(0),
            last_url: Mutex::new(None),
        })
    }

    fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    fn param(&self, name: &str) -> Option<String> {
        let url = self.last_url.lock().clone()?;
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    /// Port of the callback listener announced in the consent URL
    fn callback_port(&self) -> u16 {
        let redirect = self.param("redirect_uri").expect("redirect_uri");
        Url::parse(&redirect).unwrap().port().expect("explicit port")
    }
}

impl BrowserLauncher for ScriptedBrowser {
    fn open(&self, url: &str) -> blogger_mcp::Result<()> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let consent_url = Url::parse(url).unwrap();
        *self.last_url.lock() = Some(consent_url.clone());

        let query: HashMap<String, String> = consent_url.query_pairs().into_owned().collect();
        // The listener binds IPv4 loopback
        let mut callback =
            Url::parse(&query["redirect_uri"].replace("localhost", "127.0.0.1")).unwrap();
        match self.consent {
            Consent::Grant => {
                callback
                    .query_pairs_mut()
                    .append_pair("code", "abc")
                    .append_pair("state", &query["state"]);
            }
            Consent::Deny => {
                callback
                    .query_pairs_mut()
                    .append_pair("error", "access_denied")
                    .append_pair("state", &query["state"]);
            }
            Consent::ReturnWithoutCode => {
                callback.query_pairs_mut().append_pair("state", &query["state"]);
            }
            Consent::Ignore => return Ok(()),
        }

        tokio::spawn(async move {
            let _ = reqwest::get(callback).await;
        });
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn oauth_config(token_addr: SocketAddr, dir: &Path) -> OAuthConfig {
    OAuthConfig {
        client_id: Some("client-id".into()),
        client_secret: Some("client-secret".into()),
        auth_url: "https://accounts.example.test/o/oauth2/v2/auth".into(),
        token_url: format!("http://{token_addr}/token"),
        revoke_url: format!("http://{token_addr}/revoke"),
        callback_port: 0,
        flow_timeout: Duration::from_secs(10),
        token_file: dir.join("tokens.json"),
        ..OAuthConfig::default()
    }
}

fn client(config: &OAuthConfig, browser: Arc<ScriptedBrowser>) -> OAuthClient {
    OAuthClient::new(config, reqwest::Client::new(), browser).unwrap()
}

fn listener_is_closed(port: u16) -> bool {
    std::net::TcpStream::connect(("127.0.0.1", port)).is_err()
}

fn expired_token() -> TokenSet {
    TokenSet {
        access_token: "stale-access".into(),
        refresh_token: Some("stored-refresh".into()),
        scope: None,
        token_type: "Bearer".into(),
        expiry_date: Some(Utc::now() - chrono::Duration::minutes(5)),
    }
}

// ── Resolution ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn write_without_oauth_credentials_is_unavailable() {
    let resolver = CredentialResolver::new(Some("api-key".into()), None);
    let err = resolver.resolve(AuthRequirement::Write).await.unwrap_err();
    assert!(matches!(err, Error::AuthUnavailable(_)), "{err}");
}

#[tokio::test]
async fn read_with_api_key_never_touches_oauth() {
    let endpoint = Arc::new(TokenEndpoint::default());
    let addr = start_token_endpoint(endpoint.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let browser = ScriptedBrowser::new(Consent::Grant);
    let oauth = client(&oauth_config(addr, dir.path()), browser.clone());

    let resolver = CredentialResolver::new(Some("api-key".into()), Some(oauth));
    let credential = resolver.resolve(AuthRequirement::Read).await.unwrap();

    assert!(matches!(credential, Credential::ApiKey(ref k) if k == "api-key"));
    assert_eq!(browser.opened(), 0);
    assert_eq!(endpoint.code_grants.load(Ordering::SeqCst), 0);
    assert_eq!(endpoint.refresh_grants.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn expired_token_is_refreshed_once_and_persisted() {
    let endpoint = Arc::new(TokenEndpoint::default());
    let addr = start_token_endpoint(endpoint.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let config = oauth_config(addr, dir.path());
    let store = TokenStore::new(&config.token_file);
    store.save(&expired_token()).unwrap();

    let browser = ScriptedBrowser::new(Consent::Ignore);
    let resolver = CredentialResolver::new(None, Some(client(&config, browser.clone())));

    let Credential::OAuth(token) = resolver.resolve(AuthRequirement::Write).await.unwrap() else {
        panic!("expected an OAuth credential");
    };

    assert_eq!(token.access_token, "refreshed-access");
    assert_eq!(token.refresh_token.as_deref(), Some("stored-refresh"));
    assert!(!token.is_expired());
    assert_eq!(endpoint.refresh_grants.load(Ordering::SeqCst), 1);
    assert_eq!(endpoint.code_grants.load(Ordering::SeqCst), 0);
    assert_eq!(browser.opened(), 0);

    let stored = store.load().expect("refreshed token persisted");
    assert_eq!(stored.access_token, "refreshed-access");
    assert_eq!(stored.refresh_token.as_deref(), Some("stored-refresh"));
}

#[tokio::test]
async fn valid_token_is_reused_without_network() {
    let endpoint = Arc::new(TokenEndpoint::default());
    let addr = start_token_endpoint(endpoint.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let browser = ScriptedBrowser::new(Consent::Ignore);
    let oauth = client(&oauth_config(addr, dir.path()), browser.clone());
    oauth.set_token(TokenSet {
        expiry_date: Some(Utc::now() + chrono::Duration::hours(1)),
        ..expired_token()
    });

    let resolver = CredentialResolver::new(None, Some(oauth));
    let first = resolver.resolve(AuthRequirement::Read).await.unwrap();
    let second = resolver.resolve(AuthRequirement::Read).await.unwrap();

    assert_eq!(first.kind(), "oauth");
    assert_eq!(second.kind(), "oauth");
    assert_eq!(endpoint.refresh_grants.load(Ordering::SeqCst), 0);
    assert_eq!(endpoint.code_grants.load(Ordering::SeqCst), 0);
    assert_eq!(browser.opened(), 0);
}

#[tokio::test]
async fn rejected_refresh_falls_through_to_one_consent_flow() {
    let endpoint = Arc::new(TokenEndpoint {
        reject_refreshes: true,
        ..TokenEndpoint::default()
    });
    let addr = start_token_endpoint(endpoint.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let config = oauth_config(addr, dir.path());
    let store = TokenStore::new(&config.token_file);
    store.save(&expired_token()).unwrap();

    let browser = ScriptedBrowser::new(Consent::Grant);
    let resolver = CredentialResolver::new(None, Some(client(&config, browser.clone())));

    let Credential::OAuth(token) = resolver.resolve(AuthRequirement::Write).await.unwrap() else {
        panic!("expected an OAuth credential");
    };

    assert_eq!(token.access_token, "fresh-access");
    assert_eq!(endpoint.refresh_grants.load(Ordering::SeqCst), 1);
    assert_eq!(endpoint.code_grants.load(Ordering::SeqCst), 1);
    assert_eq!(browser.opened(), 1);

    let stored = store.load().expect("new token persisted");
    assert_eq!(stored.access_token, "fresh-access");
    assert_eq!(stored.refresh_token.as_deref(), Some("fresh-refresh"));
}

#[tokio::test]
async fn rejected_refresh_and_failed_consent_is_not_retried() {
    let endpoint = Arc::new(TokenEndpoint {
        reject_refreshes: true,
        reject_codes: true,
        ..TokenEndpoint::default()
    });
    let addr = start_token_endpoint(endpoint.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let config = oauth_config(addr, dir.path());
    TokenStore::new(&config.token_file).save(&expired_token()).unwrap();

    let browser = ScriptedBrowser::new(Consent::Grant);
    let resolver = CredentialResolver::new(None, Some(client(&config, browser.clone())));

    let err = resolver.resolve(AuthRequirement::Write).await.unwrap_err();

    assert!(matches!(err, Error::AuthFlowFailed(_)), "{err}");
    assert_eq!(endpoint.refresh_grants.load(Ordering::SeqCst), 1);
    assert_eq!(endpoint.code_grants.load(Ordering::SeqCst), 1);
    assert_eq!(browser.opened(), 1);
}

#[tokio::test]
async fn denied_consent_falls_back_to_api_key() {
    let endpoint = Arc::new(TokenEndpoint::default());
    let addr = start_token_endpoint(endpoint.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let config = oauth_config(addr, dir.path());
    let browser = ScriptedBrowser::new(Consent::Deny);
    let resolver =
        CredentialResolver::new(Some("api-key".into()), Some(client(&config, browser.clone())));

    let credential = resolver
        .resolve_with_fallback(AuthRequirement::Write, AuthRequirement::Read)
        .await
        .unwrap();

    assert_eq!(credential, Credential::ApiKey("api-key".into()));
    assert_eq!(browser.opened(), 1);
    assert_eq!(endpoint.code_grants.load(Ordering::SeqCst), 0);
    assert!(TokenStore::new(&config.token_file).load().is_none());
}

#[tokio::test]
async fn concurrent_writes_share_one_consent_flow() {
    let endpoint = Arc::new(TokenEndpoint::default());
    let addr = start_token_endpoint(endpoint.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let browser = ScriptedBrowser::new(Consent::Grant);
    let resolver = CredentialResolver::new(
        None,
        Some(client(&oauth_config(addr, dir.path()), browser.clone())),
    );

    let (first, second) = tokio::join!(
        resolver.resolve(AuthRequirement::Write),
        resolver.resolve(AuthRequirement::Write),
    );

    assert_eq!(first.unwrap(), second.unwrap());
    assert_eq!(browser.opened(), 1);
    assert_eq!(endpoint.code_grants.load(Ordering::SeqCst), 1);
}

// ── Consent flow ────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_token_runs_one_consent_flow() {
    let endpoint = Arc::new(TokenEndpoint::default());
    let addr = start_token_endpoint(endpoint.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let config = oauth_config(addr, dir.path());
    let browser = ScriptedBrowser::new(Consent::Grant);
    let resolver = CredentialResolver::new(None, Some(client(&config, browser.clone())));

    let Credential::OAuth(token) = resolver.resolve(AuthRequirement::Write).await.unwrap() else {
        panic!("expected an OAuth credential");
    };

    assert_eq!(token.access_token, "fresh-access");
    assert_eq!(browser.opened(), 1);
    assert_eq!(endpoint.code_grants.load(Ordering::SeqCst), 1);
    let stored = TokenStore::new(&config.token_file).load().expect("token persisted");
    assert_eq!(stored.access_token, token.access_token);
    assert_eq!(stored.refresh_token.as_deref(), Some("fresh-refresh"));

    let form = endpoint.last_form.lock().clone();
    assert_eq!(form["code"], "abc");
    assert_eq!(form["client_id"], "client-id");
    assert_eq!(form.get("redirect_uri"), browser.param("redirect_uri").as_ref());
    assert!(form.contains_key("code_verifier"));

    assert_eq!(browser.param("access_type").as_deref(), Some("offline"));
    assert_eq!(browser.param("prompt").as_deref(), Some("consent"));
    assert_eq!(browser.param("code_challenge_method").as_deref(), Some("S256"));
    assert!(listener_is_closed(browser.callback_port()));
}

#[tokio::test]
async fn denied_consent_fails_without_persisting() {
    let endpoint = Arc::new(TokenEndpoint::default());
    let addr = start_token_endpoint(endpoint.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let config = oauth_config(addr, dir.path());
    let browser = ScriptedBrowser::new(Consent::Deny);
    let oauth = client(&config, browser.clone());
    let resolver = CredentialResolver::new(None, Some(oauth.clone()));

    let err = resolver.resolve(AuthRequirement::Write).await.unwrap_err();

    assert!(matches!(err, Error::AuthFlowFailed(ref m) if m.contains("access_denied")), "{err}");
    assert_eq!(endpoint.code_grants.load(Ordering::SeqCst), 0);
    assert!(TokenStore::new(&config.token_file).load().is_none());
    assert!(oauth.current_token().is_none());
    assert_eq!(oauth.flow_state(), FlowState::Failed);
}

#[tokio::test]
async fn listener_is_torn_down_on_every_exit_path() {
    let cases = [
        ("success", Consent::Grant, false, true),
        ("provider error", Consent::Deny, false, false),
        ("missing code", Consent::ReturnWithoutCode, false, false),
        ("exchange failure", Consent::Grant, true, false),
        ("timeout", Consent::Ignore, false, false),
    ];

    for (label, consent, reject_codes, succeeds) in cases {
        let endpoint = Arc::new(TokenEndpoint {
            reject_codes,
            ..TokenEndpoint::default()
        });
        let addr = start_token_endpoint(endpoint).await;
        let dir = tempfile::tempdir().unwrap();
        let mut config = oauth_config(addr, dir.path());
        config.flow_timeout = Duration::from_millis(300);
        let browser = ScriptedBrowser::new(consent);

        let outcome = client(&config, browser.clone()).authorize().await;

        assert_eq!(outcome.is_ok(), succeeds, "{label}: {outcome:?}");
        if let Err(err) = outcome {
            assert!(matches!(err, Error::AuthFlowFailed(_)), "{label}: {err}");
        }
        assert!(listener_is_closed(browser.callback_port()), "{label}: listener still open");
    }
}

#[tokio::test]
async fn logout_revokes_and_clears_store() {
    let endpoint = Arc::new(TokenEndpoint::default());
    let addr = start_token_endpoint(endpoint.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let config = oauth_config(addr, dir.path());
    let store = TokenStore::new(&config.token_file);
    store.save(&expired_token()).unwrap();

    let oauth = client(&config, ScriptedBrowser::new(Consent::Ignore));
    oauth.revoke().await.unwrap();

    assert_eq!(endpoint.revocations.load(Ordering::SeqCst), 1);
    assert!(store.load().is_none());
    assert!(oauth.current_token().is_none());
}
