//! Blogger v3 REST client

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::ContentApi;
use super::types::{ApiErrorBody, Blog, NewPost, Post, PostList, PostPatch, PostStatus};
use crate::config::BloggerConfig;
use crate::oauth::Credential;
use crate::{Error, Result};

/// Longest raw error body kept as detail when it is not a Google error envelope
const MAX_RAW_DETAIL: usize = 200;

/// HTTP client for the Blogger API
#[derive(Debug, Clone)]
pub struct BloggerClient {
    http_client: Client,
    base_url: Url,
}

impl BloggerClient {
    /// Create a client from configuration
    pub fn new(config: &BloggerConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Self::with_client(http_client, &config.base_url)
    }

    /// Create a client around an existing HTTP client
    pub fn with_client(http_client: Client, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("Invalid Blogger base URL '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "Blogger base URL cannot carry a path: {base_url}"
            )));
        }
        Ok(Self {
            http_client,
            base_url,
        })
    }

    /// Build an endpoint URL from path segments; each segment is percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = Self::error_for_status(Self::dispatch(request).await?).await?;
        let status = response.status().as_u16();
        response
            .json()
            .await
            .map_err(|e| Error::RemoteOperationFailed {
                status: Some(status),
                message: format!("Failed to parse Blogger API response: {e}"),
                detail: None,
            })
    }

    async fn dispatch(request: RequestBuilder) -> Result<Response> {
        request
            .send()
            .await
            .map_err(|e| Error::RemoteOperationFailed {
                status: None,
                message: format!("Request to Blogger API failed: {e}"),
                detail: None,
            })
    }

    async fn error_for_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(api_error(status.as_u16(), &body))
    }
}

/// Attach a credential to a request
fn authorize(request: RequestBuilder, credential: &Credential) -> RequestBuilder {
    match credential {
        Credential::ApiKey(key) => request.query(&[("key", key.as_str())]),
        Credential::OAuth(token) => request.bearer_auth(&token.access_token),
    }
}

/// Map a non-success response body to [`Error::RemoteOperationFailed`]
fn api_error(status: u16, body: &str) -> Error {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => {
            let detail = parsed
                .error
                .errors
                .iter()
                .filter_map(|item| match (&item.reason, &item.message) {
                    (Some(reason), Some(message)) => Some(format!("{reason}: {message}")),
                    (Some(reason), None) => Some(reason.clone()),
                    (None, Some(message)) => Some(message.clone()),
                    (None, None) => None,
                })
                .collect::<Vec<_>>()
                .join("; ");
            Error::RemoteOperationFailed {
                status: Some(status),
                message: parsed
                    .error
                    .message
                    .unwrap_or_else(|| format!("Blogger API returned HTTP {status}")),
                detail: (!detail.is_empty()).then_some(detail),
            }
        }
        Err(_) => {
            let trimmed = body.trim();
            Error::RemoteOperationFailed {
                status: Some(status),
                message: format!("Blogger API returned HTTP {status}"),
                detail: (!trimmed.is_empty())
                    .then(|| trimmed.chars().take(MAX_RAW_DETAIL).collect()),
            }
        }
    }
}

#[async_trait]
impl ContentApi for BloggerClient {
    async fn get_blog(&self, credential: &Credential, blog_id: &str) -> Result<Blog> {
        debug!(blog_id, "Fetching blog");
        let request = self.http_client.get(self.endpoint(&["blogs", blog_id]));
        self.send(authorize(request, credential)).await
    }

    async fn get_blog_by_url(&self, credential: &Credential, blog_url: &str) -> Result<Blog> {
        debug!(blog_url, "Fetching blog by URL");
        let request = self
            .http_client
            .get(self.endpoint(&["blogs", "byurl"]))
            .query(&[("url", blog_url)]);
        self.send(authorize(request, credential)).await
    }

    async fn list_posts(
        &self,
        credential: &Credential,
        blog_id: &str,
        max_results: u32,
        status: Option<PostStatus>,
    ) -> Result<PostList> {
        debug!(blog_id, max_results, ?status, "Listing posts");
        let mut request = self
            .http_client
            .get(self.endpoint(&["blogs", blog_id, "posts"]))
            .query(&[("maxResults", max_results)]);
        if let Some(status) = status {
            request = request.query(&[("status", status.as_str())]);
        }
        self.send(authorize(request, credential)).await
    }

    async fn get_post(&self, credential: &Credential, blog_id: &str, post_id: &str) -> Result<Post> {
        debug!(blog_id, post_id, "Fetching post");
        let request = self
            .http_client
            .get(self.endpoint(&["blogs", blog_id, "posts", post_id]));
        self.send(authorize(request, credential)).await
    }

    async fn search_posts(
        &self,
        credential: &Credential,
        blog_id: &str,
        query: &str,
    ) -> Result<PostList> {
        debug!(blog_id, query, "Searching posts");
        let request = self
            .http_client
            .get(self.endpoint(&["blogs", blog_id, "posts", "search"]))
            .query(&[("q", query)]);
        self.send(authorize(request, credential)).await
    }

    async fn create_post(
        &self,
        credential: &Credential,
        blog_id: &str,
        post: &NewPost,
        is_draft: bool,
    ) -> Result<Post> {
        debug!(blog_id, is_draft, "Creating post");
        let request = self
            .http_client
            .post(self.endpoint(&["blogs", blog_id, "posts"]))
            .query(&[("isDraft", is_draft)])
            .json(post);
        self.send(authorize(request, credential)).await
    }

    async fn update_post(
        &self,
        credential: &Credential,
        blog_id: &str,
        post_id: &str,
        patch: &PostPatch,
    ) -> Result<Post> {
        debug!(blog_id, post_id, "Updating post");
        let request = self
            .http_client
            .patch(self.endpoint(&["blogs", blog_id, "posts", post_id]))
            .json(patch);
        self.send(authorize(request, credential)).await
    }

    async fn delete_post(&self, credential: &Credential, blog_id: &str, post_id: &str) -> Result<()> {
        debug!(blog_id, post_id, "Deleting post");
        let request = self
            .http_client
            .delete(self.endpoint(&["blogs", blog_id, "posts", post_id]));
        Self::error_for_status(Self::dispatch(authorize(request, credential)).await?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::Arc;

    use axum::{
        Json, Router,
        extract::State,
        http::{HeaderMap, Method, StatusCode, Uri},
        response::{IntoResponse, Response},
    };
    use parking_lot::Mutex;
    use serde_json::{Value, json};

    use super::*;
    use crate::oauth::TokenSet;

    /// A request as seen by the fake API
    #[derive(Debug, Clone)]
    struct Seen {
        method: Method,
        path: String,
        query: HashMap<String, String>,
        auth: Option<String>,
        body: Option<Value>,
    }

    type Log = Arc<Mutex<Vec<Seen>>>;

    async fn fake_api(
        State(log): State<Log>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: String,
    ) -> Response {
        let seen = Seen {
            method: method.clone(),
            path: uri.path().to_string(),
            query: serde_urlencoded::from_str(uri.query().unwrap_or_default()).unwrap_or_default(),
            auth: headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string),
            body: serde_json::from_str(&body).ok(),
        };
        log.lock().push(seen.clone());

        let segments: Vec<&str> = seen
            .path
            .trim_start_matches("/blogger/v3/")
            .split('/')
            .collect();
        match (method, segments.as_slice()) {
            (Method::GET, ["blogs", "byurl"]) => Json(json!({"id": "77", "name": "By URL"})).into_response(),
            (Method::GET, ["blogs", "missing"]) => (
                StatusCode::NOT_FOUND,
                Json(json!({"error": {
                    "code": 404,
                    "message": "Blog not found",
                    "errors": [{"reason": "notFound", "message": "Not Found"}]
                }})),
            )
                .into_response(),
            (Method::GET, ["blogs", id]) => Json(json!({"id": id, "name": "Notes"})).into_response(),
            (Method::GET, ["blogs", _, "posts"]) => {
                Json(json!({"items": [{"id": "1", "title": "First"}]})).into_response()
            }
            (Method::POST, ["blogs", _, "posts"]) => {
                let title = seen.body.as_ref().map_or(Value::Null, |b| b["title"].clone());
                Json(json!({"id": "9", "title": title})).into_response()
            }
            (Method::GET, ["blogs", _, "posts", "search"]) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "backend exploded").into_response()
            }
            (Method::GET, ["blogs", _, "posts", id]) => Json(json!({"id": id, "title": "Second"})).into_response(),
            (Method::PATCH, ["blogs", _, "posts", id]) => Json(json!({"id": id, "title": "Patched"})).into_response(),
            (Method::DELETE, ["blogs", _, "posts", _]) => StatusCode::NO_CONTENT.into_response(),
            _ => StatusCode::NOT_FOUND.into_response(),
        }
    }

    async fn fake_blogger() -> (SocketAddr, Log) {
        let log: Log = Arc::default();
        let app = Router::new().fallback(fake_api).with_state(log.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, log)
    }

    fn client(addr: SocketAddr) -> BloggerClient {
        BloggerClient::with_client(Client::new(), &format!("http://{addr}/blogger/v3")).unwrap()
    }

    fn oauth() -> Credential {
        Credential::OAuth(TokenSet {
            access_token: "ya29.token".into(),
            refresh_token: None,
            scope: None,
            token_type: "Bearer".into(),
            expiry_date: None,
        })
    }

    #[test]
    fn endpoint_encodes_segments() {
        let c = BloggerClient::with_client(Client::new(), "https://www.googleapis.com/blogger/v3")
            .unwrap();
        assert_eq!(
            c.endpoint(&["blogs", "a/b", "posts"]).as_str(),
            "https://www.googleapis.com/blogger/v3/blogs/a%2Fb/posts"
        );
    }

    #[test]
    fn api_error_extracts_reasons() {
        let err = api_error(
            403,
            r#"{"error":{"code":403,"message":"Forbidden","errors":[{"reason":"insufficientPermissions","message":"Insufficient Permission"}]}}"#,
        );
        assert_eq!(err.to_string(), "Forbidden");
        assert_eq!(
            err.remote_detail(),
            Some("insufficientPermissions: Insufficient Permission")
        );
    }

    #[test]
    fn api_error_keeps_raw_body_as_detail() {
        let err = api_error(502, "<html>Bad Gateway</html>");
        assert_eq!(err.to_string(), "Blogger API returned HTTP 502");
        assert_eq!(err.remote_detail(), Some("<html>Bad Gateway</html>"));
    }

    #[tokio::test]
    async fn api_key_goes_in_query() {
        let (addr, seen) = fake_blogger().await;
        let blog = client(addr)
            .get_blog(&Credential::ApiKey("k-123".into()), "42")
            .await
            .unwrap();
        assert_eq!(blog.id, "42");

        let seen = seen.lock();
        assert_eq!(seen[0].path, "/blogger/v3/blogs/42");
        assert_eq!(seen[0].query.get("key").map(String::as_str), Some("k-123"));
        assert!(seen[0].auth.is_none());
    }

    #[tokio::test]
    async fn oauth_uses_bearer_header() {
        let (addr, seen) = fake_blogger().await;
        let list = client(addr)
            .list_posts(&oauth(), "42", 5, Some(PostStatus::Draft))
            .await
            .unwrap();
        assert_eq!(list.items.len(), 1);

        let seen = &seen.lock()[0];
        assert_eq!(seen.path, "/blogger/v3/blogs/42/posts");
        assert_eq!(seen.query.get("maxResults").map(String::as_str), Some("5"));
        assert_eq!(seen.query.get("status").map(String::as_str), Some("draft"));
        assert!(!seen.query.contains_key("key"));
        assert_eq!(seen.auth.as_deref(), Some("Bearer ya29.token"));
    }

    #[tokio::test]
    async fn blog_by_url_passes_url_param() {
        let (addr, seen) = fake_blogger().await;
        let blog = client(addr)
            .get_blog_by_url(&Credential::ApiKey("k".into()), "https://example.blogspot.com")
            .await
            .unwrap();
        assert_eq!(blog.id, "77");
        assert_eq!(
            seen.lock()[0].query.get("url").map(String::as_str),
            Some("https://example.blogspot.com")
        );
    }

    #[tokio::test]
    async fn not_found_maps_to_remote_failure() {
        let (addr, _) = fake_blogger().await;
        let err = client(addr)
            .get_blog(&Credential::ApiKey("k".into()), "missing")
            .await
            .unwrap_err();
        match err {
            Error::RemoteOperationFailed { status, message, detail } => {
                assert_eq!(status, Some(404));
                assert_eq!(message, "Blog not found");
                assert_eq!(detail.as_deref(), Some("notFound: Not Found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_sends_post_body_and_draft_flag() {
        let (addr, seen) = fake_blogger().await;
        let post = client(addr)
            .create_post(
                &oauth(),
                "42",
                &NewPost::new("Hello".into(), "<p>hi</p>".into(), Some(vec!["a".into()])),
                true,
            )
            .await
            .unwrap();
        assert_eq!(post.id, "9");

        let seen = &seen.lock()[0];
        assert_eq!(seen.method, Method::POST);
        assert_eq!(seen.query.get("isDraft").map(String::as_str), Some("true"));
        assert_eq!(
            seen.body.as_ref().unwrap(),
            &json!({"kind": "blogger#post", "title": "Hello", "content": "<p>hi</p>", "labels": ["a"]})
        );
    }

    #[tokio::test]
    async fn update_sends_only_changed_fields() {
        let (addr, seen) = fake_blogger().await;
        let patch = PostPatch {
            title: Some("Patched".into()),
            ..Default::default()
        };
        let post = client(addr).update_post(&oauth(), "42", "2", &patch).await.unwrap();
        assert_eq!(post.title.as_deref(), Some("Patched"));
        let seen = &seen.lock()[0];
        assert_eq!(seen.method, Method::PATCH);
        assert_eq!(seen.body, Some(json!({"title": "Patched"})));
    }

    #[tokio::test]
    async fn delete_accepts_no_content() {
        let (addr, seen) = fake_blogger().await;
        client(addr).delete_post(&oauth(), "42", "2").await.unwrap();
        assert_eq!(seen.lock()[0].method, Method::DELETE);
    }

    #[tokio::test]
    async fn server_error_without_envelope_is_remote_failure() {
        let (addr, _) = fake_blogger().await;
        let err = client(addr)
            .search_posts(&Credential::ApiKey("k".into()), "42", "rust")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Blogger API returned HTTP 500");
        assert_eq!(err.remote_detail(), Some("backend exploded"));
    }
}
