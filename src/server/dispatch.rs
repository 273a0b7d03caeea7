//! Tool dispatch
//!
//! Validates a `tools/call`, decides its authorization requirement, resolves
//! a credential and runs the matching Blogger operation.

use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::format;
use super::schema_validator::validate_arguments;
use super::tools::{self, DEFAULT_MAX_RESULTS};
use crate::blogger::{ContentApi, NewPost, PostPatch, PostStatus};
use crate::oauth::{AuthRequirement, Credential, CredentialSource};
use crate::protocol::{Tool, ToolsCallResult};
use crate::{Error, Result};

// ── Arguments ────────────────────────────────────────────────────────────────

/// `get_blog_info` arguments
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetBlogInfoArgs {
    /// Blog URL or ID
    pub blog_url: String,
}

/// `list_posts` arguments
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPostsArgs {
    /// Blog ID
    pub blog_id: String,
    /// Page size
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    /// Visibility filter
    #[serde(default)]
    pub status: Option<PostStatus>,
}

fn default_max_results() -> u32 {
    DEFAULT_MAX_RESULTS
}

/// Arguments naming one post (`get_post`, `delete_post`)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRefArgs {
    /// Blog ID
    pub blog_id: String,
    /// Post ID
    pub post_id: String,
}

/// `search_posts` arguments
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPostsArgs {
    /// Blog ID
    pub blog_id: String,
    /// Search query
    pub query: String,
}

/// `create_post` arguments
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostArgs {
    /// Blog ID
    pub blog_id: String,
    /// Title
    pub title: String,
    /// HTML content
    pub content: String,
    /// Labels
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    /// Save as draft instead of publishing
    #[serde(default)]
    pub is_draft: bool,
}

/// `update_post` arguments
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostArgs {
    /// Blog ID
    pub blog_id: String,
    /// Post ID
    pub post_id: String,
    /// Fields to change
    #[serde(flatten)]
    pub patch: PostPatch,
}

/// How `get_blog_info` addresses a blog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlogRef {
    /// Fetch by public URL
    Url(String),
    /// Fetch by numeric ID
    Id(String),
}

impl BlogRef {
    /// Anything containing a `.` is a URL; `https://` is added when no scheme is given.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.contains('.') {
            if input.starts_with("http") {
                Self::Url(input.to_string())
            } else {
                Self::Url(format!("https://{input}"))
            }
        } else {
            Self::Id(input.to_string())
        }
    }
}

/// A validated, typed tool call
#[derive(Debug)]
pub enum Invocation {
    /// `get_blog_info`
    GetBlogInfo(GetBlogInfoArgs),
    /// `list_posts`
    ListPosts(ListPostsArgs),
    /// `get_post`
    GetPost(PostRefArgs),
    /// `search_posts`
    SearchPosts(SearchPostsArgs),
    /// `create_post`
    CreatePost(CreatePostArgs),
    /// `update_post`
    UpdatePost(UpdatePostArgs),
    /// `delete_post`
    DeletePost(PostRefArgs),
}

/// Which credential an invocation needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPolicy {
    /// Exactly this requirement
    Require(AuthRequirement),
    /// Try `primary`, then `secondary` once
    Fallback {
        /// First choice
        primary: AuthRequirement,
        /// Used when the first choice cannot be resolved
        secondary: AuthRequirement,
    },
}

fn parse_args<T: DeserializeOwned>(tool: &str, args: Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(args))
        .map_err(|e| Error::InvalidInvocation(format!("Invalid arguments for {tool}: {e}")))
}

impl Invocation {
    /// Build a typed invocation from schema-validated arguments
    pub fn parse(name: &str, args: Map<String, Value>) -> Result<Self> {
        let invocation = match name {
            "get_blog_info" => Self::GetBlogInfo(parse_args(name, args)?),
            "list_posts" => Self::ListPosts(parse_args(name, args)?),
            "get_post" => Self::GetPost(parse_args(name, args)?),
            "search_posts" => Self::SearchPosts(parse_args(name, args)?),
            "create_post" => Self::CreatePost(parse_args(name, args)?),
            "update_post" => {
                let args: UpdatePostArgs = parse_args(name, args)?;
                if args.patch.is_empty() {
                    return Err(Error::InvalidInvocation(
                        "update_post needs at least one of title, content or labels".to_string(),
                    ));
                }
                Self::UpdatePost(args)
            }
            "delete_post" => Self::DeletePost(parse_args(name, args)?),
            _ => return Err(Error::UnknownTool(name.to_string())),
        };
        Ok(invocation)
    }

    /// Tool name
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetBlogInfo(_) => "get_blog_info",
            Self::ListPosts(_) => "list_posts",
            Self::GetPost(_) => "get_post",
            Self::SearchPosts(_) => "search_posts",
            Self::CreatePost(_) => "create_post",
            Self::UpdatePost(_) => "update_post",
            Self::DeletePost(_) => "delete_post",
        }
    }

    /// Authorization needed to run this call
    pub fn auth_policy(&self) -> AuthPolicy {
        match self {
            Self::GetBlogInfo(_) | Self::SearchPosts(_) => AuthPolicy::Require(AuthRequirement::Read),
            // Only OAuth can see drafts and scheduled posts
            Self::ListPosts(args) => match args.status {
                None | Some(PostStatus::Live) => AuthPolicy::Require(AuthRequirement::Read),
                Some(_) => AuthPolicy::Require(AuthRequirement::Write),
            },
            Self::GetPost(_) => AuthPolicy::Fallback {
                primary: AuthRequirement::Write,
                secondary: AuthRequirement::Read,
            },
            Self::CreatePost(_) | Self::UpdatePost(_) | Self::DeletePost(_) => {
                AuthPolicy::Require(AuthRequirement::Write)
            }
        }
    }
}

// ── Dispatcher ───────────────────────────────────────────────────────────────

/// Routes tool calls to Blogger operations
pub struct ToolDispatcher {
    credentials: Arc<dyn CredentialSource>,
    content: Arc<dyn ContentApi>,
    tools: Vec<Tool>,
}

impl ToolDispatcher {
    /// Create a dispatcher over a credential source and content API
    pub fn new(credentials: Arc<dyn CredentialSource>, content: Arc<dyn ContentApi>) -> Self {
        Self {
            credentials,
            content,
            tools: tools::definitions(),
        }
    }

    /// Tool definitions in listing order
    pub fn list_tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Run one tool call.
    ///
    /// Invocation errors (`InvalidInvocation`, `UnknownTool`) are returned as is;
    /// anything that fails while running the handler is normalized with
    /// [`Error::into_tool_failure`].
    pub async fn invoke(&self, name: &str, arguments: Option<Map<String, Value>>) -> Result<ToolsCallResult> {
        let Some(arguments) = arguments else {
            return Err(Error::InvalidInvocation("Arguments are required".to_string()));
        };

        let tool = self
            .tools
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| Error::UnknownTool(name.to_string()))?;

        let validation = validate_arguments(&arguments, &tool.input_schema);
        if !validation.is_valid() {
            debug!(tool = name, violations = validation.violations.len(), "Rejected tool arguments");
            return Err(Error::InvalidInvocation(
                validation.format_error(&tool.input_schema),
            ));
        }

        let invocation = Invocation::parse(name, validation.coerced)?;
        info!(tool = name, "Tool call");

        match self.execute(invocation).await {
            Ok(text) => Ok(ToolsCallResult::text(text)),
            Err(e) => {
                warn!(tool = name, error = %e, "Tool call failed");
                Err(e.into_tool_failure())
            }
        }
    }

    async fn credential_for(&self, policy: AuthPolicy) -> Result<Credential> {
        match policy {
            AuthPolicy::Require(requirement) => self.credentials.resolve(requirement).await,
            AuthPolicy::Fallback { primary, secondary } => {
                self.credentials
                    .resolve_with_fallback(primary, secondary)
                    .await
            }
        }
    }

    async fn execute(&self, invocation: Invocation) -> Result<String> {
        let credential = self.credential_for(invocation.auth_policy()).await?;
        debug!(tool = invocation.name(), kind = credential.kind(), "Using credential");
        let api = &self.content;

        match invocation {
            Invocation::GetBlogInfo(args) => {
                let blog = match BlogRef::parse(&args.blog_url) {
                    BlogRef::Url(url) => api.get_blog_by_url(&credential, &url).await?,
                    BlogRef::Id(id) => api.get_blog(&credential, &id).await?,
                };
                format::blog_info(&blog)
            }
            Invocation::ListPosts(args) => {
                let list = api
                    .list_posts(&credential, &args.blog_id, args.max_results, args.status)
                    .await?;
                Ok(format::post_list(&list.items))
            }
            Invocation::GetPost(args) => {
                let post = api.get_post(&credential, &args.blog_id, &args.post_id).await?;
                Ok(format::post(&post))
            }
            Invocation::SearchPosts(args) => {
                let list = api.search_posts(&credential, &args.blog_id, &args.query).await?;
                Ok(format::search_results(&args.query, &list.items))
            }
            Invocation::CreatePost(args) => {
                let body = NewPost::new(args.title, args.content, args.labels);
                let post = api
                    .create_post(&credential, &args.blog_id, &body, args.is_draft)
                    .await?;
                Ok(format::created(&post, args.is_draft))
            }
            Invocation::UpdatePost(args) => {
                let post = api
                    .update_post(&credential, &args.blog_id, &args.post_id, &args.patch)
                    .await?;
                Ok(format::updated(&post))
            }
            Invocation::DeletePost(args) => {
                api.delete_post(&credential, &args.blog_id, &args.post_id).await?;
                Ok(format::deleted(&args.blog_id, &args.post_id))
            }
        }
    }
}
