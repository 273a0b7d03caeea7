//! Blogger v3 resource types

use serde::{Deserialize, Serialize};

/// Item count attached to a blog (`posts`, `pages`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemCount {
    /// Total number of items
    #[serde(default)]
    pub total_items: u64,
}

/// A blog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
    /// Blog ID
    pub id: String,
    /// Blog name
    #[serde(default)]
    pub name: Option<String>,
    /// Blog description
    #[serde(default)]
    pub description: Option<String>,
    /// Public URL
    #[serde(default)]
    pub url: Option<String>,
    /// RFC 3339 publish time
    #[serde(default)]
    pub published: Option<String>,
    /// RFC 3339 update time
    #[serde(default)]
    pub updated: Option<String>,
    /// Post count
    #[serde(default)]
    pub posts: Option<ItemCount>,
    /// Page count
    #[serde(default)]
    pub pages: Option<ItemCount>,
}

/// A blog post
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Post ID
    pub id: String,
    /// Title
    #[serde(default)]
    pub title: Option<String>,
    /// HTML content
    #[serde(default)]
    pub content: Option<String>,
    /// Public URL
    #[serde(default)]
    pub url: Option<String>,
    /// RFC 3339 publish time
    #[serde(default)]
    pub published: Option<String>,
    /// RFC 3339 update time
    #[serde(default)]
    pub updated: Option<String>,
    /// Labels
    #[serde(default)]
    pub labels: Vec<String>,
    /// `LIVE`, `DRAFT` or `SCHEDULED`
    #[serde(default)]
    pub status: Option<String>,
}

/// One page of posts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostList {
    /// Posts; absent when there are none
    #[serde(default)]
    pub items: Vec<Post>,
    /// Token for the next page
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Post visibility filter for listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    /// Published posts
    Live,
    /// Unpublished drafts
    Draft,
    /// Posts scheduled for later publication
    Scheduled,
}

impl PostStatus {
    /// Query parameter value
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
        }
    }
}

/// Body for creating a post
#[derive(Debug, Clone, Serialize)]
pub struct NewPost {
    /// Resource kind, always `blogger#post`
    pub kind: &'static str,
    /// Title
    pub title: String,
    /// HTML content
    pub content: String,
    /// Labels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

impl NewPost {
    /// Create a post body
    pub fn new(title: String, content: String, labels: Option<Vec<String>>) -> Self {
        Self {
            kind: "blogger#post",
            title,
            content,
            labels,
        }
    }
}

/// Body for patching a post; unset fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostPatch {
    /// New title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New HTML content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Replacement labels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

impl PostPatch {
    /// Whether the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.labels.is_none()
    }
}

/// Google API error envelope
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error: ApiError,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Vec<ApiErrorItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorItem {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
