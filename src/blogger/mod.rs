//! Blogger v3 API access
//!
//! A thin adapter over the blog and post endpoints, parameterized by the
//! credential chosen for each call.

mod client;
mod types;

use async_trait::async_trait;

pub use client::BloggerClient;
pub use types::{Blog, ItemCount, NewPost, Post, PostList, PostPatch, PostStatus};

use crate::Result;
use crate::oauth::Credential;

/// Blog and post operations used by the tools
#[async_trait]
pub trait ContentApi: Send + Sync {
    /// `GET /blogs/{blogId}`
    async fn get_blog(&self, credential: &Credential, blog_id: &str) -> Result<Blog>;

    /// `GET /blogs/byurl?url=`
    async fn get_blog_by_url(&self, credential: &Credential, blog_url: &str) -> Result<Blog>;

    /// `GET /blogs/{blogId}/posts`
    async fn list_posts(
        &self,
        credential: &Credential,
        blog_id: &str,
        max_results: u32,
        status: Option<PostStatus>,
    ) -> Result<PostList>;

    /// `GET /blogs/{blogId}/posts/{postId}`
    async fn get_post(&self, credential: &Credential, blog_id: &str, post_id: &str) -> Result<Post>;

    /// `GET /blogs/{blogId}/posts/search?q=`
    async fn search_posts(
        &self,
        credential: &Credential,
        blog_id: &str,
        query: &str,
    ) -> Result<PostList>;

    /// `POST /blogs/{blogId}/posts`
    async fn create_post(
        &self,
        credential: &Credential,
        blog_id: &str,
        post: &NewPost,
        is_draft: bool,
    ) -> Result<Post>;

    /// `PATCH /blogs/{blogId}/posts/{postId}`
    async fn update_post(
        &self,
        credential: &Credential,
        blog_id: &str,
        post_id: &str,
        patch: &PostPatch,
    ) -> Result<Post>;

    /// `DELETE /blogs/{blogId}/posts/{postId}`
    async fn delete_post(&self, credential: &Credential, blog_id: &str, post_id: &str)
    -> Result<()>;
}
