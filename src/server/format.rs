//! Text rendering of tool results

use std::fmt::Write as _;

use serde::Serialize;

use crate::Result;
use crate::blogger::{Blog, Post};

#[derive(Serialize)]
struct Count {
    #[serde(rename = "totalItems")]
    total_items: u64,
}

#[derive(Serialize)]
struct BlogSummary<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    published: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated: Option<&'a str>,
    posts: Count,
    pages: Count,
}

fn or_empty(value: Option<&String>) -> &str {
    value.map_or("", String::as_str)
}

/// Pretty JSON summary of a blog
pub fn blog_info(blog: &Blog) -> Result<String> {
    let summary = BlogSummary {
        id: &blog.id,
        name: blog.name.as_deref(),
        description: blog.description.as_deref(),
        url: blog.url.as_deref(),
        published: blog.published.as_deref(),
        updated: blog.updated.as_deref(),
        posts: Count {
            total_items: blog.posts.as_ref().map_or(0, |c| c.total_items),
        },
        pages: Count {
            total_items: blog.pages.as_ref().map_or(0, |c| c.total_items),
        },
    };
    Ok(serde_json::to_string_pretty(&summary)?)
}

fn post_entry(post: &Post) -> String {
    format!(
        "**{}**\nID: {}\nPublished: {}\nURL: {}\n---",
        or_empty(post.title.as_ref()),
        post.id,
        or_empty(post.published.as_ref()),
        or_empty(post.url.as_ref()),
    )
}

fn post_listing(header: String, posts: &[Post]) -> String {
    let entries: Vec<String> = posts.iter().map(post_entry).collect();
    format!("{header}\n\n{}", entries.join("\n\n"))
}

/// "Found N posts:" listing
pub fn post_list(posts: &[Post]) -> String {
    post_listing(format!("Found {} posts:", posts.len()), posts)
}

/// "Found N posts matching" listing
pub fn search_results(query: &str, posts: &[Post]) -> String {
    post_listing(
        format!("Found {} posts matching \"{query}\":", posts.len()),
        posts,
    )
}

/// A single post with its content
pub fn post(post: &Post) -> String {
    format!(
        "**{}**\n\nPublished: {}\nUpdated: {}\nURL: {}\n\n**Content:**\n{}",
        or_empty(post.title.as_ref()),
        or_empty(post.published.as_ref()),
        or_empty(post.updated.as_ref()),
        or_empty(post.url.as_ref()),
        or_empty(post.content.as_ref()),
    )
}

/// Confirmation for a created post
pub fn created(post: &Post, is_draft: bool) -> String {
    let mut out = format!(
        "Post {} successfully!\n\n**{}**\nID: {}\n",
        if is_draft { "saved as draft" } else { "published" },
        or_empty(post.title.as_ref()),
        post.id,
    );
    if let Some(url) = &post.url {
        let _ = writeln!(out, "URL: {url}");
    }
    if !post.labels.is_empty() {
        let _ = writeln!(out, "Labels: {}", post.labels.join(", "));
    }
    out.trim_end().to_string()
}

/// Confirmation for an updated post
pub fn updated(post: &Post) -> String {
    format!(
        "Post updated successfully!\n\n**{}**\nID: {}\nUpdated: {}\nURL: {}",
        or_empty(post.title.as_ref()),
        post.id,
        or_empty(post.updated.as_ref()),
        or_empty(post.url.as_ref()),
    )
}

/// Confirmation for a deleted post
pub fn deleted(blog_id: &str, post_id: &str) -> String {
    format!("Post {post_id} deleted from blog {blog_id}.")
}
