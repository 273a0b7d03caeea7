//! Tool definitions

use serde_json::json;

use crate::protocol::{Tool, ToolAnnotations};

/// Default page size for `list_posts`
pub const DEFAULT_MAX_RESULTS: u32 = 10;

fn read_only() -> ToolAnnotations {
    ToolAnnotations {
        read_only_hint: Some(true),
        destructive_hint: None,
        idempotent_hint: Some(true),
        open_world_hint: Some(true),
    }
}

fn mutating(destructive: bool, idempotent: bool) -> ToolAnnotations {
    ToolAnnotations {
        read_only_hint: Some(false),
        destructive_hint: Some(destructive),
        idempotent_hint: Some(idempotent),
        open_world_hint: Some(true),
    }
}

fn tool(name: &str, title: &str, description: &str, input_schema: serde_json::Value, annotations: ToolAnnotations) -> Tool {
    Tool {
        name: name.to_string(),
        title: Some(title.to_string()),
        description: Some(description.to_string()),
        input_schema,
        annotations: Some(annotations),
    }
}

/// All tools, in listing order
pub fn definitions() -> Vec<Tool> {
    vec![
        tool(
            "get_blog_info",
            "Get Blog Info",
            "Get information about a blog by URL or ID",
            json!({
                "type": "object",
                "properties": {
                    "blogUrl": {
                        "type": "string",
                        "description": "Blog URL (e.g., myblog.blogspot.com) or Blog ID",
                        "minLength": 1
                    }
                },
                "required": ["blogUrl"]
            }),
            read_only(),
        ),
        tool(
            "list_posts",
            "List Posts",
            "List posts from a blog. Listing drafts or scheduled posts requires OAuth.",
            json!({
                "type": "object",
                "properties": {
                    "blogId": { "type": "string", "description": "Blog ID", "minLength": 1 },
                    "maxResults": {
                        "type": "integer",
                        "description": "Maximum number of posts to return (default: 10)",
                        "default": DEFAULT_MAX_RESULTS,
                        "minimum": 1
                    },
                    "status": {
                        "type": "string",
                        "description": "Post status to list (default: live)",
                        "enum": ["live", "draft", "scheduled"]
                    }
                },
                "required": ["blogId"]
            }),
            read_only(),
        ),
        tool(
            "get_post",
            "Get Post",
            "Get a specific post by ID",
            json!({
                "type": "object",
                "properties": {
                    "blogId": { "type": "string", "description": "Blog ID", "minLength": 1 },
                    "postId": { "type": "string", "description": "Post ID", "minLength": 1 }
                },
                "required": ["blogId", "postId"]
            }),
            read_only(),
        ),
        tool(
            "search_posts",
            "Search Posts",
            "Search for posts in a blog",
            json!({
                "type": "object",
                "properties": {
                    "blogId": { "type": "string", "description": "Blog ID", "minLength": 1 },
                    "query": { "type": "string", "description": "Search query", "minLength": 1 }
                },
                "required": ["blogId", "query"]
            }),
            read_only(),
        ),
        tool(
            "create_post",
            "Create Post",
            "Create a new post (requires OAuth)",
            json!({
                "type": "object",
                "properties": {
                    "blogId": { "type": "string", "description": "Blog ID", "minLength": 1 },
                    "title": { "type": "string", "description": "Post title" },
                    "content": { "type": "string", "description": "Post content (HTML)" },
                    "labels": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Post labels/tags"
                    },
                    "isDraft": {
                        "type": "boolean",
                        "description": "Save as draft instead of publishing (default: false)",
                        "default": false
                    }
                },
                "required": ["blogId", "title", "content"]
            }),
            mutating(false, false),
        ),
        tool(
            "update_post",
            "Update Post",
            "Update an existing post; only the given fields change (requires OAuth)",
            json!({
                "type": "object",
                "properties": {
                    "blogId": { "type": "string", "description": "Blog ID", "minLength": 1 },
                    "postId": { "type": "string", "description": "Post ID", "minLength": 1 },
                    "title": { "type": "string", "description": "New post title" },
                    "content": { "type": "string", "description": "New post content (HTML)" },
                    "labels": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Replacement post labels/tags"
                    }
                },
                "required": ["blogId", "postId"]
            }),
            mutating(true, true),
        ),
        tool(
            "delete_post",
            "Delete Post",
            "Delete a post (requires OAuth)",
            json!({
                "type": "object",
                "properties": {
                    "blogId": { "type": "string", "description": "Blog ID", "minLength": 1 },
                    "postId": { "type": "string", "description": "Post ID", "minLength": 1 }
                },
                "required": ["blogId", "postId"]
            }),
            mutating(true, true),
        ),
    ]
}
