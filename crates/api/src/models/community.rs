//! Community domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use lumina_core::{CommentId, PostId, UserId};

#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: PostId,
    pub user_id: UserId,
    pub author_name: String,
    pub title: String,
    pub content: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub likes_count: i32,
    pub comments_count: i32,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub user_id: UserId,
    pub author_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    /// Newest first.
    pub comments: Vec<Comment>,
}

/// Result of toggling a like.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LikeStatus {
    pub liked: bool,
    pub likes_count: i32,
}
