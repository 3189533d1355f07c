//! Community repository: posts, comments and likes.
//!
//! `likes_count` and `comments_count` are denormalized onto the post row and
//! maintained in the same transaction as the like or comment row.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use lumina_core::{CommentId, PostId, UserId};

use super::RepositoryError;
use crate::models::{Comment, LikeStatus, Post, PostDetail};

const POST_COLUMNS: &str = "p.id, p.user_id, u.name AS author_name, p.title, p.content, \
     p.category, p.tags, p.likes_count, p.comments_count, p.is_published, p.created_at, \
     p.updated_at";

/// Comments shown with a post.
pub const DETAIL_COMMENT_LIMIT: i64 = 10;

/// Window for the trending sort.
const TRENDING_DAYS: i32 = 7;

#[derive(Debug, sqlx::FromRow)]
struct PostRow {
    id: i64,
    user_id: i64,
    author_name: String,
    title: String,
    content: String,
    category: Option<String>,
    tags: Vec<String>,
    likes_count: i32,
    comments_count: i32,
    is_published: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Self {
            id: PostId::new(row.id),
            user_id: UserId::new(row.user_id),
            author_name: row.author_name,
            title: row.title,
            content: row.content,
            category: row.category,
            tags: row.tags,
            likes_count: row.likes_count,
            comments_count: row.comments_count,
            is_published: row.is_published,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CommentRow {
    id: i64,
    post_id: i64,
    user_id: i64,
    author_name: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Self {
            id: CommentId::new(row.id),
            post_id: PostId::new(row.post_id),
            user_id: UserId::new(row.user_id),
            author_name: row.author_name,
            content: row.content,
            created_at: row.created_at,
        }
    }
}

/// Ordering of the public post feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostSort {
    #[default]
    Latest,
    Popular,
    /// Recent posts ranked by engagement.
    Trending,
}

#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub category: Option<String>,
    pub sort: PostSort,
}

/// Post fields as submitted by the author.
#[derive(Debug, Clone)]
pub struct PostInput {
    pub title: String,
    pub content: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
}

/// Repository for community content.
pub struct CommunityRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CommunityRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Published posts for the public feed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_published(
        &self,
        filter: &PostFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, RepositoryError> {
        let mut query: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "SELECT {POST_COLUMNS} FROM community_posts p \
             JOIN users u ON u.id = p.user_id WHERE p.is_published"
        ));

        if let Some(category) = filter.category.as_deref().filter(|c| !c.is_empty()) {
            query.push(" AND p.category = ").push_bind(category.to_owned());
        }

        match filter.sort {
            PostSort::Latest => {
                query.push(" ORDER BY p.created_at DESC, p.id DESC");
            }
            PostSort::Popular => {
                query.push(" ORDER BY p.likes_count DESC, p.created_at DESC, p.id DESC");
            }
            PostSort::Trending => {
                query
                    .push(" AND p.created_at >= NOW() - make_interval(days => ")
                    .push_bind(TRENDING_DAYS)
                    .push(
                        ") ORDER BY p.likes_count DESC, p.comments_count DESC, \
                         p.created_at DESC, p.id DESC",
                    );
            }
        }

        query
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = query.build_query_as::<PostRow>().fetch_all(self.pool).await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// A published post with its newest comments.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn get_detail(&self, id: PostId) -> Result<Option<PostDetail>, RepositoryError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            r"
            SELECT {POST_COLUMNS}
            FROM community_posts p
            JOIN users u ON u.id = p.user_id
            WHERE p.id = $1 AND p.is_published
            "
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let comments = sqlx::query_as::<_, CommentRow>(
            r"
            SELECT c.id, c.post_id, c.user_id, u.name AS author_name, c.content, c.created_at
            FROM post_comments c
            JOIN users u ON u.id = c.user_id
            WHERE c.post_id = $1
            ORDER BY c.created_at DESC, c.id DESC
            LIMIT $2
            ",
        )
        .bind(id)
        .bind(DETAIL_COMMENT_LIMIT)
        .fetch_all(self.pool)
        .await?;

        Ok(Some(PostDetail {
            post: row.into(),
            comments: comments.into_iter().map(Into::into).collect(),
        }))
    }

    /// The author's own posts, published or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn by_author(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, RepositoryError> {
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            r"
            SELECT {POST_COLUMNS}
            FROM community_posts p
            JOIN users u ON u.id = p.user_id
            WHERE p.user_id = $1
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Publish a new post.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    #[instrument(skip(self, input))]
    pub async fn create(&self, user_id: UserId, input: &PostInput) -> Result<Post, RepositoryError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            r"
            WITH p AS (
                INSERT INTO community_posts (user_id, title, content, category, tags)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
            )
            SELECT {POST_COLUMNS} FROM p JOIN users u ON u.id = p.user_id
            "
        ))
        .bind(user_id)
        .bind(&input.title)
        .bind(&input.content)
        .bind(&input.category)
        .bind(&input.tags)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Edit a post owned by the user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the post isn't the user's.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        user_id: UserId,
        id: PostId,
        input: &PostInput,
    ) -> Result<Post, RepositoryError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            r"
            WITH p AS (
                UPDATE community_posts
                SET title = $3, content = $4, category = $5, tags = $6, updated_at = NOW()
                WHERE id = $1 AND user_id = $2
                RETURNING *
            )
            SELECT {POST_COLUMNS} FROM p JOIN users u ON u.id = p.user_id
            "
        ))
        .bind(id)
        .bind(user_id)
        .bind(&input.title)
        .bind(&input.content)
        .bind(&input.category)
        .bind(&input.tags)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a post owned by the user, with its comments and likes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the post isn't the user's.
    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: UserId, id: PostId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM community_posts WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Like a published post, or remove the user's existing like.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the post doesn't exist or isn't published.
    #[instrument(skip(self))]
    pub async fn toggle_like(
        &self,
        user_id: UserId,
        post_id: PostId,
    ) -> Result<LikeStatus, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, i64>(
            "SELECT id FROM community_posts WHERE id = $1 AND is_published FOR UPDATE",
        )
        .bind(post_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let removed = sqlx::query("DELETE FROM post_likes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if !removed {
            sqlx::query("INSERT INTO post_likes (post_id, user_id) VALUES ($1, $2)")
                .bind(post_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        let delta: i32 = if removed { -1 } else { 1 };
        let likes_count = sqlx::query_scalar::<_, i32>(
            r"
            UPDATE community_posts
            SET likes_count = GREATEST(likes_count + $2, 0)
            WHERE id = $1
            RETURNING likes_count
            ",
        )
        .bind(post_id)
        .bind(delta)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(LikeStatus {
            liked: !removed,
            likes_count,
        })
    }

    /// Comment on a published post.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the post doesn't exist or isn't published.
    #[instrument(skip(self, content))]
    pub async fn add_comment(
        &self,
        user_id: UserId,
        post_id: PostId,
        content: &str,
    ) -> Result<Comment, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let bumped = sqlx::query(
            r"
            UPDATE community_posts
            SET comments_count = comments_count + 1
            WHERE id = $1 AND is_published
            ",
        )
        .bind(post_id)
        .execute(&mut *tx)
        .await?;

        if bumped.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        let row = sqlx::query_as::<_, CommentRow>(
            r"
            WITH c AS (
                INSERT INTO post_comments (post_id, user_id, content)
                VALUES ($1, $2, $3)
                RETURNING *
            )
            SELECT c.id, c.post_id, c.user_id, u.name AS author_name, c.content, c.created_at
            FROM c JOIN users u ON u.id = c.user_id
            ",
        )
        .bind(post_id)
        .bind(user_id)
        .bind(content)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(row.into())
    }
}
