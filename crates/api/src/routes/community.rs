//! Community route handlers.
//!
//! Reading the feed is public; writing requires a token. Authors can only
//! touch their own posts, and someone else's post looks missing.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use validator::Validate;

use lumina_core::PostId;

use crate::db::CommunityRepository;
use crate::db::community::{PostFilter, PostInput, PostSort};
use crate::error::{AppError, Result};
use crate::extract::ValidJson;
use crate::middleware::RequireUser;
use crate::response::ApiResponse;
use crate::routes::Pagination;
use crate::state::AppState;

const DEFAULT_PER_PAGE: i64 = 15;

#[derive(Debug, Default, Deserialize)]
pub struct PostQuery {
    pub category: Option<String>,
    #[serde(default)]
    pub sort: PostSort,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PostRequest {
    #[validate(length(min = 1, max = 255, message = "The title field is required."))]
    pub title: String,
    #[validate(length(min = 1, message = "The content field is required."))]
    pub content: String,
    #[validate(length(max = 50))]
    pub category: Option<String>,
    #[serde(default)]
    #[validate(length(max = 10, message = "A post may have at most 10 tags."))]
    pub tags: Vec<String>,
}

impl From<PostRequest> for PostInput {
    fn from(body: PostRequest) -> Self {
        Self {
            title: body.title.trim().to_owned(),
            content: body.content,
            category: body.category.filter(|c| !c.trim().is_empty()),
            tags: body
                .tags
                .into_iter()
                .map(|tag| tag.trim().to_lowercase())
                .filter(|tag| !tag.is_empty())
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CommentRequest {
    #[validate(length(min = 1, max = 1000, message = "The content must be between 1 and 1000 characters."))]
    pub content: String,
}

/// GET /api/community/posts
///
/// # Errors
///
/// 500 on database failure.
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<PostQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse> {
    let (limit, offset) = pagination.limit_offset(DEFAULT_PER_PAGE);
    let filter = PostFilter {
        category: query.category.filter(|c| !c.is_empty()),
        sort: query.sort,
    };
    let posts = CommunityRepository::new(state.pool())
        .list_published(&filter, limit, offset)
        .await?;
    Ok(ApiResponse::data(posts))
}

/// GET /api/community/posts/{id}
///
/// # Errors
///
/// 404 if the post is missing or unpublished.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<PostId>,
) -> Result<impl IntoResponse> {
    let post = CommunityRepository::new(state.pool())
        .get_detail(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_owned()))?;
    Ok(ApiResponse::data(post))
}

/// POST /api/community/posts
///
/// # Errors
///
/// 422 on validation failure.
pub async fn store(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    ValidJson(body): ValidJson<PostRequest>,
) -> Result<impl IntoResponse> {
    let post = CommunityRepository::new(state.pool())
        .create(current.user.id, &body.into())
        .await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Post created successfully", post),
    ))
}

/// PUT /api/community/posts/{id}
///
/// # Errors
///
/// 404 unless the caller wrote the post.
pub async fn update(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(id): Path<PostId>,
    ValidJson(body): ValidJson<PostRequest>,
) -> Result<impl IntoResponse> {
    let post = CommunityRepository::new(state.pool())
        .update(current.user.id, id, &body.into())
        .await?;
    Ok(ApiResponse::with_message("Post updated successfully", post))
}

/// DELETE /api/community/posts/{id}
///
/// # Errors
///
/// 404 unless the caller wrote the post.
pub async fn destroy(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(id): Path<PostId>,
) -> Result<impl IntoResponse> {
    CommunityRepository::new(state.pool())
        .delete(current.user.id, id)
        .await?;
    Ok(ApiResponse::message("Post deleted successfully"))
}

/// Like the post, or take the like back.
///
/// POST /api/community/posts/{id}/like
///
/// # Errors
///
/// 404 if the post is missing.
pub async fn like(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(id): Path<PostId>,
) -> Result<impl IntoResponse> {
    let status = CommunityRepository::new(state.pool())
        .toggle_like(current.user.id, id)
        .await?;
    let message = if status.liked {
        "Post liked"
    } else {
        "Post unliked"
    };
    Ok(ApiResponse::with_message(message, status))
}

/// POST /api/community/posts/{id}/comments
///
/// # Errors
///
/// 404 if the post is missing or unpublished.
pub async fn comment(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(id): Path<PostId>,
    ValidJson(body): ValidJson<CommentRequest>,
) -> Result<impl IntoResponse> {
    let comment = CommunityRepository::new(state.pool())
        .add_comment(current.user.id, id, body.content.trim())
        .await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Comment added successfully", comment),
    ))
}

/// GET /api/community/my-posts
///
/// # Errors
///
/// 500 on database failure.
pub async fn my_posts(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse> {
    let (limit, offset) = pagination.limit_offset(DEFAULT_PER_PAGE);
    let posts = CommunityRepository::new(state.pool())
        .by_author(current.user.id, limit, offset)
        .await?;
    Ok(ApiResponse::data(posts))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Uri;

    use super::*;

    #[test]
    fn test_post_query_sort() {
        let uri: Uri = "/api/community/posts?sort=trending&category=skincare"
            .parse()
            .unwrap();
        let query = Query::<PostQuery>::try_from_uri(&uri).unwrap().0;
        assert_eq!(query.sort, PostSort::Trending);
        assert_eq!(query.category.as_deref(), Some("skincare"));

        let uri: Uri = "/api/community/posts".parse().unwrap();
        let query = Query::<PostQuery>::try_from_uri(&uri).unwrap().0;
        assert_eq!(query.sort, PostSort::Latest);
    }

    #[test]
    fn test_post_input_normalizes_tags() {
        let body: PostRequest = serde_json::from_str(
            r#"{"title":"  Night routine ","content":"Retinol twice a week.",
                "category":" ","tags":[" Retinol","", "SPF "]}"#,
        )
        .unwrap();
        assert!(body.validate().is_ok());

        let input = PostInput::from(body);
        assert_eq!(input.title, "Night routine");
        assert_eq!(input.category, None);
        assert_eq!(input.tags, vec!["retinol", "spf"]);
    }

    #[test]
    fn test_comment_length() {
        let body = CommentRequest {
            content: "x".repeat(1001),
        };
        assert!(body.validate().is_err());
    }
}
