//! Post, comment and timeline endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use super::params::BackwardPage;
use crate::AppState;
use crate::auth::{CurrentUser, MaybeUser};
use crate::data::ToggleLikeOutput;
use crate::error::AppError;
use crate::service::{Comment, Post, TimelineItem};

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub content: String,
    pub spoiler_of: Option<String>,
    #[serde(default)]
    pub nsfw: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
}

// =============================================================================
// Posts
// =============================================================================

/// POST /api/posts
pub async fn create_post(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Json(request): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<TimelineItem>), AppError> {
    let item = state
        .post_service()
        .create_post(
            Some(viewer),
            &request.content,
            request.spoiler_of.as_deref(),
            request.nsfw,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /api/users/:username/posts
pub async fn posts(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(username): Path<String>,
    Query(page): Query<BackwardPage>,
) -> Result<Json<Vec<Post>>, AppError> {
    let posts = state
        .post_service()
        .posts(viewer, &username, page.last(), page.before())
        .await?;
    Ok(Json(posts))
}

/// GET /api/posts/:post_id
pub async fn post(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(post_id): Path<i64>,
) -> Result<Json<Post>, AppError> {
    let post = state.post_service().post(viewer, post_id).await?;
    Ok(Json(post))
}

/// POST /api/posts/:post_id/toggle_like
pub async fn toggle_post_like(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(post_id): Path<i64>,
) -> Result<Json<ToggleLikeOutput>, AppError> {
    let output = state.post_service().toggle_like(Some(viewer), post_id).await?;
    Ok(Json(output))
}

// =============================================================================
// Timeline
// =============================================================================

/// GET /api/timeline
pub async fn timeline(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Query(page): Query<BackwardPage>,
) -> Result<Json<Vec<TimelineItem>>, AppError> {
    let items = state
        .timeline_service()
        .timeline(Some(viewer), page.last(), page.before())
        .await?;
    Ok(Json(items))
}

// =============================================================================
// Comments
// =============================================================================

/// POST /api/posts/:post_id/comments
pub async fn create_comment(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(post_id): Path<i64>,
    Json(request): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let comment = state
        .comment_service()
        .create_comment(Some(viewer), post_id, &request.content)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// GET /api/posts/:post_id/comments
pub async fn comments(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(post_id): Path<i64>,
    Query(page): Query<BackwardPage>,
) -> Result<Json<Vec<Comment>>, AppError> {
    let comments = state
        .comment_service()
        .comments(viewer, post_id, page.last(), page.before())
        .await?;
    Ok(Json(comments))
}

/// POST /api/comments/:comment_id/toggle_like
pub async fn toggle_comment_like(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(comment_id): Path<i64>,
) -> Result<Json<ToggleLikeOutput>, AppError> {
    let output = state
        .comment_service()
        .toggle_like(Some(viewer), comment_id)
        .await?;
    Ok(Json(output))
}
