//! Account and follow-graph endpoints

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use super::params::{ForwardPage, UserSearch};
use crate::AppState;
use crate::auth::{CurrentUser, MaybeUser};
use crate::data::ToggleFollowOutput;
use crate::error::AppError;
use crate::service::{LoginOutput, User, UserProfile};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub username: String,
}

/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginOutput>, AppError> {
    let output = state.user_service().login(&request.email).await?;
    Ok(Json(output))
}

/// GET /api/auth_user
pub async fn auth_user(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
) -> Result<Json<User>, AppError> {
    let user = state.user_service().auth_user(Some(viewer)).await?;
    Ok(Json(user))
}

/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<StatusCode, AppError> {
    state
        .user_service()
        .create_user(&request.email, &request.username)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/users
pub async fn users(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Query(params): Query<UserSearch>,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    let users = state
        .user_service()
        .users(
            viewer,
            params.search.as_deref(),
            params.page.first(),
            params.page.after(),
        )
        .await?;
    Ok(Json(users))
}

/// GET /api/users/:username
pub async fn user(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(username): Path<String>,
) -> Result<Json<UserProfile>, AppError> {
    let profile = state.user_service().user(viewer, &username).await?;
    Ok(Json(profile))
}

/// PUT /api/auth_user/avatar
///
/// The body is the raw image; the response is the new avatar URL.
pub async fn update_avatar(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    body: Bytes,
) -> Result<String, AppError> {
    state
        .user_service()
        .update_avatar(Some(viewer), body.to_vec())
        .await
}

/// POST /api/users/:username/toggle_follow
pub async fn toggle_follow(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(username): Path<String>,
) -> Result<Json<ToggleFollowOutput>, AppError> {
    let output = state
        .user_service()
        .toggle_follow(Some(viewer), &username)
        .await?;
    Ok(Json(output))
}

/// GET /api/users/:username/followers
pub async fn followers(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(username): Path<String>,
    Query(page): Query<ForwardPage>,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    let users = state
        .user_service()
        .followers(viewer, &username, page.first(), page.after())
        .await?;
    Ok(Json(users))
}

/// GET /api/users/:username/followees
pub async fn followees(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(username): Path<String>,
    Query(page): Query<ForwardPage>,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    let users = state
        .user_service()
        .followees(viewer, &username, page.first(), page.after())
        .await?;
    Ok(Json(users))
}
