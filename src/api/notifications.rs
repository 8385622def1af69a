//! Notification endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use super::params::BackwardPage;
use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::service::Notification;

/// GET /api/notifications
pub async fn notifications(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Query(page): Query<BackwardPage>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let notifications = state
        .notification_service()
        .notifications(Some(viewer), page.last(), page.before())
        .await?;
    Ok(Json(notifications))
}

/// POST /api/notifications/:notification_id/mark_as_read
pub async fn mark_notification_as_read(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(notification_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state
        .notification_service()
        .mark_as_read(Some(viewer), notification_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/mark_notifications_as_read
pub async fn mark_notifications_as_read(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
) -> Result<StatusCode, AppError> {
    state
        .notification_service()
        .mark_all_as_read(Some(viewer))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
