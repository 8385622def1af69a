//! API layer
//!
//! Thin HTTP handlers: extract the caller and parameters, call one
//! service operation, serialize the result.
//! - JSON API under `/api`
//! - Metrics (Prometheus)

pub mod metrics;
mod notifications;
mod params;
mod posts;
mod users;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};

use crate::AppState;
use crate::storage::MAX_AVATAR_BYTES;

pub use metrics::{metrics_router, track_http};

/// Create the `/api` router
pub fn api_router() -> Router<AppState> {
    Router::new()
        // Accounts
        .route("/login", post(users::login))
        .route("/auth_user", get(users::auth_user))
        .route(
            "/auth_user/avatar",
            put(users::update_avatar).layer(DefaultBodyLimit::max(MAX_AVATAR_BYTES + 1)),
        )
        .route("/users", post(users::create_user).get(users::users))
        .route("/users/:username", get(users::user))
        // Follow graph
        .route("/users/:username/toggle_follow", post(users::toggle_follow))
        .route("/users/:username/followers", get(users::followers))
        .route("/users/:username/followees", get(users::followees))
        // Posts and timeline
        .route("/posts", post(posts::create_post))
        .route("/users/:username/posts", get(posts::posts))
        .route("/posts/:post_id", get(posts::post))
        .route("/posts/:post_id/toggle_like", post(posts::toggle_post_like))
        .route("/timeline", get(posts::timeline))
        // Comments
        .route(
            "/posts/:post_id/comments",
            post(posts::create_comment).get(posts::comments),
        )
        .route(
            "/comments/:comment_id/toggle_like",
            post(posts::toggle_comment_like),
        )
        // Notifications
        .route("/notifications", get(notifications::notifications))
        .route(
            "/notifications/:notification_id/mark_as_read",
            post(notifications::mark_notification_as_read),
        )
        .route(
            "/mark_notifications_as_read",
            post(notifications::mark_notifications_as_read),
        )
}
