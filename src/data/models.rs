//! Data models
//!
//! Row types decoded straight from SQLite, plus the identifier newtypes
//! shared by the store and service layers. Rows carry raw storage values
//! (avatar references, numeric ids); the service layer decides what a
//! given viewer is allowed to see.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Numeric user identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// Users
// =============================================================================

/// A user row, optionally with relationship flags relative to a viewer
///
/// `following` / `followeed` are only selected when the query ran with a
/// viewer; otherwise they decode to `false`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub username: String,
    /// Object storage reference for the avatar
    pub avatar: Option<String>,
    pub followers_count: i64,
    pub followees_count: i64,
    /// Viewer follows this user
    #[sqlx(default)]
    pub following: bool,
    /// This user follows the viewer
    #[sqlx(default)]
    pub followeed: bool,
}

/// Result of a follow toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToggleFollowOutput {
    pub following: bool,
    pub followers_count: i64,
}

// =============================================================================
// Posts and timeline
// =============================================================================

/// A post joined with its author
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostRow {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    pub spoiler_of: Option<String>,
    pub nsfw: bool,
    pub likes_count: i64,
    pub comments_count: i64,
    pub created_at: DateTime<Utc>,
    pub username: String,
    pub avatar: Option<String>,
    #[sqlx(default)]
    pub mine: bool,
    #[sqlx(default)]
    pub liked: bool,
}

/// A timeline entry joined with its post
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TimelineRow {
    pub timeline_id: i64,
    #[sqlx(flatten)]
    pub post: PostRow,
}

/// Input for a new post, already validated
#[derive(Debug, Clone)]
pub struct NewPost {
    pub author: UserId,
    pub content: String,
    pub spoiler_of: Option<String>,
    pub nsfw: bool,
}

/// Identifiers assigned when a post is created
#[derive(Debug, Clone, Copy)]
pub struct CreatedPost {
    pub post_id: i64,
    pub timeline_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Result of a like toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToggleLikeOutput {
    pub liked: bool,
    pub likes_count: i64,
}

// =============================================================================
// Comments
// =============================================================================

/// A comment joined with its author
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentRow {
    pub id: i64,
    pub user_id: i64,
    pub post_id: i64,
    pub content: String,
    pub likes_count: i64,
    pub created_at: DateTime<Utc>,
    pub username: String,
    pub avatar: Option<String>,
    #[sqlx(default)]
    pub mine: bool,
    #[sqlx(default)]
    pub liked: bool,
}

/// Identifiers assigned when a comment is created
#[derive(Debug, Clone, Copy)]
pub struct CreatedComment {
    pub id: i64,
    pub post_author: UserId,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Fan-out outbox
// =============================================================================

/// A pending fan-out of one post to its author's followers
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FanoutTask {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub attempts: i64,
}

// =============================================================================
// Notifications
// =============================================================================

/// Notification row; `actors` holds a JSON array of usernames
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationRow {
    pub id: i64,
    pub user_id: i64,
    pub actors: String,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub post_id: Option<i64>,
    pub read: bool,
    pub issued_at: DateTime<Utc>,
}

/// Notification types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Follow,
    Comment,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Follow => "follow",
            Self::Comment => "comment",
        }
    }
}
