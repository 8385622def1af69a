//! Comment service

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::notification::NotificationService;
use super::user::{User, avatar_url};
use super::validation::normalize_content;
use crate::data::{CommentRow, Database, NotificationKind, ToggleLikeOutput, UserId};
use crate::error::AppError;

/// Comment with its embedded author
#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub likes_count: i64,
    pub created_at: DateTime<Utc>,
    pub user: User,
    pub mine: bool,
    pub liked: bool,
}

impl Comment {
    fn from_row(row: CommentRow, base_url: &str) -> Self {
        Self {
            id: row.id,
            content: row.content,
            likes_count: row.likes_count,
            created_at: row.created_at,
            user: User {
                id: None,
                avatar_url: avatar_url(base_url, row.avatar.as_deref()),
                username: row.username,
            },
            mine: row.mine,
            liked: row.liked,
        }
    }
}

/// Comment service
pub struct CommentService {
    db: Arc<Database>,
    notifications: NotificationService,
    base_url: String,
}

impl CommentService {
    /// Create new comment service
    pub fn new(db: Arc<Database>, base_url: String) -> Self {
        Self {
            notifications: NotificationService::new(db.clone()),
            db,
            base_url,
        }
    }

    /// Comment on a post
    ///
    /// The post author is notified after commit unless they wrote the comment.
    pub async fn create_comment(
        &self,
        viewer: Option<UserId>,
        post_id: i64,
        content: &str,
    ) -> Result<Comment, AppError> {
        let viewer = viewer.ok_or(AppError::Unauthenticated)?;
        let content = normalize_content(content)?;

        let author = self.db.get_user(viewer).await?.ok_or(AppError::UserNotFound)?;
        let created = self
            .db
            .insert_comment(viewer, post_id, content.clone())
            .await?;

        tracing::info!(comment_id = created.id, post_id, author = %viewer, "Comment created");

        self.notifications
            .dispatch(
                created.post_author,
                viewer,
                author.username.clone(),
                NotificationKind::Comment,
                Some(post_id),
            )
            .await;

        Ok(Comment {
            id: created.id,
            content,
            likes_count: 0,
            created_at: created.created_at,
            user: User {
                id: None,
                avatar_url: avatar_url(&self.base_url, author.avatar.as_deref()),
                username: author.username,
            },
            mine: true,
            liked: false,
        })
    }

    /// Comments on a post, newest first
    ///
    /// An unknown post yields an empty page.
    pub async fn comments(
        &self,
        viewer: Option<UserId>,
        post_id: i64,
        last: i64,
        before: Option<i64>,
    ) -> Result<Vec<Comment>, AppError> {
        let rows = self.db.list_comments(post_id, last, before, viewer).await?;
        Ok(rows
            .into_iter()
            .map(|row| Comment::from_row(row, &self.base_url))
            .collect())
    }

    /// Like or unlike a comment
    pub async fn toggle_like(
        &self,
        viewer: Option<UserId>,
        comment_id: i64,
    ) -> Result<ToggleLikeOutput, AppError> {
        let viewer = viewer.ok_or(AppError::Unauthenticated)?;
        let output = self.db.toggle_comment_like(viewer, comment_id).await?;

        tracing::debug!(comment_id, user_id = %viewer, liked = output.liked, "Comment like toggled");
        Ok(output)
    }
}
