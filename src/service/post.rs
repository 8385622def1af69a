//! Post service
//!
//! Handles post creation, reads and likes. Creating a post hands the
//! follower fan-out to the background worker through the outbox.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::fanout::FanoutSignal;
use super::timeline::TimelineItem;
use super::user::{User, avatar_url};
use super::validation::{normalize_content, normalize_spoiler, normalize_username};
use crate::data::{Database, NewPost, PostRow, ToggleLikeOutput, UserId};
use crate::error::AppError;
use crate::metrics::POSTS_TOTAL;

/// Post with its embedded author
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: i64,
    pub content: String,
    pub spoiler_of: Option<String>,
    pub nsfw: bool,
    pub likes_count: i64,
    pub comments_count: i64,
    pub created_at: DateTime<Utc>,
    pub user: User,
    pub mine: bool,
    pub liked: bool,
}

impl Post {
    pub(crate) fn from_row(row: PostRow, base_url: &str) -> Self {
        Self {
            id: row.id,
            content: row.content,
            spoiler_of: row.spoiler_of,
            nsfw: row.nsfw,
            likes_count: row.likes_count,
            comments_count: row.comments_count,
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

/// Post service
pub struct PostService {
    db: Arc<Database>,
    fanout: FanoutSignal,
    base_url: String,
}

impl PostService {
    /// Create new post service
    pub fn new(db: Arc<Database>, fanout: FanoutSignal, base_url: String) -> Self {
        Self {
            db,
            fanout,
            base_url,
        }
    }

    /// Publish a post
    ///
    /// The post and the author's timeline entry are committed before this
    /// returns; followers receive it once the fan-out worker runs.
    ///
    /// # Returns
    /// The author's own timeline item for the new post
    pub async fn create_post(
        &self,
        viewer: Option<UserId>,
        content: &str,
        spoiler_of: Option<&str>,
        nsfw: bool,
    ) -> Result<TimelineItem, AppError> {
        let viewer = viewer.ok_or(AppError::Unauthenticated)?;
        let content = normalize_content(content)?;
        let spoiler_of = normalize_spoiler(spoiler_of)?;

        let author = self.db.get_user(viewer).await?.ok_or(AppError::UserNotFound)?;

        let created = self
            .db
            .insert_post(NewPost {
                author: viewer,
                content: content.clone(),
                spoiler_of: spoiler_of.clone(),
                nsfw,
            })
            .await?;

        self.fanout.wake();
        POSTS_TOTAL.inc();
        tracing::info!(post_id = created.post_id, author = %viewer, "Post created");

        Ok(TimelineItem {
            id: created.timeline_id,
            post: Post {
                id: created.post_id,
                content,
                spoiler_of,
                nsfw,
                likes_count: 0,
                comments_count: 0,
                created_at: created.created_at,
                user: User {
                    id: None,
                    avatar_url: avatar_url(&self.base_url, author.avatar.as_deref()),
                    username: author.username,
                },
                mine: true,
                liked: false,
            },
        })
    }

    /// Posts by `username`, newest first
    pub async fn posts(
        &self,
        viewer: Option<UserId>,
        username: &str,
        last: i64,
        before: Option<i64>,
    ) -> Result<Vec<Post>, AppError> {
        let username = normalize_username(username)?;
        let author = self
            .db
            .get_user_id(&username)
            .await?
            .ok_or(AppError::UserNotFound)?;

        let rows = self.db.list_posts(author, last, before, viewer).await?;
        Ok(rows
            .into_iter()
            .map(|row| Post::from_row(row, &self.base_url))
            .collect())
    }

    /// A single post
    pub async fn post(&self, viewer: Option<UserId>, post_id: i64) -> Result<Post, AppError> {
        let row = self
            .db
            .get_post(post_id, viewer)
            .await?
            .ok_or(AppError::PostNotFound)?;
        Ok(Post::from_row(row, &self.base_url))
    }

    /// Like or unlike a post
    pub async fn toggle_like(
        &self,
        viewer: Option<UserId>,
        post_id: i64,
    ) -> Result<ToggleLikeOutput, AppError> {
        let viewer = viewer.ok_or(AppError::Unauthenticated)?;
        let output = self.db.toggle_post_like(viewer, post_id).await?;

        tracing::debug!(post_id, user_id = %viewer, liked = output.liked, "Post like toggled");
        Ok(output)
    }
}
