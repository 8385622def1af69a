//! Timeline service
//!
//! Reads the viewer's materialized timeline.

use std::sync::Arc;

use serde::Serialize;

use super::post::Post;
use crate::data::{Database, UserId};
use crate::error::AppError;

/// One entry of a user's timeline
#[derive(Debug, Clone, Serialize)]
pub struct TimelineItem {
    pub id: i64,
    pub post: Post,
}

/// Timeline service
pub struct TimelineService {
    db: Arc<Database>,
    base_url: String,
}

impl TimelineService {
    /// Create new timeline service
    pub fn new(db: Arc<Database>, base_url: String) -> Self {
        Self { db, base_url }
    }

    /// The viewer's timeline, newest entry first
    ///
    /// # Arguments
    /// * `last` - Page size (default 10, max 10)
    /// * `before` - Return entries whose post is older than this post id
    pub async fn timeline(
        &self,
        viewer: Option<UserId>,
        last: i64,
        before: Option<i64>,
    ) -> Result<Vec<TimelineItem>, AppError> {
        let viewer = viewer.ok_or(AppError::Unauthenticated)?;

        let rows = self.db.list_timeline(viewer, last, before).await?;
        Ok(rows
            .into_iter()
            .map(|row| TimelineItem {
                id: row.timeline_id,
                post: Post::from_row(row.post, &self.base_url),
            })
            .collect())
    }
}
