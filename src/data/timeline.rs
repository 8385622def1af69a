//! Materialized timelines and the fan-out outbox

use chrono::{DateTime, Utc};

use super::content::{POST_COLUMNS, post_listing};
use super::database::Database;
use super::models::{FanoutTask, TimelineRow, UserId};
use super::query::{Cursor, Fragment, SortOrder};
use crate::error::AppError;

impl Database {
    // =========================================================================
    // Timeline
    // =========================================================================

    /// List `owner`'s timeline entries, newest post first
    ///
    /// Ordered by the post's creation time, not by delivery, so a retried
    /// fan-out lands in its place. `before` is a post id.
    pub async fn list_timeline(
        &self,
        owner: UserId,
        last: i64,
        before: Option<i64>,
    ) -> Result<Vec<TimelineRow>, AppError> {
        let columns = format!("timeline.id AS timeline_id, {POST_COLUMNS}");
        let query = post_listing(
            &columns,
            "timeline \
             INNER JOIN posts ON posts.id = timeline.post_id \
             INNER JOIN users ON users.id = posts.user_id",
            Some(owner),
        )
        .filter(Fragment::new("timeline.user_id = ?").bind(owner))
        .cursor("posts.id", Cursor::before_id(before))
        .order_by("posts.created_at", SortOrder::Desc)
        .order_by("posts.id", SortOrder::Desc)
        .limit(last);

        let mut builder = query.build();
        let rows = builder
            .build_query_as::<TimelineRow>()
            .fetch_all(self.pool())
            .await?;

        Ok(rows)
    }

    /// Number of timeline entries `owner` has for `post_id` (0 or 1)
    #[cfg(test)]
    pub(crate) async fn count_timeline_entries(
        &self,
        owner: UserId,
        post_id: i64,
    ) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM timeline WHERE user_id = ? AND post_id = ?",
        )
        .bind(owner)
        .bind(post_id)
        .fetch_one(self.pool())
        .await?;

        Ok(count)
    }

    // =========================================================================
    // Fan-out outbox
    // =========================================================================

    /// Tasks whose retry time has come, oldest first
    ///
    /// Tasks that used up `max_attempts` stay parked and are never returned.
    pub async fn due_fanout_tasks(
        &self,
        now: DateTime<Utc>,
        max_attempts: i64,
        batch_size: i64,
    ) -> Result<Vec<FanoutTask>, AppError> {
        let tasks = sqlx::query_as::<_, FanoutTask>(
            "SELECT id, post_id, author_id, attempts FROM fanout_tasks \
             WHERE next_attempt_at <= ? AND attempts < ? \
             ORDER BY id LIMIT ?",
        )
        .bind(now)
        .bind(max_attempts)
        .bind(batch_size)
        .fetch_all(self.pool())
        .await?;

        Ok(tasks)
    }

    /// Copy the post into every current follower's timeline and retire the task
    ///
    /// Followers that already hold the entry are skipped by the
    /// `(user_id, post_id)` constraint, so replaying a task is harmless.
    ///
    /// # Returns
    /// Number of timeline rows inserted
    pub async fn deliver_fanout(&self, task: &FanoutTask) -> Result<u64, AppError> {
        let (task_id, post_id, author_id) = (task.id, task.post_id, task.author_id);

        self.write(move |conn| {
            Box::pin(async move {
                let delivered = sqlx::query(
                    "INSERT INTO timeline (user_id, post_id) \
                     SELECT follower_id, ? FROM follows WHERE followee_id = ? \
                     ON CONFLICT (user_id, post_id) DO NOTHING",
                )
                .bind(post_id)
                .bind(author_id)
                .execute(&mut *conn)
                .await?
                .rows_affected();

                sqlx::query("DELETE FROM fanout_tasks WHERE id = ?")
                    .bind(task_id)
                    .execute(&mut *conn)
                    .await?;

                Ok(delivered)
            })
        })
        .await
    }

    /// Record a failed attempt and push the task back
    ///
    /// # Returns
    /// The task's attempt count after this failure
    pub async fn record_fanout_failure(
        &self,
        task_id: i64,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<i64, AppError> {
        let attempts = sqlx::query_scalar::<_, i64>(
            "UPDATE fanout_tasks \
             SET attempts = attempts + 1, last_error = ?, next_attempt_at = ? \
             WHERE id = ? RETURNING attempts",
        )
        .bind(error)
        .bind(next_attempt_at)
        .bind(task_id)
        .fetch_one(self.pool())
        .await?;

        Ok(attempts)
    }

    /// Number of outbox rows not yet delivered, parked ones included
    pub async fn pending_fanout_count(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM fanout_tasks")
            .fetch_one(self.pool())
            .await?;

        Ok(count)
    }
}
