//! Notification ledger
//!
//! Unread notifications are grouped per `(recipient, kind, post)`: a new
//! actor joins the existing group instead of adding a row. A group that
//! gains an actor is re-issued with a fresh id, so id order is recency.

use chrono::Utc;

use super::database::Database;
use super::models::{NotificationKind, NotificationRow, UserId};
use super::query::{Cursor, Fragment, ListingQuery, SortOrder};
use crate::error::AppError;

const NOTIFICATION_COLUMNS: &str = "id, user_id, actors, type, post_id, read, issued_at";

impl Database {
    /// Record that `actor` did something `recipient` should hear about
    pub async fn notify(
        &self,
        recipient: UserId,
        actor: String,
        kind: NotificationKind,
        post_id: Option<i64>,
    ) -> Result<NotificationRow, AppError> {
        self.write(move |conn| {
            Box::pin(async move {
                let existing = sqlx::query_as::<_, (i64, String)>(
                    "SELECT id, actors FROM notifications \
                     WHERE user_id = ? AND type = ? AND post_id IS ? AND read = 0 \
                     ORDER BY id DESC LIMIT 1",
                )
                .bind(recipient)
                .bind(kind.as_str())
                .bind(post_id)
                .fetch_optional(&mut *conn)
                .await?;

                let mut actors = Vec::new();
                if let Some((id, encoded)) = existing {
                    actors = serde_json::from_str::<Vec<String>>(&encoded)
                        .map_err(|e| AppError::Internal(e.into()))?;

                    sqlx::query("DELETE FROM notifications WHERE id = ?")
                        .bind(id)
                        .execute(&mut *conn)
                        .await?;
                }

                // Most recent actor first
                actors.retain(|name| name != &actor);
                actors.insert(0, actor);
                let encoded =
                    serde_json::to_string(&actors).map_err(|e| AppError::Internal(e.into()))?;

                let row = sqlx::query_as::<_, NotificationRow>(&format!(
                    "INSERT INTO notifications (user_id, actors, type, post_id, issued_at) \
                     VALUES (?, ?, ?, ?, ?) RETURNING {NOTIFICATION_COLUMNS}"
                ))
                .bind(recipient)
                .bind(&encoded)
                .bind(kind.as_str())
                .bind(post_id)
                .bind(Utc::now())
                .fetch_one(&mut *conn)
                .await?;

                Ok(row)
            })
        })
        .await
    }

    /// List `recipient`'s notifications, newest first, older than `before`
    pub async fn list_notifications(
        &self,
        recipient: UserId,
        last: i64,
        before: Option<i64>,
    ) -> Result<Vec<NotificationRow>, AppError> {
        let query = ListingQuery::select(NOTIFICATION_COLUMNS, "notifications")
            .filter(Fragment::new("user_id = ?").bind(recipient))
            .cursor("id", Cursor::before_id(before))
            .order_by("id", SortOrder::Desc)
            .limit(last);

        let mut builder = query.build();
        let rows = builder
            .build_query_as::<NotificationRow>()
            .fetch_all(self.pool())
            .await?;

        Ok(rows)
    }

    /// Mark one of `recipient`'s notifications as read
    ///
    /// # Errors
    /// `NotificationNotFound` if the id does not belong to `recipient`
    pub async fn mark_notification_as_read(
        &self,
        recipient: UserId,
        id: i64,
    ) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE notifications SET read = 1 WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(recipient)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotificationNotFound);
        }

        Ok(())
    }

    /// Mark every notification of `recipient` as read
    ///
    /// # Returns
    /// Number of notifications that were unread
    pub async fn mark_notifications_as_read(&self, recipient: UserId) -> Result<u64, AppError> {
        let result =
            sqlx::query("UPDATE notifications SET read = 1 WHERE user_id = ? AND read = 0")
                .bind(recipient)
                .execute(self.pool())
                .await?;

        Ok(result.rows_affected())
    }
}
