//! Notification service
//!
//! Lists and acknowledges a user's notifications, and dispatches new ones
//! after the action that caused them has committed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::data::{Database, NotificationKind, NotificationRow, UserId};
use crate::error::AppError;
use crate::metrics::NOTIFICATIONS_TOTAL;

/// Notification as returned to its recipient
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: i64,
    /// Usernames, most recent actor first
    pub actors: Vec<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<i64>,
    pub read: bool,
    pub issued_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = AppError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let actors = serde_json::from_str(&row.actors).map_err(|e| AppError::Internal(e.into()))?;
        Ok(Self {
            id: row.id,
            actors,
            kind: row.kind,
            post_id: row.post_id,
            read: row.read,
            issued_at: row.issued_at,
        })
    }
}

/// Notification service
#[derive(Clone)]
pub struct NotificationService {
    db: Arc<Database>,
}

impl NotificationService {
    /// Create new notification service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// List the viewer's notifications, newest first
    pub async fn notifications(
        &self,
        viewer: Option<UserId>,
        last: i64,
        before: Option<i64>,
    ) -> Result<Vec<Notification>, AppError> {
        let viewer = viewer.ok_or(AppError::Unauthenticated)?;

        self.db
            .list_notifications(viewer, last, before)
            .await?
            .into_iter()
            .map(Notification::try_from)
            .collect()
    }

    pub async fn mark_as_read(
        &self,
        viewer: Option<UserId>,
        notification_id: i64,
    ) -> Result<(), AppError> {
        let viewer = viewer.ok_or(AppError::Unauthenticated)?;
        self.db
            .mark_notification_as_read(viewer, notification_id)
            .await
    }

    pub async fn mark_all_as_read(&self, viewer: Option<UserId>) -> Result<(), AppError> {
        let viewer = viewer.ok_or(AppError::Unauthenticated)?;
        let marked = self.db.mark_notifications_as_read(viewer).await?;
        tracing::debug!(user_id = %viewer, marked, "Notifications marked as read");
        Ok(())
    }

    /// Notify `recipient` that `actor` did something
    ///
    /// Best-effort: the triggering action has already committed, so a
    /// failure here is logged and dropped. Self-notifications are skipped.
    pub async fn dispatch(
        &self,
        recipient: UserId,
        actor: UserId,
        actor_username: String,
        kind: NotificationKind,
        post_id: Option<i64>,
    ) {
        if recipient == actor {
            return;
        }

        match self.db.notify(recipient, actor_username, kind, post_id).await {
            Ok(row) => {
                NOTIFICATIONS_TOTAL.with_label_values(&[kind.as_str()]).inc();
                tracing::debug!(
                    notification_id = row.id,
                    recipient = %recipient,
                    kind = kind.as_str(),
                    "Notification issued"
                );
            }
            Err(error) => {
                tracing::warn!(
                    %error,
                    recipient = %recipient,
                    kind = kind.as_str(),
                    "Failed to issue notification"
                );
            }
        }
    }
}
