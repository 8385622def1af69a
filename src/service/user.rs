//! User service
//!
//! Registration, login, profiles, avatars and the follow graph.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::notification::NotificationService;
use super::validation::{normalize_email, normalize_username};
use crate::auth::TokenCodec;
use crate::data::{Database, NotificationKind, ToggleFollowOutput, UserId, UserRow};
use crate::error::AppError;
use crate::metrics::USERS_TOTAL;
use crate::storage::{AvatarFormat, AvatarStore, MAX_AVATAR_BYTES};

/// Public URL of a stored avatar
pub(crate) fn avatar_url(base_url: &str, reference: Option<&str>) -> Option<String> {
    reference.map(|reference| format!("{base_url}/img/avatars/{reference}"))
}

/// Minimal user representation
///
/// `id` is only filled in for the caller's own record.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub username: String,
    pub avatar_url: Option<String>,
}

/// Profile as seen by a particular viewer
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub username: String,
    pub avatar_url: Option<String>,
    pub followers_count: i64,
    pub followees_count: i64,
    pub me: bool,
    /// Viewer follows this user; absent for anonymous viewers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub following: Option<bool>,
    /// This user follows the viewer; absent for anonymous viewers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub followeed: Option<bool>,
}

impl UserProfile {
    /// Project a row for `viewer`: private fields only for the owner
    pub(crate) fn from_row(row: UserRow, viewer: Option<UserId>, base_url: &str) -> Self {
        let me = viewer == Some(UserId(row.id));
        Self {
            id: me.then_some(row.id),
            email: me.then_some(row.email),
            avatar_url: avatar_url(base_url, row.avatar.as_deref()),
            username: row.username,
            followers_count: row.followers_count,
            followees_count: row.followees_count,
            me,
            following: viewer.map(|_| row.following),
            followeed: viewer.map(|_| row.followeed),
        }
    }
}

/// Result of a successful login
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutput {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub auth_user: User,
}

/// User service
pub struct UserService {
    db: Arc<Database>,
    tokens: Arc<TokenCodec>,
    avatars: Arc<dyn AvatarStore>,
    notifications: NotificationService,
    base_url: String,
}

impl UserService {
    /// Create new user service
    pub fn new(
        db: Arc<Database>,
        tokens: Arc<TokenCodec>,
        avatars: Arc<dyn AvatarStore>,
        base_url: String,
    ) -> Self {
        Self {
            notifications: NotificationService::new(db.clone()),
            db,
            tokens,
            avatars,
            base_url,
        }
    }

    fn user_from_row(&self, row: UserRow) -> User {
        User {
            id: Some(row.id),
            avatar_url: avatar_url(&self.base_url, row.avatar.as_deref()),
            username: row.username,
        }
    }

    /// Resolve a username or fail with `UserNotFound`
    ///
    /// A malformed username is rejected before any lookup.
    async fn resolve(&self, username: &str) -> Result<UserId, AppError> {
        let username = normalize_username(username)?;
        self.db
            .get_user_id(&username)
            .await?
            .ok_or(AppError::UserNotFound)
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// Register a user
    ///
    /// # Errors
    /// `InvalidEmail` / `InvalidUsername` on format, `EmailTaken` /
    /// `UsernameTaken` on conflict
    pub async fn create_user(&self, email: &str, username: &str) -> Result<UserId, AppError> {
        let email = normalize_email(email)?;
        let username = normalize_username(username)?;

        let id = self.db.insert_user(&email, &username).await?;
        USERS_TOTAL.inc();
        tracing::info!(user_id = %id, %username, "User created");

        Ok(id)
    }

    /// Log in by email and issue a bearer token
    pub async fn login(&self, email: &str) -> Result<LoginOutput, AppError> {
        let email = normalize_email(email)?;
        let row = self
            .db
            .get_user_by_email(&email)
            .await?
            .ok_or(AppError::UserNotFound)?;

        let (token, expires_at) = self.tokens.issue(UserId(row.id))?;

        Ok(LoginOutput {
            token,
            expires_at,
            auth_user: self.user_from_row(row),
        })
    }

    /// The caller's own user record
    pub async fn auth_user(&self, viewer: Option<UserId>) -> Result<User, AppError> {
        let viewer = viewer.ok_or(AppError::Unauthenticated)?;
        self.user_by_id(viewer).await
    }

    pub async fn user_by_id(&self, id: UserId) -> Result<User, AppError> {
        let row = self.db.get_user(id).await?.ok_or(AppError::UserNotFound)?;
        Ok(self.user_from_row(row))
    }

    /// Look up one profile
    pub async fn user(
        &self,
        viewer: Option<UserId>,
        username: &str,
    ) -> Result<UserProfile, AppError> {
        let username = normalize_username(username)?;
        let row = self
            .db
            .get_profile(&username, viewer)
            .await?
            .ok_or(AppError::UserNotFound)?;

        Ok(UserProfile::from_row(row, viewer, &self.base_url))
    }

    /// List users, optionally searching by username substring
    pub async fn users(
        &self,
        viewer: Option<UserId>,
        search: Option<&str>,
        first: i64,
        after: Option<&str>,
    ) -> Result<Vec<UserProfile>, AppError> {
        let rows = self.db.list_users(search, first, after, viewer).await?;
        Ok(self.profiles(rows, viewer))
    }

    fn profiles(&self, rows: Vec<UserRow>, viewer: Option<UserId>) -> Vec<UserProfile> {
        rows.into_iter()
            .map(|row| UserProfile::from_row(row, viewer, &self.base_url))
            .collect()
    }

    /// Replace the caller's avatar
    ///
    /// # Returns
    /// Public URL of the new avatar
    pub async fn update_avatar(
        &self,
        viewer: Option<UserId>,
        bytes: Vec<u8>,
    ) -> Result<String, AppError> {
        let viewer = viewer.ok_or(AppError::Unauthenticated)?;

        if bytes.len() > MAX_AVATAR_BYTES {
            return Err(AppError::AvatarTooLarge);
        }
        let format = AvatarFormat::sniff(&bytes).ok_or(AppError::UnsupportedAvatarFormat)?;

        let reference = self.avatars.put(bytes, format.extension()).await?;

        let previous = match self.db.update_user_avatar(viewer, reference.clone()).await {
            Ok(previous) => previous,
            Err(error) => {
                if let Err(cleanup) = self.avatars.delete(&reference).await {
                    tracing::warn!(error = %cleanup, %reference, "Failed to remove orphaned avatar");
                }
                return Err(error);
            }
        };

        if let Some(previous) = previous {
            if let Err(error) = self.avatars.delete(&previous).await {
                tracing::warn!(%error, reference = %previous, "Failed to remove previous avatar");
            }
        }

        let url = format!("{}/img/avatars/{}", self.base_url, reference);
        tracing::info!(user_id = %viewer, %url, "Avatar updated");
        Ok(url)
    }

    // =========================================================================
    // Follow graph
    // =========================================================================

    /// Follow or unfollow `username`
    ///
    /// A new follow notifies the followee after commit.
    pub async fn toggle_follow(
        &self,
        viewer: Option<UserId>,
        username: &str,
    ) -> Result<ToggleFollowOutput, AppError> {
        let viewer = viewer.ok_or(AppError::Unauthenticated)?;
        let username = normalize_username(username)?;

        let output = self.db.toggle_follow(viewer, username.clone()).await?;

        tracing::info!(
            follower = %viewer,
            followee = %username,
            following = output.following,
            "Follow toggled"
        );

        if output.following {
            self.notify_follow(viewer, &username).await;
        }

        Ok(output)
    }

    async fn notify_follow(&self, follower: UserId, followee_username: &str) {
        let (follower_row, followee) = match tokio::try_join!(
            self.db.get_user(follower),
            self.db.get_user_id(followee_username)
        ) {
            Ok((Some(row), Some(followee))) => (row, followee),
            Ok(_) => return,
            Err(error) => {
                tracing::warn!(%error, "Failed to resolve follow notification parties");
                return;
            }
        };

        self.notifications
            .dispatch(
                followee,
                follower,
                follower_row.username,
                NotificationKind::Follow,
                None,
            )
            .await;
    }

    /// Users following `username`
    pub async fn followers(
        &self,
        viewer: Option<UserId>,
        username: &str,
        first: i64,
        after: Option<&str>,
    ) -> Result<Vec<UserProfile>, AppError> {
        let user = self.resolve(username).await?;
        let rows = self.db.list_followers(user, first, after, viewer).await?;
        Ok(self.profiles(rows, viewer))
    }

    /// Users `username` follows
    pub async fn followees(
        &self,
        viewer: Option<UserId>,
        username: &str,
        first: i64,
        after: Option<&str>,
    ) -> Result<Vec<UserProfile>, AppError> {
        let user = self.resolve(username).await?;
        let rows = self.db.list_followees(user, first, after, viewer).await?;
        Ok(self.profiles(rows, viewer))
    }
}
