//! Graph store: users, follow edges and their denormalized counters

use super::database::{Database, unique_violation};
use super::models::{ToggleFollowOutput, UserId, UserRow};
use super::query::{Cursor, Fragment, ListingQuery, SortOrder, escape_like};
use crate::error::AppError;

const USER_COLUMNS: &str = "users.id AS id, users.email AS email, users.username AS username, \
     users.avatar AS avatar, users.followers_count AS followers_count, \
     users.followees_count AS followees_count";

/// Base user listing with the viewer's relationship flags
///
/// `following`: the viewer follows the row. `followeed`: the row follows the viewer.
fn user_listing(from: &str, viewer: Option<UserId>) -> ListingQuery {
    ListingQuery::select(USER_COLUMNS, from)
        .viewer(viewer, |query, viewer| {
            query
                .column(Fragment::new("followers.follower_id IS NOT NULL AS following"))
                .column(Fragment::new("followees.followee_id IS NOT NULL AS followeed"))
                .join(
                    Fragment::new(
                        "LEFT JOIN follows AS followers \
                         ON followers.follower_id = ? AND followers.followee_id = users.id",
                    )
                    .bind(viewer),
                )
                .join(
                    Fragment::new(
                        "LEFT JOIN follows AS followees \
                         ON followees.follower_id = users.id AND followees.followee_id = ?",
                    )
                    .bind(viewer),
                )
        })
}

/// Page of users ordered by username, starting after `after`
fn user_page(query: ListingQuery, first: i64, after: Option<&str>) -> ListingQuery {
    query
        .cursor("users.username", Cursor::after_text(after))
        .order_by("users.username", SortOrder::Asc)
        .limit(first)
}

impl Database {
    // =========================================================================
    // Users
    // =========================================================================

    /// Insert a user with zeroed counters
    ///
    /// # Errors
    /// `EmailTaken` / `UsernameTaken` depending on which unique constraint fired
    pub async fn insert_user(&self, email: &str, username: &str) -> Result<UserId, AppError> {
        let result = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (email, username) VALUES (?, ?) RETURNING id",
        )
        .bind(email)
        .bind(username)
        .fetch_one(self.pool())
        .await;

        match result {
            Ok(id) => Ok(UserId(id)),
            Err(error) => match unique_violation(&error) {
                Some(message) if message.contains("users.email") => Err(AppError::EmailTaken),
                Some(message) if message.contains("users.username") => {
                    Err(AppError::UsernameTaken)
                }
                _ => Err(error.into()),
            },
        }
    }

    /// Get a user by ID
    pub async fn get_user(&self, id: UserId) -> Result<Option<UserRow>, AppError> {
        let user = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE users.id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(user)
    }

    /// Get a user by email
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>, AppError> {
        let user = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE users.email = ?"
        ))
        .bind(email)
        .fetch_optional(self.pool())
        .await?;

        Ok(user)
    }

    /// Resolve a username to its ID
    pub async fn get_user_id(&self, username: &str) -> Result<Option<UserId>, AppError> {
        let id = sqlx::query_scalar::<_, UserId>("SELECT id FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(self.pool())
            .await?;

        Ok(id)
    }

    /// Get a profile with relationship flags relative to `viewer`
    pub async fn get_profile(
        &self,
        username: &str,
        viewer: Option<UserId>,
    ) -> Result<Option<UserRow>, AppError> {
        let query = user_listing("users", viewer)
            .filter(Fragment::new("users.username = ?").bind(username))
            .limit(1);

        let mut builder = query.build();
        let user = builder
            .build_query_as::<UserRow>()
            .fetch_optional(self.pool())
            .await?;

        Ok(user)
    }

    /// List users, optionally filtered by a username substring
    pub async fn list_users(
        &self,
        search: Option<&str>,
        first: i64,
        after: Option<&str>,
        viewer: Option<UserId>,
    ) -> Result<Vec<UserRow>, AppError> {
        let mut query = user_listing("users", viewer);
        if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(
                Fragment::new("users.username LIKE '%' || ? || '%' ESCAPE '\\'")
                    .bind(escape_like(search)),
            );
        }

        let mut builder = user_page(query, first, after).build();
        let users = builder
            .build_query_as::<UserRow>()
            .fetch_all(self.pool())
            .await?;

        Ok(users)
    }

    /// List the users following `user`
    pub async fn list_followers(
        &self,
        user: UserId,
        first: i64,
        after: Option<&str>,
        viewer: Option<UserId>,
    ) -> Result<Vec<UserRow>, AppError> {
        let query = user_listing(
            "follows INNER JOIN users ON follows.follower_id = users.id",
            viewer,
        )
        .filter(Fragment::new("follows.followee_id = ?").bind(user));

        let mut builder = user_page(query, first, after).build();
        let users = builder
            .build_query_as::<UserRow>()
            .fetch_all(self.pool())
            .await?;

        Ok(users)
    }

    /// List the users `user` follows
    pub async fn list_followees(
        &self,
        user: UserId,
        first: i64,
        after: Option<&str>,
        viewer: Option<UserId>,
    ) -> Result<Vec<UserRow>, AppError> {
        let query = user_listing(
            "follows INNER JOIN users ON follows.followee_id = users.id",
            viewer,
        )
        .filter(Fragment::new("follows.follower_id = ?").bind(user));

        let mut builder = user_page(query, first, after).build();
        let users = builder
            .build_query_as::<UserRow>()
            .fetch_all(self.pool())
            .await?;

        Ok(users)
    }

    /// Replace a user's avatar reference
    ///
    /// # Returns
    /// The previous reference, if any
    pub async fn update_user_avatar(
        &self,
        user: UserId,
        avatar: String,
    ) -> Result<Option<String>, AppError> {
        self.write(move |conn| {
            Box::pin(async move {
                let previous =
                    sqlx::query_scalar::<_, Option<String>>("SELECT avatar FROM users WHERE id = ?")
                        .bind(user)
                        .fetch_optional(&mut *conn)
                        .await?
                        .ok_or(AppError::UserNotFound)?;

                sqlx::query("UPDATE users SET avatar = ? WHERE id = ?")
                    .bind(&avatar)
                    .bind(user)
                    .execute(&mut *conn)
                    .await?;

                Ok(previous)
            })
        })
        .await
    }

    // =========================================================================
    // Follows
    // =========================================================================

    /// Flip the follow edge from `follower` to the user named `username`
    ///
    /// Edge and both counters change together or not at all.
    ///
    /// # Errors
    /// `UserNotFound` if the target does not exist, `ForbiddenFollow` on self-follow
    pub async fn toggle_follow(
        &self,
        follower: UserId,
        username: String,
    ) -> Result<ToggleFollowOutput, AppError> {
        self.write(move |conn| {
            Box::pin(async move {
                let followee = sqlx::query_scalar::<_, UserId>(
                    "SELECT id FROM users WHERE username = ?",
                )
                .bind(&username)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or(AppError::UserNotFound)?;

                if followee == follower {
                    return Err(AppError::ForbiddenFollow);
                }

                let following = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = ? AND followee_id = ?)",
                )
                .bind(follower)
                .bind(followee)
                .fetch_one(&mut *conn)
                .await?;

                let (edge_sql, delta) = if following {
                    ("DELETE FROM follows WHERE follower_id = ? AND followee_id = ?", -1)
                } else {
                    ("INSERT INTO follows (follower_id, followee_id) VALUES (?, ?)", 1)
                };

                sqlx::query(edge_sql)
                    .bind(follower)
                    .bind(followee)
                    .execute(&mut *conn)
                    .await?;

                sqlx::query("UPDATE users SET followees_count = followees_count + ? WHERE id = ?")
                    .bind(delta)
                    .bind(follower)
                    .execute(&mut *conn)
                    .await?;

                let followers_count = sqlx::query_scalar::<_, i64>(
                    "UPDATE users SET followers_count = followers_count + ? WHERE id = ? \
                     RETURNING followers_count",
                )
                .bind(delta)
                .bind(followee)
                .fetch_one(&mut *conn)
                .await?;

                Ok(ToggleFollowOutput {
                    following: !following,
                    followers_count,
                })
            })
        })
        .await
    }

    /// Whether `follower` currently follows `followee`
    #[cfg(test)]
    pub(crate) async fn is_following(&self, follower: UserId, followee: UserId) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = ? AND followee_id = ?)",
        )
        .bind(follower)
        .bind(followee)
        .fetch_one(self.pool())
        .await?;

        Ok(exists)
    }

    /// Count follow edges touching `user`, as (followers, followees)
    #[cfg(test)]
    pub(crate) async fn count_follow_edges(&self, user: UserId) -> Result<(i64, i64), AppError> {
        let counts = sqlx::query_as::<_, (i64, i64)>(
            "SELECT \
                (SELECT COUNT(*) FROM follows WHERE followee_id = ?), \
                (SELECT COUNT(*) FROM follows WHERE follower_id = ?)",
        )
        .bind(user)
        .bind(user)
        .fetch_one(self.pool())
        .await?;

        Ok(counts)
    }
}
