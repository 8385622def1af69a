//! Content store: posts, comments, likes and their counters

use chrono::Utc;

use super::database::{Database, is_foreign_key_violation};
use super::models::{
    CommentRow, CreatedComment, CreatedPost, NewPost, PostRow, ToggleLikeOutput, UserId,
};
use super::query::{Cursor, Fragment, ListingQuery, SortOrder};
use crate::error::AppError;

pub(crate) const POST_COLUMNS: &str = "posts.id AS id, posts.user_id AS user_id, \
     posts.content AS content, posts.spoiler_of AS spoiler_of, posts.nsfw AS nsfw, \
     posts.likes_count AS likes_count, posts.comments_count AS comments_count, \
     posts.created_at AS created_at, users.username AS username, users.avatar AS avatar";

const COMMENT_COLUMNS: &str = "comments.id AS id, comments.user_id AS user_id, \
     comments.post_id AS post_id, comments.content AS content, \
     comments.likes_count AS likes_count, comments.created_at AS created_at, \
     users.username AS username, users.avatar AS avatar";

/// Post listing over `from` with the viewer's mine/liked flags
pub(crate) fn post_listing(columns: &str, from: &str, viewer: Option<UserId>) -> ListingQuery {
    ListingQuery::select(columns, from).viewer(viewer, |query, viewer| {
        query
            .column(Fragment::new("posts.user_id = ? AS mine").bind(viewer))
            .column(Fragment::new("post_likes.user_id IS NOT NULL AS liked"))
            .join(
                Fragment::new(
                    "LEFT JOIN post_likes \
                     ON post_likes.post_id = posts.id AND post_likes.user_id = ?",
                )
                .bind(viewer),
            )
    })
}

fn comment_listing(viewer: Option<UserId>) -> ListingQuery {
    ListingQuery::select(
        COMMENT_COLUMNS,
        "comments INNER JOIN users ON users.id = comments.user_id",
    )
    .viewer(viewer, |query, viewer| {
        query
            .column(Fragment::new("comments.user_id = ? AS mine").bind(viewer))
            .column(Fragment::new("comment_likes.user_id IS NOT NULL AS liked"))
            .join(
                Fragment::new(
                    "LEFT JOIN comment_likes \
                     ON comment_likes.comment_id = comments.id AND comment_likes.user_id = ?",
                )
                .bind(viewer),
            )
    })
}

impl Database {
    // =========================================================================
    // Posts
    // =========================================================================

    /// Insert a post, the author's timeline entry and a fan-out task
    ///
    /// All three rows commit together; follower delivery happens later
    /// from the fan-out task.
    pub async fn insert_post(&self, post: NewPost) -> Result<CreatedPost, AppError> {
        self.write(move |conn| {
            Box::pin(async move {
                let created_at = Utc::now();

                let post_id = sqlx::query_scalar::<_, i64>(
                    "INSERT INTO posts (user_id, content, spoiler_of, nsfw, created_at) \
                     VALUES (?, ?, ?, ?, ?) RETURNING id",
                )
                .bind(post.author)
                .bind(&post.content)
                .bind(&post.spoiler_of)
                .bind(post.nsfw)
                .bind(created_at)
                .fetch_one(&mut *conn)
                .await?;

                let timeline_id = sqlx::query_scalar::<_, i64>(
                    "INSERT INTO timeline (user_id, post_id) VALUES (?, ?) RETURNING id",
                )
                .bind(post.author)
                .bind(post_id)
                .fetch_one(&mut *conn)
                .await?;

                sqlx::query(
                    "INSERT INTO fanout_tasks (post_id, author_id, next_attempt_at) VALUES (?, ?, ?)",
                )
                .bind(post_id)
                .bind(post.author)
                .bind(created_at)
                .execute(&mut *conn)
                .await?;

                Ok(CreatedPost {
                    post_id,
                    timeline_id,
                    created_at,
                })
            })
        })
        .await
    }

    /// Get a post with its author
    pub async fn get_post(
        &self,
        id: i64,
        viewer: Option<UserId>,
    ) -> Result<Option<PostRow>, AppError> {
        let query = post_listing(
            POST_COLUMNS,
            "posts INNER JOIN users ON users.id = posts.user_id",
            viewer,
        )
        .filter(Fragment::new("posts.id = ?").bind(id))
        .limit(1);

        let mut builder = query.build();
        let post = builder
            .build_query_as::<PostRow>()
            .fetch_optional(self.pool())
            .await?;

        Ok(post)
    }

    /// List posts by `author`, newest first, older than `before`
    pub async fn list_posts(
        &self,
        author: UserId,
        last: i64,
        before: Option<i64>,
        viewer: Option<UserId>,
    ) -> Result<Vec<PostRow>, AppError> {
        let query = post_listing(
            POST_COLUMNS,
            "posts INNER JOIN users ON users.id = posts.user_id",
            viewer,
        )
        .filter(Fragment::new("posts.user_id = ?").bind(author))
        .cursor("posts.id", Cursor::before_id(before))
        .order_by("posts.created_at", SortOrder::Desc)
        .order_by("posts.id", SortOrder::Desc)
        .limit(last);

        let mut builder = query.build();
        let posts = builder
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await?;

        Ok(posts)
    }

    /// Flip `user`'s like on a post
    ///
    /// # Errors
    /// `PostNotFound` when the insert hits the posts foreign key
    pub async fn toggle_post_like(
        &self,
        user: UserId,
        post_id: i64,
    ) -> Result<ToggleLikeOutput, AppError> {
        self.write(move |conn| {
            Box::pin(async move {
                let liked = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS (SELECT 1 FROM post_likes WHERE user_id = ? AND post_id = ?)",
                )
                .bind(user)
                .bind(post_id)
                .fetch_one(&mut *conn)
                .await?;

                let delta = if liked {
                    sqlx::query("DELETE FROM post_likes WHERE user_id = ? AND post_id = ?")
                        .bind(user)
                        .bind(post_id)
                        .execute(&mut *conn)
                        .await?;
                    -1
                } else {
                    sqlx::query("INSERT INTO post_likes (user_id, post_id) VALUES (?, ?)")
                        .bind(user)
                        .bind(post_id)
                        .execute(&mut *conn)
                        .await
                        .map_err(|error| {
                            if is_foreign_key_violation(&error) {
                                AppError::PostNotFound
                            } else {
                                error.into()
                            }
                        })?;
                    1
                };

                let likes_count = sqlx::query_scalar::<_, i64>(
                    "UPDATE posts SET likes_count = likes_count + ? WHERE id = ? RETURNING likes_count",
                )
                .bind(delta)
                .bind(post_id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or(AppError::PostNotFound)?;

                Ok(ToggleLikeOutput {
                    liked: !liked,
                    likes_count,
                })
            })
        })
        .await
    }

    // =========================================================================
    // Comments
    // =========================================================================

    /// Insert a comment and bump the post's comment counter
    ///
    /// # Errors
    /// `PostNotFound` when the insert hits the posts foreign key
    pub async fn insert_comment(
        &self,
        author: UserId,
        post_id: i64,
        content: String,
    ) -> Result<CreatedComment, AppError> {
        self.write(move |conn| {
            Box::pin(async move {
                let created_at = Utc::now();

                let id = sqlx::query_scalar::<_, i64>(
                    "INSERT INTO comments (user_id, post_id, content, created_at) \
                     VALUES (?, ?, ?, ?) RETURNING id",
                )
                .bind(author)
                .bind(post_id)
                .bind(&content)
                .bind(created_at)
                .fetch_one(&mut *conn)
                .await
                .map_err(|error| {
                    if is_foreign_key_violation(&error) {
                        AppError::PostNotFound
                    } else {
                        error.into()
                    }
                })?;

                let post_author = sqlx::query_scalar::<_, UserId>(
                    "UPDATE posts SET comments_count = comments_count + 1 WHERE id = ? \
                     RETURNING user_id",
                )
                .bind(post_id)
                .fetch_one(&mut *conn)
                .await?;

                Ok(CreatedComment {
                    id,
                    post_author,
                    created_at,
                })
            })
        })
        .await
    }

    /// List comments on a post, newest first, older than `before`
    pub async fn list_comments(
        &self,
        post_id: i64,
        last: i64,
        before: Option<i64>,
        viewer: Option<UserId>,
    ) -> Result<Vec<CommentRow>, AppError> {
        let query = comment_listing(viewer)
            .filter(Fragment::new("comments.post_id = ?").bind(post_id))
            .cursor("comments.id", Cursor::before_id(before))
            .order_by("comments.created_at", SortOrder::Desc)
            .order_by("comments.id", SortOrder::Desc)
            .limit(last);

        let mut builder = query.build();
        let comments = builder
            .build_query_as::<CommentRow>()
            .fetch_all(self.pool())
            .await?;

        Ok(comments)
    }

    /// Flip `user`'s like on a comment
    ///
    /// # Errors
    /// `CommentNotFound` when the insert hits the comments foreign key
    pub async fn toggle_comment_like(
        &self,
        user: UserId,
        comment_id: i64,
    ) -> Result<ToggleLikeOutput, AppError> {
        self.write(move |conn| {
            Box::pin(async move {
                let liked = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS (SELECT 1 FROM comment_likes WHERE user_id = ? AND comment_id = ?)",
                )
                .bind(user)
                .bind(comment_id)
                .fetch_one(&mut *conn)
                .await?;

                let delta = if liked {
                    sqlx::query("DELETE FROM comment_likes WHERE user_id = ? AND comment_id = ?")
                        .bind(user)
                        .bind(comment_id)
                        .execute(&mut *conn)
                        .await?;
                    -1
                } else {
                    sqlx::query("INSERT INTO comment_likes (user_id, comment_id) VALUES (?, ?)")
                        .bind(user)
                        .bind(comment_id)
                        .execute(&mut *conn)
                        .await
                        .map_err(|error| {
                            if is_foreign_key_violation(&error) {
                                AppError::CommentNotFound
                            } else {
                                error.into()
                            }
                        })?;
                    1
                };

                let likes_count = sqlx::query_scalar::<_, i64>(
                    "UPDATE comments SET likes_count = likes_count + ? WHERE id = ? \
                     RETURNING likes_count",
                )
                .bind(delta)
                .bind(comment_id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or(AppError::CommentNotFound)?;

                Ok(ToggleLikeOutput {
                    liked: !liked,
                    likes_count,
                })
            })
        })
        .await
    }
}
