//! Database tests

use super::*;
use crate::error::AppError;
use chrono::Utc;
use tempfile::TempDir;

/// Helper to create a test database
async fn create_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::connect(&db_path).await.unwrap();
    (db, temp_dir)
}

async fn create_user(db: &Database, username: &str) -> UserId {
    db.insert_user(&format!("{username}@example.com"), username)
        .await
        .unwrap()
}

async fn create_post(db: &Database, author: UserId, content: &str) -> CreatedPost {
    db.insert_post(NewPost {
        author,
        content: content.to_string(),
        spoiler_of: None,
        nsfw: false,
    })
    .await
    .unwrap()
}

async fn count(db: &Database, sql: &str, id: i64) -> i64 {
    sqlx::query_scalar::<_, i64>(sql)
        .bind(id)
        .fetch_one(db.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_database_connection() {
    let (_db, _temp_dir) = create_test_db().await;
    // Connection successful if we get here without panicking
}

#[tokio::test]
async fn test_panicking_write_leaves_pool_usable() {
    let temp_dir = TempDir::new().unwrap();
    let settings = PoolSettings {
        max_connections: 1,
        busy_timeout: std::time::Duration::from_secs(5),
    };
    let db = Database::connect_with(&temp_dir.path().join("test.db"), settings)
        .await
        .unwrap();

    let result: Result<(), AppError> = db
        .write(|conn| {
            Box::pin(async move {
                sqlx::query("INSERT INTO users (email, username) VALUES ('a@example.com', 'a')")
                    .execute(&mut *conn)
                    .await?;
                let fail = true;
                if fail {
                    panic!("write closure failed midway");
                }
                Ok(())
            })
        })
        .await;
    assert!(matches!(result, Err(AppError::Internal(_))));

    // Half-done insert was discarded with the connection
    let users = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(users, 0);

    // The next write gets a clean connection
    let alice = create_user(&db, "alice").await;
    assert!(db.get_user(alice).await.unwrap().is_some());
}

// =============================================================================
// Users and follows
// =============================================================================

#[tokio::test]
async fn test_user_created_with_zeroed_counters() {
    let (db, _temp_dir) = create_test_db().await;

    create_user(&db, "alice").await;

    let profile = db.get_profile("alice", None).await.unwrap().unwrap();
    assert_eq!(profile.followers_count, 0);
    assert_eq!(profile.followees_count, 0);
    assert!(!profile.following);
    assert!(!profile.followeed);
}

#[tokio::test]
async fn test_duplicate_user_reports_which_constraint() {
    let (db, _temp_dir) = create_test_db().await;

    create_user(&db, "alice").await;

    let email = db.insert_user("alice@example.com", "other").await;
    assert!(matches!(email, Err(AppError::EmailTaken)));

    let username = db.insert_user("other@example.com", "alice").await;
    assert!(matches!(username, Err(AppError::UsernameTaken)));
}

#[tokio::test]
async fn test_follow_round_trip() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;

    let first = db.toggle_follow(alice, "bob".to_string()).await.unwrap();
    assert!(first.following);
    assert_eq!(first.followers_count, 1);
    assert!(db.is_following(alice, bob).await.unwrap());

    let profile = db.get_profile("bob", Some(alice)).await.unwrap().unwrap();
    assert!(profile.following);
    assert!(!profile.followeed);

    let second = db.toggle_follow(alice, "bob".to_string()).await.unwrap();
    assert!(!second.following);
    assert_eq!(second.followers_count, 0);

    assert_eq!(db.count_follow_edges(bob).await.unwrap(), (0, 0));
    let alice_row = db.get_user(alice).await.unwrap().unwrap();
    assert_eq!(alice_row.followees_count, 0);
}

#[tokio::test]
async fn test_self_follow_is_forbidden() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;

    let result = db.toggle_follow(alice, "alice".to_string()).await;
    assert!(matches!(result, Err(AppError::ForbiddenFollow)));

    assert_eq!(db.count_follow_edges(alice).await.unwrap(), (0, 0));
    let row = db.get_user(alice).await.unwrap().unwrap();
    assert_eq!((row.followers_count, row.followees_count), (0, 0));
}

#[tokio::test]
async fn test_follow_unknown_user() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;

    let result = db.toggle_follow(alice, "ghost".to_string()).await;
    assert!(matches!(result, Err(AppError::UserNotFound)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_toggles_keep_counters_consistent() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;

    let mut handles = Vec::new();
    for _ in 0..9 {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            db.toggle_follow(alice, "bob".to_string()).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Odd number of flips from "not following"
    assert!(db.is_following(alice, bob).await.unwrap());

    let (bob_followers, _) = db.count_follow_edges(bob).await.unwrap();
    let (_, alice_followees) = db.count_follow_edges(alice).await.unwrap();
    let bob_row = db.get_user(bob).await.unwrap().unwrap();
    let alice_row = db.get_user(alice).await.unwrap().unwrap();
    assert_eq!(bob_row.followers_count, bob_followers);
    assert_eq!(alice_row.followees_count, alice_followees);
    assert_eq!(bob_followers, 1);
}

#[tokio::test]
async fn test_user_listing_pages_by_username() {
    let (db, _temp_dir) = create_test_db().await;
    for i in 0..12 {
        create_user(&db, &format!("user{i:02}")).await;
    }

    let default_page = db.list_users(None, 0, None, None).await.unwrap();
    assert_eq!(default_page.len(), 10);
    assert_eq!(default_page[0].username, "user00");

    let clamped = db.list_users(None, 500, None, None).await.unwrap();
    assert_eq!(clamped.len(), 10);

    let next = db
        .list_users(None, 10, Some(&default_page[9].username), None)
        .await
        .unwrap();
    let names: Vec<_> = next.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, vec!["user10", "user11"]);
}

#[tokio::test]
async fn test_user_search_matches_substring_literally() {
    let (db, _temp_dir) = create_test_db().await;
    create_user(&db, "alice").await;
    create_user(&db, "malik").await;
    create_user(&db, "bob_b").await;
    create_user(&db, "bobxb").await;

    let found = db.list_users(Some("li"), 10, None, None).await.unwrap();
    let names: Vec<_> = found.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, vec!["alice", "malik"]);

    let underscore = db.list_users(Some("_"), 10, None, None).await.unwrap();
    assert_eq!(underscore.len(), 1);
    assert_eq!(underscore[0].username, "bob_b");
}

#[tokio::test]
async fn test_followers_and_followees() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let carol = create_user(&db, "carol").await;

    db.toggle_follow(bob, "alice".to_string()).await.unwrap();
    db.toggle_follow(carol, "alice".to_string()).await.unwrap();
    db.toggle_follow(alice, "carol".to_string()).await.unwrap();

    let followers = db.list_followers(alice, 10, None, Some(alice)).await.unwrap();
    let names: Vec<_> = followers.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, vec!["bob", "carol"]);
    // alice follows carol back, not bob
    assert!(!followers[0].following);
    assert!(followers[0].followeed);
    assert!(followers[1].following);

    let followees = db.list_followees(alice, 10, None, None).await.unwrap();
    assert_eq!(followees.len(), 1);
    assert_eq!(followees[0].username, "carol");
}

// =============================================================================
// Posts, likes and comments
// =============================================================================

#[tokio::test]
async fn test_create_post_writes_author_timeline_and_outbox() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;

    let created = create_post(&db, alice, "hello").await;

    assert_eq!(db.count_timeline_entries(alice, created.post_id).await.unwrap(), 1);
    assert_eq!(db.pending_fanout_count().await.unwrap(), 1);

    let post = db.get_post(created.post_id, Some(alice)).await.unwrap().unwrap();
    assert_eq!(post.content, "hello");
    assert_eq!(post.username, "alice");
    assert!(post.mine);
    assert!(!post.liked);
}

#[tokio::test]
async fn test_post_like_round_trip() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let created = create_post(&db, alice, "hello").await;

    let liked = db.toggle_post_like(bob, created.post_id).await.unwrap();
    assert_eq!(liked, ToggleLikeOutput { liked: true, likes_count: 1 });

    let seen_by_bob = db.get_post(created.post_id, Some(bob)).await.unwrap().unwrap();
    assert!(seen_by_bob.liked);
    assert!(!seen_by_bob.mine);

    let unliked = db.toggle_post_like(bob, created.post_id).await.unwrap();
    assert_eq!(unliked, ToggleLikeOutput { liked: false, likes_count: 0 });
}

#[tokio::test]
async fn test_like_missing_post_leaves_no_trace() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;

    let result = db.toggle_post_like(alice, 999).await;
    assert!(matches!(result, Err(AppError::PostNotFound)));

    let likes = count(&db, "SELECT COUNT(*) FROM post_likes WHERE user_id = ?", alice.0).await;
    assert_eq!(likes, 0);
}

#[tokio::test]
async fn test_like_counter_keyed_by_post() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let first = create_post(&db, alice, "first").await;
    let second = create_post(&db, alice, "second").await;

    db.toggle_post_like(alice, second.post_id).await.unwrap();

    let first_row = db.get_post(first.post_id, None).await.unwrap().unwrap();
    let second_row = db.get_post(second.post_id, None).await.unwrap().unwrap();
    assert_eq!(first_row.likes_count, 0);
    assert_eq!(second_row.likes_count, 1);
}

#[tokio::test]
async fn test_posts_listing_newest_first_with_cursor() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let mut ids = Vec::new();
    for i in 0..4 {
        ids.push(create_post(&db, alice, &format!("post {i}")).await.post_id);
    }

    let page = db.list_posts(alice, 2, None, None).await.unwrap();
    let got: Vec<_> = page.iter().map(|p| p.id).collect();
    assert_eq!(got, vec![ids[3], ids[2]]);
    assert!(!page[0].mine);

    let older = db.list_posts(alice, 2, Some(ids[2]), None).await.unwrap();
    let got: Vec<_> = older.iter().map(|p| p.id).collect();
    assert_eq!(got, vec![ids[1], ids[0]]);
}

#[tokio::test]
async fn test_comment_bumps_counter_and_reports_post_author() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let post = create_post(&db, alice, "hello").await;

    let comment = db
        .insert_comment(bob, post.post_id, "nice".to_string())
        .await
        .unwrap();
    assert_eq!(comment.post_author, alice);

    let row = db.get_post(post.post_id, None).await.unwrap().unwrap();
    assert_eq!(row.comments_count, 1);

    let comments = db.list_comments(post.post_id, 10, None, Some(bob)).await.unwrap();
    assert_eq!(comments.len(), 1);
    assert!(comments[0].mine);
    assert_eq!(comments[0].username, "bob");

    let liked = db.toggle_comment_like(alice, comment.id).await.unwrap();
    assert_eq!(liked, ToggleLikeOutput { liked: true, likes_count: 1 });
}

#[tokio::test]
async fn test_comment_on_missing_post() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;

    let result = db.insert_comment(alice, 42, "hi".to_string()).await;
    assert!(matches!(result, Err(AppError::PostNotFound)));

    let result = db.toggle_comment_like(alice, 42).await;
    assert!(matches!(result, Err(AppError::CommentNotFound)));
}

// =============================================================================
// Fan-out outbox and timeline
// =============================================================================

#[tokio::test]
async fn test_fanout_delivers_to_current_followers() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let carol = create_user(&db, "carol").await;
    db.toggle_follow(bob, "alice".to_string()).await.unwrap();
    db.toggle_follow(carol, "alice".to_string()).await.unwrap();

    let post = create_post(&db, alice, "hello").await;

    let tasks = db.due_fanout_tasks(Utc::now(), 8, 32).await.unwrap();
    assert_eq!(tasks.len(), 1);
    let delivered = db.deliver_fanout(&tasks[0]).await.unwrap();
    assert_eq!(delivered, 2);
    assert_eq!(db.pending_fanout_count().await.unwrap(), 0);

    for user in [alice, bob, carol] {
        assert_eq!(db.count_timeline_entries(user, post.post_id).await.unwrap(), 1);
    }

    let timeline = db.list_timeline(bob, 10, None).await.unwrap();
    assert_eq!(timeline.len(), 1);
    assert_eq!(timeline[0].post.id, post.post_id);
    assert!(!timeline[0].post.mine);
}

#[tokio::test]
async fn test_fanout_replay_is_idempotent() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    db.toggle_follow(bob, "alice".to_string()).await.unwrap();
    let post = create_post(&db, alice, "hello").await;

    let task = db.due_fanout_tasks(Utc::now(), 8, 32).await.unwrap().remove(0);
    assert_eq!(db.deliver_fanout(&task).await.unwrap(), 1);
    assert_eq!(db.deliver_fanout(&task).await.unwrap(), 0);
    assert_eq!(db.count_timeline_entries(bob, post.post_id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_failed_fanout_is_rescheduled_then_parked() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    create_post(&db, alice, "hello").await;

    let task = db.due_fanout_tasks(Utc::now(), 2, 32).await.unwrap().remove(0);
    let later = Utc::now() + chrono::Duration::seconds(60);

    let attempts = db.record_fanout_failure(task.id, "boom", later).await.unwrap();
    assert_eq!(attempts, 1);
    assert!(db.due_fanout_tasks(Utc::now(), 2, 32).await.unwrap().is_empty());
    assert_eq!(db.due_fanout_tasks(later, 2, 32).await.unwrap().len(), 1);

    db.record_fanout_failure(task.id, "boom", Utc::now()).await.unwrap();
    assert!(db.due_fanout_tasks(later, 2, 32).await.unwrap().is_empty());
    assert_eq!(db.pending_fanout_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_timeline_pages_by_post() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let mut posts = Vec::new();
    for i in 0..3 {
        posts.push(create_post(&db, alice, &format!("post {i}")).await.post_id);
    }

    let first = db.list_timeline(alice, 2, None).await.unwrap();
    let got: Vec<_> = first.iter().map(|row| row.post.id).collect();
    assert_eq!(got, vec![posts[2], posts[1]]);
    assert!(first[0].post.mine);

    let rest = db.list_timeline(alice, 2, Some(posts[1])).await.unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].post.id, posts[0]);
}

#[tokio::test]
async fn test_timeline_orders_by_post_time_after_late_delivery() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let carol = create_user(&db, "carol").await;
    db.toggle_follow(bob, "alice".to_string()).await.unwrap();
    db.toggle_follow(bob, "carol".to_string()).await.unwrap();

    let older = create_post(&db, alice, "older").await;
    let newer = create_post(&db, carol, "newer").await;

    let tasks = db.due_fanout_tasks(Utc::now(), 8, 32).await.unwrap();
    assert_eq!(tasks.len(), 2);
    let (older_task, newer_task) = if tasks[0].post_id == older.post_id {
        (&tasks[0], &tasks[1])
    } else {
        (&tasks[1], &tasks[0])
    };

    // The older post's task was retried and lands last
    db.deliver_fanout(newer_task).await.unwrap();
    db.deliver_fanout(older_task).await.unwrap();

    let timeline = db.list_timeline(bob, 10, None).await.unwrap();
    let got: Vec<_> = timeline.iter().map(|row| row.post.id).collect();
    assert_eq!(got, vec![newer.post_id, older.post_id]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fanout_races_with_unfollow() {
    let (db, _temp_dir) = create_test_db().await;
    let db = std::sync::Arc::new(db);
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let carol = create_user(&db, "carol").await;
    db.toggle_follow(bob, "alice".to_string()).await.unwrap();
    db.toggle_follow(carol, "alice".to_string()).await.unwrap();

    let post = create_post(&db, alice, "racing").await;
    let task = db.due_fanout_tasks(Utc::now(), 8, 32).await.unwrap().remove(0);

    let deliver = {
        let db = db.clone();
        tokio::spawn(async move { db.deliver_fanout(&task).await })
    };
    let unfollow = {
        let db = db.clone();
        tokio::spawn(async move { db.toggle_follow(carol, "alice".to_string()).await })
    };

    deliver.await.unwrap().unwrap();
    let toggled = unfollow.await.unwrap().unwrap();
    assert!(!toggled.following);

    assert_eq!(db.count_timeline_entries(alice, post.post_id).await.unwrap(), 1);
    assert_eq!(db.count_timeline_entries(bob, post.post_id).await.unwrap(), 1);
    assert!(db.count_timeline_entries(carol, post.post_id).await.unwrap() <= 1);
    assert_eq!(db.pending_fanout_count().await.unwrap(), 0);

    for user in [alice, bob, carol] {
        let row = db.get_user(user).await.unwrap().unwrap();
        let (followers, followees) = db.count_follow_edges(user).await.unwrap();
        assert_eq!(row.followers_count, followers);
        assert_eq!(row.followees_count, followees);
    }
}


// NOTE(build): orphaned, header-less fragment (stale copy of test_timeline_pages_by_post
// referencing undefined `entries`); commented out so the file parses. Not a #[test] fn.
//     let first = db.list_timeline(alice, 2, None).await.unwrap();
//     let got: Vec<_> = first.iter().map(|row| row.timeline_id).collect();
//     assert_eq!(got, vec![entries[2], entries[1]]);
//     assert!(first[0].post.mine);
//
//     let rest = db.list_timeline(alice, 2, Some(entries[1])).await.unwrap();
//     assert_eq!(rest.len(), 1);
//     assert_eq!(rest[0].timeline_id, entries[0]);
// }

// =============================================================================
// Notifications
// =============================================================================

#[tokio::test]
async fn test_notifications_group_actors() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let post = create_post(&db, alice, "hello").await;

    let first = db
        .notify(alice, "bob".to_string(), NotificationKind::Comment, Some(post.post_id))
        .await
        .unwrap();
    let second = db
        .notify(alice, "carol".to_string(), NotificationKind::Comment, Some(post.post_id))
        .await
        .unwrap();
    db.notify(alice, "bob".to_string(), NotificationKind::Follow, None)
        .await
        .unwrap();

    assert!(second.id > first.id);
    assert_eq!(second.actors, r#"["carol","bob"]"#);

    let listed = db.list_notifications(alice, 10, None).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].kind, "follow");
    assert_eq!(listed[1].id, second.id);
}

#[tokio::test]
async fn test_read_notifications_start_a_new_group() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;

    let first = db
        .notify(alice, "bob".to_string(), NotificationKind::Follow, None)
        .await
        .unwrap();
    db.mark_notification_as_read(alice, first.id).await.unwrap();

    let result = db.mark_notification_as_read(bob, first.id).await;
    assert!(matches!(result, Err(AppError::NotificationNotFound)));

    db.notify(alice, "carol".to_string(), NotificationKind::Follow, None)
        .await
        .unwrap();
    assert_eq!(db.list_notifications(alice, 10, None).await.unwrap().len(), 2);

    assert_eq!(db.mark_notifications_as_read(alice).await.unwrap(), 1);
    let listed = db.list_notifications(alice, 10, None).await.unwrap();
    assert!(listed.iter().all(|n| n.read));
}
