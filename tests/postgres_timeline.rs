//! Durable backend tests. `sqlx::test` provisions a fresh database per test from the
//! server named by `DATABASE_URL`, so that variable must be set:
//!
//! ```text
//! DATABASE_URL=postgres://postgres@localhost/postgres cargo test
//! ```

use std::sync::Arc;

use murmur::application::follow::FollowService;
use murmur::application::publish::PublishService;
use murmur::application::repos::{BACKFILL_LIMIT, RepoError, TimelineStore};
use murmur::application::timeline::TimelineService;
use murmur::domain::entities::Post;
use murmur::infra::db::PostgresRepositories;
use sqlx::PgPool;

fn services(
    pool: PgPool,
) -> (
    Arc<PostgresRepositories>,
    PublishService,
    FollowService,
    TimelineService,
) {
    let repos = Arc::new(PostgresRepositories::new(pool));
    (
        repos.clone(),
        PublishService::new(repos.clone()),
        FollowService::new(repos.clone()),
        TimelineService::new(repos),
    )
}

fn texts(posts: Vec<Post>) -> Vec<String> {
    posts.into_iter().map(|post| post.text).collect()
}

#[sqlx::test(migrations = "./migrations")]
async fn backfill_orders_newest_first(pool: PgPool) {
    let (_, publish, follow, timeline) = services(pool);

    for text in ["a", "b", "c"] {
        publish.publish_post("b1", text).await.expect("publish");
    }
    follow.follow_user("a1", "b1").await.expect("follow");

    let feed = timeline.get_feed("a1").await.expect("feed");
    assert_eq!(texts(feed), ["c", "b", "a"]);
}

#[sqlx::test(migrations = "./migrations")]
async fn fan_out_reaches_followers_and_author(pool: PgPool) {
    let (_, publish, follow, timeline) = services(pool);

    follow.follow_user("a1", "b1").await.expect("follow a1");
    follow.follow_user("c1", "b1").await.expect("follow c1");
    let post = publish.publish_post("b1", "hello").await.expect("publish");

    for owner in ["a1", "b1", "c1"] {
        let feed = timeline.get_feed(owner).await.expect("feed");
        assert_eq!(feed.len(), 1, "feed of {owner}");
        assert_eq!(feed[0], post);
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn backfill_is_bounded(pool: PgPool) {
    let (_, publish, follow, timeline) = services(pool);

    for i in 0..(BACKFILL_LIMIT + 5) {
        publish
            .publish_post("b1", &format!("post-{i}"))
            .await
            .expect("publish");
    }
    follow.follow_user("a1", "b1").await.expect("follow");

    let feed = timeline.get_feed_page("a1", 500).await.expect("feed");
    assert_eq!(feed.len(), BACKFILL_LIMIT);
    assert_eq!(feed[0].text, format!("post-{}", BACKFILL_LIMIT + 4));
}

#[sqlx::test(migrations = "./migrations")]
async fn repeated_follow_keeps_one_edge(pool: PgPool) {
    let (repos, publish, follow, timeline) = services(pool);

    publish.publish_post("b1", "once").await.expect("publish");
    follow.follow_user("a1", "b1").await.expect("first follow");
    follow.follow_user("a1", "b1").await.expect("second follow");

    let edges: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM followers")
        .fetch_one(repos.pool())
        .await
        .expect("count edges");
    assert_eq!(edges, 1);
    assert_eq!(texts(timeline.get_feed("a1").await.expect("feed")), ["once"]);
}

#[sqlx::test(migrations = "./migrations")]
async fn limit_returns_newest(pool: PgPool) {
    let (_, publish, follow, timeline) = services(pool);

    follow.follow_user("a1", "b1").await.expect("follow");
    for text in ["P1", "P2", "P3"] {
        publish.publish_post("b1", text).await.expect("publish");
    }

    let feed = timeline.get_feed_page("a1", 2).await.expect("feed");
    assert_eq!(texts(feed), ["P3", "P2"]);
}

#[sqlx::test(migrations = "./migrations")]
async fn rejected_writes_persist_nothing(pool: PgPool) {
    let (repos, publish, follow, _) = services(pool);

    assert!(publish.publish_post("b1", &"x".repeat(281)).await.is_err());
    assert!(follow.follow_user("a1", "a1").await.is_err());

    let posts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
        .fetch_one(repos.pool())
        .await
        .expect("count posts");
    let edges: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM followers")
        .fetch_one(repos.pool())
        .await
        .expect("count edges");
    assert_eq!((posts, edges), (0, 0));
}

#[sqlx::test(migrations = "./migrations")]
async fn duplicate_post_id_is_rejected(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let post = Post::new("b1", "hello").expect("valid post");

    repos.publish(&post).await.expect("first publish");
    let err = repos.publish(&post).await.expect_err("duplicate id");
    assert!(matches!(err, RepoError::Duplicate { .. }));
}

#[sqlx::test(migrations = "./migrations")]
async fn fan_out_failure_keeps_the_post(pool: PgPool) {
    sqlx::query(
        r#"
        CREATE FUNCTION reject_broken_owner() RETURNS trigger AS $$
        BEGIN
            IF NEW.owner_id = 'broken' THEN
                RAISE EXCEPTION 'feed for % is unavailable', NEW.owner_id;
            END IF;
            RETURN NEW;
        END;
        $$ LANGUAGE plpgsql
        "#,
    )
    .execute(&pool)
    .await
    .expect("create trigger function");
    sqlx::query(
        r#"
        CREATE TRIGGER reject_broken_owner
        BEFORE INSERT ON feed_entries
        FOR EACH ROW EXECUTE FUNCTION reject_broken_owner()
        "#,
    )
    .execute(&pool)
    .await
    .expect("create trigger");

    let (_, publish, follow, timeline) = services(pool);
    follow.follow_user("a1", "b1").await.expect("follow a1");
    follow.follow_user("broken", "b1").await.expect("follow broken");

    let post = publish
        .publish_post("b1", "survives")
        .await
        .expect("publish succeeds despite fan-out failure");

    let own = timeline.get_feed("b1").await.expect("author feed");
    assert_eq!(own, [post]);
    // The batch insert is all-or-nothing, so healthy followers miss the post too.
    assert!(timeline.get_feed("a1").await.expect("follower feed").is_empty());
}
