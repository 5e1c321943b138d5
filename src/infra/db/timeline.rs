use async_trait::async_trait;
use metrics::{counter, histogram};
use sqlx::{Connection, FromRow, PgConnection};
use time::OffsetDateTime;
use tracing::{debug, error};
use uuid::Uuid;

use crate::application::repos::{BACKFILL_LIMIT, RepoError, TimelineStore};
use crate::domain::entities::Post;

use super::PostgresRepositories;
use super::util::map_sqlx_error;

pub(crate) const METRIC_FANOUT_FAILED: &str = "murmur_fanout_failed_total";
pub(crate) const METRIC_FANOUT_TARGETS: &str = "murmur_fanout_targets";

#[derive(Debug, FromRow)]
struct PostRow {
    id: Uuid,
    author_id: String,
    body: String,
    created_at: OffsetDateTime,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            author_id: row.author_id,
            text: row.body,
            created_at: row.created_at,
        }
    }
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

async fn ensure_users(conn: &mut PgConnection, ids: &[&str]) -> Result<(), sqlx::Error> {
    let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    sqlx::query(
        r#"
        INSERT INTO users (id)
        SELECT id FROM UNNEST($1::text[]) AS t(id)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(&ids)
    .execute(conn)
    .await
    .map(|_| ())
}

async fn insert_follower_entries(conn: &mut PgConnection, post: &Post) -> Result<usize, sqlx::Error> {
    let followers: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT follower_id
        FROM followers
        WHERE followee_id = $1
        "#,
    )
    .bind(&post.author_id)
    .fetch_all(&mut *conn)
    .await?;

    if followers.is_empty() {
        return Ok(0);
    }

    sqlx::query(
        r#"
        INSERT INTO feed_entries (owner_id, post_id, post_created_at)
        SELECT owner_id, $2, $3
        FROM UNNEST($1::text[]) AS t(owner_id)
        ON CONFLICT (owner_id, post_id) DO NOTHING
        "#,
    )
    .bind(&followers)
    .bind(post.id)
    .bind(post.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(followers.len())
}

/// Fan a post out to the author's followers inside a savepoint of the publish
/// transaction. A failure rolls back only the savepoint, leaving the post in place.
async fn fan_out_to_followers(conn: &mut PgConnection, post: &Post) -> Result<usize, sqlx::Error> {
    let mut savepoint = conn.begin().await?;
    match insert_follower_entries(&mut savepoint, post).await {
        Ok(count) => {
            savepoint.commit().await?;
            Ok(count)
        }
        Err(err) => {
            savepoint.rollback().await?;
            Err(err)
        }
    }
}

#[async_trait]
impl TimelineStore for PostgresRepositories {
    async fn follow(&self, follower_id: &str, followee_id: &str) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        ensure_users(&mut tx, &[follower_id, followee_id])
            .await
            .map_err(map_sqlx_error)?;

        let edge = sqlx::query(
            r#"
            INSERT INTO followers (followee_id, follower_id)
            VALUES ($1, $2)
            ON CONFLICT (followee_id, follower_id) DO NOTHING
            "#,
        )
        .bind(followee_id)
        .bind(follower_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let backfill = sqlx::query(
            r#"
            INSERT INTO feed_entries (owner_id, post_id, post_created_at)
            SELECT $1, p.id, p.created_at
            FROM posts p
            WHERE p.author_id = $2
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT $3
            ON CONFLICT (owner_id, post_id) DO NOTHING
            "#,
        )
        .bind(follower_id)
        .bind(followee_id)
        .bind(sql_limit(BACKFILL_LIMIT))
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        debug!(
            follower_id,
            followee_id,
            new_edge = edge.rows_affected() > 0,
            backfilled = backfill.rows_affected(),
            "Follow committed"
        );
        Ok(())
    }

    async fn get_followers(&self, user_id: &str) -> Result<Vec<String>, RepoError> {
        sqlx::query_scalar(
            r#"
            SELECT follower_id
            FROM followers
            WHERE followee_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn publish(&self, post: &Post) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        ensure_users(&mut tx, &[post.author_id.as_str()])
            .await
            .map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            INSERT INTO posts (id, author_id, body, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(post.id)
        .bind(&post.author_id)
        .bind(&post.text)
        .bind(post.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            INSERT INTO feed_entries (owner_id, post_id, post_created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (owner_id, post_id) DO NOTHING
            "#,
        )
        .bind(&post.author_id)
        .bind(post.id)
        .bind(post.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        match fan_out_to_followers(&mut tx, post).await {
            Ok(followers) => {
                histogram!(METRIC_FANOUT_TARGETS).record((followers + 1) as f64);
                debug!(post_id = %post.id, followers, "Fan-out staged");
            }
            Err(err) => {
                counter!(METRIC_FANOUT_FAILED).increment(1);
                error!(
                    post_id = %post.id,
                    author_id = %post.author_id,
                    error = %err,
                    "Fan-out to followers failed; keeping the post"
                );
            }
        }

        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn get_feed(&self, user_id: &str, limit: usize) -> Result<Vec<Post>, RepoError> {
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT p.id, p.author_id, p.body, p.created_at
            FROM feed_entries f
            INNER JOIN posts p ON p.id = f.post_id
            WHERE f.owner_id = $1
            ORDER BY f.post_created_at DESC, f.post_id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(sql_limit(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Post::from).collect())
    }
}
