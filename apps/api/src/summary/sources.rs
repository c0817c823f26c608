//! Read-only collaborators of the collector, behind traits so the collector
//! can be exercised without a database.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::broadcast::BroadcastRow;

#[async_trait]
pub trait BroadcastRepository: Send + Sync {
    async fn get_by_id(&self, id: &str) -> Result<Option<BroadcastRow>>;
}

/// Aggregate audience queries used to enrich summary data.
#[async_trait]
pub trait AudienceStats: Send + Sync {
    /// Highest concurrent viewer sample for `broadcaster` within `[from, to]`.
    /// `None` when no samples were recorded in the window.
    async fn max_viewers(
        &self,
        broadcaster: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<i64>>;

    /// Usernames carrying a friend tier, best tier first.
    async fn friends_list(&self) -> Result<Vec<String>>;
}

pub struct PgBroadcastRepository {
    pool: PgPool,
}

impl PgBroadcastRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BroadcastRepository for PgBroadcastRepository {
    async fn get_by_id(&self, id: &str) -> Result<Option<BroadcastRow>> {
        Ok(sqlx::query_as::<_, BroadcastRow>(
            r#"
            SELECT id::TEXT AS id,
                   started_at,
                   ended_at,
                   duration_minutes::BIGINT AS duration_minutes,
                   peak_viewers::BIGINT AS peak_viewers
            FROM broadcasts
            WHERE id::TEXT = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }
}

pub struct PgAudienceStats {
    pool: PgPool,
}

impl PgAudienceStats {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AudienceStats for PgAudienceStats {
    async fn max_viewers(
        &self,
        broadcaster: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<i64>> {
        Ok(sqlx::query_scalar::<_, Option<i64>>(
            r#"
            SELECT MAX(viewer_count)::BIGINT
            FROM viewer_snapshots
            WHERE username = $1
              AND recorded_at BETWEEN $2 AND $3
            "#,
        )
        .bind(broadcaster)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn friends_list(&self) -> Result<Vec<String>> {
        Ok(sqlx::query_scalar::<_, String>(
            r#"
            SELECT username
            FROM profiles
            WHERE friend_tier IS NOT NULL
            ORDER BY friend_tier ASC, username ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?)
    }
}
