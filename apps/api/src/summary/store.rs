//! Persistence for `broadcast_summaries`. One row per broadcast id; saves are
//! full upserts, narrative fields can be patched afterwards.

use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;

use crate::models::summary::{BroadcastSummary, BroadcastSummaryRow, SummaryInput, SummaryUpdate};

/// Inserts or fully replaces the summary for `broadcast_id`.
/// Concurrent saves for the same id resolve last-write-wins.
pub async fn save_summary(
    pool: &PgPool,
    broadcast_id: &str,
    input: &SummaryInput,
) -> Result<BroadcastSummary, sqlx::Error> {
    let row = sqlx::query_as::<_, BroadcastSummaryRow>(
        r#"
        INSERT INTO broadcast_summaries
            (broadcast_id, theme, tokens_received, tokens_per_hour, max_viewers,
             unique_viewers, avg_watch_time_seconds, new_followers, lost_followers,
             net_followers, room_subject_variants, visitors_stayed, visitors_quick,
             visitors_banned, top_tippers, top_lovers_board, overall_vibe,
             engagement_summary, tracking_notes, private_dynamics, opportunities,
             chat_highlights, themes_moments, overall_summary, full_markdown,
             transcript_text, ai_model, generation_tokens_used, generated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, NOW())
        ON CONFLICT (broadcast_id) DO UPDATE SET
            theme = EXCLUDED.theme,
            tokens_received = EXCLUDED.tokens_received,
            tokens_per_hour = EXCLUDED.tokens_per_hour,
            max_viewers = EXCLUDED.max_viewers,
            unique_viewers = EXCLUDED.unique_viewers,
            avg_watch_time_seconds = EXCLUDED.avg_watch_time_seconds,
            new_followers = EXCLUDED.new_followers,
            lost_followers = EXCLUDED.lost_followers,
            net_followers = EXCLUDED.net_followers,
            room_subject_variants = EXCLUDED.room_subject_variants,
            visitors_stayed = EXCLUDED.visitors_stayed,
            visitors_quick = EXCLUDED.visitors_quick,
            visitors_banned = EXCLUDED.visitors_banned,
            top_tippers = EXCLUDED.top_tippers,
            top_lovers_board = EXCLUDED.top_lovers_board,
            overall_vibe = EXCLUDED.overall_vibe,
            engagement_summary = EXCLUDED.engagement_summary,
            tracking_notes = EXCLUDED.tracking_notes,
            private_dynamics = EXCLUDED.private_dynamics,
            opportunities = EXCLUDED.opportunities,
            chat_highlights = EXCLUDED.chat_highlights,
            themes_moments = EXCLUDED.themes_moments,
            overall_summary = EXCLUDED.overall_summary,
            full_markdown = EXCLUDED.full_markdown,
            transcript_text = EXCLUDED.transcript_text,
            ai_model = EXCLUDED.ai_model,
            generation_tokens_used = EXCLUDED.generation_tokens_used,
            generated_at = NOW(),
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(broadcast_id)
    .bind(&input.theme)
    .bind(input.tokens_received)
    .bind(input.tokens_per_hour)
    .bind(input.max_viewers)
    .bind(input.unique_viewers)
    .bind(input.avg_watch_time_seconds)
    .bind(input.new_followers)
    .bind(input.lost_followers)
    .bind(input.net_followers)
    .bind(input.room_subject_variants.as_slice())
    .bind(input.visitors_stayed.as_slice())
    .bind(input.visitors_quick.as_slice())
    .bind(input.visitors_banned.as_slice())
    .bind(Json(&input.top_tippers))
    .bind(Json(&input.top_lovers_board))
    .bind(&input.overall_vibe)
    .bind(&input.engagement_summary)
    .bind(&input.tracking_notes)
    .bind(&input.private_dynamics)
    .bind(&input.opportunities)
    .bind(&input.chat_highlights)
    .bind(&input.themes_moments)
    .bind(&input.overall_summary)
    .bind(&input.full_markdown)
    .bind(&input.transcript_text)
    .bind(&input.ai_model)
    .bind(input.generation_tokens_used)
    .fetch_one(pool)
    .await?;

    info!("Saved summary for broadcast {broadcast_id}");
    Ok(row.into())
}

pub async fn get_summary_by_broadcast_id(
    pool: &PgPool,
    broadcast_id: &str,
) -> Result<Option<BroadcastSummary>, sqlx::Error> {
    let row = sqlx::query_as::<_, BroadcastSummaryRow>(
        "SELECT * FROM broadcast_summaries WHERE broadcast_id = $1",
    )
    .bind(broadcast_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Into::into))
}

/// Writes only the narrative fields present in `updates`.
/// With nothing to write this is a plain lookup and `updated_at` is untouched.
pub async fn update_summary(
    pool: &PgPool,
    broadcast_id: &str,
    updates: &SummaryUpdate,
) -> Result<Option<BroadcastSummary>, sqlx::Error> {
    let Some(mut query) = build_update_query(broadcast_id, updates) else {
        return get_summary_by_broadcast_id(pool, broadcast_id).await;
    };

    let row = query
        .build_query_as::<BroadcastSummaryRow>()
        .fetch_optional(pool)
        .await?;

    if row.is_some() {
        info!("Updated summary fields for broadcast {broadcast_id}");
    }
    Ok(row.map(Into::into))
}

/// Returns whether a row was actually removed.
pub async fn delete_summary(pool: &PgPool, broadcast_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM broadcast_summaries WHERE broadcast_id = $1")
        .bind(broadcast_id)
        .execute(pool)
        .await?;

    let deleted = result.rows_affected() > 0;
    if deleted {
        info!("Deleted summary for broadcast {broadcast_id}");
    }
    Ok(deleted)
}

fn build_update_query<'a>(
    broadcast_id: &'a str,
    updates: &'a SummaryUpdate,
) -> Option<QueryBuilder<'a, Postgres>> {
    let assignments = updates.assignments();
    if assignments.is_empty() {
        return None;
    }

    let mut qb = QueryBuilder::new("UPDATE broadcast_summaries SET ");
    {
        let mut set = qb.separated(", ");
        for (column, value) in assignments {
            set.push(format!("{column} = "));
            set.push_bind_unseparated(value);
        }
        set.push("updated_at = NOW()");
    }
    qb.push(" WHERE broadcast_id = ");
    qb.push_bind(broadcast_id);
    qb.push(" RETURNING *");
    Some(qb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::summary::TopTipper;

    #[test]
    fn test_update_query_none_without_allowed_fields() {
        let updates: SummaryUpdate = serde_json::from_str(r#"{"foo": "bar"}"#).unwrap();
        assert!(build_update_query("b-1", &updates).is_none());
        assert!(build_update_query("b-1", &SummaryUpdate::default()).is_none());
    }

    #[test]
    fn test_update_query_sets_only_present_fields() {
        let updates = SummaryUpdate {
            theme: Some("Pajama party".to_string()),
            full_markdown: Some("# Recap".to_string()),
            ..Default::default()
        };
        let qb = build_update_query("b-1", &updates).unwrap();
        assert_eq!(
            qb.sql(),
            "UPDATE broadcast_summaries SET theme = $1, full_markdown = $2, \
             updated_at = NOW() WHERE broadcast_id = $3 RETURNING *"
        );
    }

    #[test]
    fn test_update_query_single_field() {
        let updates = SummaryUpdate {
            tracking_notes: Some("watch for regulars".to_string()),
            ..Default::default()
        };
        let qb = build_update_query("b-1", &updates).unwrap();
        assert!(qb.sql().starts_with("UPDATE broadcast_summaries SET tracking_notes = $1, "));
        assert!(!qb.sql().contains("theme"));
    }

    fn sample_input(theme: &str) -> SummaryInput {
        SummaryInput {
            theme: Some(theme.to_string()),
            tokens_received: 35,
            tokens_per_hour: Some(17.5),
            max_viewers: Some(42),
            net_followers: 1,
            new_followers: 2,
            lost_followers: 1,
            visitors_stayed: vec!["alice".to_string()],
            top_tippers: vec![TopTipper {
                username: "carol".to_string(),
                tokens: 20,
            }],
            overall_summary: Some("A relaxed evening.".to_string()),
            ..Default::default()
        }
    }

    async fn row_count(pool: &PgPool, broadcast_id: &str) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM broadcast_summaries WHERE broadcast_id = $1")
            .bind(broadcast_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_save_twice_keeps_one_row_with_latest_content(pool: PgPool) {
        let first = save_summary(&pool, "b-1", &sample_input("First pass"))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let second = save_summary(&pool, "b-1", &sample_input("Second pass"))
            .await
            .unwrap();

        assert_eq!(row_count(&pool, "b-1").await, 1);
        assert_eq!(second.id, first.id);
        assert_eq!(second.theme.as_deref(), Some("Second pass"));
        assert!(second.generated_at > first.generated_at);
        assert_eq!(second.top_tippers, sample_input("x").top_tippers);
        assert_eq!(second.visitors_stayed, vec!["alice"]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_save_overwrites_fields_missing_from_second_input(pool: PgPool) {
        save_summary(&pool, "b-1", &sample_input("Full")).await.unwrap();
        let replaced = save_summary(&pool, "b-1", &SummaryInput::default())
            .await
            .unwrap();

        assert!(replaced.theme.is_none());
        assert!(replaced.top_tippers.is_empty());
        assert_eq!(replaced.tokens_received, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_get_missing_summary_is_none(pool: PgPool) {
        assert!(get_summary_by_broadcast_id(&pool, "nope")
            .await
            .unwrap()
            .is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_update_without_allowed_fields_is_plain_lookup(pool: PgPool) {
        save_summary(&pool, "b-1", &sample_input("Cozy")).await.unwrap();
        let before = get_summary_by_broadcast_id(&pool, "b-1").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let empty = update_summary(&pool, "b-1", &SummaryUpdate::default())
            .await
            .unwrap();
        let unknown: SummaryUpdate = serde_json::from_str(r#"{"foo": "bar"}"#).unwrap();
        let ignored = update_summary(&pool, "b-1", &unknown).await.unwrap();

        assert_eq!(empty, before);
        assert_eq!(ignored, before);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_update_writes_only_supplied_fields(pool: PgPool) {
        let saved = save_summary(&pool, "b-1", &sample_input("Cozy")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let updates = SummaryUpdate {
            tracking_notes: Some("carol is a new regular".to_string()),
            ..Default::default()
        };
        let updated = update_summary(&pool, "b-1", &updates)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.tracking_notes.as_deref(), Some("carol is a new regular"));
        assert_eq!(updated.theme, saved.theme);
        assert_eq!(updated.overall_summary, saved.overall_summary);
        assert_eq!(updated.max_viewers, saved.max_viewers);
        assert_eq!(updated.generated_at, saved.generated_at);
        assert!(updated.updated_at > saved.updated_at);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_update_missing_summary_is_none(pool: PgPool) {
        let updates = SummaryUpdate {
            theme: Some("Ghost".to_string()),
            ..Default::default()
        };
        assert!(update_summary(&pool, "nope", &updates).await.unwrap().is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_delete_reports_existing_row_once(pool: PgPool) {
        save_summary(&pool, "b-1", &sample_input("Cozy")).await.unwrap();

        assert!(delete_summary(&pool, "b-1").await.unwrap());
        assert!(!delete_summary(&pool, "b-1").await.unwrap());
        assert!(get_summary_by_broadcast_id(&pool, "b-1")
            .await
            .unwrap()
            .is_none());
    }
}
