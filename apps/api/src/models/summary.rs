use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopTipper {
    pub username: String,
    pub tokens: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoverRank {
    pub rank: i32,
    pub username: String,
    pub tokens: i64,
}

/// Raw `broadcast_summaries` row. JSONB columns stay wrapped in `Json`;
/// convert into `BroadcastSummary` before handing it out.
#[derive(Debug, FromRow)]
pub struct BroadcastSummaryRow {
    pub id: Uuid,
    pub broadcast_id: String,
    pub theme: Option<String>,
    pub tokens_received: i64,
    pub tokens_per_hour: Option<f64>,
    pub max_viewers: Option<i64>,
    pub unique_viewers: Option<i64>,
    pub avg_watch_time_seconds: Option<f64>,
    pub new_followers: i64,
    pub lost_followers: i64,
    pub net_followers: i64,
    pub room_subject_variants: Vec<String>,
    pub visitors_stayed: Vec<String>,
    pub visitors_quick: Vec<String>,
    pub visitors_banned: Vec<String>,
    pub top_tippers: Json<Vec<TopTipper>>,
    pub top_lovers_board: Json<Vec<LoverRank>>,
    pub overall_vibe: Option<String>,
    pub engagement_summary: Option<String>,
    pub tracking_notes: Option<String>,
    pub private_dynamics: Option<String>,
    pub opportunities: Option<String>,
    pub chat_highlights: Option<String>,
    pub themes_moments: Option<String>,
    pub overall_summary: Option<String>,
    pub full_markdown: Option<String>,
    pub transcript_text: Option<String>,
    pub ai_model: Option<String>,
    pub generation_tokens_used: Option<i64>,
    pub generated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted broadcast summary. Metrics are a snapshot taken at generation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastSummary {
    pub id: Uuid,
    pub broadcast_id: String,
    pub theme: Option<String>,
    pub tokens_received: i64,
    pub tokens_per_hour: Option<f64>,
    pub max_viewers: Option<i64>,
    pub unique_viewers: Option<i64>,
    pub avg_watch_time_seconds: Option<f64>,
    pub new_followers: i64,
    pub lost_followers: i64,
    pub net_followers: i64,
    pub room_subject_variants: Vec<String>,
    pub visitors_stayed: Vec<String>,
    pub visitors_quick: Vec<String>,
    pub visitors_banned: Vec<String>,
    pub top_tippers: Vec<TopTipper>,
    pub top_lovers_board: Vec<LoverRank>,
    pub overall_vibe: Option<String>,
    pub engagement_summary: Option<String>,
    pub tracking_notes: Option<String>,
    pub private_dynamics: Option<String>,
    pub opportunities: Option<String>,
    pub chat_highlights: Option<String>,
    pub themes_moments: Option<String>,
    pub overall_summary: Option<String>,
    pub full_markdown: Option<String>,
    pub transcript_text: Option<String>,
    pub ai_model: Option<String>,
    pub generation_tokens_used: Option<i64>,
    pub generated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BroadcastSummaryRow> for BroadcastSummary {
    fn from(row: BroadcastSummaryRow) -> Self {
        BroadcastSummary {
            id: row.id,
            broadcast_id: row.broadcast_id,
            theme: row.theme,
            tokens_received: row.tokens_received,
            tokens_per_hour: row.tokens_per_hour,
            max_viewers: row.max_viewers,
            unique_viewers: row.unique_viewers,
            avg_watch_time_seconds: row.avg_watch_time_seconds,
            new_followers: row.new_followers,
            lost_followers: row.lost_followers,
            net_followers: row.net_followers,
            room_subject_variants: row.room_subject_variants,
            visitors_stayed: row.visitors_stayed,
            visitors_quick: row.visitors_quick,
            visitors_banned: row.visitors_banned,
            top_tippers: row.top_tippers.0,
            top_lovers_board: row.top_lovers_board.0,
            overall_vibe: row.overall_vibe,
            engagement_summary: row.engagement_summary,
            tracking_notes: row.tracking_notes,
            private_dynamics: row.private_dynamics,
            opportunities: row.opportunities,
            chat_highlights: row.chat_highlights,
            themes_moments: row.themes_moments,
            overall_summary: row.overall_summary,
            full_markdown: row.full_markdown,
            transcript_text: row.transcript_text,
            ai_model: row.ai_model,
            generation_tokens_used: row.generation_tokens_used,
            generated_at: row.generated_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Full payload for `save_summary`. Absent fields fall back to NULL, 0 or an empty list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryInput {
    pub theme: Option<String>,
    pub tokens_received: i64,
    pub tokens_per_hour: Option<f64>,
    pub max_viewers: Option<i64>,
    pub unique_viewers: Option<i64>,
    pub avg_watch_time_seconds: Option<f64>,
    pub new_followers: i64,
    pub lost_followers: i64,
    pub net_followers: i64,
    pub room_subject_variants: Vec<String>,
    pub visitors_stayed: Vec<String>,
    pub visitors_quick: Vec<String>,
    pub visitors_banned: Vec<String>,
    pub top_tippers: Vec<TopTipper>,
    pub top_lovers_board: Vec<LoverRank>,
    pub overall_vibe: Option<String>,
    pub engagement_summary: Option<String>,
    pub tracking_notes: Option<String>,
    pub private_dynamics: Option<String>,
    pub opportunities: Option<String>,
    pub chat_highlights: Option<String>,
    pub themes_moments: Option<String>,
    pub overall_summary: Option<String>,
    pub full_markdown: Option<String>,
    pub transcript_text: Option<String>,
    pub ai_model: Option<String>,
    pub generation_tokens_used: Option<i64>,
}

/// Partial update of the narrative fields. Keys outside this set are dropped
/// when the payload is deserialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryUpdate {
    pub theme: Option<String>,
    pub overall_vibe: Option<String>,
    pub engagement_summary: Option<String>,
    pub tracking_notes: Option<String>,
    pub private_dynamics: Option<String>,
    pub opportunities: Option<String>,
    pub chat_highlights: Option<String>,
    pub themes_moments: Option<String>,
    pub overall_summary: Option<String>,
    pub full_markdown: Option<String>,
}

impl SummaryUpdate {
    /// `(column, value)` pairs for every field present, in column order.
    pub fn assignments(&self) -> Vec<(&'static str, &str)> {
        [
            ("theme", &self.theme),
            ("overall_vibe", &self.overall_vibe),
            ("engagement_summary", &self.engagement_summary),
            ("tracking_notes", &self.tracking_notes),
            ("private_dynamics", &self.private_dynamics),
            ("opportunities", &self.opportunities),
            ("chat_highlights", &self.chat_highlights),
            ("themes_moments", &self.themes_moments),
            ("overall_summary", &self.overall_summary),
            ("full_markdown", &self.full_markdown),
        ]
        .into_iter()
        .filter_map(|(column, value)| value.as_deref().map(|v| (column, v)))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments().is_empty()
    }
}
