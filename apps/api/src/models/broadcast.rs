use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Timing metadata for a single broadcast, as recorded by the scraper.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BroadcastRow {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    /// Peak viewer count cached on the broadcast when it was last scraped.
    pub peak_viewers: Option<i64>,
}
