//! Summary data collection: assembles everything the summary prompt needs
//! for one broadcast.
//!
//! Flow: broadcast lookup → parse transcript → derived metrics →
//!       max viewers / friends list / instructions (each soft-failed).
//!
//! Only a missing broadcast or a transcript the parser rejects fails a call;
//! enrichment failures degrade to their defaults.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::models::broadcast::BroadcastRow;
use crate::models::summary::{SummaryInput, TopTipper};
use crate::summary::fallback::soft_fail;
use crate::summary::sources::{AudienceStats, BroadcastRepository};
use crate::transcript::{
    self, calculate_avg_watch_time, categorize_visitors, ParsedTranscript, TranscriptError,
    VisitorCategories,
};

/// Broadcast id used for data collected from pasted text with no broadcast row.
pub const PREVIEW_BROADCAST_ID: &str = "preview";
/// Assumed duration for preview token-rate estimates.
pub const PREVIEW_DURATION_MINUTES: i64 = 60;
/// Visitors staying at least this long count as "stayed", shorter as "quick".
pub const STAYED_THRESHOLD_MINUTES: i64 = 1;
const TOP_TIPPER_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("broadcast {0} not found")]
    BroadcastNotFound(String),

    #[error("transcript could not be parsed: {0}")]
    Transcript(#[from] TranscriptError),

    #[error("broadcast lookup failed: {0}")]
    Lookup(#[from] anyhow::Error),
}

/// Construction-time settings for the collector.
#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub instructions_path: PathBuf,
    pub broadcaster: String,
}

/// Everything collected for one summary. Transient; never stored as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryData {
    pub broadcast_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_minutes: i64,
    pub parsed: ParsedTranscript,
    pub visitor_categories: VisitorCategories,
    pub tokens_received: i64,
    /// Rounded to 2 decimals; an estimate in preview mode.
    pub tokens_per_hour: f64,
    pub unique_viewers: i64,
    pub avg_watch_time_seconds: f64,
    pub new_followers: i64,
    pub lost_followers: i64,
    pub net_followers: i64,
    pub max_viewers: i64,
    pub friends_list: Vec<String>,
    pub top_tippers: Vec<TopTipper>,
    pub room_subject_variants: Vec<String>,
    pub instructions: String,
}

impl SummaryData {
    /// Metric snapshot for persistence. Narrative fields are left empty.
    pub fn to_summary_input(&self) -> SummaryInput {
        SummaryInput {
            tokens_received: self.tokens_received,
            tokens_per_hour: Some(self.tokens_per_hour),
            max_viewers: Some(self.max_viewers),
            unique_viewers: Some(self.unique_viewers),
            avg_watch_time_seconds: Some(self.avg_watch_time_seconds),
            new_followers: self.new_followers,
            lost_followers: self.lost_followers,
            net_followers: self.net_followers,
            room_subject_variants: self.room_subject_variants.clone(),
            visitors_stayed: self.visitor_categories.stayed.clone(),
            visitors_quick: self.visitor_categories.quick.clone(),
            visitors_banned: self.visitor_categories.banned.clone(),
            top_tippers: self.top_tippers.clone(),
            ..Default::default()
        }
    }
}

pub struct SummaryDataCollector {
    broadcasts: Arc<dyn BroadcastRepository>,
    stats: Arc<dyn AudienceStats>,
    settings: CollectorSettings,
}

impl SummaryDataCollector {
    pub fn new(
        broadcasts: Arc<dyn BroadcastRepository>,
        stats: Arc<dyn AudienceStats>,
        settings: CollectorSettings,
    ) -> Self {
        Self {
            broadcasts,
            stats,
            settings,
        }
    }

    pub async fn collect(
        &self,
        broadcast_id: &str,
        transcript: &str,
    ) -> Result<SummaryData, CollectError> {
        let broadcast = self
            .broadcasts
            .get_by_id(broadcast_id)
            .await?
            .ok_or_else(|| CollectError::BroadcastNotFound(broadcast_id.to_string()))?;

        let parsed = transcript::parse(transcript)?;
        let duration_minutes = resolve_duration_minutes(&broadcast);
        let max_viewers = self.resolve_max_viewers(&broadcast).await;
        let friends_list = self.load_friends_list().await;
        let instructions = self.load_instructions().await;

        info!(
            "Collected summary data for broadcast {broadcast_id}: {} tokens over {duration_minutes} min",
            parsed.total_tokens
        );

        Ok(assemble(
            broadcast_id.to_string(),
            broadcast.started_at,
            broadcast.ended_at,
            duration_minutes,
            parsed,
            max_viewers,
            friends_list,
            instructions,
        ))
    }

    /// Collects from pasted text without a broadcast row. Duration is assumed
    /// and max viewers cannot be known.
    pub async fn collect_for_preview(&self, transcript: &str) -> Result<SummaryData, CollectError> {
        let parsed = transcript::parse(transcript)?;
        let friends_list = self.load_friends_list().await;
        let instructions = self.load_instructions().await;
        let now = Utc::now();

        Ok(assemble(
            PREVIEW_BROADCAST_ID.to_string(),
            now,
            Some(now),
            PREVIEW_DURATION_MINUTES,
            parsed,
            0,
            friends_list,
            instructions,
        ))
    }

    async fn resolve_max_viewers(&self, broadcast: &BroadcastRow) -> i64 {
        let cached = broadcast.peak_viewers.unwrap_or(0);
        let Some(ended_at) = broadcast.ended_at else {
            return cached;
        };

        soft_fail("max viewers query", cached, async {
            let max = self
                .stats
                .max_viewers(&self.settings.broadcaster, broadcast.started_at, ended_at)
                .await?;
            Ok::<_, anyhow::Error>(max.unwrap_or(cached))
        })
        .await
    }

    async fn load_friends_list(&self) -> Vec<String> {
        soft_fail("friends list query", Vec::new(), self.stats.friends_list()).await
    }

    async fn load_instructions(&self) -> String {
        let path = &self.settings.instructions_path;
        soft_fail(
            &format!("instructions read from {}", path.display()),
            String::new(),
            tokio::fs::read_to_string(path),
        )
        .await
    }
}

#[allow(clippy::too_many_arguments)]
fn assemble(
    broadcast_id: String,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    duration_minutes: i64,
    parsed: ParsedTranscript,
    max_viewers: i64,
    friends_list: Vec<String>,
    instructions: String,
) -> SummaryData {
    let visitor_categories =
        categorize_visitors(&parsed.visitors, &parsed.banned, STAYED_THRESHOLD_MINUTES);
    let new_followers = parsed.follows.len() as i64;
    let lost_followers = parsed.unfollows.len() as i64;

    SummaryData {
        broadcast_id,
        started_at,
        ended_at,
        duration_minutes,
        visitor_categories,
        tokens_received: parsed.total_tokens,
        tokens_per_hour: tokens_per_hour(parsed.total_tokens, duration_minutes),
        unique_viewers: parsed.unique_usernames.len() as i64,
        avg_watch_time_seconds: calculate_avg_watch_time(&parsed.visitors),
        new_followers,
        lost_followers,
        net_followers: new_followers - lost_followers,
        max_viewers,
        friends_list,
        top_tippers: parsed.top_tippers(TOP_TIPPER_LIMIT),
        room_subject_variants: parsed.room_subjects.clone(),
        instructions,
        parsed,
    }
}

/// Stored duration if present, else whole minutes between start and end, else 0.
fn resolve_duration_minutes(broadcast: &BroadcastRow) -> i64 {
    if let Some(minutes) = broadcast.duration_minutes {
        return minutes.max(0);
    }
    broadcast
        .ended_at
        .map(|ended| (ended - broadcast.started_at).num_minutes().max(0))
        .unwrap_or(0)
}

fn tokens_per_hour(tokens: i64, duration_minutes: i64) -> f64 {
    if duration_minutes <= 0 {
        return 0.0;
    }
    round2(tokens as f64 / duration_minutes as f64 * 60.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
