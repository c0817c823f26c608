//! Summary generation: runs collected data through the LLM and persists the result.
//!
//! Flow: collect → build prompt → LLM (JSON) → merge with metric snapshot →
//!       save_summary → archive markdown.

use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use tracing::info;

use crate::errors::AppError;
use crate::llm_client::{LlmClient, MODEL};
use crate::models::summary::{BroadcastSummary, SummaryInput};
use crate::storage::{archive_summary, SummaryArchive};
use crate::summary::collector::{SummaryData, SummaryDataCollector};
use crate::summary::prompts::{DEFAULT_INSTRUCTIONS, SUMMARY_PROMPT_TEMPLATE, SUMMARY_SYSTEM};
use crate::summary::store::save_summary;

/// Narrative fields returned by the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratedNarrative {
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

impl GeneratedNarrative {
    fn apply_to(self, input: &mut SummaryInput) {
        input.theme = self.theme;
        input.overall_vibe = self.overall_vibe;
        input.engagement_summary = self.engagement_summary;
        input.tracking_notes = self.tracking_notes;
        input.private_dynamics = self.private_dynamics;
        input.opportunities = self.opportunities;
        input.chat_highlights = self.chat_highlights;
        input.themes_moments = self.themes_moments;
        input.overall_summary = self.overall_summary;
        input.full_markdown = self.full_markdown;
    }
}

/// Generates and stores the summary for a real broadcast, replacing any previous one.
pub async fn generate_summary(
    collector: &SummaryDataCollector,
    pool: &PgPool,
    llm: &LlmClient,
    archive: &dyn SummaryArchive,
    broadcast_id: &str,
    transcript: &str,
) -> Result<BroadcastSummary, AppError> {
    let data = collector.collect(broadcast_id, transcript).await?;
    let (narrative, tokens_used) = run_generation(llm, &data, transcript).await?;

    let input = build_summary_input(&data, narrative, transcript, tokens_used);
    let summary = save_summary(pool, broadcast_id, &input).await?;
    archive_summary(archive, &summary).await;

    info!("Generated summary for broadcast {broadcast_id} ({tokens_used} tokens)");
    Ok(summary)
}

/// Generates a narrative for pasted text. Nothing is persisted.
pub async fn preview_summary(
    collector: &SummaryDataCollector,
    llm: &LlmClient,
    transcript: &str,
) -> Result<GeneratedNarrative, AppError> {
    let data = collector.collect_for_preview(transcript).await?;
    let (narrative, _) = run_generation(llm, &data, transcript).await?;
    Ok(narrative)
}

async fn run_generation(
    llm: &LlmClient,
    data: &SummaryData,
    transcript: &str,
) -> Result<(GeneratedNarrative, i64), AppError> {
    let prompt = build_prompt(data, transcript);
    let (narrative, usage) = llm
        .call_json_with_usage::<GeneratedNarrative>(&prompt, SUMMARY_SYSTEM)
        .await
        .map_err(|e| AppError::Llm(format!("Summary generation failed: {e}")))?;
    Ok((narrative, i64::from(usage.total())))
}

fn build_summary_input(
    data: &SummaryData,
    narrative: GeneratedNarrative,
    transcript: &str,
    tokens_used: i64,
) -> SummaryInput {
    let mut input = data.to_summary_input();
    narrative.apply_to(&mut input);
    input.transcript_text = Some(transcript.to_string());
    input.ai_model = Some(MODEL.to_string());
    input.generation_tokens_used = Some(tokens_used);
    input
}

fn build_prompt(data: &SummaryData, transcript: &str) -> String {
    let instructions = if data.instructions.trim().is_empty() {
        DEFAULT_INSTRUCTIONS
    } else {
        data.instructions.as_str()
    };

    // The parsed event lists are already reflected in the transcript itself.
    let collected = json!({
        "broadcast_id": data.broadcast_id,
        "started_at": data.started_at,
        "ended_at": data.ended_at,
        "duration_minutes": data.duration_minutes,
        "tokens_received": data.tokens_received,
        "tokens_per_hour": data.tokens_per_hour,
        "unique_viewers": data.unique_viewers,
        "max_viewers": data.max_viewers,
        "avg_watch_time_seconds": data.avg_watch_time_seconds,
        "new_followers": data.new_followers,
        "lost_followers": data.lost_followers,
        "net_followers": data.net_followers,
        "room_subject_variants": data.room_subject_variants,
        "top_tippers": data.top_tippers,
        "visitors": data.visitor_categories,
        "friends": data.friends_list,
    });
    let collected = serde_json::to_string_pretty(&collected).unwrap_or_default();

    fill_template(
        SUMMARY_PROMPT_TEMPLATE,
        &[
            ("{instructions}", instructions),
            ("{data}", &collected),
            ("{transcript}", transcript),
        ],
    )
}

/// Substitutes placeholders in a single pass over `template`; inserted values
/// are never scanned for placeholders themselves.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match values.iter().find(|(key, _)| tail.starts_with(key)) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
