//! Axum route handlers for the Summary API.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::summary::{BroadcastSummary, SummaryInput, SummaryUpdate};
use crate::state::AppState;
use crate::storage::archive_summary;
use crate::summary::collector::SummaryData;
use crate::summary::generator::{generate_summary, preview_summary, GeneratedNarrative};
use crate::summary::store::{
    delete_summary, get_summary_by_broadcast_id, save_summary, update_summary,
};

#[derive(Debug, Deserialize)]
pub struct TranscriptRequest {
    pub transcript: String,
}

impl TranscriptRequest {
    fn validated(&self) -> Result<&str, AppError> {
        if self.transcript.trim().is_empty() {
            return Err(AppError::Validation("transcript cannot be empty".to_string()));
        }
        Ok(&self.transcript)
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

fn not_found(broadcast_id: &str) -> AppError {
    AppError::NotFound(format!("No summary for broadcast {broadcast_id}"))
}

/// POST /api/v1/broadcasts/:id/summary/data
pub async fn handle_collect(
    State(state): State<AppState>,
    Path(broadcast_id): Path<String>,
    Json(req): Json<TranscriptRequest>,
) -> Result<Json<SummaryData>, AppError> {
    let transcript = req.validated()?;
    Ok(Json(state.collector.collect(&broadcast_id, transcript).await?))
}

/// POST /api/v1/summaries/preview/data
pub async fn handle_collect_preview(
    State(state): State<AppState>,
    Json(req): Json<TranscriptRequest>,
) -> Result<Json<SummaryData>, AppError> {
    let transcript = req.validated()?;
    Ok(Json(state.collector.collect_for_preview(transcript).await?))
}

/// POST /api/v1/broadcasts/:id/summary/generate
pub async fn handle_generate(
    State(state): State<AppState>,
    Path(broadcast_id): Path<String>,
    Json(req): Json<TranscriptRequest>,
) -> Result<Json<BroadcastSummary>, AppError> {
    let transcript = req.validated()?;
    let summary = generate_summary(
        &state.collector,
        &state.db,
        &state.llm,
        state.archive.as_ref(),
        &broadcast_id,
        transcript,
    )
    .await?;
    Ok(Json(summary))
}

/// POST /api/v1/summaries/preview
pub async fn handle_preview(
    State(state): State<AppState>,
    Json(req): Json<TranscriptRequest>,
) -> Result<Json<GeneratedNarrative>, AppError> {
    let transcript = req.validated()?;
    Ok(Json(
        preview_summary(&state.collector, &state.llm, transcript).await?,
    ))
}

/// GET /api/v1/broadcasts/:id/summary
pub async fn handle_get_summary(
    State(state): State<AppState>,
    Path(broadcast_id): Path<String>,
) -> Result<Json<BroadcastSummary>, AppError> {
    get_summary_by_broadcast_id(&state.db, &broadcast_id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(&broadcast_id))
}

/// PUT /api/v1/broadcasts/:id/summary
pub async fn handle_save_summary(
    State(state): State<AppState>,
    Path(broadcast_id): Path<String>,
    Json(input): Json<SummaryInput>,
) -> Result<Json<BroadcastSummary>, AppError> {
    let summary = save_summary(&state.db, &broadcast_id, &input).await?;
    archive_summary(state.archive.as_ref(), &summary).await;
    Ok(Json(summary))
}

/// PATCH /api/v1/broadcasts/:id/summary
pub async fn handle_update_summary(
    State(state): State<AppState>,
    Path(broadcast_id): Path<String>,
    Json(updates): Json<SummaryUpdate>,
) -> Result<Json<BroadcastSummary>, AppError> {
    let summary = update_summary(&state.db, &broadcast_id, &updates)
        .await?
        .ok_or_else(|| not_found(&broadcast_id))?;
    if updates.full_markdown.is_some() {
        archive_summary(state.archive.as_ref(), &summary).await;
    }
    Ok(Json(summary))
}

/// DELETE /api/v1/broadcasts/:id/summary
pub async fn handle_delete_summary(
    State(state): State<AppState>,
    Path(broadcast_id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let deleted = delete_summary(&state.db, &broadcast_id).await?;
    Ok(Json(DeleteResponse { deleted }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_transcript_rejected() {
        let req = TranscriptRequest {
            transcript: " \n\t".to_string(),
        };
        assert!(matches!(req.validated(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_transcript_passed_through() {
        let req = TranscriptRequest {
            transcript: "bob tipped 5 tokens".to_string(),
        };
        assert_eq!(req.validated().unwrap(), "bob tipped 5 tokens");
    }
}
