use std::sync::Arc;

use sqlx::PgPool;

use crate::llm_client::LlmClient;
use crate::storage::SummaryArchive;
use crate::summary::collector::SummaryDataCollector;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub llm: LlmClient,
    pub collector: Arc<SummaryDataCollector>,
    /// Markdown archive selected by STORAGE_BACKEND.
    pub archive: Arc<dyn SummaryArchive>,
}
