pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;
use crate::summary::handlers;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Summary data collection
        .route(
            "/api/v1/broadcasts/:id/summary/data",
            post(handlers::handle_collect),
        )
        .route(
            "/api/v1/summaries/preview/data",
            post(handlers::handle_collect_preview),
        )
        // Generation
        .route(
            "/api/v1/broadcasts/:id/summary/generate",
            post(handlers::handle_generate),
        )
        .route("/api/v1/summaries/preview", post(handlers::handle_preview))
        // Stored summaries
        .route(
            "/api/v1/broadcasts/:id/summary",
            get(handlers::handle_get_summary)
                .put(handlers::handle_save_summary)
                .patch(handlers::handle_update_summary)
                .delete(handlers::handle_delete_summary),
        )
        .with_state(state)
}
