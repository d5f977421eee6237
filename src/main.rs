//! citelens server entry point.
//!
//! Exposes the resolution engine over HTTP: document registration, link
//! activation resolution, citation summaries, and cached metadata
//! enrichment.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use citelens::{handlers, AppState, DB_PATH};

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "citelens=info".into()),
        )
        .init();

    let state = Arc::new(AppState::new());

    let app = Router::new()
        // Document routes
        .route("/api/documents", post(handlers::register_document))
        .route("/api/documents/pdf", post(handlers::ingest_pdf))
        .route(
            "/api/documents/{id}/citations",
            post(handlers::attach_citations),
        )
        .route(
            "/api/documents/{id}/citations/summary",
            get(handlers::citation_summary),
        )
        // Resolution routes
        .route("/api/documents/{id}/resolve", post(handlers::resolve))
        .route("/api/resolutions/latest", get(handlers::latest_resolution))
        // Enrichment (wildcard so DOIs with slashes pass through)
        .route("/api/enrich/{*identifier}", get(handlers::enrich))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000")
        .await
        .expect("Failed to bind to port 3000");

    println!("citelens server running at http://127.0.0.1:3000");
    println!("Metadata cache: {}", DB_PATH);

    axum::serve(listener, app).await.expect("Server error");
}
