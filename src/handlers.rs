//! HTTP route handlers.
//!
//! The rendering layer registers documents and posts link activations here;
//! responses are the presentation records. Enrichment results are cached in
//! sled keyed by identifier so repeat lookups skip the network.

use crate::citations;
use crate::document::LoadedDocument;
use crate::enrichment::fetch_metadata;
use crate::identifiers::{classify_identifier, Identifier};
use crate::models::{
    CitationMapping, DocumentUpload, PaperMetadata, Resolution, ResolveRequest, ResolveResponse,
    ResolvedReference,
};
use crate::resolver::resolve_activation;
use crate::{AppState, ResolutionError};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

const METADATA_TREE: &str = "metadata";

// ============================================================================
// Document Registration
// ============================================================================

/// POST /api/documents — register a document text map.
pub async fn register_document(
    State(state): State<Arc<AppState>>,
    Json(upload): Json<DocumentUpload>,
) -> Response {
    // Page indexing fans out over rayon; keep it off the async runtime
    let built = tokio::task::spawn_blocking(move || LoadedDocument::from_upload(upload)).await;

    match built {
        Ok(doc) => {
            let registered = state.insert_document(doc);
            info!(id = %registered.id, pages = registered.pages, "document registered");
            Json(registered).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Task join error: {}", e),
        )
            .into_response(),
    }
}

/// POST /api/documents/pdf — ingest a raw PDF without a text map.
///
/// Fallback for flattened/scanned documents: plain text is extracted and
/// turned into synthetic fragments, so only the line-based heuristics and
/// the citation-number pattern path apply.
pub async fn ingest_pdf(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let extracted = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem(&body).map_err(|e| format!("pdf-extract failed: {}", e))
    })
    .await;

    match extracted {
        Ok(Ok(text)) => {
            let doc = LoadedDocument::from_plain_text(None, &text);
            if doc.page_count() == 0 {
                return (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "No text could be extracted from this PDF".to_string(),
                )
                    .into_response();
            }
            let registered = state.insert_document(doc);
            info!(id = %registered.id, pages = registered.pages, "PDF ingested");
            Json(registered).into_response()
        }
        Ok(Err(e)) => (StatusCode::UNPROCESSABLE_ENTITY, e).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Task join error: {}", e),
        )
            .into_response(),
    }
}

/// POST /api/documents/{id}/citations — attach the citation mapping
/// produced by the source-document parser.
pub async fn attach_citations(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(mapping): Json<CitationMapping>,
) -> Response {
    let Some(doc) = state.document(&id) else {
        return (StatusCode::NOT_FOUND, format!("Document not found: {}", id)).into_response();
    };

    let count = mapping.len();
    doc.set_citation_mapping(mapping);
    info!(%id, count, "citation mapping attached");
    (
        StatusCode::OK,
        format!("Attached {} citation entr(ies) to {}", count, id),
    )
        .into_response()
}

// ============================================================================
// Resolution
// ============================================================================

/// POST /api/documents/{id}/resolve — resolve one link activation.
pub async fn resolve(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<ResolveRequest>,
) -> Response {
    let call_id = state.controller.begin();

    let Some(doc) = state.document(&id) else {
        return (StatusCode::NOT_FOUND, format!("Document not found: {}", id)).into_response();
    };
    let mapping = doc.citation_mapping();

    let resolution = match resolve_activation(&doc, mapping.as_deref(), &request) {
        Ok(resolution) => resolution,
        // Destination failures still reach the presentation layer, as a
        // diagnostic record carrying the raw payload
        Err(error) => Resolution::Reference(diagnostic_record(&error)),
    };

    if !state.controller.complete(call_id, resolution.clone()) {
        debug!(call_id, "stale resolution completed after a newer call; not published");
    }

    let enrich_with = crate::resolver::enrichable_identifier(&resolution, mapping.as_deref())
        .map(|identifier| match identifier {
            Identifier::Arxiv(id) => id,
            Identifier::Doi(doi) => doi,
        });

    Json(ResolveResponse {
        call_id,
        resolution,
        enrich_with,
    })
    .into_response()
}

/// GET /api/resolutions/latest — the last published resolution.
pub async fn latest_resolution(State(state): State<Arc<AppState>>) -> Response {
    match state.controller.latest() {
        Some((call_id, resolution)) => Json(ResolveResponse {
            call_id,
            resolution,
            enrich_with: None,
        })
        .into_response(),
        None => (StatusCode::NOT_FOUND, "No resolution has completed yet").into_response(),
    }
}

fn diagnostic_record(error: &ResolutionError) -> ResolvedReference {
    match error {
        ResolutionError::UnresolvedDestination { payload } => ResolvedReference {
            title: "Citation Link Error".to_string(),
            content: payload.clone(),
            description: "Could not resolve the destination for this citation link.".to_string(),
            confidence: 0.0,
            match_type: "unresolved-destination".to_string(),
        },
        ResolutionError::PageOutOfRange { payload, .. } => ResolvedReference {
            title: "Citation Link Error".to_string(),
            content: payload.clone(),
            description: "Could not locate the destination page for this citation link."
                .to_string(),
            confidence: 0.0,
            match_type: "page-out-of-range".to_string(),
        },
        ResolutionError::DocumentNotFound(id) => ResolvedReference {
            title: "Citation Link Error".to_string(),
            content: id.clone(),
            description: "The document for this citation link is no longer registered."
                .to_string(),
            confidence: 0.0,
            match_type: "document-not-found".to_string(),
        },
    }
}

// ============================================================================
// Citation Summary
// ============================================================================

/// GET /api/documents/{id}/citations/summary — influence ranking over the
/// attached citation mapping.
pub async fn citation_summary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let Some(doc) = state.document(&id) else {
        return (StatusCode::NOT_FOUND, format!("Document not found: {}", id)).into_response();
    };

    match doc.citation_mapping() {
        Some(mapping) => Json(citations::citation_summary(&mapping)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            "No citation data available. Attach the source mapping first.",
        )
            .into_response(),
    }
}

// ============================================================================
// Enrichment
// ============================================================================

#[derive(Serialize, Deserialize)]
struct CachedMetadata {
    fetched_at: DateTime<Utc>,
    metadata: PaperMetadata,
}

/// GET /api/enrich/{identifier} — metadata for an arXiv id or DOI, cached.
/// A failed lookup is reported but never retried automatically; the primary
/// reference display does not depend on it.
pub async fn enrich(State(state): State<Arc<AppState>>, Path(identifier): Path<String>) -> Response {
    let Some(identifier) = classify_identifier(&identifier) else {
        return (
            StatusCode::BAD_REQUEST,
            "Unrecognized identifier; expected an arXiv id or DOI".to_string(),
        )
            .into_response();
    };

    let cache_key = match &identifier {
        Identifier::Arxiv(id) => format!("arxiv:{}", id),
        Identifier::Doi(doi) => format!("doi:{}", doi),
    };

    if let Some(cached) = load_cached_metadata(&state.db, &cache_key) {
        debug!(%cache_key, "metadata served from cache");
        return Json(cached.metadata).into_response();
    }

    match fetch_metadata(&identifier).await {
        Some(metadata) => {
            if let Err(e) = save_cached_metadata(&state.db, &cache_key, &metadata) {
                debug!(%cache_key, error = %e, "failed to cache metadata");
            }
            Json(metadata).into_response()
        }
        None => (
            StatusCode::BAD_GATEWAY,
            "Metadata lookup failed; the reference is resolved without enrichment.".to_string(),
        )
            .into_response(),
    }
}

fn load_cached_metadata(db: &sled::Db, key: &str) -> Option<CachedMetadata> {
    let tree = db.open_tree(METADATA_TREE).ok()?;
    let data = tree.get(key.as_bytes()).ok()??;
    serde_json::from_slice(&data).ok()
}

fn save_cached_metadata(db: &sled::Db, key: &str, metadata: &PaperMetadata) -> Result<(), String> {
    let tree = db
        .open_tree(METADATA_TREE)
        .map_err(|e| format!("Cannot open metadata tree: {}", e))?;
    let cached = CachedMetadata {
        fetched_at: Utc::now(),
        metadata: metadata.clone(),
    };
    let json = serde_json::to_vec(&cached).map_err(|e| format!("JSON serialize error: {}", e))?;
    tree.insert(key.as_bytes(), json)
        .map_err(|e| format!("Sled insert error: {}", e))?;
    Ok(())
}
