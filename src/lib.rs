//! citelens - citation reference resolution for paginated documents.
//!
//! The rendering layer registers a document's text map (positioned text
//! fragments plus its destination tables), then posts link-activation
//! events; the engine resolves each to a bibliography entry using the
//! structured citation mapping when one is attached and positional
//! heuristics otherwise. The application is organized into the following
//! modules:
//!
//! - `models`: fragments, destinations, structured citations, API bodies
//! - `fragments`: coordinate text index over one page
//! - `patterns`: bracketed/parenthetical citation marker expansion
//! - `destinations`: link target -> (page, anchor y)
//! - `extraction`: heuristic reference extraction and cross-page continuation
//! - `citations`: structured lookup, match scorer, formatted output
//! - `identifiers`: arXiv/DOI identifier extraction tables
//! - `content_blocks`: figure/table/algorithm/equation/appendix detection
//! - `enrichment`: external metadata providers
//! - `resolver`: activation orchestration and the last-result guard
//! - `handlers`: HTTP route handlers

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

pub mod citations;
pub mod content_blocks;
pub mod destinations;
pub mod document;
pub mod enrichment;
pub mod extraction;
pub mod fragments;
pub mod handlers;
pub mod identifiers;
pub mod models;
pub mod patterns;
pub mod resolver;

// ============================================================================
// Configuration
// ============================================================================

pub const DB_PATH: &str = ".citelens_db";

/// Document ids are the leading hex of the content hash.
const DOCUMENT_ID_LEN: usize = 12;

// ============================================================================
// Errors
// ============================================================================

/// Terminal resolution failures. Heuristic degradation is not an error;
/// these cover the destinations that cannot be resolved at all and are
/// surfaced to the presentation layer with the raw payload attached.
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("unresolved destination: {payload}")]
    UnresolvedDestination { payload: String },
    #[error("destination page {page} out of range: {payload}")]
    PageOutOfRange { page: u32, payload: String },
    #[error("document not found: {0}")]
    DocumentNotFound(String),
}

// ============================================================================
// Application State
// ============================================================================

pub struct AppState {
    pub documents: RwLock<HashMap<String, Arc<document::LoadedDocument>>>,
    pub db: sled::Db,
    pub controller: resolver::ResolutionController,
}

impl AppState {
    pub fn new() -> Self {
        let db = sled::open(DB_PATH).expect("Failed to open database");
        Self {
            documents: RwLock::new(HashMap::new()),
            db,
            controller: resolver::ResolutionController::new(),
        }
    }

    pub fn document(&self, id: &str) -> Option<Arc<document::LoadedDocument>> {
        self.documents.read().unwrap().get(id).cloned()
    }

    pub fn insert_document(&self, doc: document::LoadedDocument) -> models::DocumentRegistered {
        let id: String = doc.hash.chars().take(DOCUMENT_ID_LEN).collect();
        let registered = models::DocumentRegistered {
            id: id.clone(),
            hash: doc.hash.clone(),
            pages: doc.page_count(),
        };
        self.documents.write().unwrap().insert(id, Arc::new(doc));
        registered
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

// Re-export commonly used types
pub use document::{DocumentProvider, LoadedDocument};
pub use extraction::{
    extract_reference_at, ExtractionMethod, HeuristicExtraction, EXTRACTION_SENTINEL,
};
pub use fragments::{FragmentIndex, AUTHOR_BAND_TOLERANCE, LINE_BAND_TOLERANCE};
pub use models::{
    Anchor, CitationEntry, CitationMapping, CitationSummary, CitingContext, ContentBlock,
    ContentBlockType, Destination, DocumentRegistered, DocumentUpload, PageRef, PaperMetadata,
    PositionalDestination, ReferenceCandidate, Resolution, ResolveRequest, ResolveResponse,
    ResolvedReference, StructuredReference, TextFragment,
};

pub use citations::{
    citation_summary, extract_citing_surname, find_best_reference, format_reference,
    lookup_citation, score_reference_match, strip_citation_prefix, CONFIDENT_SCORE,
};

pub use content_blocks::{detect_content_at, looks_like_reference_page};

pub use destinations::resolve_destination;

pub use identifiers::{
    classify_identifier, extract_arxiv_id, extract_arxiv_id_from_text, extract_doi,
    extract_identifier_from_url, Identifier,
};

pub use patterns::{expand_citation_numbers, is_citation_marker};

pub use resolver::{enrichable_identifier, resolve_activation, ResolutionController};
