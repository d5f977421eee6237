//! Data models for the citation resolution service.
//!
//! This module contains the core data structures: positioned text fragments,
//! link destinations and anchors, structured citation data supplied by an
//! external source parser, detected content blocks, and the request/response
//! bodies of the HTTP API.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Text Fragments
// ============================================================================

/// One positioned glyph run on a page. Coordinates use the page's own space
/// with the origin at the bottom-left, so a smaller `y` is lower on the page.
/// Fragments are immutable once produced by the rendering layer and live for
/// one page-render cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextFragment {
    pub text: String,
    pub x: f64,
    pub y: f64,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            text: text.into(),
            x,
            y,
        }
    }
}

// ============================================================================
// Destinations and Anchors
// ============================================================================

/// A document-internal link target: either an opaque name resolved through
/// the document's name table, or a positional descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Named(String),
    Positional(PositionalDestination),
}

/// The first slot of a positional destination: either an object reference
/// that must be converted through the document's page-index table, or a page
/// number used directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum PageRef {
    /// Indirect page-object reference (resolved via the page-index lookup).
    Object { num: u32, gen: u16 },
    /// Direct 1-based page number.
    Number(u32),
}

/// Positional destination `[pageRef, displayMode, x?, y?, zoom?]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PositionalDestination {
    pub page: PageRef,
    /// Display-mode tag: "XYZ", "Fit", "FitH", ...
    pub display_mode: String,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub zoom: Option<f64>,
}

/// The resolved (page, y) point a reference lookup is centered on. `y` is
/// None when the destination carried no usable coordinate, which forces the
/// whole-page fallback downstream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    /// 1-based page number.
    pub page_number: u32,
    pub y: Option<f64>,
}

/// A heuristically assembled span of fragment text plus its vertical
/// distance from the anchor. Produced and discarded within one resolution.
#[derive(Debug, Clone)]
pub struct ReferenceCandidate {
    pub text: String,
    pub distance: f64,
}

// ============================================================================
// Structured Citation Data (external source parser)
// ============================================================================

/// A bibliography entry from the externally supplied citation mapping.
/// Field names mirror the source parser's JSON; the parser emits empty
/// strings for missing fields, so every accessor treats empty as absent.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StructuredReference {
    pub key: String,
    #[serde(default)]
    pub authors: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub venue: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub doi: String,
    #[serde(default)]
    pub arxiv_id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub raw_entry: String,
}

impl StructuredReference {
    /// Returns a field only when it is non-empty.
    pub fn field(value: &str) -> Option<&str> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }
}

/// One place in the source document where the entry is cited.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CitingContext {
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub line_number: u32,
    /// The citing command used in the source ("cite", "citep", ...).
    #[serde(default)]
    pub command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CitationEntry {
    pub reference: StructuredReference,
    #[serde(default)]
    pub citations: Vec<CitingContext>,
}

/// Citation key -> entry map, supplied wholesale by the source-document
/// parser before resolution begins. Read-only during resolution.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct CitationMapping {
    pub entries: HashMap<String, CitationEntry>,
}

impl CitationMapping {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

// ============================================================================
// Content Blocks
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentBlockType {
    Figure,
    Table,
    Algorithm,
    Equation,
    Appendix,
}

/// Page-space rectangle handed to the presentation sink alongside a content
/// block, when the rendering layer supplied page dimensions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageArea {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A detected figure/table/algorithm/equation/appendix near a destination.
/// Constructed transiently per lookup, not persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: ContentBlockType,
    pub number: String,
    pub caption: String,
    pub page_number: u32,
    pub area: Option<PageArea>,
}

// ============================================================================
// Resolution Results
// ============================================================================

/// The record handed to the presentation sink for a resolved reference.
/// `confidence` and `match_type` let the presentation layer distinguish a
/// confident match from a guess-of-last-resort.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedReference {
    pub title: String,
    pub content: String,
    pub description: String,
    pub confidence: f64,
    pub match_type: String,
}

/// What a link activation resolved to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Reference(ResolvedReference),
    Content(ContentBlock),
}

/// Metadata returned by the enrichment providers.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PaperMetadata {
    pub title: String,
    pub authors: Vec<String>,
    #[serde(default)]
    pub abstract_text: String,
    #[serde(default)]
    pub year: Option<i32>,
    pub source: String,
}

// ============================================================================
// API Bodies
// ============================================================================

/// A document text map registered by the rendering layer: one fragment list
/// per page, the destination name table, and the page-object index table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentUpload {
    #[serde(default)]
    pub name: Option<String>,
    pub pages: Vec<Vec<TextFragment>>,
    #[serde(default)]
    pub destinations: HashMap<String, PositionalDestination>,
    /// Page-object number -> 0-based page index.
    #[serde(default)]
    pub page_refs: HashMap<u32, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRegistered {
    pub id: String,
    pub hash: String,
    pub pages: usize,
}

/// A link activation event. Exactly one of `url`, `dest`, or `clicked_text`
/// drives the resolution; `source_page`/`source_y` locate the click on the
/// citing page so the surrounding author surname can be picked up.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResolveRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub dest: Option<Destination>,
    #[serde(default)]
    pub clicked_text: Option<String>,
    #[serde(default)]
    pub source_page: Option<u32>,
    #[serde(default)]
    pub source_y: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub call_id: u64,
    pub resolution: Resolution,
    /// Identifier the caller may pass to the enrichment endpoint as an
    /// optional follow-up; resolution itself never waits on enrichment.
    #[serde(default)]
    pub enrich_with: Option<String>,
}

/// One ranked entry of the per-document citation influence summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationRanking {
    pub key: String,
    pub title: Option<String>,
    pub citation_count: usize,
    pub arxiv_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationSummary {
    pub total_entries: usize,
    pub total_citations: usize,
    /// Mean citing-context count across entries.
    pub influence_score: f64,
    pub most_cited: Vec<CitationRanking>,
}
