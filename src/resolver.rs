//! Link-activation resolution.
//!
//! A link activation carries a URL (answered directly), a destination
//! (resolved to an anchor, then matched against the structured citation
//! mapping before falling back to heuristic extraction), or clicked text
//! (the pattern path for documents without live links). The controller
//! guards the globally visible "last shown result" with a monotonically
//! increasing call id so an older, slower resolution can never overwrite a
//! newer one's output.

use crate::citations::{
    self, extract_citing_surname, find_best_reference, format_reference, has_citation_prefix,
    lookup_citation, strip_citation_prefix, StructuredMatch,
};
use crate::content_blocks::detect_content_at;
use crate::destinations::resolve_destination;
use crate::document::LoadedDocument;
use crate::extraction::{
    extract_reference_at, find_reference_by_number, ExtractionMethod, HeuristicExtraction,
};
use crate::identifiers::{extract_identifier_from_url, Identifier};
use crate::models::{
    Anchor, CitationMapping, Destination, Resolution, ResolveRequest, ResolvedReference,
};
use crate::patterns::expand_citation_numbers;
use crate::ResolutionError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// Link-name prefixes that mark a content (figure/table/...) destination.
const CONTENT_PREFIXES: &[&str] = &["fig.", "tab.", "alg.", "eq.", "app.", "sec."];

/// Citation-number search covers this many trailing pages.
const TRAILING_PAGE_SPAN: u32 = 5;

// ============================================================================
// Controller
// ============================================================================

/// Guards the globally visible last result: each resolution takes a call id
/// before starting, and a completed resolution is only published if no newer
/// call has published first.
#[derive(Default)]
pub struct ResolutionController {
    next_id: AtomicU64,
    latest: Mutex<Option<(u64, Resolution)>>,
}

impl ResolutionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the id for a new resolution call.
    pub fn begin(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Publish a completed resolution. Returns false when a newer call has
    /// already published, in which case the result is discarded.
    pub fn complete(&self, call_id: u64, resolution: Resolution) -> bool {
        let mut slot = self.latest.lock().unwrap();
        match slot.as_ref() {
            Some((stored, _)) if *stored > call_id => false,
            _ => {
                *slot = Some((call_id, resolution));
                true
            }
        }
    }

    /// The most recently published resolution, if any.
    pub fn latest(&self) -> Option<(u64, Resolution)> {
        self.latest.lock().unwrap().clone()
    }
}

// ============================================================================
// Activation Resolution
// ============================================================================

/// Resolve one link activation against a document. Destination failures are
/// returned as errors so the caller can surface the raw payload; everything
/// else degrades to a best-effort reference record.
pub fn resolve_activation(
    doc: &LoadedDocument,
    mapping: Option<&CitationMapping>,
    request: &ResolveRequest,
) -> Result<Resolution, ResolutionError> {
    if let Some(url) = &request.url {
        return Ok(Resolution::Reference(resolve_external_url(url)));
    }

    if let Some(dest) = &request.dest {
        return resolve_destination_activation(doc, mapping, dest, request);
    }

    if let Some(text) = &request.clicked_text {
        return Ok(Resolution::Reference(resolve_clicked_text(doc, text)));
    }

    // The activation carried nothing usable; the presentation layer still
    // receives a record rather than an exception
    Ok(Resolution::Reference(ResolvedReference {
        title: "Citation Error".to_string(),
        content: "This citation does not contain a valid link destination.".to_string(),
        description: "The annotation is missing destination information.".to_string(),
        confidence: 0.0,
        match_type: "error".to_string(),
    }))
}

/// A URL link is answered directly; page heuristics never run.
fn resolve_external_url(url: &str) -> ResolvedReference {
    let identifier = extract_identifier_from_url(url);
    let description = match &identifier {
        Some(Identifier::Arxiv(id)) => format!("External arXiv link ({}).", id),
        Some(Identifier::Doi(doi)) => format!("External DOI link ({}).", doi),
        None => "External link without a recognized identifier.".to_string(),
    };

    ResolvedReference {
        title: "External Citation".to_string(),
        content: url.to_string(),
        description,
        confidence: 1.0,
        match_type: "external-url".to_string(),
    }
}

fn resolve_destination_activation(
    doc: &LoadedDocument,
    mapping: Option<&CitationMapping>,
    dest: &Destination,
    request: &ResolveRequest,
) -> Result<Resolution, ResolutionError> {
    let anchor = resolve_destination(dest, doc)?;

    let dest_name = match dest {
        Destination::Named(name) => Some(name.as_str()),
        Destination::Positional(_) => None,
    };

    // A figure/table/... destination goes to content detection first
    if let Some(name) = dest_name {
        if has_content_prefix(name) {
            if let Some(fragments) = doc.page_fragments(anchor.page_number) {
                if let Some(block) = detect_content_at(fragments, anchor.page_number) {
                    return Ok(Resolution::Content(block));
                }
            }
            debug!(name, "content destination fell through to reference path");
        }
    }

    let key_candidate = dest_name
        .filter(|name| !has_content_prefix(name))
        .map(strip_citation_prefix);

    // Citing surname from the click point on the source page
    let surname = match (request.source_page, request.source_y) {
        (Some(page), Some(y)) => doc
            .page_fragments(page)
            .and_then(|fragments| extract_citing_surname(fragments, y)),
        _ => None,
    };

    // Structured lookup first; the first-entry fallback is reserved for
    // clicks with neither a key nor an anchor coordinate
    if let Some(mapping) = mapping {
        let allow_fallback = key_candidate.is_none() && anchor.y.is_none();
        if let Some(found) =
            lookup_citation(mapping, key_candidate, surname.as_deref(), allow_fallback)
        {
            return Ok(Resolution::Reference(reference_from_structured(&found)));
        }
    }

    // Heuristic extraction over the destination page
    let Some(page) = doc.fragment_index(anchor.page_number) else {
        return Err(ResolutionError::PageOutOfRange {
            page: anchor.page_number,
            payload: format!("{:?}", dest),
        });
    };
    let next_page = doc.page_fragments(anchor.page_number + 1);
    let extraction = extract_reference_at(anchor.y, page, surname.as_deref(), next_page);

    // With a mapping but no key match, the scorer reconciles the extracted
    // text against the structured entries
    if let Some(mapping) = mapping {
        if extraction.method != ExtractionMethod::Sentinel {
            if let Some((key, entry, score)) = find_best_reference(&extraction.text, mapping) {
                debug!(%key, score, "scorer matched extracted text to structured entry");
                return Ok(Resolution::Reference(ResolvedReference {
                    title: format!("Reference [{}]", key),
                    content: format_reference(&key, &entry),
                    description: format!(
                        "Matched extracted text to the citation mapping (score {}).",
                        score
                    ),
                    confidence: 0.75,
                    match_type: "scored".to_string(),
                }));
            }
        }
    }

    Ok(Resolution::Reference(reference_from_heuristic(
        &anchor, extraction,
    )))
}

fn has_content_prefix(name: &str) -> bool {
    !has_citation_prefix(name) && CONTENT_PREFIXES.iter().any(|p| name.starts_with(p))
}

fn reference_from_structured(found: &StructuredMatch) -> ResolvedReference {
    ResolvedReference {
        title: format!("Reference [{}]", found.key),
        content: format_reference(&found.key, &found.entry),
        description: "Resolved from the structured citation mapping.".to_string(),
        confidence: found.confidence,
        match_type: found.match_type.clone(),
    }
}

fn reference_from_heuristic(anchor: &Anchor, extraction: HeuristicExtraction) -> ResolvedReference {
    let (match_type, confidence, description) = match extraction.method {
        ExtractionMethod::AnchorBlock => (
            "anchor-block",
            0.8,
            "Found by following the citation link to the bibliography.",
        ),
        ExtractionMethod::AnchorBlockContinued => (
            "anchor-block-continued",
            0.75,
            "Found by following the citation link; the entry continued on the next page.",
        ),
        ExtractionMethod::NumberedMarker => (
            "numbered-marker",
            0.6,
            "Found by matching a numbered reference marker near the link target.",
        ),
        ExtractionMethod::PageLine => (
            "page-line",
            0.3,
            "Located the references page but could not isolate the specific entry.",
        ),
        ExtractionMethod::Sentinel => (
            "sentinel",
            0.0,
            "No extraction strategy produced a usable reference.",
        ),
    };

    ResolvedReference {
        title: format!("Reference (page {})", anchor.page_number),
        content: extraction.text,
        description: description.to_string(),
        confidence,
        match_type: match_type.to_string(),
    }
}

// ============================================================================
// Pattern Path
// ============================================================================

/// Clicked text with no live link: expand the citation marker and search the
/// trailing pages for the numbered entries.
fn resolve_clicked_text(doc: &LoadedDocument, text: &str) -> ResolvedReference {
    let numbers = expand_citation_numbers(text);
    if numbers.is_empty() {
        return ResolvedReference {
            title: "Citation".to_string(),
            content: text.to_string(),
            description: "The clicked text is not a recognized citation marker.".to_string(),
            confidence: 0.0,
            match_type: "no-pattern".to_string(),
        };
    }

    let joined_numbers = numbers
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let found = find_references_by_numbers(doc, &numbers);
    if found.is_empty() {
        return ResolvedReference {
            title: format!("Citation {}", joined_numbers),
            content: "Reference text not found".to_string(),
            description: "Could not locate the reference text for these citation numbers."
                .to_string(),
            confidence: 0.0,
            match_type: "not-found".to_string(),
        };
    }

    ResolvedReference {
        title: format!("References ({})", joined_numbers),
        content: found.join("\n\n"),
        description: "References found by searching for citation numbers in the document."
            .to_string(),
        confidence: 0.6,
        match_type: "citation-numbers".to_string(),
    }
}

/// Bibliographies sit at the end of a document, so only the trailing pages
/// are searched.
fn find_references_by_numbers(doc: &LoadedDocument, numbers: &[u32]) -> Vec<String> {
    let page_count = doc.page_count() as u32;
    let start_page = page_count.saturating_sub(TRAILING_PAGE_SPAN).max(1);

    let mut found = Vec::new();
    for number in numbers {
        for page_number in start_page..=page_count {
            let Some(fragments) = doc.page_fragments(page_number) else {
                continue;
            };
            if let Some(entry) = find_reference_by_number(fragments, *number) {
                found.push(format!("[{}] {}", number, entry));
                break;
            }
        }
    }
    found
}

// ============================================================================
// Enrichment Follow-Up
// ============================================================================

/// Pull an enrichable identifier out of a completed resolution. Separate
/// from resolution itself so a hung metadata fetch can never delay the
/// primary result.
pub fn enrichable_identifier(
    resolution: &Resolution,
    mapping: Option<&CitationMapping>,
) -> Option<Identifier> {
    let Resolution::Reference(reference) = resolution else {
        return None;
    };

    // A structured match's own identifier takes priority
    if let Some(mapping) = mapping {
        if reference.match_type.starts_with("key") || reference.match_type == "scored" {
            if let Some(key) = reference
                .title
                .strip_prefix("Reference [")
                .and_then(|t| t.strip_suffix(']'))
            {
                if let Some(entry) = mapping.entries.get(key) {
                    if let Some(id) = citations::structured_identifier(&entry.reference) {
                        return Some(id);
                    }
                }
            }
        }
    }

    crate::identifiers::extract_arxiv_id_from_text(&reference.content)
        .map(Identifier::Arxiv)
        .or_else(|| crate::identifiers::extract_doi(&reference.content).map(Identifier::Doi))
}
