//! Structured citation lookup and scoring.
//!
//! When the source parser has supplied a citation mapping, a clicked link is
//! resolved against it directly: by citation key (stripped of its link
//! prefix), by the citing author's surname, or as a last resort by the
//! bibliography match scorer over heuristically extracted text. Every result
//! carries a match type and confidence so the presentation layer can tell a
//! confident match from a guess.

use crate::fragments::AUTHOR_BAND_TOLERANCE;
use crate::models::{
    CitationEntry, CitationMapping, CitationRanking, CitationSummary, StructuredReference,
    TextFragment,
};
use crate::identifiers::{self, Identifier};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Link-name prefixes that mark a citation destination.
const CITATION_PREFIXES: &[&str] = &["cite.", "bib.", "ref."];

/// A scorer result above this is treated as a confident match.
pub const CONFIDENT_SCORE: i32 = 2;

/// At most this many citing contexts are included in formatted output.
const MAX_CONTEXTS: usize = 3;

/// Citing contexts are truncated to this many characters.
const CONTEXT_SNIPPET_LEN: usize = 100;

// Capitalized word usable as a surname: initial uppercase, length >= 3.
static SURNAME_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z][a-z]{2,})\b").unwrap());

// Words that look like surnames but never are.
const SURNAME_SKIP: &[&str] = &[
    "The", "And", "For", "See", "Fig", "Figure", "Table", "Section", "Appendix", "Equation",
];

// Author-field tokens that are connectives, not surnames.
const AUTHOR_TOKEN_SKIP: &[&str] = &["and", "et", "al", "the", "von", "van", "der", "den", "de"];

#[derive(Debug, Clone)]
pub struct StructuredMatch {
    pub key: String,
    pub entry: CitationEntry,
    pub match_type: String,
    pub confidence: f64,
}

// ============================================================================
// Key and Surname Candidates
// ============================================================================

/// Strip the link prefix from a destination name to get the citation key
/// candidate: "cite.smith2020" -> "smith2020".
pub fn strip_citation_prefix(name: &str) -> &str {
    for prefix in CITATION_PREFIXES {
        if let Some(rest) = name.strip_prefix(prefix) {
            return rest;
        }
    }
    name
}

/// True when the destination name carries one of the citation prefixes.
pub fn has_citation_prefix(name: &str) -> bool {
    CITATION_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Scan fragments within the author band of the click point for a
/// capitalized word usable as the citing surname ("Smith et al. [3]").
pub fn extract_citing_surname(fragments: &[TextFragment], click_y: f64) -> Option<String> {
    for fragment in fragments {
        if (fragment.y - click_y).abs() > AUTHOR_BAND_TOLERANCE {
            continue;
        }
        for caps in SURNAME_TOKEN.captures_iter(&fragment.text) {
            let word = &caps[1];
            if !SURNAME_SKIP.contains(&word) {
                return Some(word.to_string());
            }
        }
    }
    None
}

// ============================================================================
// Tiered Lookup
// ============================================================================

/// Resolve a key candidate or surname against the mapping.
///
/// Tiers: exact key, case-insensitive key, surname substring against authors
/// or title. The first-entry fallback fires only when `allow_fallback` is
/// set, i.e. for a non-specific click with neither key nor anchor
/// coordinate; it is a deliberate better-than-nothing degrade and reports a
/// low confidence.
pub fn lookup_citation(
    mapping: &CitationMapping,
    key_candidate: Option<&str>,
    surname: Option<&str>,
    allow_fallback: bool,
) -> Option<StructuredMatch> {
    if let Some(key) = key_candidate {
        if let Some(entry) = mapping.entries.get(key) {
            return Some(StructuredMatch {
                key: key.to_string(),
                entry: entry.clone(),
                match_type: "key".to_string(),
                confidence: 1.0,
            });
        }

        for actual in sorted_keys(mapping) {
            if actual.eq_ignore_ascii_case(key) {
                return Some(StructuredMatch {
                    key: actual.clone(),
                    entry: mapping.entries[actual].clone(),
                    match_type: "key-case-insensitive".to_string(),
                    confidence: 0.95,
                });
            }
        }
    }

    if let Some(surname) = surname {
        let needle = surname.to_lowercase();
        for key in sorted_keys(mapping) {
            let entry = &mapping.entries[key];
            let authors = entry.reference.authors.to_lowercase();
            let title = entry.reference.title.to_lowercase();
            if authors.contains(&needle) || title.contains(&needle) {
                debug!(%key, surname, "matched structured entry by surname");
                return Some(StructuredMatch {
                    key: key.clone(),
                    entry: entry.clone(),
                    match_type: "surname".to_string(),
                    confidence: 0.7,
                });
            }
        }
    }

    if allow_fallback {
        if let Some(key) = sorted_keys(mapping).into_iter().next() {
            return Some(StructuredMatch {
                key: key.clone(),
                entry: mapping.entries[key].clone(),
                match_type: "fallback-first-entry".to_string(),
                confidence: 0.2,
            });
        }
    }

    None
}

// Deterministic iteration order so repeated resolutions of the same
// destination against an unchanged mapping yield identical output.
fn sorted_keys(mapping: &CitationMapping) -> Vec<&String> {
    let mut keys: Vec<&String> = mapping.entries.keys().collect();
    keys.sort();
    keys
}

// ============================================================================
// Formatted Output
// ============================================================================

/// Human-readable reference string: `[key]` then authors, year, quoted
/// title, venue, DOI, arXiv id, and url, each omitted when absent, followed
/// by up to three citing contexts. A reference missing every field degrades
/// to its raw entry.
pub fn format_reference(key: &str, entry: &CitationEntry) -> String {
    let reference = &entry.reference;
    let mut parts: Vec<String> = Vec::new();

    if let Some(authors) = StructuredReference::field(&reference.authors) {
        parts.push(authors.to_string());
    }
    if let Some(year) = StructuredReference::field(&reference.year) {
        parts.push(year.to_string());
    }
    if let Some(title) = StructuredReference::field(&reference.title) {
        parts.push(format!("\"{}\"", title));
    }
    if let Some(venue) = StructuredReference::field(&reference.venue) {
        parts.push(venue.to_string());
    }
    if let Some(doi) = StructuredReference::field(&reference.doi) {
        parts.push(format!("DOI: {}", doi));
    }
    if let Some(arxiv_id) = StructuredReference::field(&reference.arxiv_id) {
        parts.push(format!("arXiv: {}", arxiv_id));
    }
    if let Some(url) = StructuredReference::field(&reference.url) {
        parts.push(url.to_string());
    }

    let body = if parts.is_empty() {
        StructuredReference::field(&reference.raw_entry)
            .unwrap_or("(no reference metadata)")
            .to_string()
    } else {
        parts.join(". ")
    };

    let mut out = format!("[{}] {}", key, body);

    if !entry.citations.is_empty() {
        out.push_str("\n\nCited in:");
        for context in entry.citations.iter().take(MAX_CONTEXTS) {
            out.push_str(&format!(
                "\n  {}:{} \"{}\"",
                context.file_name,
                context.line_number,
                truncate_chars(&context.context, CONTEXT_SNIPPET_LEN)
            ));
        }
        if entry.citations.len() > MAX_CONTEXTS {
            out.push_str(&format!(
                "\n  ... and {} more citation(s)",
                entry.citations.len() - MAX_CONTEXTS
            ));
        }
    }

    out
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let mut truncated: String = text.chars().take(limit).collect();
        truncated.push_str("...");
        truncated
    }
}

// ============================================================================
// Bibliography Match Scorer
// ============================================================================

/// Weighted feature score of a structured reference against free text near a
/// destination: +5 literal key, +2 per author-surname token, +3 year,
/// +2 venue, +1 per matching title word (first five significant words).
pub fn score_reference_match(text: &str, reference: &StructuredReference, key: &str) -> i32 {
    let lower = text.to_lowercase();
    let mut score = 0;

    if !key.is_empty() && text.contains(key) {
        score += 5;
    }

    for token in reference
        .authors
        .split(|c: char| !c.is_alphabetic())
        .filter(|t| t.len() > 2)
    {
        if AUTHOR_TOKEN_SKIP.contains(&token.to_lowercase().as_str()) {
            continue;
        }
        if lower.contains(&token.to_lowercase()) {
            score += 2;
        }
    }

    if let Some(year) = StructuredReference::field(&reference.year) {
        if lower.contains(&year.to_lowercase()) {
            score += 3;
        }
    }

    if let Some(venue) = StructuredReference::field(&reference.venue) {
        if lower.contains(&venue.to_lowercase()) {
            score += 2;
        }
    }

    if let Some(title) = StructuredReference::field(&reference.title) {
        for word in title
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 3)
            .take(5)
        {
            if lower.contains(&word.to_lowercase()) {
                score += 1;
            }
        }
    }

    score
}

/// Score every entry against the text and return the best confident one.
/// This decides among plausible entries when no direct key match was found.
pub fn find_best_reference(
    text: &str,
    mapping: &CitationMapping,
) -> Option<(String, CitationEntry, i32)> {
    let mut best: Option<(&String, i32)> = None;

    for key in sorted_keys(mapping) {
        let entry = &mapping.entries[key];
        let score = score_reference_match(text, &entry.reference, key);
        if score > CONFIDENT_SCORE && best.map_or(true, |(_, s)| score > s) {
            best = Some((key, score));
        }
    }

    best.map(|(key, score)| (key.clone(), mapping.entries[key].clone(), score))
}

/// The enrichable identifier of a structured reference, arXiv first.
pub fn structured_identifier(reference: &StructuredReference) -> Option<Identifier> {
    if let Some(id) = identifiers::extract_arxiv_id(reference) {
        return Some(Identifier::Arxiv(id));
    }
    StructuredReference::field(&reference.doi).map(|doi| Identifier::Doi(doi.to_string()))
}

// ============================================================================
// Influence Summary
// ============================================================================

/// Rank mapping entries by how often they are cited in the source document.
pub fn citation_summary(mapping: &CitationMapping) -> CitationSummary {
    let total_entries = mapping.len();
    let total_citations: usize = mapping.entries.values().map(|e| e.citations.len()).sum();

    let mut ranked: Vec<CitationRanking> = mapping
        .entries
        .iter()
        .map(|(key, entry)| CitationRanking {
            key: key.clone(),
            title: StructuredReference::field(&entry.reference.title).map(str::to_string),
            citation_count: entry.citations.len(),
            arxiv_id: identifiers::extract_arxiv_id(&entry.reference),
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.citation_count
            .cmp(&a.citation_count)
            .then_with(|| a.key.cmp(&b.key))
    });
    ranked.truncate(10);

    CitationSummary {
        total_entries,
        total_citations,
        influence_score: if total_entries == 0 {
            0.0
        } else {
            total_citations as f64 / total_entries as f64
        },
        most_cited: ranked,
    }
}

#[cfg(test)]
#[path = "citations_test.rs"]
mod citations_test;
