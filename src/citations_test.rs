//! Tests for structured citation lookup, formatting, and scoring.

use super::*;
use crate::models::{CitationEntry, CitationMapping, CitingContext, StructuredReference};

// ============================================================================
// Helpers
// ============================================================================

fn reference(
    key: &str,
    authors: &str,
    title: &str,
    venue: &str,
    year: &str,
) -> StructuredReference {
    StructuredReference {
        key: key.to_string(),
        authors: authors.to_string(),
        title: title.to_string(),
        venue: venue.to_string(),
        year: year.to_string(),
        ..Default::default()
    }
}

fn entry(reference: StructuredReference, contexts: usize) -> CitationEntry {
    let citations = (0..contexts)
        .map(|i| CitingContext {
            context: format!("context {} where the work is discussed at length", i),
            file_name: "main.tex".to_string(),
            line_number: 100 + i as u32,
            command: "cite".to_string(),
        })
        .collect();
    CitationEntry {
        reference,
        citations,
    }
}

fn test_mapping() -> CitationMapping {
    let mut mapping = CitationMapping::default();
    mapping.entries.insert(
        "smith2020".to_string(),
        entry(
            reference(
                "smith2020",
                "John Smith and Jane Doe",
                "Resolving Citations in Scholarly Documents",
                "NeurIPS",
                "2020",
            ),
            5,
        ),
    );
    mapping.entries.insert(
        "brown2019".to_string(),
        entry(
            reference(
                "brown2019",
                "Carol Brown",
                "Language Models are Few-Shot Learners",
                "ICML",
                "2019",
            ),
            1,
        ),
    );
    mapping.entries.insert(
        "zhao2021".to_string(),
        entry(
            reference("zhao2021", "Wei Zhao", "Graph Attention for Parsing", "ACL", "2021"),
            0,
        ),
    );
    mapping
}

// ============================================================================
// Key Candidates and Surnames
// ============================================================================

#[test]
fn test_strip_citation_prefix() {
    assert_eq!(strip_citation_prefix("cite.smith2020"), "smith2020");
    assert_eq!(strip_citation_prefix("bib.brown2019"), "brown2019");
    assert_eq!(strip_citation_prefix("ref.zhao2021"), "zhao2021");
    assert_eq!(strip_citation_prefix("smith2020"), "smith2020");
}

#[test]
fn test_extract_citing_surname_in_band() {
    let fragments = vec![
        TextFragment::new("far away text", 50.0, 600.0),
        TextFragment::new("as Smith et al. showed [3]", 50.0, 502.0),
    ];
    assert_eq!(
        extract_citing_surname(&fragments, 500.0).as_deref(),
        Some("Smith")
    );
    // Outside the band nothing is picked up
    assert_eq!(extract_citing_surname(&fragments, 400.0), None);
}

#[test]
fn test_extract_citing_surname_skips_stop_words() {
    let fragments = vec![TextFragment::new("See Figure and Kumar 2019", 50.0, 500.0)];
    assert_eq!(
        extract_citing_surname(&fragments, 500.0).as_deref(),
        Some("Kumar")
    );
}

// ============================================================================
// Tiered Lookup
// ============================================================================

#[test]
fn test_exact_key_match() {
    let mapping = test_mapping();
    let found = lookup_citation(&mapping, Some("smith2020"), None, false).unwrap();
    assert_eq!(found.key, "smith2020");
    assert_eq!(found.match_type, "key");
    assert_eq!(found.confidence, 1.0);
}

#[test]
fn test_case_insensitive_key_match() {
    let mapping = test_mapping();
    let found = lookup_citation(&mapping, Some("Smith2020"), None, false).unwrap();
    assert_eq!(found.key, "smith2020");
    assert_eq!(found.match_type, "key-case-insensitive");
    assert_eq!(found.confidence, 0.95);
}

#[test]
fn test_surname_match_against_authors() {
    let mapping = test_mapping();
    let found = lookup_citation(&mapping, None, Some("Brown"), false).unwrap();
    assert_eq!(found.key, "brown2019");
    assert_eq!(found.match_type, "surname");
}

#[test]
fn test_surname_match_against_title() {
    let mapping = test_mapping();
    // "Attention" appears only in zhao2021's title
    let found = lookup_citation(&mapping, None, Some("Attention"), false).unwrap();
    assert_eq!(found.key, "zhao2021");
}

#[test]
fn test_fallback_only_when_allowed() {
    let mapping = test_mapping();
    assert!(lookup_citation(&mapping, None, None, false).is_none());

    let found = lookup_citation(&mapping, None, None, true).unwrap();
    assert_eq!(found.match_type, "fallback-first-entry");
    assert!(found.confidence < 0.5, "fallback must report low confidence");
    // Deterministic: smallest key wins
    assert_eq!(found.key, "brown2019");
}

#[test]
fn test_unknown_key_without_surname_misses() {
    let mapping = test_mapping();
    assert!(lookup_citation(&mapping, Some("unknown99"), None, false).is_none());
}

#[test]
fn test_lookup_is_idempotent() {
    let mapping = test_mapping();
    let first = lookup_citation(&mapping, Some("smith2020"), None, false).unwrap();
    let second = lookup_citation(&mapping, Some("smith2020"), None, false).unwrap();
    assert_eq!(first.key, second.key);
    assert_eq!(
        format_reference(&first.key, &first.entry),
        format_reference(&second.key, &second.entry)
    );
}

// ============================================================================
// Formatted Output
// ============================================================================

#[test]
fn test_format_starts_with_bracketed_key() {
    let mapping = test_mapping();
    let found = lookup_citation(&mapping, Some("smith2020"), None, false).unwrap();
    let formatted = format_reference(&found.key, &found.entry);
    assert!(
        formatted.starts_with("[smith2020] "),
        "got: {}",
        formatted
    );
    assert!(formatted.contains("John Smith and Jane Doe"));
    assert!(formatted.contains("\"Resolving Citations in Scholarly Documents\""));
    assert!(formatted.contains("NeurIPS"));
}

#[test]
fn test_format_orders_fields() {
    let mut reference = reference(
        "k",
        "A. Author",
        "A Title",
        "A Venue",
        "2022",
    );
    reference.doi = "10.1/xyz".to_string();
    reference.arxiv_id = "2301.01234".to_string();
    reference.url = "https://example.org/paper".to_string();
    let formatted = format_reference("k", &entry(reference, 0));

    let authors_at = formatted.find("A. Author").unwrap();
    let year_at = formatted.find("2022").unwrap();
    let title_at = formatted.find("\"A Title\"").unwrap();
    let venue_at = formatted.find("A Venue").unwrap();
    let doi_at = formatted.find("DOI: 10.1/xyz").unwrap();
    let arxiv_at = formatted.find("arXiv: 2301.01234").unwrap();
    let url_at = formatted.find("https://example.org/paper").unwrap();
    assert!(authors_at < year_at && year_at < title_at && title_at < venue_at);
    assert!(venue_at < doi_at && doi_at < arxiv_at && arxiv_at < url_at);
}

#[test]
fn test_format_omits_absent_fields() {
    let reference = reference("k", "", "Only a Title", "", "");
    let formatted = format_reference("k", &entry(reference, 0));
    assert_eq!(formatted, "[k] \"Only a Title\"");
    assert!(!formatted.contains("DOI"));
}

#[test]
fn test_format_degrades_to_raw_entry() {
    let reference = StructuredReference {
        key: "k".to_string(),
        raw_entry: "K. Raw and U. Parsed. Some entry text. 1999.".to_string(),
        ..Default::default()
    };
    let formatted = format_reference("k", &entry(reference, 0));
    assert_eq!(formatted, "[k] K. Raw and U. Parsed. Some entry text. 1999.");
}

#[test]
fn test_format_caps_contexts_at_three() {
    let mapping = test_mapping();
    let found = lookup_citation(&mapping, Some("smith2020"), None, false).unwrap();
    let formatted = format_reference(&found.key, &found.entry);
    // 5 contexts attached: 3 shown, 2 summarized
    assert_eq!(formatted.matches("main.tex:").count(), 3);
    assert!(formatted.contains("... and 2 more citation(s)"));
}

#[test]
fn test_format_truncates_long_contexts() {
    let mut e = entry(reference("k", "A", "T", "V", "2000"), 0);
    e.citations.push(CitingContext {
        context: "x".repeat(250),
        file_name: "main.tex".to_string(),
        line_number: 1,
        command: "cite".to_string(),
    });
    let formatted = format_reference("k", &e);
    assert!(formatted.contains(&format!("{}...", "x".repeat(100))));
    assert!(!formatted.contains(&"x".repeat(101)));
}

// ============================================================================
// Bibliography Match Scorer
// ============================================================================

#[test]
fn test_scorer_year_plus_two_surnames() {
    let reference = reference(
        "smith2020",
        "John Smith and Jane Doe",
        "Resolving Citations in Scholarly Documents",
        "NeurIPS",
        "2020",
    );
    // Year (+3) and two author surname tokens (+2 each), no key, no venue,
    // no title words
    let score = score_reference_match("Smith, Doe, 2020", &reference, "smith2020");
    assert_eq!(score, 7);
    assert!(score > CONFIDENT_SCORE);
}

#[test]
fn test_scorer_literal_key_bonus() {
    let reference = reference("smith2020", "", "", "", "");
    let score = score_reference_match("as given in smith2020 above", &reference, "smith2020");
    assert_eq!(score, 5);
}

#[test]
fn test_scorer_title_words_capped_at_five() {
    let reference = reference(
        "k",
        "",
        "Alpha Beta Gamma Delta Epsilon Zeta Theta",
        "",
        "",
    );
    let text = "alpha beta gamma delta epsilon zeta theta";
    // Only the first five significant title words count
    assert_eq!(score_reference_match(text, &reference, "k"), 5);
}

#[test]
fn test_scorer_below_threshold_is_not_confident() {
    let reference = reference("k", "Quixote Zanzibar", "Unrelated Topic Entirely", "VLDB", "1987");
    let score = score_reference_match("completely different text", &reference, "k");
    assert!(score <= CONFIDENT_SCORE, "score was {}", score);
}

#[test]
fn test_find_best_reference_picks_highest() {
    let mapping = test_mapping();
    let (key, _, score) =
        find_best_reference("Smith and Doe, resolving citations, 2020", &mapping).unwrap();
    assert_eq!(key, "smith2020");
    assert!(score > CONFIDENT_SCORE);
}

#[test]
fn test_find_best_reference_rejects_weak_matches() {
    let mapping = test_mapping();
    assert!(find_best_reference("nothing relevant here", &mapping).is_none());
}

// ============================================================================
// Influence Summary
// ============================================================================

#[test]
fn test_citation_summary_ranks_by_count() {
    let mapping = test_mapping();
    let summary = citation_summary(&mapping);
    assert_eq!(summary.total_entries, 3);
    assert_eq!(summary.total_citations, 6);
    assert!((summary.influence_score - 2.0).abs() < 1e-9);
    assert_eq!(summary.most_cited[0].key, "smith2020");
    assert_eq!(summary.most_cited[0].citation_count, 5);
}

#[test]
fn test_citation_summary_empty_mapping() {
    let summary = citation_summary(&CitationMapping::default());
    assert_eq!(summary.total_entries, 0);
    assert_eq!(summary.influence_score, 0.0);
    assert!(summary.most_cited.is_empty());
}
