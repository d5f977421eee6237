//! Citation marker pattern matching.
//!
//! Recognizes the bracketed/parenthetical citation markers that appear in
//! rendered text and expands them to the cited entry numbers. This path runs
//! only when the click point carries no live annotation link, i.e. for
//! scanned or flattened documents.

use once_cell::sync::Lazy;
use regex::Regex;

// The four recognized lexical forms. Ranges accept a hyphen or an en-dash.
static SINGLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[(\d+)\]$").unwrap());
static RANGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[(\d+)[-\u{2013}](\d+)\]$").unwrap());
static LIST: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[\d+(?:,\s*\d+)*\]$").unwrap());
static PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\((\d+)\)$").unwrap());
static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// True if the clicked text is a recognized citation marker.
pub fn is_citation_marker(text: &str) -> bool {
    let text = text.trim();
    SINGLE.is_match(text) || RANGE.is_match(text) || LIST.is_match(text) || PAREN.is_match(text)
}

/// Expand a citation marker to its entry numbers.
///
/// `[n]` and `(n)` yield one element, `[n-m]` the inclusive sequence `n..=m`,
/// and `[n1, n2, ...]` its literal members in order, duplicates preserved.
/// Anything else yields an empty vec; non-matching text is not an error.
pub fn expand_citation_numbers(text: &str) -> Vec<u32> {
    let text = text.trim();

    if let Some(caps) = SINGLE.captures(text) {
        return caps[1].parse().into_iter().collect();
    }

    if let Some(caps) = RANGE.captures(text) {
        if let (Ok(start), Ok(end)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) {
            return (start..=end).collect();
        }
        return Vec::new();
    }

    if LIST.is_match(text) {
        return NUMBER
            .find_iter(text)
            .filter_map(|m| m.as_str().parse().ok())
            .collect();
    }

    if let Some(caps) = PAREN.captures(text) {
        return caps[1].parse().into_iter().collect();
    }

    Vec::new()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_bracket() {
        assert_eq!(expand_citation_numbers("[5]"), vec![5]);
        assert_eq!(expand_citation_numbers("[12]"), vec![12]);
    }

    #[test]
    fn test_range_is_inclusive() {
        assert_eq!(expand_citation_numbers("[3-6]"), vec![3, 4, 5, 6]);
        // En-dash variant
        assert_eq!(expand_citation_numbers("[5\u{2013}7]"), vec![5, 6, 7]);
        // Degenerate range
        assert_eq!(expand_citation_numbers("[4-4]"), vec![4]);
    }

    #[test]
    fn test_reversed_range_is_empty() {
        assert_eq!(expand_citation_numbers("[6-3]"), Vec::<u32>::new());
    }

    #[test]
    fn test_list_preserves_order_and_duplicates() {
        assert_eq!(expand_citation_numbers("[1,3,5]"), vec![1, 3, 5]);
        assert_eq!(expand_citation_numbers("[9, 2, 2]"), vec![9, 2, 2]);
    }

    #[test]
    fn test_parenthetical() {
        assert_eq!(expand_citation_numbers("(7)"), vec![7]);
    }

    #[test]
    fn test_non_matching_yields_empty() {
        assert_eq!(expand_citation_numbers("see Section 3"), Vec::<u32>::new());
        assert_eq!(expand_citation_numbers("[a]"), Vec::<u32>::new());
        assert_eq!(expand_citation_numbers("[1; 2]"), Vec::<u32>::new());
        assert_eq!(expand_citation_numbers(""), Vec::<u32>::new());
    }

    #[test]
    fn test_marker_detection() {
        assert!(is_citation_marker("[1]"));
        assert!(is_citation_marker("[1-3]"));
        assert!(is_citation_marker("[1, 5, 9]"));
        assert!(is_citation_marker("(2)"));
        assert!(is_citation_marker("  [4]  "));
        assert!(!is_citation_marker("Figure 2"));
        assert!(!is_citation_marker("[1-3"));
    }
}
