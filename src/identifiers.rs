//! arXiv and DOI identifier extraction.
//!
//! Raw bibliography entries often contain several numeric-looking tokens, so
//! the arXiv patterns are kept as an ordered table evaluated most-specific
//! first; the first match wins. The same field priority applies across a
//! structured reference: explicit id, raw entry, url, then DOI.

use crate::models::StructuredReference;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

const ARXIV_ID: &str = r"([0-9]{4}\.[0-9]{4,5}(?:v\d+)?)";

// Ordered most-specific first; the bare-token form must stay last.
static ARXIV_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        format!(r"(?i)arXiv[:\s]*{}", ARXIV_ID),
        format!(r"(?i)abs/{}", ARXIV_ID),
        format!(r"(?i)arxiv\.org/abs/{}", ARXIV_ID),
        format!(r"(?i)ARXIV\.{}", ARXIV_ID),
        format!(r"(?i)\\href\s*\{{\s*https?://arxiv\.org/abs/{}", ARXIV_ID),
        format!(r"\b{}\b", ARXIV_ID),
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static ARXIV_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)arxiv\.org/(?:abs|pdf)/{}", ARXIV_ID)).unwrap());

static ARXIV_DOI: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)ARXIV\.{}", ARXIV_ID)).unwrap());

static DOI_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"(?:doi\.org|dx\.doi\.org)/(10\.\d{4,}/[^\s\]"'<>]+)"#,
        r#"(?i)\bdoi[:\s]+(10\.\d{4,}/[^\s,]+)"#,
        r#"\b(10\.\d{4,}/[^\s\]"'<>]+)"#,
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static BARE_ARXIV_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^{}$", ARXIV_ID)).unwrap());

static BARE_DOI: Lazy<Regex> = Lazy::new(|| Regex::new(r"^10\.\d{4,}/\S+$").unwrap());

/// A resolved external identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Arxiv(String),
    Doi(String),
}

/// Run the arXiv pattern table over free text; first match wins.
pub fn extract_arxiv_id_from_text(text: &str) -> Option<String> {
    for pattern in ARXIV_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(text) {
            return Some(caps[1].to_string());
        }
    }
    None
}

/// Extract the arXiv id of a structured reference.
///
/// Priority: the explicit id field, then the raw entry via the pattern
/// table, then the url field, then an arXiv-form DOI. The order matters and
/// must not be rearranged.
pub fn extract_arxiv_id(reference: &StructuredReference) -> Option<String> {
    if let Some(id) = StructuredReference::field(&reference.arxiv_id) {
        return Some(id.to_string());
    }

    if let Some(raw) = StructuredReference::field(&reference.raw_entry) {
        if let Some(id) = extract_arxiv_id_from_text(raw) {
            return Some(id);
        }
    }

    if let Some(url) = StructuredReference::field(&reference.url) {
        if let Some(caps) = ARXIV_URL.captures(url) {
            return Some(caps[1].to_string());
        }
    }

    if let Some(doi) = StructuredReference::field(&reference.doi) {
        if let Some(caps) = ARXIV_DOI.captures(doi) {
            return Some(caps[1].to_string());
        }
    }

    None
}

/// Extract a DOI from free text, trimming trailing punctuation.
pub fn extract_doi(text: &str) -> Option<String> {
    for pattern in DOI_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(text) {
            let doi = caps[1].trim_end_matches(['.', ',', ';']);
            return Some(doi.to_string());
        }
    }
    None
}

/// Identify an external link target directly from its URL.
pub fn extract_identifier_from_url(url: &str) -> Option<Identifier> {
    let parsed = Url::parse(url).ok()?;
    let text = parsed.as_str();

    if let Some(caps) = ARXIV_URL.captures(text) {
        return Some(Identifier::Arxiv(caps[1].to_string()));
    }
    if let Some(host) = parsed.host_str() {
        if host == "doi.org" || host == "dx.doi.org" {
            let doi = parsed.path().trim_start_matches('/');
            if !doi.is_empty() {
                return Some(Identifier::Doi(doi.to_string()));
            }
        }
    }
    extract_doi(text).map(Identifier::Doi)
}

/// Classify a bare identifier string, for the enrichment endpoint.
pub fn classify_identifier(raw: &str) -> Option<Identifier> {
    let raw = raw.trim();
    if BARE_ARXIV_ID.is_match(raw) {
        return Some(Identifier::Arxiv(raw.to_string()));
    }
    if BARE_DOI.is_match(raw) {
        return Some(Identifier::Doi(raw.to_string()));
    }
    if let Some(id) = extract_arxiv_id_from_text(raw) {
        return Some(Identifier::Arxiv(id));
    }
    extract_doi(raw).map(Identifier::Doi)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_with(
        arxiv_id: &str,
        raw_entry: &str,
        url: &str,
        doi: &str,
    ) -> StructuredReference {
        StructuredReference {
            key: "k".to_string(),
            arxiv_id: arxiv_id.to_string(),
            raw_entry: raw_entry.to_string(),
            url: url.to_string(),
            doi: doi.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_abs_url_in_raw_entry() {
        let reference =
            reference_with("", "See https://arxiv.org/abs/2301.01234 for details", "", "");
        assert_eq!(extract_arxiv_id(&reference).as_deref(), Some("2301.01234"));
    }

    #[test]
    fn test_explicit_field_wins_over_raw_entry() {
        let reference = reference_with("1111.22222", "arXiv:9999.88888", "", "");
        assert_eq!(extract_arxiv_id(&reference).as_deref(), Some("1111.22222"));
    }

    #[test]
    fn test_arxiv_prefix_beats_bare_token() {
        // The bare token 2020.12345 appears first, but the arXiv: form is
        // more specific and must win
        let reference = reference_with("", "2020.12345 something arXiv:1703.04977", "", "");
        assert_eq!(extract_arxiv_id(&reference).as_deref(), Some("1703.04977"));
    }

    #[test]
    fn test_versioned_id() {
        let reference = reference_with("", "arXiv:2106.04560v2", "", "");
        assert_eq!(extract_arxiv_id(&reference).as_deref(), Some("2106.04560v2"));
    }

    #[test]
    fn test_latex_href_wrapper() {
        let reference = reference_with(
            "",
            r"\href{https://arxiv.org/abs/1810.04805}{BERT: Pre-training}",
            "",
            "",
        );
        assert_eq!(extract_arxiv_id(&reference).as_deref(), Some("1810.04805"));
    }

    #[test]
    fn test_url_field_fallback() {
        let reference = reference_with("", "no id here", "https://arxiv.org/pdf/1412.6980", "");
        assert_eq!(extract_arxiv_id(&reference).as_deref(), Some("1412.6980"));
    }

    #[test]
    fn test_doi_field_fallback() {
        let reference = reference_with("", "no id here", "", "10.48550/ARXIV.2203.02155");
        assert_eq!(extract_arxiv_id(&reference).as_deref(), Some("2203.02155"));
    }

    #[test]
    fn test_no_identifier_anywhere() {
        let reference = reference_with("", "Smith, J. A paper without identifiers. 2020.", "", "");
        assert_eq!(extract_arxiv_id(&reference), None);
    }

    #[test]
    fn test_extract_doi_variants() {
        assert_eq!(
            extract_doi("https://doi.org/10.1145/1480881.1480915").as_deref(),
            Some("10.1145/1480881.1480915")
        );
        assert_eq!(
            extract_doi("doi: 10.1007/s00357-019-9312-3.").as_deref(),
            Some("10.1007/s00357-019-9312-3")
        );
        assert_eq!(extract_doi("no doi present"), None);
    }

    #[test]
    fn test_identifier_from_url() {
        assert_eq!(
            extract_identifier_from_url("https://arxiv.org/abs/2301.01234"),
            Some(Identifier::Arxiv("2301.01234".to_string()))
        );
        assert_eq!(
            extract_identifier_from_url("https://doi.org/10.1145/3133956"),
            Some(Identifier::Doi("10.1145/3133956".to_string()))
        );
        assert_eq!(extract_identifier_from_url("not a url"), None);
        assert_eq!(
            extract_identifier_from_url("https://example.com/paper.html"),
            None
        );
    }

    #[test]
    fn test_classify_identifier() {
        assert_eq!(
            classify_identifier("2301.01234"),
            Some(Identifier::Arxiv("2301.01234".to_string()))
        );
        assert_eq!(
            classify_identifier("10.1145/3133956.3134043"),
            Some(Identifier::Doi("10.1145/3133956.3134043".to_string()))
        );
        assert_eq!(classify_identifier("smith2020"), None);
    }
}
