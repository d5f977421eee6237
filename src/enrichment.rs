//! Metadata enrichment from external providers.
//!
//! Strictly a follow-up stage: enrichment runs only after a reference has
//! been resolved, never blocks or fails the primary result, and every
//! failure (non-OK response, parse failure, timeout) collapses to `None`.

use crate::identifiers::Identifier;
use crate::models::PaperMetadata;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetch title/authors/abstract/year for a resolved identifier.
pub async fn fetch_metadata(identifier: &Identifier) -> Option<PaperMetadata> {
    match identifier {
        Identifier::Arxiv(id) => fetch_arxiv_metadata(id).await,
        Identifier::Doi(doi) => fetch_crossref_metadata(doi).await,
    }
}

/// Query the arXiv export API for one paper.
pub async fn fetch_arxiv_metadata(arxiv_id: &str) -> Option<PaperMetadata> {
    let url = format!("https://export.arxiv.org/api/query?id_list={}", arxiv_id);

    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .ok()?;

    let response = client.get(&url).send().await.ok()?;
    let text = response.text().await.ok()?;

    // The feed carries its own <title> ("arXiv Query: ..."); the paper's
    // fields live inside <entry>
    let entry = extract_xml_tag(&text, "entry")?;

    let title = extract_xml_tag(&entry, "title")
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty() && !t.starts_with("Error"))?;

    let authors: Vec<String> = extract_all_xml_tags(&entry, "name")
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let abstract_text = extract_xml_tag(&entry, "summary")
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default();

    let year = extract_xml_tag(&entry, "published")
        .and_then(|p| p.get(..4).and_then(|y| y.parse().ok()));

    Some(PaperMetadata {
        title,
        authors,
        abstract_text,
        year,
        source: "arxiv".to_string(),
    })
}

/// Query Crossref for a DOI.
pub async fn fetch_crossref_metadata(doi: &str) -> Option<PaperMetadata> {
    let url = format!(
        "https://api.crossref.org/works/{}",
        urlencoding::encode(doi)
    );

    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .ok()?;

    let response = client
        .get(&url)
        .header("User-Agent", "citelens/0.1 (mailto:user@example.com)")
        .send()
        .await
        .ok()?;

    let json: serde_json::Value = response.json().await.ok()?;
    let message = json.get("message")?;

    let title = message
        .get("title")
        .and_then(|t| t.as_array())
        .and_then(|a| a.first())
        .and_then(|t| t.as_str())
        .map(|s| s.to_string())?;

    let authors: Vec<String> = message
        .get("author")
        .and_then(|a| a.as_array())
        .map(|authors| {
            authors
                .iter()
                .filter_map(|a| {
                    let given = a.get("given").and_then(|g| g.as_str()).unwrap_or("");
                    let family = a.get("family").and_then(|f| f.as_str()).unwrap_or("");
                    if family.is_empty() {
                        None
                    } else {
                        Some(format!("{} {}", given, family).trim().to_string())
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let year = message
        .get("published")
        .or_else(|| message.get("published-print"))
        .or_else(|| message.get("published-online"))
        .and_then(|p| p.get("date-parts"))
        .and_then(|d| d.as_array())
        .and_then(|a| a.first())
        .and_then(|a| a.as_array())
        .and_then(|a| a.first())
        .and_then(|y| y.as_i64())
        .map(|y| y as i32);

    debug!(doi, "crossref lookup succeeded");
    Some(PaperMetadata {
        title,
        authors,
        abstract_text: String::new(),
        year,
        source: "crossref".to_string(),
    })
}

// ============================================================================
// XML Helpers
// ============================================================================

fn extract_xml_tag(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);

    let start = xml.find(&open)?;
    let content_start = start + xml[start..].find('>')? + 1;
    let end = content_start + xml[content_start..].find(&close)?;
    Some(xml[content_start..end].to_string())
}

fn extract_all_xml_tags(xml: &str, tag: &str) -> Vec<String> {
    let close = format!("</{}>", tag);
    let mut results = Vec::new();
    let mut offset = 0;

    while let Some(content) = extract_xml_tag(&xml[offset..], tag) {
        let advance = xml[offset..]
            .find(&close)
            .map(|i| i + close.len())
            .unwrap_or(xml.len() - offset);
        offset += advance;
        results.push(content);
        if offset >= xml.len() {
            break;
        }
    }

    results
}

// ============================================================================
// Tests
// ============================================================================
