//! Content block detection: figures, tables, algorithms, equations, and
//! appendices near a destination.
//!
//! A destination that does not land on a bibliography entry may point at a
//! captioned content block instead. Detection scans the target page for
//! caption-like text, discarding pages that look like reference lists and
//! caption candidates that are really citations of the block ("see Figure 3").

use crate::models::{ContentBlock, ContentBlockType, TextFragment};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// A page shorter than this that carries `[n]` markers is treated as a
/// reference list. Tunable; the keyword check has known false positives on
/// prose pages that merely mention "references".
pub const REFERENCE_PAGE_SHORT_LIMIT: usize = 1000;

/// Caption text is capped at this length.
const CAPTION_CHAR_LIMIT: usize = 1000;

/// Fragments on the same line for the citation-vs-caption check.
const SAME_LINE_TOLERANCE: f64 = 20.0;

static BRACKET_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\d+\]").unwrap());

struct ContentPattern {
    block_type: ContentBlockType,
    keywords: &'static [&'static str],
    patterns: Vec<Regex>,
}

static CONTENT_PATTERNS: Lazy<Vec<ContentPattern>> = Lazy::new(|| {
    vec![
        ContentPattern {
            block_type: ContentBlockType::Figure,
            keywords: &["figure", "fig.", "fig "],
            patterns: vec![
                Regex::new(r"(?i)(?:Figure|Fig\.?)\s*(\d+)[:.]?\s*(.*)").unwrap(),
            ],
        },
        ContentPattern {
            block_type: ContentBlockType::Table,
            keywords: &["table", "tab."],
            patterns: vec![Regex::new(r"(?i)(?:Table|Tab\.?)\s*(\d+)[:.]?\s*(.*)").unwrap()],
        },
        ContentPattern {
            block_type: ContentBlockType::Algorithm,
            keywords: &["algorithm", "alg."],
            patterns: vec![
                Regex::new(r"(?i)(?:Algorithm|Alg\.?)\s*(\d+)[:.]?\s*(.*)").unwrap(),
            ],
        },
        ContentPattern {
            block_type: ContentBlockType::Equation,
            keywords: &["equation", "eq."],
            patterns: vec![
                Regex::new(r"(?i)(?:Equation|Eq\.?)\s*(\d+)[:.]?\s*(.*)").unwrap(),
            ],
        },
        ContentPattern {
            block_type: ContentBlockType::Appendix,
            keywords: &["appendix", "app."],
            patterns: vec![
                Regex::new(r"(?i)(?:Appendix|App\.?)\s*([A-Z])[:.]?\s*(.*)").unwrap(),
            ],
        },
    ]
});

// Phrases that mark a mention as a citation of the block, not its caption.
const CITATION_INDICATORS: &[&str] = &[
    "see figure", "see fig", "in figure", "in fig", "shown in figure", "shown in fig",
    "as shown", "as seen", "depicted in", "illustrated in", "presented in",
    "refer to", "according to", "based on", "from figure", "from fig",
    "see table", "in table", "shown in table", "from table",
    "see algorithm", "in algorithm", "see equation", "in equation",
    "see appendix", "in appendix", "see section", "in section",
];

/// Heuristic: does this page look like a citation/reference list (and so
/// should be excluded from content detection)?
pub fn looks_like_reference_page(fragments: &[TextFragment]) -> bool {
    let all_text: String = fragments
        .iter()
        .map(|f| f.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let lower = all_text.to_lowercase();

    lower.contains("reference")
        || lower.contains("bibliograph")
        || lower.contains("citation")
        || (BRACKET_MARKER.is_match(&all_text) && all_text.len() < REFERENCE_PAGE_SHORT_LIMIT)
}

/// Detect a captioned content block on the page.
pub fn detect_content_at(fragments: &[TextFragment], page_number: u32) -> Option<ContentBlock> {
    if looks_like_reference_page(fragments) {
        debug!(page_number, "page looks like a reference list, skipping content detection");
        return None;
    }

    for (i, fragment) in fragments.iter().enumerate() {
        let text = fragment.text.trim();
        let lower = text.to_lowercase();

        for definition in CONTENT_PATTERNS.iter() {
            if !definition.keywords.iter().any(|k| lower.contains(k)) {
                continue;
            }

            for pattern in &definition.patterns {
                let Some(caps) = pattern.captures(text) else {
                    continue;
                };
                let number = caps[1].to_string();

                if is_citation_not_caption(fragments, i, definition.block_type, &number) {
                    debug!(block_type = ?definition.block_type, %number, "mention is a citation, not a caption");
                    continue;
                }

                let lead = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
                return Some(ContentBlock {
                    block_type: definition.block_type,
                    number,
                    caption: assemble_caption(lead, fragments, i),
                    page_number,
                    area: None,
                });
            }
        }
    }

    None
}

/// Caption text: the matched remainder plus surrounding fragments, capped.
fn assemble_caption(lead: &str, fragments: &[TextFragment], index: usize) -> String {
    let start = index.saturating_sub(5);
    let end = (index + 16).min(fragments.len());

    let mut caption = lead.to_string();
    for (j, fragment) in fragments.iter().enumerate().take(end).skip(start) {
        if j == index {
            continue;
        }
        caption.push(' ');
        caption.push_str(&fragment.text);
    }

    let caption = caption.trim().to_string();
    if caption.len() > CAPTION_CHAR_LIMIT {
        let mut truncated: String = caption.chars().take(CAPTION_CHAR_LIMIT).collect();
        truncated.push_str("...");
        truncated
    } else {
        caption
    }
}

/// Distinguish a reference TO a block from the block's actual caption.
fn is_citation_not_caption(
    fragments: &[TextFragment],
    index: usize,
    block_type: ContentBlockType,
    number: &str,
) -> bool {
    let current_y = fragments[index].y;

    // Same-line/paragraph context around the mention
    let start = index.saturating_sub(10);
    let end = (index + 11).min(fragments.len());
    let mut context = String::new();
    for fragment in &fragments[start..end] {
        if (fragment.y - current_y).abs() <= SAME_LINE_TOLERANCE {
            context.push(' ');
            context.push_str(&fragment.text);
        }
    }
    let context = context.to_lowercase();

    for indicator in CITATION_INDICATORS {
        if context.contains(indicator) {
            return true;
        }
    }

    // Parenthetical mention, e.g. "(cf. Figure 3)"
    let type_word = match block_type {
        ContentBlockType::Figure => "fig",
        ContentBlockType::Table => "table",
        ContentBlockType::Algorithm => "algorithm",
        ContentBlockType::Equation => "equation",
        ContentBlockType::Appendix => "appendix",
    };
    if let Ok(parenthetical) =
        Regex::new(&format!(r"(?i)\(.*{}.*{}.*\)", type_word, regex::escape(number)))
    {
        if parenthetical.is_match(&context) {
            return true;
        }
    }

    // Substantial text before the mention on the same line means it appears
    // mid-sentence; captions start their line
    let mut before = String::new();
    for fragment in &fragments[index.saturating_sub(5)..index] {
        if (fragment.y - current_y).abs() <= 10.0 {
            before.push(' ');
            before.push_str(&fragment.text);
        }
    }
    let before = before.trim();
    if before.len() > 20 && !before.ends_with('.') && !before.ends_with(':') {
        return true;
    }

    false
}

// ============================================================================
// Tests
// ============================================================================
