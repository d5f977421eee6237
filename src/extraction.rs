//! Heuristic reference extraction over a page's positioned fragments.
//!
//! Given an anchor coordinate, produce the best-guess bibliography entry
//! text. Every stage is best-effort: the anchor band scan degrades to the
//! numbered-marker fallback, then to whole-page line reconstruction, and
//! bottoms out at a fixed sentinel string. Nothing here returns an error.

use crate::fragments::{reconstruct_lines, FragmentIndex, LINE_BAND_TOLERANCE};
use crate::models::{ReferenceCandidate, TextFragment};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Returned when every strategy fails; the presentation layer must always
/// receive something.
pub const EXTRACTION_SENTINEL: &str = "Could not extract reference text from this page.";

/// A block below the anchor is only accepted past this length; shorter
/// blocks fall through to the numbered-reference fallback.
const MIN_ACCEPTED_LEN: usize = 20;

/// Cap on anchor-block accumulation.
const BLOCK_CHAR_LIMIT: usize = 800;

/// Numbered-marker candidates must start within this distance of the anchor.
const MARKER_ANCHOR_RADIUS: f64 = 50.0;

/// Accumulation for a numbered candidate stops at this vertical jump.
const MARKER_VERTICAL_JUMP: f64 = 100.0;

/// At most this many fragments are folded into one numbered candidate.
const MARKER_FRAGMENT_SPAN: usize = 50;

/// Cap on numbered-candidate accumulation.
const MARKER_CHAR_LIMIT: usize = 1000;

/// Continuation scans at most this many fragments at the top of the next page.
const CONTINUATION_SCAN_LIMIT: usize = 20;

/// Continuation stops once this much text has accumulated.
const CONTINUATION_CHAR_LIMIT: usize = 500;

// A fragment that opens a new bibliography entry: "[12]", "3.", "(7)".
static NEW_ENTRY_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:\[\d+\]|\d+\.|\(\d+\))").unwrap());

// DOI presence marks an entry as complete.
static DOI_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bdoi\b|10\.\d{4,}/").unwrap());

// DOI or URL inside continuation text ends the entry.
static DOI_OR_URL_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bdoi\b|10\.\d{4,}/|https?://").unwrap());

/// Which strategy produced the extracted text; callers map this to a
/// confidence for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    /// Anchor band scan below the destination coordinate.
    AnchorBlock,
    /// Anchor block completed with next-page continuation.
    AnchorBlockContinued,
    /// Numbered-marker fallback.
    NumberedMarker,
    /// Whole-page line reconstruction.
    PageLine,
    /// Everything failed; the text is the sentinel string.
    Sentinel,
}

#[derive(Debug, Clone)]
pub struct HeuristicExtraction {
    pub text: String,
    pub method: ExtractionMethod,
}

/// Extract the reference entry nearest the anchor.
///
/// `citing_surname` is the author surname found near the click point on the
/// citing page, used to disambiguate candidates. `next_page` supplies the
/// following page's fragments for cross-page continuation.
pub fn extract_reference_at(
    anchor_y: Option<f64>,
    page: &FragmentIndex,
    citing_surname: Option<&str>,
    next_page: Option<&[TextFragment]>,
) -> HeuristicExtraction {
    if let Some(anchor_y) = anchor_y {
        if let Some(block) = extract_block_below(anchor_y, page) {
            let mut text = block;
            let mut continued = false;

            if text.len() > MIN_ACCEPTED_LEN && !is_complete_entry(&text) {
                if let Some(next) = next_page {
                    if let Some(joined) = continue_on_next_page(&text, next) {
                        debug!(len = joined.len(), "accepted cross-page continuation");
                        text = joined;
                        continued = true;
                    }
                }
            }

            if text.trim().len() > MIN_ACCEPTED_LEN {
                return HeuristicExtraction {
                    text: text.trim().to_string(),
                    method: if continued {
                        ExtractionMethod::AnchorBlockContinued
                    } else {
                        ExtractionMethod::AnchorBlock
                    },
                };
            }
            debug!(len = text.trim().len(), "anchor block too short, falling back");
        }
    }

    let candidates = numbered_candidates(anchor_y, page.fragments());
    if let Some(best) = select_candidate(candidates, citing_surname) {
        return HeuristicExtraction {
            text: best,
            method: ExtractionMethod::NumberedMarker,
        };
    }

    if let Some(line) = best_line_on_page(page.fragments(), citing_surname) {
        return HeuristicExtraction {
            text: line,
            method: ExtractionMethod::PageLine,
        };
    }

    HeuristicExtraction {
        text: EXTRACTION_SENTINEL.to_string(),
        method: ExtractionMethod::Sentinel,
    }
}

// ============================================================================
// Anchor Band Scan
// ============================================================================

/// Accumulate the block starting at the first fragment strictly below the
/// anchor (smaller y in bottom-origin coordinates). Tracks the running
/// average inter-line spacing and stops at the first gap exceeding twice
/// that average, which tolerates varying line heights across documents.
fn extract_block_below(anchor_y: f64, page: &FragmentIndex) -> Option<String> {
    let ordered: Vec<&TextFragment> = page.by_descending_y().collect();
    let start = ordered.iter().position(|f| f.y < anchor_y)?;

    let mut text = ordered[start].text.clone();
    let mut prev_y = ordered[start].y;
    let mut gap_sum = 0.0_f64;
    let mut gap_count = 0_u32;

    for fragment in &ordered[start + 1..] {
        let gap = prev_y - fragment.y;
        // Gaps below a unit are same-line jitter, not line breaks
        if gap > 1.0 {
            if gap_count > 0 && gap > 2.0 * (gap_sum / gap_count as f64) {
                break;
            }
            gap_sum += gap;
            gap_count += 1;
        }

        text.push(' ');
        text.push_str(&fragment.text);
        prev_y = fragment.y;

        if text.len() > BLOCK_CHAR_LIMIT {
            break;
        }
    }

    Some(text.trim().to_string())
}

/// A block is complete if it ends in sentence-final punctuation or carries a
/// DOI marker.
fn is_complete_entry(text: &str) -> bool {
    let trimmed = text.trim_end();
    trimmed.ends_with('.') || trimmed.ends_with('!') || trimmed.ends_with('?')
        || DOI_MARKER.is_match(trimmed)
}

// ============================================================================
// Cross-Page Continuation
// ============================================================================

/// Try to complete a block cut off at the page boundary with text from the
/// top of the next page. The stitched result is accepted only when the
/// combined text carries a DOI/arXiv/abs marker; without that gate an
/// unrelated next entry would routinely be glued onto the current one.
fn continue_on_next_page(block: &str, next_page: &[TextFragment]) -> Option<String> {
    let mut ordered: Vec<&TextFragment> = next_page.iter().collect();
    ordered.sort_by(|a, b| b.y.partial_cmp(&a.y).unwrap_or(std::cmp::Ordering::Equal));

    let mut accumulated = String::new();
    for fragment in ordered.iter().take(CONTINUATION_SCAN_LIMIT) {
        let text = fragment.text.trim();
        if text.is_empty() {
            continue;
        }
        // Page-number-like tokens at the top of the page
        if text.len() < 3 && text.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if NEW_ENTRY_MARKER.is_match(text) {
            break;
        }
        // Terminal punctuation followed by an uppercase start means the
        // entry ended and a new sentence-level unit began
        if !accumulated.is_empty()
            && accumulated.trim_end().ends_with('.')
            && text.chars().next().is_some_and(|c| c.is_uppercase())
        {
            break;
        }

        if !accumulated.is_empty() {
            accumulated.push(' ');
        }
        accumulated.push_str(text);

        if accumulated.len() > CONTINUATION_CHAR_LIMIT {
            break;
        }
        if DOI_OR_URL_MARKER.is_match(text) {
            break;
        }
    }

    let accumulated = accumulated.trim();
    if accumulated.is_empty() {
        return None;
    }

    let combined = format!("{} {}", block.trim(), accumulated);
    let lower = combined.to_lowercase();
    if DOI_MARKER.is_match(&combined) || lower.contains("arxiv") || lower.contains("abs/") {
        Some(combined)
    } else {
        debug!("continuation rejected by sanity gate");
        None
    }
}

// ============================================================================
// Numbered-Reference Fallback
// ============================================================================

/// Collect candidate entries opened by a numbered marker near the anchor.
/// Without an anchor coordinate every marker on the page qualifies.
fn numbered_candidates(anchor_y: Option<f64>, fragments: &[TextFragment]) -> Vec<ReferenceCandidate> {
    let mut candidates = Vec::new();

    for (i, fragment) in fragments.iter().enumerate() {
        if !NEW_ENTRY_MARKER.is_match(&fragment.text) {
            continue;
        }
        let near_anchor = anchor_y.map_or(true, |y| (fragment.y - y).abs() < MARKER_ANCHOR_RADIUS);
        if !near_anchor {
            continue;
        }

        let mut full = fragment.text.clone();
        let span_end = (i + 1 + MARKER_FRAGMENT_SPAN).min(fragments.len());
        for next in &fragments[i + 1..span_end] {
            if NEW_ENTRY_MARKER.is_match(&next.text) {
                break;
            }
            if let Some(y) = anchor_y {
                if (next.y - y).abs() > MARKER_VERTICAL_JUMP {
                    break;
                }
            }
            full.push(' ');
            full.push_str(&next.text);
            if full.len() > MARKER_CHAR_LIMIT {
                break;
            }
        }

        candidates.push(ReferenceCandidate {
            text: full.trim().to_string(),
            distance: anchor_y.map_or(0.0, |y| (fragment.y - y).abs()),
        });
    }

    candidates
}

/// Prefer the candidate containing the citing surname; otherwise take the
/// one closest to the anchor.
fn select_candidate(
    candidates: Vec<ReferenceCandidate>,
    citing_surname: Option<&str>,
) -> Option<String> {
    if candidates.is_empty() {
        return None;
    }

    if let Some(surname) = citing_surname {
        let needle = surname.to_lowercase();
        if let Some(hit) = candidates
            .iter()
            .find(|c| c.text.to_lowercase().contains(&needle))
        {
            return Some(hit.text.clone());
        }
    }

    candidates
        .into_iter()
        .min_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|c| c.text)
}

// ============================================================================
// Whole-Page Fallback
// ============================================================================

/// Reconstruct the page into lines, preferring one containing the citing
/// surname, else the single longest line.
fn best_line_on_page(fragments: &[TextFragment], citing_surname: Option<&str>) -> Option<String> {
    let lines = reconstruct_lines(fragments, LINE_BAND_TOLERANCE);
    if lines.is_empty() {
        return None;
    }

    if let Some(surname) = citing_surname {
        let needle = surname.to_lowercase();
        if let Some(line) = lines.iter().find(|l| l.to_lowercase().contains(&needle)) {
            return Some(line.clone());
        }
    }

    lines.into_iter().max_by_key(|l| l.len())
}

// ============================================================================
// Numbered Lookup Across Pages
// ============================================================================

/// Find the entry opened by `[n]`/`n.` on a page, for citation-number search
/// over the trailing pages of a document. Accumulates up to 30 following
/// fragments and stops at the next numbered marker.
pub fn find_reference_by_number(fragments: &[TextFragment], number: u32) -> Option<String> {
    let bracket = format!("[{}]", number);
    let dotted = format!("{}.", number);

    for (i, fragment) in fragments.iter().enumerate() {
        let text = fragment.text.trim();
        if text != bracket && text != dotted && !text.starts_with(&bracket) {
            continue;
        }

        let mut entry = String::new();
        for next in fragments.iter().skip(i + 1).take(30) {
            if NEW_ENTRY_MARKER.is_match(&next.text) {
                break;
            }
            if !entry.is_empty() {
                entry.push(' ');
            }
            entry.push_str(&next.text);
            if entry.len() > BLOCK_CHAR_LIMIT {
                break;
            }
        }

        let entry = entry.trim();
        if !entry.is_empty() {
            return Some(entry.to_string());
        }
    }

    None
}

#[cfg(test)]
#[path = "extraction_test.rs"]
mod extraction_test;
