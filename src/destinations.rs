//! Destination resolution: link target -> (page number, anchor y).
//!
//! Named destinations are resolved through the document's name table once,
//! at this boundary; everything downstream works from the uniform `Anchor`.
//! Failures carry the raw destination payload for diagnostics and are never
//! silently coerced to page 1.

use crate::document::DocumentProvider;
use crate::models::{Anchor, Destination, PageRef, PositionalDestination};
use crate::ResolutionError;
use tracing::debug;

/// Display-mode tag whose optional y slot carries an explicit coordinate.
const XYZ_MODE: &str = "XYZ";

/// Resolve a destination to a concrete anchor.
///
/// A named destination absent from the name table, or a page reference that
/// cannot be converted, is a terminal error; the caller surfaces it and does
/// not retry.
pub fn resolve_destination(
    dest: &Destination,
    doc: &dyn DocumentProvider,
) -> Result<Anchor, ResolutionError> {
    match dest {
        Destination::Named(name) => {
            debug!(%name, "looking up named destination");
            let positional = doc
                .destination(name)
                .ok_or_else(|| ResolutionError::UnresolvedDestination {
                    payload: name.clone(),
                })?;
            resolve_positional(positional, doc)
        }
        Destination::Positional(positional) => resolve_positional(positional, doc),
    }
}

fn resolve_positional(
    dest: &PositionalDestination,
    doc: &dyn DocumentProvider,
) -> Result<Anchor, ResolutionError> {
    let page_number = match &dest.page {
        PageRef::Object { .. } => {
            // Destinations are 0-based, presentation is 1-based
            let index =
                doc.page_index(&dest.page)
                    .ok_or_else(|| ResolutionError::UnresolvedDestination {
                        payload: payload_of(dest),
                    })?;
            (index + 1) as u32
        }
        PageRef::Number(n) => *n,
    };

    if page_number == 0 || page_number as usize > doc.page_count() {
        return Err(ResolutionError::PageOutOfRange {
            page: page_number,
            payload: payload_of(dest),
        });
    }

    // Only an XYZ destination carries a usable anchor coordinate; everything
    // else degrades to whole-page heuristics downstream.
    let y = if dest.display_mode == XYZ_MODE {
        dest.y
    } else {
        None
    };

    debug!(page_number, anchor_y = ?y, "destination resolved");
    Ok(Anchor { page_number, y })
}

fn payload_of(dest: &PositionalDestination) -> String {
    serde_json::to_string(dest).unwrap_or_else(|_| format!("{:?}", dest))
}

// ============================================================================
// Tests
// ============================================================================
