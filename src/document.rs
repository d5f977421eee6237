//! Document access for one viewing session.
//!
//! The rendering layer registers a document's text map once (per-page
//! positioned fragments, the destination name table, and the page-object
//! index table); everything here is read-only for the rest of the session.
//! `DocumentProvider` is the seam the destination resolver works against, so
//! tests can substitute a stub document.

use crate::fragments::FragmentIndex;
use crate::models::{DocumentUpload, PageRef, PositionalDestination, TextFragment};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// The contract a document must satisfy for destination resolution:
/// a page count, a destination name table, and a page-object index lookup.
pub trait DocumentProvider: Send + Sync {
    fn page_count(&self) -> usize;
    fn destination(&self, name: &str) -> Option<&PositionalDestination>;
    /// 0-based page index for a page-object reference.
    fn page_index(&self, page_ref: &PageRef) -> Option<usize>;
}

/// A registered document: per-page fragment indexes plus the lookup tables,
/// with an optional citation mapping attached later by the source parser.
pub struct LoadedDocument {
    pub name: Option<String>,
    pub hash: String,
    pages: Vec<FragmentIndex>,
    destinations: HashMap<String, PositionalDestination>,
    page_refs: HashMap<u32, usize>,
    mapping: RwLock<Option<Arc<crate::models::CitationMapping>>>,
}

impl LoadedDocument {
    /// Build a document from an uploaded text map. Pages are indexed in
    /// parallel; the content hash covers every fragment so re-registration
    /// of an unchanged document produces the same id.
    pub fn from_upload(upload: DocumentUpload) -> Self {
        let hash = hash_pages(&upload.pages);
        let pages: Vec<FragmentIndex> = upload
            .pages
            .into_par_iter()
            .map(FragmentIndex::build)
            .collect();

        Self {
            name: upload.name,
            hash,
            pages,
            destinations: upload.destinations,
            page_refs: upload.page_refs,
            mapping: RwLock::new(None),
        }
    }

    /// Build a document from plain extracted text (the ingest fallback for
    /// flattened documents without a text map). Pages split on form feeds;
    /// each line becomes a synthetic fragment with a descending y so the
    /// line-based heuristics still work. No destinations are available.
    pub fn from_plain_text(name: Option<String>, text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let hash = format!("{:x}", hasher.finalize());

        let pages: Vec<FragmentIndex> = text
            .split('\x0c')
            .filter(|page| !page.trim().is_empty())
            .map(|page| {
                let fragments: Vec<TextFragment> = page
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .enumerate()
                    .map(|(i, line)| TextFragment::new(line.trim(), 72.0, 760.0 - i as f64 * 12.0))
                    .collect();
                FragmentIndex::build(fragments)
            })
            .collect();

        Self {
            name,
            hash,
            pages,
            destinations: HashMap::new(),
            page_refs: HashMap::new(),
            mapping: RwLock::new(None),
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Fragment index for a 1-based page number.
    pub fn fragment_index(&self, page_number: u32) -> Option<&FragmentIndex> {
        if page_number == 0 {
            return None;
        }
        self.pages.get(page_number as usize - 1)
    }

    /// Raw fragments for a 1-based page number, in reading order.
    pub fn page_fragments(&self, page_number: u32) -> Option<&[TextFragment]> {
        self.fragment_index(page_number).map(|p| p.fragments())
    }

    pub fn set_citation_mapping(&self, mapping: crate::models::CitationMapping) {
        *self.mapping.write().unwrap() = Some(Arc::new(mapping));
    }

    pub fn citation_mapping(&self) -> Option<Arc<crate::models::CitationMapping>> {
        self.mapping.read().unwrap().clone()
    }
}

impl DocumentProvider for LoadedDocument {
    fn page_count(&self) -> usize {
        LoadedDocument::page_count(self)
    }

    fn destination(&self, name: &str) -> Option<&PositionalDestination> {
        self.destinations.get(name)
    }

    fn page_index(&self, page_ref: &PageRef) -> Option<usize> {
        match page_ref {
            PageRef::Object { num, .. } => self.page_refs.get(num).copied(),
            PageRef::Number(n) => {
                if *n >= 1 && (*n as usize) <= self.pages.len() {
                    Some(*n as usize - 1)
                } else {
                    None
                }
            }
        }
    }
}

fn hash_pages(pages: &[Vec<TextFragment>]) -> String {
    let mut hasher = Sha256::new();
    for page in pages {
        for fragment in page {
            hasher.update(fragment.text.as_bytes());
            hasher.update(fragment.x.to_le_bytes());
            hasher.update(fragment.y.to_le_bytes());
        }
        hasher.update([0xff]);
    }
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// Tests
// ============================================================================
