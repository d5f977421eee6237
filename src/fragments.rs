//! Coordinate text index over one page's fragments.
//!
//! Supports the positional queries the extraction heuristics need: fragments
//! within a radius of a point, fragments in a horizontal band around a y
//! coordinate, a stable top-of-page-first ordering, and line reconstruction.
//! Fragments are never mutated; the index holds its own copy built once per
//! page when a document is registered.

use crate::models::TextFragment;

/// Band tolerance for grouping fragments onto the same line when scanning
/// for an author surname around a click point.
pub const AUTHOR_BAND_TOLERANCE: f64 = 10.0;

/// Band tolerance for generic line reconstruction.
pub const LINE_BAND_TOLERANCE: f64 = 15.0;

pub struct FragmentIndex {
    fragments: Vec<TextFragment>,
    /// Fragment indices sorted by descending y (top of page first), stable
    /// within a line so reading order is preserved.
    by_y: Vec<usize>,
}

impl FragmentIndex {
    pub fn build(fragments: Vec<TextFragment>) -> Self {
        let mut by_y: Vec<usize> = (0..fragments.len()).collect();
        by_y.sort_by(|&a, &b| {
            fragments[b]
                .y
                .partial_cmp(&fragments[a].y)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Self { fragments, by_y }
    }

    /// The page's fragments in their original (reading) order.
    pub fn fragments(&self) -> &[TextFragment] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Fragments within Euclidean distance `radius` of `(x, y)`.
    pub fn within_radius(&self, x: f64, y: f64, radius: f64) -> Vec<&TextFragment> {
        self.fragments
            .iter()
            .filter(|f| {
                let dx = f.x - x;
                let dy = f.y - y;
                (dx * dx + dy * dy).sqrt() <= radius
            })
            .collect()
    }

    /// Fragments whose y lies within `tolerance` of `y`, in reading order.
    pub fn band(&self, y: f64, tolerance: f64) -> Vec<&TextFragment> {
        self.fragments
            .iter()
            .filter(|f| (f.y - y).abs() <= tolerance)
            .collect()
    }

    /// Fragments sorted by descending y: top of the page first.
    pub fn by_descending_y(&self) -> impl Iterator<Item = &TextFragment> {
        self.by_y.iter().map(move |&i| &self.fragments[i])
    }

    /// Reconstruct the page into lines: consecutive fragments whose y differs
    /// by at most `tolerance` join the current line, a larger jump starts a
    /// new one. Works over reading order, matching how the rendering layer
    /// emits fragments.
    pub fn reconstruct_lines(&self, tolerance: f64) -> Vec<String> {
        reconstruct_lines(&self.fragments, tolerance)
    }
}

/// Line reconstruction over a raw fragment slice, for callers that hold
/// fragments without an index (e.g. the next-page continuation scan).
pub fn reconstruct_lines(fragments: &[TextFragment], tolerance: f64) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut last_y: Option<f64> = None;

    for fragment in fragments {
        match last_y {
            Some(prev) if (fragment.y - prev).abs() > tolerance => {
                if !current.trim().is_empty() {
                    lines.push(current.trim().to_string());
                }
                current = fragment.text.clone();
            }
            _ => {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(&fragment.text);
            }
        }
        last_y = Some(fragment.y);
    }

    if !current.trim().is_empty() {
        lines.push(current.trim().to_string());
    }
    lines
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_page() -> Vec<TextFragment> {
        vec![
            TextFragment::new("Header", 100.0, 700.0),
            TextFragment::new("First line,", 50.0, 500.0),
            TextFragment::new("continued.", 120.0, 498.0),
            TextFragment::new("Second line.", 50.0, 480.0),
            TextFragment::new("Footer", 100.0, 40.0),
        ]
    }

    #[test]
    fn test_band_picks_same_line() {
        let index = FragmentIndex::build(sample_page());
        let band = index.band(500.0, AUTHOR_BAND_TOLERANCE);
        let texts: Vec<&str> = band.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec!["First line,", "continued."]);
    }

    #[test]
    fn test_within_radius_is_euclidean() {
        let index = FragmentIndex::build(sample_page());
        // (50, 500) to (120, 498) is ~70 units apart
        let near = index.within_radius(50.0, 500.0, 75.0);
        assert!(near.iter().any(|f| f.text == "continued."));
        let tight = index.within_radius(50.0, 500.0, 30.0);
        assert!(!tight.iter().any(|f| f.text == "continued."));
    }

    #[test]
    fn test_descending_y_starts_at_top() {
        let index = FragmentIndex::build(sample_page());
        let first = index.by_descending_y().next().unwrap();
        assert_eq!(first.text, "Header");
        let ys: Vec<f64> = index.by_descending_y().map(|f| f.y).collect();
        let mut sorted = ys.clone();
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_eq!(ys, sorted);
    }

    #[test]
    fn test_reconstruct_lines_groups_by_tolerance() {
        let index = FragmentIndex::build(sample_page());
        let lines = index.reconstruct_lines(LINE_BAND_TOLERANCE);
        assert!(lines.contains(&"First line, continued.".to_string()));
        assert!(lines.contains(&"Second line.".to_string()));
        // Header and footer are far from everything else
        assert!(lines.contains(&"Header".to_string()));
    }

    #[test]
    fn test_empty_page() {
        let index = FragmentIndex::build(Vec::new());
        assert!(index.is_empty());
        assert!(index.reconstruct_lines(LINE_BAND_TOLERANCE).is_empty());
        assert!(index.band(100.0, 10.0).is_empty());
    }
}
