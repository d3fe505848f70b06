//! Pattern specificity ordering.
//!
//! # Responsibilities
//! - Order registry collections so the middleware chain runs outer to inner
//! - Decide which of several matching terminal handlers wins a URL
//!
//! # Design Decisions
//! - Literal beats named capture beats rest capture, segment by segment
//! - A strict prefix is the outer scope and sorts first
//! - Deterministic: ties preserve insertion order (stable sorts only)
//!
//! This ordering silently decides which handler wins any given URL, so it
//! is the most carefully tested code in the crate.

use std::cmp::Ordering;

use super::{MatchPattern, Segment};

/// Rank of a single segment. Higher is more specific.
fn rank(segment: &Segment) -> u8 {
    match segment {
        Segment::Literal(_) => 2,
        Segment::Named(_) => 1,
        Segment::Rest(_) => 0,
    }
}

/// Compare two patterns for chain order: `Less` sorts (and therefore runs)
/// first.
///
/// Segments are compared left to right. At the first position where the
/// ranks differ, the more specific segment sorts first, so a literal route
/// preempts a `[param]` sibling. When one pattern is a strict prefix of the
/// other it is the outer scope and sorts first, which is what makes a
/// `_middleware` at `/admin` run before one at `/admin/signin`.
pub fn compare(a: &MatchPattern, b: &MatchPattern) -> Ordering {
    let (sa, sb) = (a.segments(), b.segments());
    let len = sa.len().max(sb.len());
    for i in 0..len {
        match (sa.get(i), sb.get(i)) {
            (None, None) => break,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let (rx, ry) = (rank(x), rank(y));
                if rx != ry {
                    // higher rank first
                    return ry.cmp(&rx);
                }
                if let (Segment::Literal(lx), Segment::Literal(ly)) = (x, y) {
                    if lx != ly {
                        // disjoint literals never both match one URL; order
                        // lexically for determinism
                        return lx.cmp(ly);
                    }
                }
            }
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(path: &str) -> MatchPattern {
        MatchPattern::from_route_path(path).unwrap()
    }

    #[test]
    fn literal_beats_named_capture() {
        assert_eq!(compare(&pattern("/a/b"), &pattern("/a/[id]")), Ordering::Less);
        assert_eq!(compare(&pattern("/a/[id]"), &pattern("/a/b")), Ordering::Greater);
    }

    #[test]
    fn named_capture_beats_rest_capture() {
        assert_eq!(
            compare(&pattern("/a/[id]"), &pattern("/a/[...rest]")),
            Ordering::Less
        );
    }

    #[test]
    fn strict_prefix_is_outer_scope() {
        assert_eq!(
            compare(&pattern("/admin/_middleware"), &pattern("/admin/signin")),
            Ordering::Less
        );
        assert_eq!(
            compare(&pattern("/_middleware"), &pattern("/admin/_middleware")),
            Ordering::Less
        );
    }

    #[test]
    fn identical_segment_lists_tie() {
        assert_eq!(
            compare(&pattern("/admin/_middleware"), &pattern("/admin")),
            Ordering::Equal
        );
    }

    #[test]
    fn sorted_middleware_runs_outer_to_inner() {
        let mut patterns = vec![
            pattern("/admin/signin"),
            pattern("/_middleware"),
            pattern("/admin/_middleware"),
        ];
        patterns.sort_by(compare);
        let rendered: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
        assert_eq!(rendered, vec!["/*", "/admin/*", "/admin/signin"]);
    }
}
