//! URL match patterns compiled from route-tree file paths.
//!
//! # Data Flow
//! ```text
//! routes/blog/[slug].md
//!     → strip extension (indexer)
//!     → MatchPattern::from_route_path("/blog/[slug]")
//!     → /blog/:slug
//!
//! routes/admin/_middleware.ts
//!     → MatchPattern::from_route_path("/admin/_middleware")
//!     → /admin/* (owns the directory and everything beneath it)
//! ```
//!
//! # Design Decisions
//! - Patterns are compiled once at indexing time, immutable afterwards
//! - Segment-wise matching, no regex in the request path
//! - Malformed bracket syntax fails indexing, never a live request

pub mod specificity;

use std::collections::HashMap;
use std::fmt;

use crate::error::PatternError;

/// Captured named segments for a matched URL, e.g. `{"id": "6448"}`.
/// A rest capture joins the remaining segments with `/`.
pub type Params = HashMap<String, String>;

/// One path segment of a compiled pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Matches exactly this text.
    Literal(String),
    /// `[name]`: matches any single segment, captured under `name`.
    Named(String),
    /// `[...name]`: matches the remainder of the path, captured under `name`.
    Rest(String),
}

/// A compiled path matcher with named capture groups.
///
/// `scope` marks the "owns everything below it" form used by
/// `_middleware`/`_data` files: the pattern matches its own path and any
/// deeper path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchPattern {
    segments: Vec<Segment>,
    scope: bool,
}

impl MatchPattern {
    /// The catch-all root pattern (`/*`), the default for middleware and
    /// data entries registered without one.
    pub fn root_scope() -> Self {
        Self { segments: Vec::new(), scope: true }
    }

    /// Compile a pattern from a route-tree file path with the extension
    /// already stripped, applying the filename conventions:
    ///
    /// - a trailing `index` segment is elided (`/about/index` → `/about`)
    /// - a trailing `_middleware` or `_data` segment widens the pattern to
    ///   the file's directory and everything beneath it
    /// - `[name]` becomes a named capture, `[...name]` a rest capture
    /// - duplicate slashes collapse, a single leading slash is enforced
    pub fn from_route_path(path: &str) -> Result<Self, PatternError> {
        let mut parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        let mut scope = false;
        match parts.last().copied() {
            Some("index") => {
                parts.pop();
            }
            Some("_middleware") | Some("_data") => {
                parts.pop();
                scope = true;
            }
            _ => {}
        }

        let mut segments = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let segment = compile_segment(part)?;
            if matches!(segment, Segment::Rest(_)) && i + 1 != parts.len() {
                return Err(PatternError::RestNotLast((*part).to_string()));
            }
            segments.push(segment);
        }
        Ok(Self { segments, scope })
    }

    /// Parse an explicit pattern override in display syntax, e.g.
    /// `/user/:id`, `/files/:path*` or `/admin/*`.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let mut parts: Vec<&str> = pattern.split('/').filter(|p| !p.is_empty()).collect();
        let scope = parts.last() == Some(&"*");
        if scope {
            parts.pop();
        }

        let mut segments = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let segment = if let Some(name) = part.strip_prefix(':') {
                if let Some(name) = name.strip_suffix('*') {
                    Segment::Rest(require_name(name, part)?)
                } else {
                    Segment::Named(require_name(name, part)?)
                }
            } else {
                compile_segment(part)?
            };
            if matches!(segment, Segment::Rest(_)) && i + 1 != parts.len() {
                return Err(PatternError::RestNotLast((*part).to_string()));
            }
            segments.push(segment);
        }
        Ok(Self { segments, scope })
    }

    /// Match a URL path, returning captured params on success.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        let mut params = Params::new();
        let mut i = 0;
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => {
                    if parts.get(i).copied() != Some(text.as_str()) {
                        return None;
                    }
                    i += 1;
                }
                Segment::Named(name) => {
                    let part = parts.get(i)?;
                    params.insert(name.clone(), (*part).to_string());
                    i += 1;
                }
                Segment::Rest(name) => {
                    params.insert(name.clone(), parts[i..].join("/"));
                    i = parts.len();
                }
            }
        }
        if i < parts.len() && !self.scope {
            return None;
        }
        Some(params)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_scope(&self) -> bool {
        self.scope
    }
}

impl fmt::Display for MatchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() && !self.scope {
            return write!(f, "/");
        }
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => write!(f, "/{text}")?,
                Segment::Named(name) => write!(f, "/:{name}")?,
                Segment::Rest(name) => write!(f, "/:{name}*")?,
            }
        }
        if self.scope {
            write!(f, "/*")?;
        }
        Ok(())
    }
}

fn compile_segment(part: &str) -> Result<Segment, PatternError> {
    if let Some(inner) = part.strip_prefix("[...") {
        let name = inner
            .strip_suffix(']')
            .ok_or_else(|| PatternError::UnterminatedBracket(part.to_string()))?;
        return Ok(Segment::Rest(require_name(name, part)?));
    }
    if let Some(inner) = part.strip_prefix('[') {
        let name = inner
            .strip_suffix(']')
            .ok_or_else(|| PatternError::UnterminatedBracket(part.to_string()))?;
        return Ok(Segment::Named(require_name(name, part)?));
    }
    if part.contains('[') || part.contains(']') {
        return Err(PatternError::UnterminatedBracket(part.to_string()));
    }
    Ok(Segment::Literal(part.to_string()))
}

fn require_name(name: &str, part: &str) -> Result<String, PatternError> {
    if name.is_empty() || name.contains('[') || name.contains(']') {
        return Err(PatternError::EmptyCaptureName(part.to_string()));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_segment_is_elided() {
        let pattern = MatchPattern::from_route_path("/about/index").unwrap();
        assert!(pattern.matches("/about").is_some());
        assert!(pattern.matches("/about/more").is_none());
        assert_eq!(pattern.to_string(), "/about");
    }

    #[test]
    fn middleware_owns_subtree() {
        let pattern = MatchPattern::from_route_path("/admin/_middleware").unwrap();
        assert!(pattern.matches("/admin").is_some());
        assert!(pattern.matches("/admin/signin").is_some());
        assert!(pattern.matches("/admin/deep/nested/path").is_some());
        assert!(pattern.matches("/blog").is_none());
    }

    #[test]
    fn root_middleware_matches_everything() {
        let pattern = MatchPattern::from_route_path("/_middleware").unwrap();
        assert!(pattern.matches("/").is_some());
        assert!(pattern.matches("/any/path").is_some());
    }

    #[test]
    fn named_capture_binds_one_segment() {
        let pattern = MatchPattern::from_route_path("/user/[id]").unwrap();
        let params = pattern.matches("/user/6448").unwrap();
        assert_eq!(params["id"], "6448");
        assert!(pattern.matches("/user").is_none());
        assert!(pattern.matches("/user/6448/profile").is_none());
    }

    #[test]
    fn rest_capture_binds_remaining_segments() {
        let pattern = MatchPattern::from_route_path("/docs/[...path]").unwrap();
        let params = pattern.matches("/docs/guide/install").unwrap();
        assert_eq!(params["path"], "guide/install");
        let params = pattern.matches("/docs").unwrap();
        assert_eq!(params["path"], "");
    }

    #[test]
    fn duplicate_slashes_collapse() {
        let pattern = MatchPattern::from_route_path("//blog///post").unwrap();
        assert!(pattern.matches("/blog/post").is_some());
    }

    #[test]
    fn unterminated_bracket_is_an_error() {
        assert!(matches!(
            MatchPattern::from_route_path("/user/[id"),
            Err(PatternError::UnterminatedBracket(_))
        ));
    }

    #[test]
    fn empty_capture_name_is_an_error() {
        assert!(matches!(
            MatchPattern::from_route_path("/user/[]"),
            Err(PatternError::EmptyCaptureName(_))
        ));
    }

    #[test]
    fn rest_must_be_final() {
        assert!(matches!(
            MatchPattern::from_route_path("/a/[...rest]/b"),
            Err(PatternError::RestNotLast(_))
        ));
    }

    #[test]
    fn explicit_pattern_round_trips() {
        let pattern = MatchPattern::parse("/user/:id").unwrap();
        assert_eq!(pattern.matches("/user/1").unwrap()["id"], "1");
        let scope = MatchPattern::parse("/admin/*").unwrap();
        assert!(scope.is_scope());
        assert!(scope.matches("/admin/anything").is_some());
    }
}
