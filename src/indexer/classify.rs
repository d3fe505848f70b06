//! File classification by filename convention.

/// What a routes-tree file contributes to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// `_middleware.*`: a pass-through handler scoped to its directory.
    Middleware,
    /// `_data.*`: a shared-data bag scoped to its directory.
    Data,
    /// `_NNN.*` where NNN is a 4xx/5xx status: an error page.
    ErrorHandler(u16),
    /// Anything else: a route.
    Route,
}

/// Classify a pathname by its basename with the extension stripped.
pub fn classify(pathname: &str) -> FileKind {
    let basename = pathname.rsplit('/').next().unwrap_or(pathname);
    let stem = match basename.rsplit_once('.') {
        Some((stem, _ext)) => stem,
        None => basename,
    };
    match stem {
        "_middleware" => FileKind::Middleware,
        "_data" => FileKind::Data,
        _ => {
            if let Some(digits) = stem.strip_prefix('_') {
                if digits.len() == 3 {
                    if let Ok(status) = digits.parse::<u16>() {
                        if (400..=599).contains(&status) {
                            return FileKind::ErrorHandler(status);
                        }
                    }
                }
            }
            FileKind::Route
        }
    }
}

/// Whether a pathname lives under the `_layouts/` or `_components/`
/// subtrees, which are catalogued separately from routes.
pub fn is_template_subtree(pathname: &str) -> bool {
    pathname.starts_with("/_layouts/") || pathname.starts_with("/_components/")
}
