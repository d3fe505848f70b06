//! Cached file reading for the routes and static trees.
//!
//! # Responsibilities
//! - Walk a directory subtree into decoded file records
//! - Cache records by path, returning safe-to-mutate copies
//! - Derive content types and etags for static serving
//!
//! # Design Decisions
//! - Walking is sequential and sorted by pathname, so indexing the same
//!   tree twice yields the same registry order
//! - A missing root is an empty tree, not an error (a site without a
//!   `static/` directory is fine)
//! - Etags hash the build id, pathname and size: cheap, and invalidated
//!   wholesale by a new server generation

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use dashmap::DashMap;

use crate::error::IndexError;

/// A decoded file from the routes or static tree.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Absolute filesystem path.
    pub path: PathBuf,
    /// `/`-prefixed path relative to the walked root, e.g. `/blog/post.md`.
    pub pathname: String,
    /// Raw file bytes.
    pub content: Vec<u8>,
    /// HTTP content-type derived from the extension.
    pub content_type: String,
    /// Cache validator derived from build id, pathname and size.
    pub etag: String,
    pub size: u64,
}

impl FileRecord {
    /// File contents decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }
}

/// Reads and caches files beneath a root directory.
#[derive(Default)]
pub struct FileReader {
    cache: DashMap<PathBuf, FileRecord>,
}

impl FileReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every file beneath `root`, sorted by pathname.
    pub fn walk(&self, root: &Path) -> Result<Vec<FileRecord>, IndexError> {
        let mut records = Vec::new();
        if !root.is_dir() {
            tracing::debug!(root = %root.display(), "directory absent, skipping walk");
            return Ok(records);
        }
        self.walk_into(root, root, &mut records)?;
        records.sort_by(|a, b| a.pathname.cmp(&b.pathname));
        Ok(records)
    }

    /// Read a single file, serving repeated reads from the cache.
    pub fn read(&self, path: &Path, root: &Path) -> Result<FileRecord, IndexError> {
        if let Some(record) = self.cache.get(path) {
            return Ok(record.clone());
        }
        let content = std::fs::read(path).map_err(|source| IndexError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let pathname = pathname_of(path, root);
        let record = FileRecord {
            path: path.to_path_buf(),
            content_type: content_type_for(&pathname).to_string(),
            etag: make_etag(&pathname, content.len() as u64),
            size: content.len() as u64,
            pathname,
            content,
        };
        self.cache.insert(path.to_path_buf(), record.clone());
        Ok(record)
    }

    /// Drop every cached record. Called before a dev-mode re-index so
    /// changed files are re-read from disk.
    pub fn invalidate(&self) {
        self.cache.clear();
    }

    fn walk_into(
        &self,
        root: &Path,
        dir: &Path,
        records: &mut Vec<FileRecord>,
    ) -> Result<(), IndexError> {
        let entries = std::fs::read_dir(dir).map_err(|source| IndexError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| IndexError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_dir() {
                self.walk_into(root, &path, records)?;
            } else {
                records.push(self.read(&path, root)?);
            }
        }
        Ok(())
    }
}

fn pathname_of(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut pathname = String::from("/");
    pathname.push_str(&relative.to_string_lossy().replace('\\', "/"));
    pathname
}

fn make_etag(pathname: &str, size: u64) -> String {
    let mut hasher = DefaultHasher::new();
    crate::build_id().hash(&mut hasher);
    pathname.hash(&mut hasher);
    size.hash(&mut hasher);
    format!("\"{:016x}\"", hasher.finish())
}

/// Content type for a pathname, by extension.
pub fn content_type_for(pathname: &str) -> &'static str {
    let extension = pathname.rsplit('.').next().unwrap_or("");
    match extension {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "md" | "markdown" => "text/markdown; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "wasm" => "application/wasm",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn walk_is_sorted_and_relative() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("blog")).unwrap();
        fs::write(dir.path().join("blog/post.md"), "hello").unwrap();
        fs::write(dir.path().join("about.md"), "about").unwrap();

        let reader = FileReader::new();
        let records = reader.walk(dir.path()).unwrap();
        let paths: Vec<&str> = records.iter().map(|r| r.pathname.as_str()).collect();
        assert_eq!(paths, vec!["/about.md", "/blog/post.md"]);
    }

    #[test]
    fn missing_root_is_empty() {
        let reader = FileReader::new();
        let records = reader.walk(Path::new("/definitely/not/here")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn reads_are_cached() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("page.html");
        fs::write(&file, "one").unwrap();

        let reader = FileReader::new();
        let first = reader.read(&file, dir.path()).unwrap();
        fs::write(&file, "two").unwrap();
        let second = reader.read(&file, dir.path()).unwrap();
        assert_eq!(first.content, second.content);

        reader.invalidate();
        let third = reader.read(&file, dir.path()).unwrap();
        assert_eq!(third.text(), "two");
    }

    #[test]
    fn content_types_by_extension() {
        assert_eq!(content_type_for("/style.css"), "text/css; charset=utf-8");
        assert_eq!(content_type_for("/unknown.bin"), "application/octet-stream");
    }
}
