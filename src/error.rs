//! Error definitions shared across the crate.
//!
//! # Responsibilities
//! - Startup-fatal indexing errors (the server must not start)
//! - Per-request handler errors (caught at the dispatcher boundary)
//!
//! # Design Decisions
//! - NotFound / MethodNotAllowed are dispatch outcomes, not errors
//! - An unregistered engine or layout is an identity transform, not an error

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while compiling a file path or pattern string into a
/// match pattern.
#[derive(Debug, Error)]
pub enum PatternError {
    /// Bracket syntax opened but never closed, e.g. `/user/[id`.
    #[error("unterminated bracket in segment `{0}`")]
    UnterminatedBracket(String),

    /// A capture group with no name, e.g. `[]` or `[...]`.
    #[error("empty capture name in segment `{0}`")]
    EmptyCaptureName(String),

    /// A rest capture followed by further segments.
    #[error("rest capture `{0}` must be the final segment")]
    RestNotLast(String),
}

/// Startup-fatal errors surfaced while indexing the routes tree.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A route file's path or explicit pattern failed to compile.
    #[error("invalid pattern for `{path}`: {source}")]
    Pattern {
        path: String,
        #[source]
        source: PatternError,
    },

    /// A route, layout or static file could not be read.
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A data document (JSON/TOML/YAML) failed to parse.
    #[error("failed to parse `{path}`: {message}")]
    Parse { path: String, message: String },

    /// A layout's parent chain loops back on itself.
    #[error("cyclic layout chain involving `{0}`")]
    LayoutCycle(String),
}

/// Any failure inside a middleware, route handler, render engine or
/// component. Recovered at the dispatcher boundary and routed to the
/// `_500` error handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Message(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    /// Wrap an arbitrary message into a handler error.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}
