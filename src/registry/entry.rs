//! Registry entry types.
//!
//! Every entry's shape is resolved once at indexing time: what a route file
//! contributes (handler, renderable payload, both, or a static asset) is a
//! tagged variant here, never re-inspected per request.

use std::fmt;
use std::sync::Arc;

use axum::http::Method;
use axum::response::Response;
use futures_util::future::BoxFuture;

use crate::error::HandlerError;
use crate::pattern::MatchPattern;
use crate::reader::FileRecord;

/// Mutable per-request key/value state, seeded from matching data entries
/// and threaded through the middleware chain and render pipeline.
pub type StateMap = serde_json::Map<String, serde_json::Value>;

/// Future returned by a middleware or route handler.
pub type HandlerFuture<'a> = BoxFuture<'a, Result<Response, HandlerError>>;

/// A middleware or route handler. Receives the request context, may call
/// `ctx.next()` to run the remainder of the chain.
pub type BoxedHandler =
    Arc<dyn for<'a> Fn(&'a mut crate::dispatch::Context) -> HandlerFuture<'a> + Send + Sync>;

/// Future returned by a render function.
pub type RenderFuture<'a> = BoxFuture<'a, Result<String, HandlerError>>;

/// A route or layout render function. Receives the request context so it
/// can read state and invoke components.
pub type RenderFn =
    Arc<dyn for<'a> Fn(&'a mut crate::dispatch::Context) -> RenderFuture<'a> + Send + Sync>;

/// A component render function. Components are stateless with respect to
/// the page: they receive only their own props, so their futures can
/// outlive the synchronous render pass.
pub type ComponentFn =
    Arc<dyn Fn(StateMap) -> BoxFuture<'static, Result<String, HandlerError>> + Send + Sync>;

/// What a route, layout or error handler renders: a programmatic render
/// function, or the literal file body.
pub enum RenderSource {
    Body(String),
    Fn(RenderFn),
}

impl fmt::Debug for RenderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Body(body) => f.debug_tuple("Body").field(&body.len()).finish(),
            Self::Fn(_) => f.write_str("Fn"),
        }
    }
}

/// HTTP method filter for a middleware entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFilter {
    /// Matches every method (`*`).
    Any,
    /// Matches exactly one method.
    Only(Method),
}

impl MethodFilter {
    pub fn allows(&self, method: &Method) -> bool {
        match self {
            Self::Any => true,
            Self::Only(m) => m == method,
        }
    }
}

impl fmt::Display for MethodFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Only(m) => write!(f, "{m}"),
        }
    }
}

/// The work a middleware entry performs when its turn in the chain comes.
pub enum Payload {
    /// A programmatic handler (pass-through middleware or an explicit
    /// method handler).
    Handler(BoxedHandler),
    /// A renderable route without an explicit `GET`: the synthetic `GET`
    /// runs a full render-pipeline pass and serializes the result.
    Render(Arc<RenderSource>),
    /// An explicit `GET` handler on a renderable route: the handler runs
    /// with a `ctx.render()` capability.
    HandlerWithRender(BoxedHandler, Arc<RenderSource>),
    /// A static asset served with etag/cache-bust handling.
    StaticAsset(Arc<FileRecord>),
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Handler(_) => "Handler",
            Self::Render(_) => "Render",
            Self::HandlerWithRender(..) => "HandlerWithRender",
            Self::StaticAsset(_) => "StaticAsset",
        };
        f.write_str(name)
    }
}

/// A shared-data entry: a key/value bag merged into the request state of
/// every URL its pattern matches. No behavior, only a scope.
#[derive(Debug, Clone)]
pub struct DataEntry {
    pub pattern: MatchPattern,
    pub values: StateMap,
}

/// A middleware or terminal route/file handler entry.
///
/// `initialises_response` distinguishes terminal handlers (which produce
/// the response) from pass-through middleware (logging, auth, header
/// injection); it drives 404-vs-405 decisions and chain ordering.
#[derive(Debug)]
pub struct MiddlewareEntry {
    pub pattern: MatchPattern,
    pub method: MethodFilter,
    pub payload: Payload,
    pub initialises_response: bool,
}

/// An error page keyed by status code, scoped to its directory subtree.
/// Consulted when no route matches or a handler fails.
#[derive(Debug)]
pub struct ErrorHandlerEntry {
    pub pattern: MatchPattern,
    pub status: u16,
    pub render: Arc<RenderSource>,
    pub data: StateMap,
}
