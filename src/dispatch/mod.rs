//! Request dispatch.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → MATCH_PATTERN  (collect middleware/route entries matching the URL)
//!     → FILTER_METHOD  (404 if nothing terminal matched, 405 + Allow if
//!                       the method filtered every terminal out)
//!     → RUN_CHAIN      (seed data, execute the continuation queue)
//!     → RESPONDED
//! ```
//!
//! # Design Decisions
//! - The registry is passed in by reference, never ambient: multiple
//!   server instances and hot reload by registry replacement
//! - Every handler error is recovered here and routed to the `_500`
//!   page; nothing below the dispatcher formats a user-facing failure
//! - Trailing slashes redirect (`/about/` → `/about`) before matching

pub mod context;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, request::Parts, HeaderValue, Request, StatusCode};
use axum::response::Response;
use serde_json::Value;
use url::Url;

pub use context::{ChainLink, Context};

use crate::error::HandlerError;
use crate::registry::{
    BoxedHandler, ComponentFn, HandlerFuture, Registry, RenderFn, RenderFuture, StateMap,
};
use crate::render::RenderEnv;
use crate::response;

/// Wrap a handler function for registration in a manifest.
pub fn handler<F>(f: F) -> BoxedHandler
where
    F: for<'a> Fn(&'a mut Context) -> HandlerFuture<'a> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a route/layout render function for registration in a manifest.
pub fn render_fn<F>(f: F) -> RenderFn
where
    F: for<'a> Fn(&'a mut Context) -> RenderFuture<'a> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a component render function for registration in a manifest.
pub fn component_fn<F>(f: F) -> ComponentFn
where
    F: Fn(StateMap) -> futures_util::future::BoxFuture<'static, Result<String, HandlerError>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

/// Executes requests against one immutable registry generation.
pub struct Dispatcher {
    registry: Arc<Registry>,
    env: RenderEnv,
    body_limit: usize,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, env: RenderEnv, body_limit: usize) -> Self {
        Self {
            registry,
            env,
            body_limit,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run one request through the full state machine. Always yields a
    /// well-formed response; errors never reach the transport.
    pub async fn dispatch(&self, request: Request<Body>, remote_addr: Option<SocketAddr>) -> Response {
        let (parts, body) = request.into_parts();
        let path = parts.uri.path().to_string();

        // strip trailing slashes, e.g. /about/ -> /about
        if path.len() > 1 && path.ends_with('/') {
            let mut location = path.trim_end_matches('/').to_string();
            if let Some(query) = parts.uri.query() {
                location.push('?');
                location.push_str(query);
            }
            return response::redirect(&location);
        }

        let bytes = match axum::body::to_bytes(body, self.body_limit).await {
            Ok(bytes) => bytes,
            Err(_) => return response::plain_status(StatusCode::PAYLOAD_TOO_LARGE),
        };
        let url = request_url(&parts);
        let mut ctx = Context::new(
            parts.method.clone(),
            url,
            parts.headers,
            bytes,
            remote_addr,
            self.env.clone(),
        );
        ctx.state.insert(
            "contentType".to_string(),
            Value::String("text/html".to_string()),
        );

        tracing::debug!(method = %ctx.method, path = %path, "dispatching request");

        // MATCH_PATTERN
        let matched = self.registry.middleware_for(&path);
        if !matched.iter().any(|(entry, _)| entry.initialises_response) {
            return self.error_status(&mut ctx, StatusCode::NOT_FOUND).await;
        }

        // FILTER_METHOD
        let chain: Vec<_> = matched
            .iter()
            .filter(|(entry, _)| entry.method.allows(&ctx.method))
            .cloned()
            .collect();
        if !chain.iter().any(|(entry, _)| entry.initialises_response) {
            let allow = allowed_methods(&matched);
            let mut res = self
                .error_status(&mut ctx, StatusCode::METHOD_NOT_ALLOWED)
                .await;
            if let Ok(value) = HeaderValue::from_str(&allow) {
                res.headers_mut().insert(header::ALLOW, value);
            }
            return res;
        }

        // seed state from matching data entries, outer scope first so
        // inner values win on key collision
        for entry in self.registry.data_for(&path) {
            for (key, value) in &entry.values {
                ctx.state.insert(key.clone(), value.clone());
            }
        }

        // RUN_CHAIN
        ctx.chain = chain
            .into_iter()
            .map(|(entry, params)| ChainLink { entry, params })
            .collect();
        match ctx.next().await {
            Ok(res) => res,
            Err(err) => {
                tracing::error!(error = %err, method = %ctx.method, path = %path, "handler error");
                ctx.state
                    .insert("error".to_string(), Value::String(err.to_string()));
                self.error_status(&mut ctx, StatusCode::INTERNAL_SERVER_ERROR)
                    .await
            }
        }
    }

    /// Produce an error-status response, rendering the registered `_NNN`
    /// page when one covers this URL, else a plain-text body. A failing
    /// error page falls back to plain text rather than escalating.
    async fn error_status(&self, ctx: &mut Context, status: StatusCode) -> Response {
        let path = ctx.url.path().to_string();
        if let Some(entry) = self.registry.error_handler_for(status.as_u16(), &path) {
            ctx.state.insert(
                "contentType".to_string(),
                Value::String("text/html".to_string()),
            );
            for (key, value) in &entry.data {
                ctx.state.insert(key.clone(), value.clone());
            }
            let source = Arc::clone(&entry.render);
            ctx.current_render = Some(Arc::clone(&source));
            match crate::render::render_page(ctx, &source).await {
                Ok(document) => {
                    let content_type = ctx
                        .state
                        .get("contentType")
                        .and_then(Value::as_str)
                        .unwrap_or("text/html")
                        .to_string();
                    let mut res = response::with_content_type(document, &content_type);
                    *res.status_mut() = status;
                    return res;
                }
                Err(err) => {
                    tracing::error!(error = %err, status = status.as_u16(), "error page failed, falling back to plain text");
                }
            }
        }
        response::plain_status(status)
    }
}

/// Deduplicated `Allow` header value from the pattern-matched terminal
/// entries.
fn allowed_methods(
    matched: &[(Arc<crate::registry::MiddlewareEntry>, crate::pattern::Params)],
) -> String {
    let mut methods: Vec<String> = Vec::new();
    for (entry, _) in matched {
        if !entry.initialises_response {
            continue;
        }
        let method = entry.method.to_string();
        if !methods.contains(&method) {
            methods.push(method);
        }
    }
    methods.join(", ")
}

/// Reconstruct the request URL from the host header and URI.
fn request_url(parts: &Parts) -> Url {
    let host = parts
        .headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    Url::parse(&format!("http://{host}{path_and_query}"))
        .unwrap_or_else(|_| Url::parse("http://localhost/").expect("literal url parses"))
}
