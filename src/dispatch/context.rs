//! Per-request context threaded through the middleware chain and render
//! pipeline.
//!
//! # Design Decisions
//! - The continuation queue lives on the context; `next()` pops and runs
//!   exactly one entry, so two middleware never execute concurrently
//!   within one request
//! - `next()` on an exhausted queue is a logged no-op, never a panic
//! - Component invocation is a context capability: it registers a pending
//!   fragment and returns a placeholder token synchronously

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::Response;
use serde_json::Value;
use url::Url;

use crate::error::HandlerError;
use crate::pattern::Params;
use crate::reader::FileRecord;
use crate::registry::{MiddlewareEntry, Payload, RenderSource, StateMap};
use crate::render::fragments::FragmentTable;
use crate::render::RenderEnv;
use crate::response;

/// One queued middleware entry with the params its pattern captured.
pub struct ChainLink {
    pub entry: Arc<MiddlewareEntry>,
    pub params: Params,
}

/// Everything a handler or render function can reach for one request.
pub struct Context {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub remote_addr: Option<SocketAddr>,
    /// Params captured by the currently-executing entry's pattern.
    pub params: Params,
    /// Request state, seeded from matching data entries (inner scope wins).
    pub state: StateMap,
    pub(crate) env: RenderEnv,
    pub(crate) chain: VecDeque<ChainLink>,
    pub(crate) fragments: FragmentTable,
    pub(crate) current_render: Option<Arc<RenderSource>>,
}

impl Context {
    pub(crate) fn new(
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: Bytes,
        remote_addr: Option<SocketAddr>,
        env: RenderEnv,
    ) -> Self {
        Self {
            method,
            url,
            headers,
            body,
            remote_addr,
            params: Params::new(),
            state: StateMap::new(),
            env,
            chain: VecDeque::new(),
            fragments: FragmentTable::new(),
            current_render: None,
        }
    }

    /// Invoke the remainder of the middleware queue. The last element is
    /// always a terminal route/file handler, which produces the response
    /// without calling `next()` again.
    pub async fn next(&mut self) -> Result<Response, HandlerError> {
        let Some(link) = self.chain.pop_front() else {
            tracing::warn!("middleware chain exhausted, next() is a no-op");
            return Ok(response::plain_status(StatusCode::NOT_FOUND));
        };
        self.params = link.params;
        match &link.entry.payload {
            Payload::Handler(handler) => {
                let handler = Arc::clone(handler);
                handler(self).await
            }
            Payload::Render(source) => {
                let source = Arc::clone(source);
                self.current_render = Some(Arc::clone(&source));
                let document = crate::render::render_page(self, &source).await?;
                let content_type = self
                    .state
                    .get("contentType")
                    .and_then(Value::as_str)
                    .unwrap_or("text/html")
                    .to_string();
                Ok(response::with_content_type(document, &content_type))
            }
            Payload::HandlerWithRender(handler, source) => {
                self.current_render = Some(Arc::clone(source));
                let handler = Arc::clone(handler);
                handler(self).await
            }
            Payload::StaticAsset(file) => Ok(static_response(self, file)),
        }
    }

    /// Render the current route through the full pipeline (engines,
    /// layouts, fragment resolution). Available to explicit `GET`
    /// handlers on renderable routes.
    pub async fn render(&mut self) -> Result<String, HandlerError> {
        let Some(source) = self.current_render.clone() else {
            return Err(HandlerError::msg("route has no renderable payload"));
        };
        crate::render::render_page(self, &source).await
    }

    /// Invoke a catalogued component with the given props. The render is
    /// deferred: a placeholder token is returned immediately and replaced
    /// by the resolved fragment after layout nesting completes.
    pub fn component(&mut self, name: &str, props: StateMap) -> String {
        match self.env.catalogue.component(name) {
            Some(component) => {
                let future = component.render_detached(props, Arc::clone(&self.env.engines));
                self.fragments.insert(future)
            }
            None => {
                tracing::warn!(component = %name, "unknown component, rendering nothing");
                String::new()
            }
        }
    }
}

/// Serve a static asset with etag and cache-bust handling.
fn static_response(ctx: &Context, file: &FileRecord) -> Response {
    let cache_id = ctx
        .url
        .query_pairs()
        .find(|(key, _)| key == crate::ASSET_CACHE_KEY)
        .map(|(_, value)| value.into_owned());

    // redirect files cached from old builds to the uncached path
    if let Some(id) = cache_id.as_deref() {
        if id != crate::build_id() {
            let mut url = ctx.url.clone();
            let retained: Vec<(String, String)> = ctx
                .url
                .query_pairs()
                .filter(|(key, _)| key != crate::ASSET_CACHE_KEY)
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect();
            url.set_query(None);
            if !retained.is_empty() {
                let mut pairs = url.query_pairs_mut();
                for (key, value) in &retained {
                    pairs.append_pair(key, value);
                }
            }
            return response::redirect(url.as_str());
        }
    }

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, file.content_type.as_str())
        .header(header::VARY, "If-None-Match")
        .header(header::ETAG, file.etag.as_str());
    // cache requested files matching the current build for a year
    if cache_id.is_some() {
        builder = builder.header(header::CACHE_CONTROL, "public, max-age=31536000, immutable");
    }

    // conditional request: only send the body if the resource changed,
    // tested by comparing etags
    let cached_etag = ctx
        .headers
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok());
    if let Some(cached) = cached_etag {
        if etags_match(&file.etag, cached) {
            return response::finish(
                builder.status(StatusCode::NOT_MODIFIED).body(Body::empty()),
            );
        }
    }
    builder = builder.header(header::CONTENT_LENGTH, file.size);
    response::finish(builder.status(StatusCode::OK).body(Body::from(file.content.clone())))
}

fn etags_match(a: &str, b: &str) -> bool {
    a.trim_start_matches("W/") == b.trim_start_matches("W/")
}
