//! Shared utilities for end-to-end dispatch and render tests.
#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use serde_json::Value;

use arbor::dispatch::{Context, Dispatcher};
use arbor::indexer::index_site;
use arbor::manifest::Manifest;
use arbor::reader::FileReader;
use arbor::registry::{RenderFuture, StateMap};
use arbor::render::{EngineRegistry, RenderEngine, RenderEnv};

/// Write a fixture file, creating parent directories as needed.
pub fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Index a fixture tree and wrap it in a dispatcher.
pub async fn build_site(manifest: Manifest, engines: EngineRegistry) -> Dispatcher {
    let reader = FileReader::new();
    let engines = Arc::new(engines);
    let output = index_site(&manifest, &reader, &engines).await.unwrap();
    let env = RenderEnv {
        engines,
        catalogue: Arc::new(output.catalogue),
    };
    Dispatcher::new(Arc::new(output.registry), env, 1024 * 1024)
}

/// Dispatch a bodyless request, returning status, headers and body text.
pub async fn send(
    dispatcher: &Dispatcher,
    method: Method,
    path: &str,
) -> (StatusCode, HeaderMap, String) {
    send_request(
        dispatcher,
        Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

/// Dispatch an arbitrary request, returning status, headers and body text.
pub async fn send_request(
    dispatcher: &Dispatcher,
    request: Request<Body>,
) -> (StatusCode, HeaderMap, String) {
    let response = dispatcher.dispatch(request, None).await;
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, String::from_utf8_lossy(&bytes).into_owned())
}

/// Append a label to the request's `trace` state array.
pub fn push_trace(ctx: &mut Context, label: &str) {
    let entry = Value::String(label.to_string());
    match ctx.state.get_mut("trace") {
        Some(Value::Array(items)) => items.push(entry),
        _ => {
            ctx.state
                .insert("trace".to_string(), Value::Array(vec![entry]));
        }
    }
}

/// The request's `trace` state array joined with commas.
pub fn read_trace(ctx: &Context) -> String {
    ctx.state
        .get("trace")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(",")
        })
        .unwrap_or_default()
}

/// A template engine substituting `{key}` markers with state values.
pub struct VarsEngine {
    targets: Vec<String>,
}

impl VarsEngine {
    pub fn new(targets: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            targets: targets.iter().map(|t| (*t).to_string()).collect(),
        })
    }
}

impl RenderEngine for VarsEngine {
    fn id(&self) -> &str {
        "vars"
    }

    fn targets(&self) -> &[String] {
        &self.targets
    }

    fn render<'a>(&'a self, input: String, state: &'a mut StateMap) -> RenderFuture<'a> {
        Box::pin(async move {
            let mut output = input;
            for (key, value) in state.iter() {
                let marker = format!("{{{key}}}");
                if !output.contains(&marker) {
                    continue;
                }
                let replacement = match value {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                output = output.replace(&marker, &replacement);
            }
            Ok(output)
        })
    }
}

/// An engine appending a fixed tag, for asserting execution order.
pub struct TagEngine {
    id: String,
    targets: Vec<String>,
    tag: String,
}

impl TagEngine {
    pub fn new(id: &str, targets: &[&str], tag: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            targets: targets.iter().map(|t| (*t).to_string()).collect(),
            tag: tag.to_string(),
        })
    }
}

impl RenderEngine for TagEngine {
    fn id(&self) -> &str {
        &self.id
    }

    fn targets(&self) -> &[String] {
        &self.targets
    }

    fn render<'a>(&'a self, input: String, _state: &'a mut StateMap) -> RenderFuture<'a> {
        Box::pin(async move { Ok(format!("{input}{}", self.tag)) })
    }
}
