//! The render pipeline.
//!
//! # Data Flow
//! ```text
//! Route (or error page) + request state
//!     → base render (render fn or literal body)
//!     → engines, most specific first
//!     → layout nesting (content wrapped by each ancestor in turn)
//!     → fragment resolution (async components spliced by token position)
//!     → HTML document
//! ```
//!
//! # Design Decisions
//! - Engine lists travel through state as engine ids; one registry query
//!   resolves them for routes, layouts and error pages alike
//! - An unregistered engine or layout is an identity pass-through, logged
//!   but never fatal, so partial plugin configurations keep serving
//! - Layout chains are cycle-checked at indexing time; rendering still
//!   carries a depth cap for catalogues assembled by hand

pub mod catalogue;
pub mod engines;
pub mod fragments;

use std::sync::Arc;

use serde_json::Value;

pub use catalogue::{Catalogue, Component, ComponentSource, Layout};
pub use engines::{EngineRegistry, FileProcessor, RenderEngine};

use crate::dispatch::Context;
use crate::error::HandlerError;
use crate::registry::{RenderSource, StateMap};

/// Shared handles the render pipeline needs per request.
#[derive(Clone)]
pub struct RenderEnv {
    pub engines: Arc<EngineRegistry>,
    pub catalogue: Arc<Catalogue>,
}

/// Safety net for layout chains that bypass indexing validation.
const MAX_LAYOUT_DEPTH: usize = 32;

/// Render a route (or error page) through engines, nested layouts and
/// fragment resolution.
pub async fn render_page(ctx: &mut Context, source: &RenderSource) -> Result<String, HandlerError> {
    // layout data merges once, at the start of the whole recursive pass
    if let Some(layout) = state_layout(&ctx.state) {
        let catalogue = Arc::clone(&ctx.env.catalogue);
        catalogue.merge_layout_data(&layout, &mut ctx.state);
    }

    let engine_ids = state_engine_ids(&ctx.state);
    let mut content = render_pass(ctx, source, &engine_ids).await?;

    let mut depth = 0;
    while let Some(name) = state_layout(&ctx.state) {
        depth += 1;
        if depth > MAX_LAYOUT_DEPTH {
            return Err(HandlerError::msg(format!(
                "layout nesting exceeded {MAX_LAYOUT_DEPTH} levels at `{name}`"
            )));
        }
        let Some(layout) = ctx.env.catalogue.layout(&name) else {
            tracing::warn!(layout = %name, "unknown layout, leaving content unwrapped");
            ctx.state.remove("layout");
            break;
        };
        ctx.state
            .insert("content".to_string(), Value::String(content));
        match &layout.parent {
            Some(parent) => {
                ctx.state
                    .insert("layout".to_string(), Value::String(parent.clone()));
            }
            None => {
                ctx.state.remove("layout");
            }
        }
        ctx.state.insert(
            "renderEngines".to_string(),
            Value::Array(layout.engines.iter().cloned().map(Value::String).collect()),
        );
        let layout_source = Arc::clone(&layout.source);
        content = render_pass(ctx, &layout_source, &layout.engines).await?;
    }

    ctx.fragments.resolve(content).await
}

/// One render step: produce content from the source and fold it through
/// the named engines in order.
async fn render_pass(
    ctx: &mut Context,
    source: &RenderSource,
    engine_ids: &[String],
) -> Result<String, HandlerError> {
    let mut content = match source {
        RenderSource::Body(body) => body.clone(),
        RenderSource::Fn(render) => {
            let render = Arc::clone(render);
            render(ctx).await?
        }
    };
    for id in engine_ids {
        match ctx.env.engines.by_id(id) {
            Some(engine) => content = engine.render(content, &mut ctx.state).await?,
            None => {
                tracing::warn!(engine = %id, "unknown render engine, passing content through");
            }
        }
    }
    Ok(content)
}

fn state_layout(state: &StateMap) -> Option<String> {
    state
        .get("layout")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn state_engine_ids(state: &StateMap) -> Vec<String> {
    state
        .get("renderEngines")
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
