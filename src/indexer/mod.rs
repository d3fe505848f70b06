//! The indexer: one startup pass over the routes and static trees.
//!
//! # Data Flow
//! ```text
//! routes/ + static/ + manifest exports
//!     → classify each file (route / middleware / data / error page /
//!       layout / component)
//!     → parse bodies (JSON/TOML/YAML documents, front-matter blocks)
//!     → compile match patterns
//!     → sorted Registry + layout/component Catalogue
//! ```
//!
//! # Design Decisions
//! - Sequential and one-shot: indexing always completes before the
//!   registry generation serves a request
//! - Dev mode re-runs the whole pass and swaps the result in; the live
//!   registry is never mutated
//! - Malformed patterns, unreadable files and cyclic layout chains fail
//!   indexing, so the server refuses to start on a broken tree

pub mod classify;
pub mod frontmatter;

use std::sync::Arc;

use axum::http::Method;
use serde_json::Value;

use crate::error::IndexError;
use crate::manifest::{Exports, Manifest};
use crate::pattern::MatchPattern;
use crate::reader::FileReader;
use crate::registry::{
    DataEntry, ErrorHandlerEntry, MethodFilter, MiddlewareEntry, Payload, Registry, RenderSource,
    StateMap,
};
use crate::render::catalogue::{Catalogue, Component, ComponentSource, Layout};
use crate::render::engines::EngineRegistry;

use classify::FileKind;

/// Everything one indexing generation produces.
pub struct IndexOutput {
    pub registry: Registry,
    pub catalogue: Catalogue,
}

/// Index the whole site: layouts, components, routes, static assets.
pub async fn index_site(
    manifest: &Manifest,
    reader: &FileReader,
    engines: &Arc<EngineRegistry>,
) -> Result<IndexOutput, IndexError> {
    let mut registry = Registry::new();
    let mut catalogue = Catalogue::new();

    index_layouts(manifest, reader, engines, &mut catalogue)?;
    index_components(manifest, reader, engines, &mut catalogue)?;
    catalogue.validate_layout_chains()?;
    index_routes(manifest, reader, engines, &mut registry)?;
    index_static(manifest, reader, engines, &mut registry).await?;

    tracing::info!(
        middleware = registry.middleware_len(),
        data = registry.data_len(),
        "site indexed"
    );
    Ok(IndexOutput {
        registry,
        catalogue,
    })
}

fn index_layouts(
    manifest: &Manifest,
    reader: &FileReader,
    engines: &Arc<EngineRegistry>,
    catalogue: &mut Catalogue,
) -> Result<(), IndexError> {
    let root = manifest.routes_root().join("_layouts");
    for file in reader.walk(&root)? {
        if manifest.is_ignored(&file.pathname) {
            continue;
        }
        let exports = manifest.layouts.get(&file.pathname);
        let (mut fields, body) = fields_and_body(&file.text());
        merge_export_fields(&mut fields, exports);

        let name = export_name(exports, &fields)
            .unwrap_or_else(|| file.pathname.trim_start_matches('/').to_string());
        let parent = fields
            .get("layout")
            .and_then(Value::as_str)
            .map(str::to_string);
        let engine_ids = field_engine_ids(&fields)
            .unwrap_or_else(|| engines.select_names_for(&file.pathname));
        let source = match exports.and_then(|e| e.render.clone()) {
            Some(render) => RenderSource::Fn(render),
            None => RenderSource::Body(body),
        };

        let mut data = fields;
        for reserved in ["name", "layout", "renderEngines"] {
            data.remove(reserved);
        }
        catalogue.insert_layout(Layout {
            name,
            parent,
            source: Arc::new(source),
            engines: engine_ids,
            data,
        });
    }
    Ok(())
}

fn index_components(
    manifest: &Manifest,
    reader: &FileReader,
    engines: &Arc<EngineRegistry>,
    catalogue: &mut Catalogue,
) -> Result<(), IndexError> {
    let root = manifest.routes_root().join("_components");
    for file in reader.walk(&root)? {
        if manifest.is_ignored(&file.pathname) {
            continue;
        }
        let exports = manifest.components.get(&file.pathname);
        let (mut fields, body) = fields_and_body(&file.text());
        merge_export_fields(&mut fields, exports);

        let name = export_name(exports, &fields)
            .unwrap_or_else(|| file.pathname.trim_start_matches('/').to_string());
        let engine_ids = field_engine_ids(&fields)
            .unwrap_or_else(|| engines.select_names_for(&file.pathname));
        let source = match exports.and_then(|e| e.component_render.clone()) {
            Some(render) => ComponentSource::Fn(render),
            None => ComponentSource::Body(body),
        };
        catalogue.insert_component(Component {
            name,
            source,
            engines: engine_ids,
        });
    }
    Ok(())
}

fn index_routes(
    manifest: &Manifest,
    reader: &FileReader,
    engines: &Arc<EngineRegistry>,
    registry: &mut Registry,
) -> Result<(), IndexError> {
    let root = manifest.routes_root();
    for file in reader.walk(&root)? {
        let pathname = file.pathname.clone();
        if classify::is_template_subtree(&pathname) {
            continue;
        }
        let kind = classify::classify(&pathname);
        // `_`-convention files bypass the ignore pattern
        if kind == FileKind::Route && manifest.is_ignored(&pathname) {
            continue;
        }

        let ext = extension_of(&pathname);
        let exports = manifest.routes.get(&pathname);
        let (mut fields, body) = parse_document(&pathname, ext, &file.text())?;
        merge_export_fields(&mut fields, exports);
        fields.remove("pattern");

        let stripped = &pathname[..pathname.len() - ext.len()];
        let pattern = match exports.and_then(|e| e.pattern.as_ref()) {
            Some(explicit) => {
                MatchPattern::parse(explicit).map_err(|source| IndexError::Pattern {
                    path: pathname.clone(),
                    source,
                })?
            }
            None => {
                MatchPattern::from_route_path(stripped).map_err(|source| IndexError::Pattern {
                    path: pathname.clone(),
                    source,
                })?
            }
        };

        match kind {
            FileKind::Middleware => {
                let Some(handler) = exports.and_then(|e| e.handler.clone()) else {
                    tracing::warn!(path = %pathname, "middleware file has no registered handler, skipping");
                    continue;
                };
                registry.insert_middleware(MiddlewareEntry {
                    pattern,
                    method: exports
                        .and_then(|e| e.method.clone())
                        .unwrap_or(MethodFilter::Any),
                    payload: Payload::Handler(handler),
                    initialises_response: exports.is_some_and(|e| e.initialises_response),
                });
            }
            FileKind::Data => {
                registry.insert_data(DataEntry {
                    pattern,
                    values: fields,
                });
            }
            FileKind::ErrorHandler(status) => {
                // error pages cover their directory and everything below it
                let directory = stripped.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
                let scope = MatchPattern::from_route_path(&format!("{directory}/_data"))
                    .map_err(|source| IndexError::Pattern {
                        path: pathname.clone(),
                        source,
                    })?;
                let render = match exports.and_then(|e| e.render.clone()) {
                    Some(render) => RenderSource::Fn(render),
                    None => RenderSource::Body(body),
                };
                annotate_engines(&mut fields, engines, &pathname);
                registry.insert_error_handler(ErrorHandlerEntry {
                    pattern: scope,
                    status,
                    render: Arc::new(render),
                    data: fields,
                });
            }
            FileKind::Route => {
                annotate_engines(&mut fields, engines, &pathname);
                // a registered render function wins; a non-empty file body
                // is the fallback render source
                let render = exports
                    .and_then(|e| e.render.clone())
                    .map(RenderSource::Fn)
                    .or_else(|| (!body.is_empty()).then(|| RenderSource::Body(body)))
                    .map(Arc::new);

                let explicit = exports.map(|e| e.methods.as_slice()).unwrap_or(&[]);
                let has_explicit_get = explicit.iter().any(|(m, _)| *m == Method::GET);
                let mut installed = false;
                for (method, handler) in explicit {
                    let payload = if *method == Method::GET {
                        match &render {
                            // explicit GET wins; it receives a render() capability
                            Some(source) => {
                                Payload::HandlerWithRender(handler.clone(), Arc::clone(source))
                            }
                            None => Payload::Handler(handler.clone()),
                        }
                    } else {
                        Payload::Handler(handler.clone())
                    };
                    registry.insert_middleware(MiddlewareEntry {
                        pattern: pattern.clone(),
                        method: MethodFilter::Only(method.clone()),
                        payload,
                        initialises_response: true,
                    });
                    installed = true;
                }
                // any method handler or renderable payload installs a
                // synthetic GET performing a full render-pipeline pass;
                // an explicit GET wins
                if !has_explicit_get && (installed || render.is_some()) {
                    let source = render
                        .clone()
                        .unwrap_or_else(|| Arc::new(RenderSource::Body(String::new())));
                    registry.insert_middleware(MiddlewareEntry {
                        pattern: pattern.clone(),
                        method: MethodFilter::Only(Method::GET),
                        payload: Payload::Render(source),
                        initialises_response: true,
                    });
                    installed = true;
                }
                if installed {
                    registry.insert_data(DataEntry {
                        pattern,
                        values: fields,
                    });
                }
                // a route with no handler and no renderable payload is a no-op
            }
        }
    }
    Ok(())
}

async fn index_static(
    manifest: &Manifest,
    reader: &FileReader,
    engines: &Arc<EngineRegistry>,
    registry: &mut Registry,
) -> Result<(), IndexError> {
    let root = manifest.static_root();
    for file in reader.walk(&root)? {
        let mut file = file;
        let pathname = file.pathname.clone();
        for processor in engines.processors_for(&pathname) {
            file = processor
                .process(file)
                .await
                .map_err(|err| IndexError::Parse {
                    path: pathname.clone(),
                    message: err.to_string(),
                })?;
        }
        if manifest.is_ignored(&file.pathname) {
            continue;
        }
        let pattern = MatchPattern::from_route_path(&file.pathname).map_err(|source| {
            IndexError::Pattern {
                path: file.pathname.clone(),
                source,
            }
        })?;
        registry.insert_middleware(MiddlewareEntry {
            pattern,
            method: MethodFilter::Only(Method::GET),
            payload: Payload::StaticAsset(Arc::new(file)),
            initialises_response: true,
        });
    }
    Ok(())
}

/// Front-matter fields and remaining body for a text file.
fn fields_and_body(content: &str) -> (StateMap, String) {
    match frontmatter::extract(content) {
        Some((fields, body)) => (fields, body),
        None => (StateMap::new(), content.to_string()),
    }
}

/// Parse a route file's content: whole-document parsing for data formats,
/// front-matter extraction for everything else.
fn parse_document(
    pathname: &str,
    ext: &str,
    content: &str,
) -> Result<(StateMap, String), IndexError> {
    match ext {
        ".json" => {
            let value: Value =
                serde_json::from_str(content).map_err(|err| IndexError::Parse {
                    path: pathname.to_string(),
                    message: err.to_string(),
                })?;
            match value {
                Value::Object(map) => Ok((map, content.to_string())),
                _ => Err(IndexError::Parse {
                    path: pathname.to_string(),
                    message: "expected a top-level object".to_string(),
                }),
            }
        }
        ".toml" => frontmatter::parse_toml(content)
            .map(|fields| (fields, content.to_string()))
            .ok_or_else(|| IndexError::Parse {
                path: pathname.to_string(),
                message: "invalid toml document".to_string(),
            }),
        ".yaml" | ".yml" => Ok((
            frontmatter::parse_simple_yaml(content),
            content.to_string(),
        )),
        _ => Ok(fields_and_body(content)),
    }
}

fn merge_export_fields(fields: &mut StateMap, exports: Option<&Exports>) {
    if let Some(exports) = exports {
        for (key, value) in &exports.fields {
            fields.insert(key.clone(), value.clone());
        }
    }
}

fn export_name(exports: Option<&Exports>, fields: &StateMap) -> Option<String> {
    exports
        .and_then(|e| e.name.clone())
        .or_else(|| fields.get("name").and_then(Value::as_str).map(str::to_string))
}

fn field_engine_ids(fields: &StateMap) -> Option<Vec<String>> {
    fields.get("renderEngines").and_then(Value::as_array).map(|ids| {
        ids.iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}

/// Default the `renderEngines` field from the file's extension when the
/// file didn't pick its own engine list.
fn annotate_engines(fields: &mut StateMap, engines: &Arc<EngineRegistry>, pathname: &str) {
    if fields.contains_key("renderEngines") {
        return;
    }
    let names = engines.select_names_for(pathname);
    if !names.is_empty() {
        fields.insert(
            "renderEngines".to_string(),
            Value::Array(names.into_iter().map(Value::String).collect()),
        );
    }
}

/// The final extension of a pathname's basename, dot included, or `""`.
fn extension_of(pathname: &str) -> &str {
    let basename = pathname.rsplit('/').next().unwrap_or(pathname);
    match basename.rfind('.') {
        Some(0) | None => "",
        Some(index) => &basename[index..],
    }
}
