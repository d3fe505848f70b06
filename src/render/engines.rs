//! Render engine and file processor registration.
//!
//! # Responsibilities
//! - Hold named render engines and their extension targets
//! - Answer one query — which engines apply to this file, in what order —
//!   for both the indexer and the render pipeline
//!
//! # Design Decisions
//! - Extension specificity: an engine targeting `.tmpl.html` runs before
//!   one targeting `.html`; a `*` engine is always last
//! - Multiple engines may share an extension; registration order breaks
//!   ties
//! - An unknown engine name resolves to nothing and the caller treats the
//!   step as an identity transform

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::error::HandlerError;
use crate::reader::FileRecord;
use crate::registry::{RenderFuture, StateMap};

/// A pluggable render engine: maps content (plus the current state map)
/// to a new string.
pub trait RenderEngine: Send + Sync {
    /// Stable identifier used in `renderEngines` lists.
    fn id(&self) -> &str;

    /// Extension suffixes this engine targets (e.g. `.md`, `.tmpl.html`),
    /// or `*` for every file.
    fn targets(&self) -> &[String];

    fn render<'a>(&'a self, input: String, state: &'a mut StateMap) -> RenderFuture<'a>;
}

/// A static-file processor run once per file at indexing time.
pub trait FileProcessor: Send + Sync {
    fn targets(&self) -> &[String];

    fn process(&self, file: FileRecord) -> BoxFuture<'static, Result<FileRecord, HandlerError>>;
}

/// All registered engines and processors, with targets pre-sorted by
/// specificity.
#[derive(Default)]
pub struct EngineRegistry {
    named: HashMap<String, Arc<dyn RenderEngine>>,
    by_target: Vec<(String, Arc<dyn RenderEngine>)>,
    processors: Vec<(String, Arc<dyn FileProcessor>)>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an engine under its id and each of its targets.
    pub fn register(&mut self, engine: Arc<dyn RenderEngine>) {
        self.named.insert(engine.id().to_string(), Arc::clone(&engine));
        for target in engine.targets() {
            self.by_target.push((target.clone(), Arc::clone(&engine)));
        }
        self.by_target
            .sort_by(|(a, _), (b, _)| target_specificity(b).cmp(&target_specificity(a)));
    }

    pub fn register_processor(&mut self, processor: Arc<dyn FileProcessor>) {
        for target in processor.targets() {
            self.processors.push((target.clone(), Arc::clone(&processor)));
        }
        self.processors
            .sort_by(|(a, _), (b, _)| target_specificity(b).cmp(&target_specificity(a)));
    }

    /// Look up an engine by id.
    pub fn by_id(&self, id: &str) -> Option<Arc<dyn RenderEngine>> {
        self.named.get(id).map(Arc::clone)
    }

    /// The ordered engines for a file: an explicit name list if given,
    /// else every engine whose target suffix matches the path, most
    /// specific first.
    pub fn select_for(&self, path: &str, explicit: Option<&[String]>) -> Vec<Arc<dyn RenderEngine>> {
        match explicit {
            Some(ids) => ids.iter().filter_map(|id| self.by_id(id)).collect(),
            None => self
                .by_target
                .iter()
                .filter(|(target, _)| target_matches(target, path))
                .map(|(_, engine)| Arc::clone(engine))
                .collect(),
        }
    }

    /// Engine ids selected by extension, for annotating entries at
    /// indexing time.
    pub fn select_names_for(&self, path: &str) -> Vec<String> {
        self.by_target
            .iter()
            .filter(|(target, _)| target_matches(target, path))
            .map(|(_, engine)| engine.id().to_string())
            .collect()
    }

    /// Ordered processors whose target suffix matches the path.
    pub fn processors_for(&self, path: &str) -> Vec<Arc<dyn FileProcessor>> {
        self.processors
            .iter()
            .filter(|(target, _)| target_matches(target, path))
            .map(|(_, processor)| Arc::clone(processor))
            .collect()
    }
}

fn target_matches(target: &str, path: &str) -> bool {
    target == "*" || path.ends_with(target)
}

/// Longer suffixes are more specific; `*` sorts below everything.
fn target_specificity(target: &str) -> usize {
    if target == "*" {
        0
    } else {
        target.len() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper {
        id: String,
        targets: Vec<String>,
    }

    impl Upper {
        fn new(id: &str, targets: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                targets: targets.iter().map(|t| t.to_string()).collect(),
            })
        }
    }

    impl RenderEngine for Upper {
        fn id(&self) -> &str {
            &self.id
        }

        fn targets(&self) -> &[String] {
            &self.targets
        }

        fn render<'a>(&'a self, input: String, _state: &'a mut StateMap) -> RenderFuture<'a> {
            Box::pin(async move { Ok(input.to_uppercase()) })
        }
    }

    #[test]
    fn more_specific_extension_runs_first() {
        let mut registry = EngineRegistry::new();
        registry.register(Upper::new("generic", &[".html"]));
        registry.register(Upper::new("wildcard", &["*"]));
        registry.register(Upper::new("templated", &[".tmpl.html"]));

        let names = registry.select_names_for("/page.tmpl.html");
        assert_eq!(names, vec!["templated", "generic", "wildcard"]);
    }

    #[test]
    fn explicit_list_overrides_extension_lookup() {
        let mut registry = EngineRegistry::new();
        registry.register(Upper::new("a", &[".html"]));
        registry.register(Upper::new("b", &[".md"]));

        let explicit = vec!["b".to_string(), "missing".to_string()];
        let selected = registry.select_for("/page.html", Some(&explicit));
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id(), "b");
    }

    #[test]
    fn non_matching_extensions_are_excluded() {
        let mut registry = EngineRegistry::new();
        registry.register(Upper::new("md", &[".md"]));
        assert!(registry.select_names_for("/page.html").is_empty());
    }
}
