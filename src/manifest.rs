//! The manifest: programmatic exports for files in the routes tree.
//!
//! Route files that are plain content (markup, data) need nothing here;
//! files that carry behavior (method handlers, render functions, typed
//! state fields) register their exports against the file's pathname so
//! the indexer never has to load code at request time.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::http::Method;
use regex::Regex;

use crate::registry::{BoxedHandler, ComponentFn, MethodFilter, RenderFn, StateMap};

/// Exports contributed by one file: handlers, render function, pattern
/// override and arbitrary state fields.
#[derive(Default)]
pub struct Exports {
    /// Explicit match pattern, overriding the path-derived one. Display
    /// syntax, e.g. `/user/:id`.
    pub pattern: Option<String>,
    /// One handler per HTTP method (terminal entries for routes).
    pub methods: Vec<(Method, BoxedHandler)>,
    /// The handler of a `_middleware` file.
    pub handler: Option<BoxedHandler>,
    /// Method filter for a `_middleware` file (defaults to every method).
    pub method: Option<MethodFilter>,
    /// Marks a `_middleware` handler as terminal (it produces the
    /// response rather than passing through).
    pub initialises_response: bool,
    /// Render function for a route, layout or error page.
    pub render: Option<RenderFn>,
    /// Render function for a component.
    pub component_render: Option<ComponentFn>,
    /// Name override for layouts and components.
    pub name: Option<String>,
    /// State fields merged with any file-derived frontmatter.
    pub fields: StateMap,
}

impl Exports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn on(mut self, method: Method, handler: BoxedHandler) -> Self {
        self.methods.push((method, handler));
        self
    }

    pub fn get(self, handler: BoxedHandler) -> Self {
        self.on(Method::GET, handler)
    }

    pub fn post(self, handler: BoxedHandler) -> Self {
        self.on(Method::POST, handler)
    }

    pub fn put(self, handler: BoxedHandler) -> Self {
        self.on(Method::PUT, handler)
    }

    pub fn delete(self, handler: BoxedHandler) -> Self {
        self.on(Method::DELETE, handler)
    }

    pub fn handler(mut self, handler: BoxedHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(MethodFilter::Only(method));
        self
    }

    pub fn terminal(mut self) -> Self {
        self.initialises_response = true;
        self
    }

    pub fn render(mut self, render: RenderFn) -> Self {
        self.render = Some(render);
        self
    }

    pub fn component_render(mut self, render: ComponentFn) -> Self {
        self.component_render = Some(render);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}

/// Maps route-tree pathnames to their exports, plus the project root the
/// routes and static directories hang off.
pub struct Manifest {
    pub import_root: PathBuf,
    routes_dir: String,
    static_dir: String,
    /// Tested against pathnames from the routes and static trees; matches
    /// are skipped unless the file is a `_`-convention entry.
    pub ignore_pattern: Option<Regex>,
    pub routes: HashMap<String, Exports>,
    pub layouts: HashMap<String, Exports>,
    pub components: HashMap<String, Exports>,
}

impl Manifest {
    pub fn new(import_root: impl Into<PathBuf>) -> Self {
        Self {
            import_root: import_root.into(),
            routes_dir: "routes".to_string(),
            static_dir: "static".to_string(),
            ignore_pattern: Some(Regex::new(r"/(\.|_)").expect("literal pattern compiles")),
            routes: HashMap::new(),
            layouts: HashMap::new(),
            components: HashMap::new(),
        }
    }

    pub fn routes_dir(mut self, dir: impl Into<String>) -> Self {
        self.routes_dir = dir.into();
        self
    }

    pub fn static_dir(mut self, dir: impl Into<String>) -> Self {
        self.static_dir = dir.into();
        self
    }

    /// Register exports for a route-tree file, keyed by its `/`-prefixed
    /// pathname (e.g. `/blog/[slug].md`).
    pub fn route(mut self, pathname: impl Into<String>, exports: Exports) -> Self {
        self.routes.insert(pathname.into(), exports);
        self
    }

    /// Register exports for a layout file, keyed by its pathname inside
    /// `_layouts/` (e.g. `/base.html`).
    pub fn layout(mut self, pathname: impl Into<String>, exports: Exports) -> Self {
        self.layouts.insert(pathname.into(), exports);
        self
    }

    /// Register exports for a component file, keyed by its pathname inside
    /// `_components/` (e.g. `/card.html`).
    pub fn component(mut self, pathname: impl Into<String>, exports: Exports) -> Self {
        self.components.insert(pathname.into(), exports);
        self
    }

    pub fn ignore_pattern(mut self, pattern: Option<Regex>) -> Self {
        self.ignore_pattern = pattern;
        self
    }

    pub fn routes_root(&self) -> PathBuf {
        self.import_root.join(&self.routes_dir)
    }

    pub fn static_root(&self) -> PathBuf {
        self.import_root.join(&self.static_dir)
    }

    pub fn is_ignored(&self, pathname: &str) -> bool {
        self.ignore_pattern
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(pathname))
    }

    pub fn root(&self) -> &Path {
        &self.import_root
    }
}
