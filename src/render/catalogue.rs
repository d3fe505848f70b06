//! Layout and component catalogue.
//!
//! Layouts wrap rendered content in an enclosing document and may chain to
//! a parent layout by name. Components render fragments from their own
//! props only; they never read or write the page's state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::error::{HandlerError, IndexError};
use crate::registry::{ComponentFn, RenderSource, StateMap};

use super::engines::EngineRegistry;

/// A wrapping template. `parent` is a name reference into the catalogue,
/// not a pointer; the chain is validated for cycles at indexing time.
pub struct Layout {
    pub name: String,
    pub parent: Option<String>,
    pub source: Arc<RenderSource>,
    pub engines: Vec<String>,
    pub data: StateMap,
}

/// What a component renders: a literal template body or a render function
/// taking the invocation props.
pub enum ComponentSource {
    Body(String),
    Fn(ComponentFn),
}

/// A reusable fragment template, invoked by name with props.
pub struct Component {
    pub name: String,
    pub source: ComponentSource,
    pub engines: Vec<String>,
}

impl Component {
    /// Render this component detached from any request: the returned
    /// future owns its props and engine handles, so it can be resolved
    /// after the synchronous render pass has finished.
    pub fn render_detached(
        self: Arc<Self>,
        props: StateMap,
        engines: Arc<EngineRegistry>,
    ) -> BoxFuture<'static, Result<String, HandlerError>> {
        let component = self;
        Box::pin(async move {
            let mut state = props;
            let mut content = match &component.source {
                ComponentSource::Body(body) => body.clone(),
                ComponentSource::Fn(render) => render(state.clone()).await?,
            };
            for id in &component.engines {
                match engines.by_id(id) {
                    Some(engine) => content = engine.render(content, &mut state).await?,
                    None => tracing::warn!(
                        engine = %id,
                        component = %component.name,
                        "unknown render engine, passing content through"
                    ),
                }
            }
            Ok(content)
        })
    }
}

/// Every layout and component discovered under `_layouts/` and
/// `_components/`, plus any registered through the manifest.
#[derive(Default)]
pub struct Catalogue {
    layouts: HashMap<String, Arc<Layout>>,
    components: HashMap<String, Arc<Component>>,
}

impl Catalogue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_layout(&mut self, layout: Layout) {
        self.layouts.insert(layout.name.clone(), Arc::new(layout));
    }

    pub fn insert_component(&mut self, component: Component) {
        self.components
            .insert(component.name.clone(), Arc::new(component));
    }

    pub fn layout(&self, name: &str) -> Option<Arc<Layout>> {
        self.layouts.get(name).map(Arc::clone)
    }

    pub fn component(&self, name: &str) -> Option<Arc<Component>> {
        self.components.get(name).map(Arc::clone)
    }

    /// Walk every layout's parent chain with a visited set. A chain that
    /// revisits a name is a startup error, never a runtime stack overflow.
    pub fn validate_layout_chains(&self) -> Result<(), IndexError> {
        for start in self.layouts.keys() {
            let mut visited = HashSet::new();
            let mut current = Some(start.clone());
            while let Some(name) = current {
                if !visited.insert(name.clone()) {
                    return Err(IndexError::LayoutCycle(name));
                }
                current = self
                    .layouts
                    .get(&name)
                    .and_then(|layout| layout.parent.clone());
            }
        }
        Ok(())
    }

    /// Merge the data fields of the layout chain starting at `name` into
    /// `state`, inserting only absent keys. The chain is walked innermost
    /// first, so route fields beat every layout and inner layouts beat
    /// outer ones.
    pub fn merge_layout_data(&self, name: &str, state: &mut StateMap) {
        let mut visited = HashSet::new();
        let mut current = Some(name.to_string());
        while let Some(layout_name) = current {
            if !visited.insert(layout_name.clone()) {
                break;
            }
            let Some(layout) = self.layouts.get(&layout_name) else {
                break;
            };
            for (key, value) in &layout.data {
                if !state.contains_key(key) {
                    state.insert(key.clone(), value.clone());
                }
            }
            current = layout.parent.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn layout(name: &str, parent: Option<&str>, data: &[(&str, &str)]) -> Layout {
        let mut values = StateMap::new();
        for (key, value) in data {
            values.insert((*key).to_string(), json!(value));
        }
        Layout {
            name: name.to_string(),
            parent: parent.map(str::to_string),
            source: Arc::new(RenderSource::Body(String::new())),
            engines: Vec::new(),
            data: values,
        }
    }

    #[test]
    fn cycles_are_rejected() {
        let mut catalogue = Catalogue::new();
        catalogue.insert_layout(layout("a.html", Some("b.html"), &[]));
        catalogue.insert_layout(layout("b.html", Some("a.html"), &[]));
        assert!(matches!(
            catalogue.validate_layout_chains(),
            Err(IndexError::LayoutCycle(_))
        ));
    }

    #[test]
    fn straight_chains_validate() {
        let mut catalogue = Catalogue::new();
        catalogue.insert_layout(layout("post.html", Some("base.html"), &[]));
        catalogue.insert_layout(layout("base.html", None, &[]));
        assert!(catalogue.validate_layout_chains().is_ok());
    }

    #[test]
    fn inner_layout_data_beats_outer() {
        let mut catalogue = Catalogue::new();
        catalogue.insert_layout(layout("post.html", Some("base.html"), &[("title", "Post")]));
        catalogue.insert_layout(layout("base.html", None, &[("title", "Base"), ("lang", "en")]));

        let mut state = StateMap::new();
        state.insert("author".to_string(), json!("route"));
        catalogue.merge_layout_data("post.html", &mut state);

        assert_eq!(state["title"], json!("Post"));
        assert_eq!(state["lang"], json!("en"));
        assert_eq!(state["author"], json!("route"));
    }

    #[test]
    fn route_fields_beat_layout_data() {
        let mut catalogue = Catalogue::new();
        catalogue.insert_layout(layout("base.html", None, &[("title", "Base")]));

        let mut state = StateMap::new();
        state.insert("title".to_string(), json!("Route"));
        catalogue.merge_layout_data("base.html", &mut state);
        assert_eq!(state["title"], json!("Route"));
    }
}
