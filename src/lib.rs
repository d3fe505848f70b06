//! arbor: a file-system-driven web serving core.
//!
//! A directory tree of route, middleware, data, layout, component and
//! static-asset files becomes a dispatch table; matched routes render
//! through pluggable engines with layout inheritance and asynchronous
//! component resolution.
//!
//! # Architecture Overview
//!
//! ```text
//!  routes/ + static/ + manifest
//!        │
//!        ▼  (startup, and again on change in dev mode)
//!  ┌──────────┐     ┌────────────────────────────────┐
//!  │ indexer  │────▶│ Registry + Catalogue (sorted,  │
//!  └──────────┘     │ immutable per generation)      │
//!                   └───────────────┬────────────────┘
//!                                   │
//!  Client Request                   ▼
//!  ───────────────▶ server ──▶ dispatcher ──▶ middleware chain
//!                                   │               │
//!                                   │               ▼ (terminal entry)
//!                                   │         render pipeline
//!                                   │         engines → layouts →
//!                                   │         fragment resolution
//!                                   ▼               │
//!  Client Response ◀────────────────┴───────────────┘
//! ```

// Core subsystems
pub mod dispatch;
pub mod indexer;
pub mod pattern;
pub mod registry;
pub mod render;

// Site plumbing
pub mod manifest;
pub mod reader;
pub mod response;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod server;
pub mod watcher;

use std::sync::OnceLock;

pub use config::ServerConfig;
pub use dispatch::{component_fn, handler, render_fn, Context, Dispatcher};
pub use error::{HandlerError, IndexError, PatternError};
pub use indexer::{index_site, IndexOutput};
pub use manifest::{Exports, Manifest};
pub use pattern::MatchPattern;
pub use reader::FileReader;
pub use registry::{Registry, StateMap};
pub use render::{Catalogue, EngineRegistry, RenderEngine, RenderEnv};
pub use server::ArborServer;

/// Query key carrying the build id for immutable asset caching.
pub const ASSET_CACHE_KEY: &str = "_arbor_cache_id";

static BUILD_ID: OnceLock<String> = OnceLock::new();

/// Unique id for this server process, used for asset cache busting and
/// etag derivation.
pub fn build_id() -> &'static str {
    BUILD_ID.get_or_init(|| uuid::Uuid::new_v4().simple().to_string())
}
