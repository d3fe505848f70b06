//! Two-phase async fragment resolution.
//!
//! Component renders are not inlined during the synchronous render pass.
//! Phase 1 stores each pending render future under a fresh id and splices
//! a stable placeholder token into the surrounding output, so synchronous
//! template engines treat component references as ordinary strings. Phase
//! 2 scans the fully-assembled document and replaces each token with its
//! awaited fragment; output order is token position, not completion order.

use std::collections::HashMap;
use std::sync::OnceLock;

use futures_util::future::BoxFuture;
use regex::Regex;
use uuid::Uuid;

use crate::error::HandlerError;

/// A pending fragment render.
pub type FragmentFuture = BoxFuture<'static, Result<String, HandlerError>>;

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| {
        Regex::new(r#"<!--<fragment id="([0-9a-f]{32})"/>-->"#).expect("token pattern is valid")
    })
}

/// Per-request table of in-flight fragment renders.
#[derive(Default)]
pub struct FragmentTable {
    pending: HashMap<String, FragmentFuture>,
}

impl FragmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a pending render and return the placeholder token to embed
    /// in its place.
    pub fn insert(&mut self, future: FragmentFuture) -> String {
        let id = Uuid::new_v4().simple().to_string();
        let token = format!("<!--<fragment id=\"{id}\"/>-->");
        self.pending.insert(id, future);
        token
    }

    /// Repeatedly scan `content` for placeholder tokens, awaiting and
    /// splicing in fragments until none remain. Fragments whose output
    /// itself contains tokens (components passed as props) resolve on a
    /// later scan.
    pub async fn resolve(&mut self, mut content: String) -> Result<String, HandlerError> {
        while let Some(found) = token_regex().captures(&content) {
            let span = found.get(0).expect("full match").range();
            let id = found[1].to_string();
            let fragment = match self.pending.remove(&id) {
                Some(future) => future.await?,
                None => {
                    tracing::warn!(fragment = %id, "placeholder with no pending render, dropping");
                    String::new()
                }
            };
            content.replace_range(span, &fragment);
        }
        Ok(content)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
