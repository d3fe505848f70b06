//! Render pipeline tests: engine ordering, layout nesting and async
//! component resolution.

use axum::http::{Method, StatusCode};
use futures_util::future::BoxFuture;
use serde_json::json;

use arbor::dispatch::Context;
use arbor::error::HandlerError;
use arbor::manifest::{Exports, Manifest};
use arbor::registry::{RenderFuture, StateMap};
use arbor::render::EngineRegistry;
use arbor::{component_fn, render_fn};

mod common;
use common::{build_site, send, write, TagEngine, VarsEngine};

#[tokio::test]
async fn layouts_nest_to_the_root() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "routes/post.md", "---\nlayout: post.html\n---\nhello");
    write(
        dir.path(),
        "routes/_layouts/post.html",
        "---\nlayout: base.html\n---\nP[{content}]",
    );
    write(dir.path(), "routes/_layouts/base.html", "B[{content}]");

    let mut engines = EngineRegistry::new();
    engines.register(VarsEngine::new(&[".html"]));

    let site = build_site(Manifest::new(dir.path()), engines).await;
    let (status, _, body) = send(&site, Method::GET, "/post").await;
    assert_eq!(status, StatusCode::OK);
    // identical to manually nesting base(content = post(content = route))
    assert_eq!(body, "B[P[hello]]");
}

#[tokio::test]
async fn layout_data_defers_to_route_fields() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "routes/page.md",
        "---\nlayout: base.html\ntitle: Route Title\n---\nbody",
    );
    write(
        dir.path(),
        "routes/_layouts/base.html",
        "---\ntitle: Layout Title\nfooter: from layout\n---\n{title}/{footer}/{content}",
    );

    let mut engines = EngineRegistry::new();
    engines.register(VarsEngine::new(&[".html"]));

    let site = build_site(Manifest::new(dir.path()), engines).await;
    let (_, _, body) = send(&site, Method::GET, "/page").await;
    assert_eq!(body, "Route Title/from layout/body");
}

#[tokio::test]
async fn unknown_layout_and_engine_pass_through() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "routes/page.md",
        "---\nlayout: missing.html\nrenderEngines: [nope]\n---\nuntouched",
    );

    let site = build_site(Manifest::new(dir.path()), EngineRegistry::new()).await;
    let (status, _, body) = send(&site, Method::GET, "/page").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "untouched");
}

#[tokio::test]
async fn engines_run_most_specific_extension_first() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "routes/page.tmpl.html", "x");

    let mut engines = EngineRegistry::new();
    engines.register(TagEngine::new("wild", &["*"], "W"));
    engines.register(TagEngine::new("html", &[".html"], "H"));
    engines.register(TagEngine::new("tmpl", &[".tmpl.html"], "T"));

    let site = build_site(Manifest::new(dir.path()), engines).await;
    let (_, _, body) = send(&site, Method::GET, "/page.tmpl").await;
    assert_eq!(body, "xTHW");
}

fn greet(props: StateMap) -> BoxFuture<'static, Result<String, HandlerError>> {
    Box::pin(async move {
        // resolve on a later tick than the synchronous render pass
        tokio::task::yield_now().await;
        let who = props
            .get("who")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("?")
            .to_string();
        Ok(format!("Hello, {who}!"))
    })
}

fn component_page(ctx: &mut Context) -> RenderFuture<'_> {
    Box::pin(async move {
        let mut first = StateMap::new();
        first.insert("who".to_string(), json!("alpha"));
        let mut second = StateMap::new();
        second.insert("who".to_string(), json!("beta"));
        let a = ctx.component("greet.html", first);
        let b = ctx.component("greet.html", second);
        Ok(format!("<main>{a}|{b}</main>"))
    })
}

#[tokio::test]
async fn delayed_components_resolve_fully() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "routes/page.html", "");
    write(dir.path(), "routes/_components/greet.html", "");

    let manifest = Manifest::new(dir.path())
        .route(
            "/page.html",
            Exports::new().render(render_fn(component_page)),
        )
        .component(
            "/greet.html",
            Exports::new().component_render(component_fn(greet)),
        );

    let site = build_site(manifest, EngineRegistry::new()).await;
    let (status, _, body) = send(&site, Method::GET, "/page").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "<main>Hello, alpha!|Hello, beta!</main>");
    assert!(!body.contains("<!--<fragment"));

    // unchanged inputs render byte-identically
    let (_, _, again) = send(&site, Method::GET, "/page").await;
    assert_eq!(body, again);
}

#[tokio::test]
async fn components_wrapped_by_layouts_still_resolve() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "routes/page.html",
        "",
    );
    write(dir.path(), "routes/_components/greet.html", "");
    write(dir.path(), "routes/_layouts/base.html", "B[{content}]");

    fn page_with_layout(ctx: &mut Context) -> RenderFuture<'_> {
        Box::pin(async move {
            ctx.state
                .insert("layout".to_string(), json!("base.html"));
            let mut props = StateMap::new();
            props.insert("who".to_string(), json!("nested"));
            let token = ctx.component("greet.html", props);
            Ok(format!("<p>{token}</p>"))
        })
    }

    let manifest = Manifest::new(dir.path())
        .route(
            "/page.html",
            Exports::new().render(render_fn(page_with_layout)),
        )
        .component(
            "/greet.html",
            Exports::new().component_render(component_fn(greet)),
        );

    let mut engines = EngineRegistry::new();
    engines.register(VarsEngine::new(&[".html"]));

    let site = build_site(manifest, engines).await;
    let (_, _, body) = send(&site, Method::GET, "/page").await;
    assert_eq!(body, "B[<p>Hello, nested!</p>]");
}

#[tokio::test]
async fn unknown_component_renders_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "routes/page.html", "");

    fn page(ctx: &mut Context) -> RenderFuture<'_> {
        Box::pin(async move {
            let token = ctx.component("missing.html", StateMap::new());
            Ok(format!("[{token}]"))
        })
    }

    let manifest = Manifest::new(dir.path())
        .route("/page.html", Exports::new().render(render_fn(page)));
    let site = build_site(manifest, EngineRegistry::new()).await;
    let (_, _, body) = send(&site, Method::GET, "/page").await;
    assert_eq!(body, "[]");
}

#[tokio::test]
async fn explicit_get_uses_the_render_capability() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "routes/wrapped.md",
        "---\nlayout: base.html\n---\ninner",
    );
    write(dir.path(), "routes/_layouts/base.html", "B[{content}]");

    fn wrapped_get(ctx: &mut Context) -> arbor::registry::HandlerFuture<'_> {
        Box::pin(async move {
            let document = ctx.render().await?;
            Ok(arbor::response::html(format!("GET:{document}")))
        })
    }

    let manifest = Manifest::new(dir.path()).route(
        "/wrapped.md",
        Exports::new().get(arbor::handler(wrapped_get)),
    );

    let mut engines = EngineRegistry::new();
    engines.register(VarsEngine::new(&[".html"]));

    let site = build_site(manifest, engines).await;
    let (_, _, body) = send(&site, Method::GET, "/wrapped").await;
    assert_eq!(body, "GET:B[inner]");
}
