//! arbor server entry point.
//!
//! Loads configuration, indexes the site once, and serves it. With
//! `--dev`, the routes and static trees are watched and re-indexed on
//! change; each re-index swaps a fresh dispatcher generation in without
//! dropping in-flight requests.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arbor::config::{load_config, ServerConfig};
use arbor::dispatch::Dispatcher;
use arbor::indexer::index_site;
use arbor::manifest::Manifest;
use arbor::reader::FileReader;
use arbor::render::{EngineRegistry, RenderEnv};
use arbor::server::ArborServer;
use arbor::watcher::RoutesWatcher;

#[derive(Parser)]
#[command(name = "arbor", version, about = "File-system-driven web server")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Project root holding the routes/ and static/ trees.
    #[arg(long)]
    root: Option<PathBuf>,

    /// Watch the routes tree and re-index on change.
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "arbor=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(root) = &cli.root {
        config.site.root = root.display().to_string();
    }
    if cli.dev {
        config.dev.watch = true;
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        root = %config.site.root,
        watch = config.dev.watch,
        "Configuration loaded"
    );

    let reader = Arc::new(FileReader::new());
    let engines = Arc::new(EngineRegistry::new());
    let manifest = Arc::new(
        Manifest::new(&config.site.root)
            .routes_dir(&config.site.routes_dir)
            .static_dir(&config.site.static_dir),
    );

    let output = index_site(&manifest, &reader, &engines).await?;
    let env = RenderEnv {
        engines: Arc::clone(&engines),
        catalogue: Arc::new(output.catalogue),
    };
    let dispatcher = Dispatcher::new(Arc::new(output.registry), env, config.limits.body_bytes);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let (rebuild_tx, rebuild_rx) = mpsc::unbounded_channel();

    // Dev mode: re-index on filesystem change and swap the generation in
    let _watcher_guard = if config.dev.watch {
        let (watcher, mut signals) = RoutesWatcher::new(
            vec![manifest.routes_root(), manifest.static_root()],
            Duration::from_secs(config.dev.poll_interval_secs),
        );
        let guard = watcher.run()?;
        let reader = Arc::clone(&reader);
        let engines = Arc::clone(&engines);
        let manifest = Arc::clone(&manifest);
        let body_limit = config.limits.body_bytes;
        tokio::spawn(async move {
            while signals.recv().await.is_some() {
                reader.invalidate();
                match index_site(&manifest, &reader, &engines).await {
                    Ok(output) => {
                        let env = RenderEnv {
                            engines: Arc::clone(&engines),
                            catalogue: Arc::new(output.catalogue),
                        };
                        let dispatcher =
                            Dispatcher::new(Arc::new(output.registry), env, body_limit);
                        if rebuild_tx.send(dispatcher).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "re-index failed, keeping current generation");
                    }
                }
            }
        });
        Some(guard)
    } else {
        None
    };

    let server = ArborServer::new(config, dispatcher);
    server.run(listener, rebuild_rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
