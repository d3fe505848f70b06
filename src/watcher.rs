//! Routes-tree watcher for development-mode re-indexing.

use std::path::PathBuf;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// A watcher that monitors the routes and static trees for changes.
///
/// Each relevant filesystem event produces one rebuild signal; the
/// receiver re-runs the indexer and swaps the fresh generation in.
pub struct RoutesWatcher {
    roots: Vec<PathBuf>,
    poll_interval: Duration,
    signal_tx: mpsc::UnboundedSender<()>,
}

impl RoutesWatcher {
    /// Create a new RoutesWatcher.
    ///
    /// Returns the watcher and a receiver for rebuild signals.
    pub fn new(
        roots: Vec<PathBuf>,
        poll_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        (
            Self {
                roots,
                poll_interval,
                signal_tx,
            },
            signal_rx,
        )
    }

    /// Start watching in a background thread.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.signal_tx.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove() {
                        tracing::info!(paths = ?event.paths, "routes tree change detected, re-indexing");
                        let _ = tx.send(());
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(self.poll_interval),
        )?;

        for root in &self.roots {
            if root.is_dir() {
                watcher.watch(root, RecursiveMode::Recursive)?;
            }
        }

        tracing::info!(roots = ?self.roots, "routes watcher started");
        Ok(watcher)
    }
}
