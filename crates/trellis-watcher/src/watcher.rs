//! Filesystem watcher driving incremental re-parses
//!
//! Events from `notify` are filtered down to TypeScript sources, coalesced
//! over a debounce window, and answered with one incremental parse per
//! burst. The change detector decides what actually re-parses, so the
//! watcher only needs to know that *something* happened.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use trellis_core::Result;
use trellis_parser::{ParseOptions, parse_project};
use trellis_store::GraphStore;

/// Events emitted by the file watcher.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
}

/// Raw filesystem watcher for a project root.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    event_rx: mpsc::UnboundedReceiver<WatchEvent>,
    root_path: PathBuf,
}

impl FileWatcher {
    pub fn new(root_path: impl AsRef<Path>) -> Result<Self> {
        let root_path = root_path.as_ref().to_path_buf();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    debug!("file system event: {:?}", event);
                    Self::handle_notify_event(event, &event_tx);
                }
                Err(e) => {
                    error!("file system watch error: {e}");
                }
            },
        )
        .map_err(|e| trellis_core::TrellisError::Configuration(format!("watcher: {e}")))?;

        Ok(Self {
            watcher,
            event_rx,
            root_path,
        })
    }

    fn handle_notify_event(event: notify::Event, event_tx: &mpsc::UnboundedSender<WatchEvent>) {
        let wrap: fn(PathBuf) -> WatchEvent = match event.kind {
            notify::EventKind::Create(_) => WatchEvent::Created,
            notify::EventKind::Modify(_) => WatchEvent::Modified,
            notify::EventKind::Remove(_) => WatchEvent::Removed,
            _ => return,
        };
        for path in event.paths {
            if !is_relevant(&path) {
                continue;
            }
            if let Err(e) = event_tx.send(wrap(path)) {
                warn!("failed to forward watch event: {e}");
            }
        }
    }

    /// Start watching the project root recursively.
    pub fn watch(&mut self) -> Result<()> {
        info!("watching directory: {}", self.root_path.display());
        self.watcher
            .watch(&self.root_path, RecursiveMode::Recursive)
            .map_err(|e| trellis_core::TrellisError::Configuration(format!("watch: {e}")))?;
        Ok(())
    }

    pub fn event_receiver(&mut self) -> &mut mpsc::UnboundedReceiver<WatchEvent> {
        &mut self.event_rx
    }
}

/// TypeScript sources outside the usual build/dependency directories.
fn is_relevant(path: &Path) -> bool {
    let is_ts = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("ts") | Some("tsx")
    );
    if !is_ts {
        return false;
    }
    !path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .is_some_and(|s| s == "node_modules" || s == ".git" || s == "dist" || s == "build")
    })
}

/// Watch service: debounce events, then run one incremental parse per burst.
pub struct WatchService {
    store: Arc<dyn GraphStore>,
    options: ParseOptions,
    debounce: Duration,
}

impl WatchService {
    pub fn new(store: Arc<dyn GraphStore>, options: ParseOptions, debounce_ms: u64) -> Self {
        let mut options = options;
        // Watching is incremental by definition.
        options.clear_existing = false;
        WatchService {
            store,
            options,
            debounce: Duration::from_millis(debounce_ms),
        }
    }

    /// Watch until the event stream closes. Each coalesced burst of changes
    /// triggers one incremental parse; parse failures are logged and
    /// watching continues.
    pub async fn run(self) -> Result<()> {
        let mut watcher = FileWatcher::new(&self.options.project_path)?;
        watcher.watch()?;
        info!(
            "watch mode active, debounce {}ms",
            self.debounce.as_millis()
        );

        loop {
            let Some(first) = watcher.event_receiver().recv().await else {
                return Ok(());
            };
            debug!("change burst started by {:?}", first);
            // Coalesce: keep draining until the window stays quiet.
            loop {
                match tokio::time::timeout(self.debounce, watcher.event_receiver().recv()).await {
                    Ok(Some(event)) => debug!("coalesced {:?}", event),
                    Ok(None) => return Ok(()),
                    Err(_) => break,
                }
            }
            match parse_project(self.store.as_ref(), &self.options).await {
                Ok(outcome) => {
                    info!(
                        "incremental parse complete: {} nodes, {} edges",
                        outcome.node_count, outcome.edge_count
                    );
                }
                Err(e) => {
                    error!("incremental parse failed: {e}");
                }
            }
        }
    }
}
