//! Trellis Watcher — debounced filesystem watching for incremental parses

pub mod watcher;

pub use watcher::{FileWatcher, WatchEvent, WatchService};
