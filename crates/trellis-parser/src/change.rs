//! Change detection for incremental re-parse (C8)
//!
//! Compares the files on disk against the store's tracking info. A file
//! re-parses when it is unknown, or when `mtime`/`size` moved AND the
//! content hash actually differs. Indexed files that vanished are deletes.
//! Deletes are computed alongside re-parses so the orchestrator can handle
//! both in one window.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use ignore::WalkBuilder;
use trellis_core::{Result, TrellisError, content_hash};
use trellis_store::GraphStore;

/// One source file on disk.
#[derive(Debug, Clone)]
pub struct SourceFileEntry {
    pub abs_path: PathBuf,
    /// Project-relative path with forward slashes; this is the node
    /// `filePath` and the identity input.
    pub rel_path: String,
    pub size: u64,
    pub mtime: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub files_to_reparse: Vec<String>,
    pub files_to_delete: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.files_to_reparse.is_empty() && self.files_to_delete.is_empty()
    }

    /// Every file whose subgraph is affected (delete ∪ reparse).
    pub fn affected_files(&self) -> Vec<String> {
        let mut all = self.files_to_delete.clone();
        for f in &self.files_to_reparse {
            if !all.contains(f) {
                all.push(f.clone());
            }
        }
        all.sort();
        all
    }
}

const SKIP_DIRS: &[&str] = &["node_modules", "dist", "build", "coverage"];

fn skipped_dir(path: &Path) -> bool {
    path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .is_some_and(|s| SKIP_DIRS.contains(&s))
    })
}

fn is_typescript(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("ts") | Some("tsx")
    )
}

/// Enumerate the project's TypeScript files in sorted order, rejecting any
/// path that escapes the project root through a symlink.
pub fn enumerate_source_files(root: &Path) -> Result<Vec<SourceFileEntry>> {
    let canonical_root = root.canonicalize()?;
    let mut entries = Vec::new();

    let walker = WalkBuilder::new(root)
        .follow_links(false)
        .sort_by_file_path(|a, b| a.cmp(b))
        .build();
    for entry in walker {
        let entry = entry.map_err(|e| TrellisError::Configuration(format!("walk: {e}")))?;
        let path = entry.path();
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        if !is_typescript(path) || skipped_dir(path) {
            continue;
        }
        let real = path.canonicalize()?;
        if !real.starts_with(&canonical_root) {
            return Err(TrellisError::PathEscape {
                path: path.to_path_buf(),
                root: canonical_root,
            });
        }
        let metadata = std::fs::metadata(path)?;
        let mtime = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        let rel_path = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        entries.push(SourceFileEntry {
            abs_path: path.to_path_buf(),
            rel_path,
            size: metadata.len(),
            mtime,
        });
    }
    Ok(entries)
}

/// Compare disk state against the store. Returns the change set and the
/// full enumeration (so the caller stats each file exactly once).
pub async fn detect_changes(
    root: &Path,
    project_id: &str,
    store: &dyn GraphStore,
) -> Result<(ChangeSet, Vec<SourceFileEntry>)> {
    let entries = enumerate_source_files(root)?;
    let tracked: HashMap<String, _> = store
        .file_tracking_info(project_id)
        .await?
        .into_iter()
        .map(|info| (info.file_path.clone(), info))
        .collect();

    let mut changes = ChangeSet::default();
    for entry in &entries {
        match tracked.get(&entry.rel_path) {
            None => changes.files_to_reparse.push(entry.rel_path.clone()),
            Some(info) => {
                if info.mtime == entry.mtime && info.size == entry.size {
                    continue;
                }
                // stat moved; only the content hash decides
                let bytes = std::fs::read(&entry.abs_path)?;
                if content_hash(&bytes) != info.content_hash {
                    changes.files_to_reparse.push(entry.rel_path.clone());
                }
            }
        }
    }
    let current: std::collections::HashSet<&str> =
        entries.iter().map(|e| e.rel_path.as_str()).collect();
    for path in tracked.keys() {
        if !current.contains(path.as_str()) {
            changes.files_to_delete.push(path.clone());
        }
    }
    changes.files_to_reparse.sort();
    changes.files_to_delete.sort();

    tracing::debug!(
        reparse = changes.files_to_reparse.len(),
        delete = changes.files_to_delete.len(),
        "change detection complete"
    );
    Ok((changes, entries))
}
