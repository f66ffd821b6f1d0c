//! Project-scoped persistence adapter
//!
//! Wraps a `GraphStore` with the operations the orchestrator needs: chunked
//! commits, cross-file edge save/restore, and subgraph deletes. Streaming
//! commits bound memory on large projects: nodes are upserted in chunks of
//! whole files, and edges only after every node chunk exists, so no edge is
//! ever created against a missing endpoint.

use std::collections::BTreeMap;

use trellis_core::{CrossFileEdge, ParsedEdge, ParsedNode, Result};

use crate::store::GraphStore;

/// Projects above this many files stream their commit in chunks.
pub const STREAMING_FILE_THRESHOLD: usize = 100;

/// Files per streaming chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, Default)]
pub struct CommitStats {
    pub nodes_written: u64,
    pub edges_written: u64,
    pub chunks: u64,
}

pub struct PersistenceAdapter<'a> {
    store: &'a dyn GraphStore,
    project_id: String,
}

impl<'a> PersistenceAdapter<'a> {
    pub fn new(store: &'a dyn GraphStore, project_id: &str) -> Self {
        PersistenceAdapter {
            store,
            project_id: project_id.to_string(),
        }
    }

    /// Commit nodes then edges. `chunk_files = Some(n)` streams in chunks of
    /// `n` files; `None` writes one batch.
    pub async fn commit(
        &self,
        nodes: &[ParsedNode],
        edges: &[ParsedEdge],
        chunk_files: Option<usize>,
    ) -> Result<CommitStats> {
        let mut stats = CommitStats::default();
        match chunk_files {
            None => {
                self.store.upsert_nodes(&self.project_id, nodes).await?;
                stats.nodes_written = nodes.len() as u64;
                stats.chunks = 1;
                stats.edges_written = self.store.create_edges(&self.project_id, edges).await?;
            }
            Some(per_chunk) => {
                let per_chunk = per_chunk.max(1);
                for chunk in chunk_by_file(nodes, |n| n.file_path(), per_chunk) {
                    self.store.upsert_nodes(&self.project_id, &chunk).await?;
                    stats.nodes_written += chunk.len() as u64;
                    stats.chunks += 1;
                    tracing::debug!(
                        chunk = stats.chunks,
                        nodes = chunk.len(),
                        "streamed node chunk"
                    );
                }
                for chunk in chunk_by_file(edges, |e| e.properties.file_path.as_str(), per_chunk) {
                    stats.edges_written +=
                        self.store.create_edges(&self.project_id, &chunk).await?;
                }
            }
        }
        Ok(stats)
    }

    /// Record every edge that crosses the boundary of `files` before those
    /// subgraphs are deleted.
    pub async fn save_cross_file_edges(&self, files: &[String]) -> Result<Vec<CrossFileEdge>> {
        self.store.cross_file_edges(&self.project_id, files).await
    }

    pub async fn delete_subgraphs(&self, files: &[String]) -> Result<u64> {
        self.store
            .delete_file_subgraphs(&self.project_id, files)
            .await
    }

    /// Stub nodes outside the affected file set, for edge detection.
    pub async fn load_stubs(&self, affected_files: &[String]) -> Result<Vec<ParsedNode>> {
        self.store
            .nodes_excluding_files(&self.project_id, affected_files)
            .await
    }

    /// Recreate saved cross-file edges. Returns `(restored, expected)`; a
    /// shortfall means the counterparty was itself deleted, which is
    /// expected and non-fatal.
    pub async fn restore_edges(&self, saved: &[CrossFileEdge]) -> Result<(u64, u64)> {
        let restored = self
            .store
            .restore_cross_file_edges(&self.project_id, saved)
            .await?;
        Ok((restored, saved.len() as u64))
    }
}

/// Split items into chunks covering at most `files_per_chunk` distinct
/// files, preserving input order within each file.
fn chunk_by_file<T: Clone, F: Fn(&T) -> &str>(
    items: &[T],
    file_of: F,
    files_per_chunk: usize,
) -> Vec<Vec<T>> {
    let mut by_file: BTreeMap<&str, Vec<&T>> = BTreeMap::new();
    for item in items {
        by_file.entry(file_of(item)).or_default().push(item);
    }
    let mut chunks = Vec::new();
    let mut current: Vec<T> = Vec::new();
    let mut files_in_current = 0usize;
    for (_, group) in by_file {
        if files_in_current == files_per_chunk {
            chunks.push(std::mem::take(&mut current));
            files_in_current = 0;
        }
        current.extend(group.into_iter().cloned());
        files_in_current += 1;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunking_groups_whole_files() {
        let items = vec![
            ("a.ts", 1),
            ("a.ts", 2),
            ("b.ts", 3),
            ("c.ts", 4),
            ("c.ts", 5),
        ];
        let chunks = chunk_by_file(&items, |i| i.0, 2);
        assert_eq!(chunks.len(), 2);
        // First chunk: files a and b, whole
        assert_eq!(chunks[0], vec![("a.ts", 1), ("a.ts", 2), ("b.ts", 3)]);
        assert_eq!(chunks[1], vec![("c.ts", 4), ("c.ts", 5)]);
    }

    #[test]
    fn chunking_never_splits_a_file() {
        let items: Vec<(&str, u32)> = (0..10).map(|i| ("same.ts", i)).collect();
        let chunks = chunk_by_file(&items, |i| i.0, 1);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 10);
    }
}
