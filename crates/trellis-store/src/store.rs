//! The property-graph store interface
//!
//! The parse pipeline only ever talks to this trait. Every query is scoped
//! by `projectId`, which is what makes concurrent parses of different
//! projects safe against a shared store. The node-lock primitive exists for
//! callers that need claim atomicity; the parse itself never takes locks.

use async_trait::async_trait;
use trellis_core::{
    CrossFileEdge, FileTrackingInfo, ParsedEdge, ParsedNode, Project, ProjectStatus, Result,
};

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create or update the project node.
    async fn upsert_project(&self, project: &Project) -> Result<()>;

    /// Advance project status and counts.
    async fn update_project_status(
        &self,
        project_id: &str,
        status: ProjectStatus,
        node_count: u64,
        edge_count: u64,
    ) -> Result<()>;

    async fn get_project(&self, project_id: &str) -> Result<Option<Project>>;

    /// Delete every node and edge carrying this `projectId`.
    async fn clear_project(&self, project_id: &str) -> Result<()>;

    /// Insert-or-replace nodes by ID.
    async fn upsert_nodes(&self, project_id: &str, nodes: &[ParsedNode]) -> Result<()>;

    /// Create edges, MATCH-by-ID then MERGE-by-type: an edge whose endpoints
    /// are not both present is skipped, an edge with an existing ID has its
    /// properties replaced. Returns how many were created or updated.
    async fn create_edges(&self, project_id: &str, edges: &[ParsedEdge]) -> Result<u64>;

    /// Tracking info for every source-file node in the project.
    async fn file_tracking_info(&self, project_id: &str) -> Result<Vec<FileTrackingInfo>>;

    /// Stub nodes for edge detection: all project nodes whose `filePath` is
    /// not in `excluded_files`, with bulky fields stripped.
    async fn nodes_excluding_files(
        &self,
        project_id: &str,
        excluded_files: &[String],
    ) -> Result<Vec<ParsedNode>>;

    /// Edges with exactly one endpoint inside `files` (cross-file edges
    /// about to lose one side to a subgraph delete).
    async fn cross_file_edges(
        &self,
        project_id: &str,
        files: &[String],
    ) -> Result<Vec<CrossFileEdge>>;

    /// Delete the named source files and every transitively-contained node,
    /// with all incident edges. Returns the number of nodes removed.
    async fn delete_file_subgraphs(&self, project_id: &str, file_paths: &[String]) -> Result<u64>;

    /// Recreate saved cross-file edges whose endpoints both still exist.
    /// Returns how many were restored.
    async fn restore_cross_file_edges(
        &self,
        project_id: &str,
        edges: &[CrossFileEdge],
    ) -> Result<u64>;

    async fn node_count(&self, project_id: &str) -> Result<u64>;

    async fn edge_count(&self, project_id: &str) -> Result<u64>;

    async fn get_node(&self, node_id: &str) -> Result<Option<ParsedNode>>;

    /// Exclusive advisory lock over a node set. Returns false if any node is
    /// already locked. Used by task-claim callers, not by the parser.
    async fn lock_nodes(&self, node_ids: &[String]) -> Result<bool>;

    async fn unlock_nodes(&self, node_ids: &[String]) -> Result<()>;
}
