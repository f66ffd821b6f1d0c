//! In-memory property-graph store
//!
//! A complete `GraphStore` over `petgraph::StableDiGraph` with a stable-ID
//! index. Tests and the CLI run against this; production deployments point
//! the same trait at an external store.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use tokio::sync::RwLock;
use trellis_core::{
    CoreNodeType, CrossFileEdge, EdgeDirection, FileTrackingInfo, ParsedEdge, ParsedNode, Project,
    ProjectStatus, Result, TrellisError, edge_id,
};

use crate::store::GraphStore;

#[derive(Default)]
struct StoreInner {
    graph: StableDiGraph<ParsedNode, ParsedEdge>,
    id_index: HashMap<String, NodeIndex>,
    edge_index: HashMap<String, EdgeIndex>,
    projects: HashMap<String, Project>,
    locked: HashSet<String>,
}

impl StoreInner {
    fn insert_node(&mut self, node: ParsedNode) {
        if let Some(&idx) = self.id_index.get(&node.id) {
            if let Some(weight) = self.graph.node_weight_mut(idx) {
                *weight = node;
                return;
            }
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.id_index.insert(id, idx);
    }

    fn insert_edge(&mut self, edge: ParsedEdge) -> bool {
        let (Some(&src), Some(&tgt)) = (
            self.id_index.get(&edge.source_node_id),
            self.id_index.get(&edge.target_node_id),
        ) else {
            return false;
        };
        if let Some(&idx) = self.edge_index.get(&edge.id) {
            if let Some(weight) = self.graph.edge_weight_mut(idx) {
                *weight = edge;
                return true;
            }
        }
        let id = edge.id.clone();
        let idx = self.graph.add_edge(src, tgt, edge);
        self.edge_index.insert(id, idx);
        true
    }

    fn remove_node(&mut self, idx: NodeIndex) {
        let incident: Vec<String> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .chain(self.graph.edges_directed(idx, Direction::Incoming))
            .map(|e| e.weight().id.clone())
            .collect();
        for edge_id in incident {
            self.edge_index.remove(&edge_id);
        }
        if let Some(node) = self.graph.remove_node(idx) {
            self.id_index.remove(&node.id);
        }
    }

    fn project_nodes(&self, project_id: &str) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .node_weight(idx)
                    .is_some_and(|n| n.project_id() == project_id)
            })
            .collect()
    }
}

pub struct MemoryStore {
    inner: RwLock<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            inner: RwLock::new(StoreInner::default()),
        }
    }

    /// All nodes in a project, for tests and the artifact path.
    pub async fn nodes_for_project(&self, project_id: &str) -> Vec<ParsedNode> {
        let inner = self.inner.read().await;
        inner
            .project_nodes(project_id)
            .into_iter()
            .filter_map(|idx| inner.graph.node_weight(idx).cloned())
            .collect()
    }

    /// All edges in a project, for tests and the artifact path.
    pub async fn edges_for_project(&self, project_id: &str) -> Vec<ParsedEdge> {
        let inner = self.inner.read().await;
        inner
            .graph
            .edge_indices()
            .filter_map(|idx| inner.graph.edge_weight(idx))
            .filter(|e| {
                inner
                    .id_index
                    .get(&e.source_node_id)
                    .and_then(|&i| inner.graph.node_weight(i))
                    .is_some_and(|n| n.project_id() == project_id)
            })
            .cloned()
            .collect()
    }

    /// Edges between two nodes. `Both` matches either orientation; it is
    /// kept for legacy undirected queries and directed lookups should be
    /// preferred.
    pub async fn edges_between(
        &self,
        a: &str,
        b: &str,
        direction: EdgeDirection,
    ) -> Vec<ParsedEdge> {
        let inner = self.inner.read().await;
        inner
            .graph
            .edge_indices()
            .filter_map(|idx| inner.graph.edge_weight(idx))
            .filter(|e| match direction {
                EdgeDirection::Out => e.source_node_id == a && e.target_node_id == b,
                EdgeDirection::In => e.source_node_id == b && e.target_node_id == a,
                EdgeDirection::Both => {
                    (e.source_node_id == a && e.target_node_id == b)
                        || (e.source_node_id == b && e.target_node_id == a)
                }
            })
            .cloned()
            .collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn upsert_project(&self, project: &Project) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .projects
            .insert(project.project_id.clone(), project.clone());
        Ok(())
    }

    async fn update_project_status(
        &self,
        project_id: &str,
        status: ProjectStatus,
        node_count: u64,
        edge_count: u64,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let project = inner
            .projects
            .get_mut(project_id)
            .ok_or_else(|| TrellisError::ProjectNotFound(project_id.to_string()))?;
        project.status = status;
        project.node_count = node_count;
        project.edge_count = edge_count;
        Ok(())
    }

    async fn get_project(&self, project_id: &str) -> Result<Option<Project>> {
        let inner = self.inner.read().await;
        Ok(inner.projects.get(project_id).cloned())
    }

    async fn clear_project(&self, project_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        for idx in inner.project_nodes(project_id) {
            inner.remove_node(idx);
        }
        Ok(())
    }

    async fn upsert_nodes(&self, _project_id: &str, nodes: &[ParsedNode]) -> Result<()> {
        let mut inner = self.inner.write().await;
        for node in nodes {
            inner.insert_node(node.clone());
        }
        Ok(())
    }

    async fn create_edges(&self, _project_id: &str, edges: &[ParsedEdge]) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let mut created = 0u64;
        for edge in edges {
            if inner.insert_edge(edge.clone()) {
                created += 1;
            } else {
                tracing::debug!(edge = %edge.id, "edge skipped, endpoint missing");
            }
        }
        Ok(created)
    }

    async fn file_tracking_info(&self, project_id: &str) -> Result<Vec<FileTrackingInfo>> {
        let inner = self.inner.read().await;
        let mut out = Vec::new();
        for idx in inner.project_nodes(project_id) {
            let Some(node) = inner.graph.node_weight(idx) else {
                continue;
            };
            if node.core_type != CoreNodeType::SourceFile {
                continue;
            }
            out.push(FileTrackingInfo {
                file_path: node.file_path().to_string(),
                mtime: node
                    .properties
                    .get("mtime")
                    .and_then(|v| v.as_i64())
                    .unwrap_or(0),
                size: node
                    .properties
                    .get("size")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0),
                content_hash: node
                    .properties
                    .get("contentHash")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
            });
        }
        Ok(out)
    }

    async fn nodes_excluding_files(
        &self,
        project_id: &str,
        excluded_files: &[String],
    ) -> Result<Vec<ParsedNode>> {
        let excluded: HashSet<&str> = excluded_files.iter().map(String::as_str).collect();
        let inner = self.inner.read().await;
        let mut stubs = Vec::new();
        for idx in inner.project_nodes(project_id) {
            let Some(node) = inner.graph.node_weight(idx) else {
                continue;
            };
            if excluded.contains(node.file_path()) {
                continue;
            }
            let mut stub = node.clone();
            // Edge detectors only need identity, labels, and context.
            stub.set_source_code(String::new());
            stubs.push(stub);
        }
        Ok(stubs)
    }

    async fn cross_file_edges(
        &self,
        project_id: &str,
        files: &[String],
    ) -> Result<Vec<CrossFileEdge>> {
        let affected: HashSet<&str> = files.iter().map(String::as_str).collect();
        let inner = self.inner.read().await;
        let mut out = Vec::new();
        for idx in inner.graph.edge_indices() {
            let Some(edge) = inner.graph.edge_weight(idx) else {
                continue;
            };
            let (Some(&src), Some(&tgt)) = (
                inner.id_index.get(&edge.source_node_id),
                inner.id_index.get(&edge.target_node_id),
            ) else {
                continue;
            };
            let (Some(source), Some(target)) =
                (inner.graph.node_weight(src), inner.graph.node_weight(tgt))
            else {
                continue;
            };
            if source.project_id() != project_id {
                continue;
            }
            let src_in = affected.contains(source.file_path());
            let tgt_in = affected.contains(target.file_path());
            if src_in ^ tgt_in {
                out.push(CrossFileEdge::from_edge(edge));
            }
        }
        Ok(out)
    }

    async fn delete_file_subgraphs(&self, project_id: &str, file_paths: &[String]) -> Result<u64> {
        let files: HashSet<&str> = file_paths.iter().map(String::as_str).collect();
        let mut inner = self.inner.write().await;

        // Roots are the source-file nodes; the walk follows containment
        // chains. Nodes tagged with an affected filePath are included even
        // if a containment edge went missing.
        let mut doomed: HashSet<NodeIndex> = HashSet::new();
        let mut queue: Vec<NodeIndex> = Vec::new();
        for idx in inner.project_nodes(project_id) {
            let Some(node) = inner.graph.node_weight(idx) else {
                continue;
            };
            if files.contains(node.file_path()) {
                if doomed.insert(idx) {
                    queue.push(idx);
                }
            }
        }
        while let Some(idx) = queue.pop() {
            let children: Vec<NodeIndex> = inner
                .graph
                .edges_directed(idx, Direction::Outgoing)
                .filter(|e| e.weight().relationship_type.is_containment())
                .map(|e| e.target())
                .collect();
            for child in children {
                if doomed.insert(child) {
                    queue.push(child);
                }
            }
        }

        let removed = doomed.len() as u64;
        for idx in doomed {
            inner.remove_node(idx);
        }
        Ok(removed)
    }

    async fn restore_cross_file_edges(
        &self,
        _project_id: &str,
        edges: &[CrossFileEdge],
    ) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let mut restored = 0u64;
        for record in edges {
            if !inner.id_index.contains_key(&record.start_node_id)
                || !inner.id_index.contains_key(&record.end_node_id)
            {
                continue;
            }
            // Identity is recomputed the same way it was originally derived:
            // from the semantic type when present, else the relationship type.
            let identity_key = record
                .edge_properties
                .semantic_type
                .as_deref()
                .unwrap_or(record.edge_type.as_str());
            let id = edge_id(identity_key, &record.start_node_id, &record.end_node_id);
            let relationship_type = record.edge_type.parse()?;
            let edge = ParsedEdge {
                id,
                relationship_type,
                source_node_id: record.start_node_id.clone(),
                target_node_id: record.end_node_id.clone(),
                properties: record.edge_properties.clone(),
            };
            if inner.insert_edge(edge) {
                restored += 1;
            }
        }
        Ok(restored)
    }

    async fn node_count(&self, project_id: &str) -> Result<u64> {
        let inner = self.inner.read().await;
        Ok(inner.project_nodes(project_id).len() as u64)
    }

    async fn edge_count(&self, project_id: &str) -> Result<u64> {
        let inner = self.inner.read().await;
        let mut count = 0u64;
        for idx in inner.graph.edge_indices() {
            let Some(edge) = inner.graph.edge_weight(idx) else {
                continue;
            };
            let in_project = inner
                .id_index
                .get(&edge.source_node_id)
                .and_then(|&i| inner.graph.node_weight(i))
                .is_some_and(|n| n.project_id() == project_id);
            if in_project {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn get_node(&self, node_id: &str) -> Result<Option<ParsedNode>> {
        let inner = self.inner.read().await;
        Ok(inner
            .id_index
            .get(node_id)
            .and_then(|&idx| inner.graph.node_weight(idx))
            .cloned())
    }

    async fn lock_nodes(&self, node_ids: &[String]) -> Result<bool> {
        let mut inner = self.inner.write().await;
        if node_ids.iter().any(|id| inner.locked.contains(id)) {
            return Ok(false);
        }
        for id in node_ids {
            inner.locked.insert(id.clone());
        }
        Ok(true)
    }

    async fn unlock_nodes(&self, node_ids: &[String]) -> Result<()> {
        let mut inner = self.inner.write().await;
        for id in node_ids {
            inner.locked.remove(id);
        }
        Ok(())
    }
}
