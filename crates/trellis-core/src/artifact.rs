//! Graph JSON artifact written to `<project>/code-graph.json`
//!
//! The artifact is a self-contained export of a parse: downstream importers
//! can load it into a store without re-parsing, and a partial-success run
//! (store import failed after parsing) reports its path for retry.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::model::{ParsedEdge, ParsedNode};

pub const ARTIFACT_FILE: &str = "code-graph.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactNode {
    pub id: String,
    pub labels: Vec<String>,
    pub properties: Map<String, Value>,
    pub skip_embedding: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactEdge {
    pub id: String,
    #[serde(rename = "type")]
    pub edge_type: String,
    pub start_node_id: String,
    pub end_node_id: String,
    pub properties: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncrementalSummary {
    pub files_reparsed: u64,
    pub files_deleted: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
    pub core_schema: String,
    pub framework_schemas: Vec<String>,
    pub project_type: String,
    pub project_id: String,
    /// ISO-8601 UTC generation time.
    pub generated: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incremental: Option<IncrementalSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphArtifact {
    pub nodes: Vec<ArtifactNode>,
    pub edges: Vec<ArtifactEdge>,
    pub metadata: ArtifactMetadata,
}

impl GraphArtifact {
    pub fn build(
        nodes: &[ParsedNode],
        edges: &[ParsedEdge],
        metadata: ArtifactMetadata,
    ) -> Result<Self> {
        let nodes = nodes
            .iter()
            .map(|n| ArtifactNode {
                id: n.id.clone(),
                labels: n.labels.clone(),
                properties: n.properties.clone(),
                skip_embedding: skip_embedding(n),
            })
            .collect();
        let edges = edges
            .iter()
            .map(|e| {
                Ok(ArtifactEdge {
                    id: e.id.clone(),
                    edge_type: e.relationship_type.as_str().to_string(),
                    start_node_id: e.source_node_id.clone(),
                    end_node_id: e.target_node_id.clone(),
                    properties: serde_json::to_value(&e.properties)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(GraphArtifact {
            nodes,
            edges,
            metadata,
        })
    }

    /// Write the artifact under `project_root`. Returns the written path.
    pub fn write(&self, project_root: &Path) -> Result<std::path::PathBuf> {
        let path = project_root.join(ARTIFACT_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        tracing::debug!("graph artifact written: {}", path.display());
        Ok(path)
    }
}

/// Leaf plumbing nodes carry no prose worth embedding.
fn skip_embedding(node: &ParsedNode) -> bool {
    use crate::model::CoreNodeType::*;
    matches!(node.core_type, Decorator | Import | Export | Parameter)
}
