//! Core data structures for the extracted code graph

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Structural node kinds taken directly from the TypeScript AST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoreNodeType {
    SourceFile,
    Class,
    Interface,
    Enum,
    Function,
    Method,
    Property,
    Parameter,
    Decorator,
    Import,
    Export,
    Variable,
}

impl CoreNodeType {
    /// Stable string form used in node IDs and persisted properties.
    pub fn as_str(&self) -> &'static str {
        match self {
            CoreNodeType::SourceFile => "SourceFile",
            CoreNodeType::Class => "Class",
            CoreNodeType::Interface => "Interface",
            CoreNodeType::Enum => "Enum",
            CoreNodeType::Function => "Function",
            CoreNodeType::Method => "Method",
            CoreNodeType::Property => "Property",
            CoreNodeType::Parameter => "Parameter",
            CoreNodeType::Decorator => "Decorator",
            CoreNodeType::Import => "Import",
            CoreNodeType::Export => "Export",
            CoreNodeType::Variable => "Variable",
        }
    }

    /// The label a node of this kind carries when no framework schema
    /// promotes it.
    pub fn primary_label(&self) -> &'static str {
        self.as_str()
    }
}

impl std::fmt::Display for CoreNodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship types. Structural kinds come straight from the AST;
/// semantic kinds are created by framework edge rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    // ── Structural (from AST) ───────────────────────────────
    Contains,
    HasMember,
    HasParameter,
    DecoratedWith,
    Imports,
    Exports,
    Extends,
    Implements,
    TypedAs,

    // ── Semantic (framework edge rules) ─────────────────────
    Injects,
    Exposes,
    UsesDal,
    ProtectedBy,
    RoutesTo,
    RoutesToHandler,
    InternalApiCall,
}

impl EdgeType {
    /// Stable relationship-type literal used in edge IDs and the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Contains => "CONTAINS",
            EdgeType::HasMember => "HAS_MEMBER",
            EdgeType::HasParameter => "HAS_PARAMETER",
            EdgeType::DecoratedWith => "DECORATED_WITH",
            EdgeType::Imports => "IMPORTS",
            EdgeType::Exports => "EXPORTS",
            EdgeType::Extends => "EXTENDS",
            EdgeType::Implements => "IMPLEMENTS",
            EdgeType::TypedAs => "TYPED_AS",
            EdgeType::Injects => "INJECTS",
            EdgeType::Exposes => "EXPOSES",
            EdgeType::UsesDal => "USES_DAL",
            EdgeType::ProtectedBy => "PROTECTED_BY",
            EdgeType::RoutesTo => "ROUTES_TO",
            EdgeType::RoutesToHandler => "ROUTES_TO_HANDLER",
            EdgeType::InternalApiCall => "INTERNAL_API_CALL",
        }
    }

    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            EdgeType::Contains
                | EdgeType::HasMember
                | EdgeType::HasParameter
                | EdgeType::DecoratedWith
                | EdgeType::Imports
                | EdgeType::Exports
                | EdgeType::Extends
                | EdgeType::Implements
                | EdgeType::TypedAs
        )
    }

    /// Containment chain types whose transitive closure defines a source
    /// file's subgraph.
    pub fn is_containment(&self) -> bool {
        matches!(
            self,
            EdgeType::Contains
                | EdgeType::HasMember
                | EdgeType::HasParameter
                | EdgeType::DecoratedWith
        )
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EdgeType {
    type Err = crate::error::TrellisError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let ty = match s {
            "CONTAINS" => EdgeType::Contains,
            "HAS_MEMBER" => EdgeType::HasMember,
            "HAS_PARAMETER" => EdgeType::HasParameter,
            "DECORATED_WITH" => EdgeType::DecoratedWith,
            "IMPORTS" => EdgeType::Imports,
            "EXPORTS" => EdgeType::Exports,
            "EXTENDS" => EdgeType::Extends,
            "IMPLEMENTS" => EdgeType::Implements,
            "TYPED_AS" => EdgeType::TypedAs,
            "INJECTS" => EdgeType::Injects,
            "EXPOSES" => EdgeType::Exposes,
            "USES_DAL" => EdgeType::UsesDal,
            "PROTECTED_BY" => EdgeType::ProtectedBy,
            "ROUTES_TO" => EdgeType::RoutesTo,
            "ROUTES_TO_HANDLER" => EdgeType::RoutesToHandler,
            "INTERNAL_API_CALL" => EdgeType::InternalApiCall,
            other => {
                return Err(crate::error::TrellisError::Store(format!(
                    "unknown relationship type: {other}"
                )));
            }
        };
        Ok(ty)
    }
}

/// How an edge was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeOrigin {
    /// Directly observed in the AST. Always correct.
    Ast,
    /// Derived from a decorator.
    Decorator,
    /// Derived by a detection-pattern rule.
    Pattern,
    /// Inferred indirectly (name matching and the like).
    Inference,
}

/// Direction of an edge rule. `Both` survives for legacy undirected queries
/// but is advisory; directed semantics are preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeDirection {
    Out,
    In,
    Both,
}

/// A node produced by the parse pipeline.
///
/// `properties` always carries `id, name, coreType, filePath, startLine,
/// endLine, sourceCode, createdAt, projectId`; source-file nodes add
/// `size, mtime, contentHash`. Framework attributes accumulate under the
/// nested `context` object. Live AST handles are kept in a side table owned
/// by the parser, never in this struct, so nodes are plain data from the
/// moment they exist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParsedNode {
    pub id: String,
    pub core_type: CoreNodeType,
    pub semantic_type: Option<String>,
    /// Ordered; the first entry is the primary label.
    pub labels: Vec<String>,
    pub properties: Map<String, Value>,
}

impl ParsedNode {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        core_type: CoreNodeType,
        name: &str,
        file_path: &str,
        start_line: u32,
        end_line: u32,
        source_code: &str,
        project_id: &str,
        parent_id: Option<&str>,
    ) -> Self {
        let id = crate::identity::node_id(core_type, file_path, name, parent_id);
        let mut properties = Map::new();
        properties.insert("id".into(), json!(id));
        properties.insert("name".into(), json!(name));
        properties.insert("coreType".into(), json!(core_type.as_str()));
        properties.insert("filePath".into(), json!(file_path));
        properties.insert("startLine".into(), json!(start_line));
        properties.insert("endLine".into(), json!(end_line));
        properties.insert("sourceCode".into(), json!(source_code));
        properties.insert("createdAt".into(), json!(crate::identity::timestamp()));
        properties.insert("projectId".into(), json!(project_id));

        ParsedNode {
            id,
            core_type,
            semantic_type: None,
            labels: vec![core_type.primary_label().to_string()],
            properties,
        }
    }

    pub fn name(&self) -> &str {
        self.properties
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn file_path(&self) -> &str {
        self.properties
            .get("filePath")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn project_id(&self) -> &str {
        self.properties
            .get("projectId")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn source_code(&self) -> &str {
        self.properties
            .get("sourceCode")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn set_source_code(&mut self, source: String) {
        self.properties.insert("sourceCode".into(), json!(source));
    }

    /// The nested framework-attribute map, if any extractor has written one.
    pub fn context(&self) -> Option<&Map<String, Value>> {
        self.properties.get("context").and_then(Value::as_object)
    }

    /// The nested framework-attribute map, created on first access.
    pub fn context_mut(&mut self) -> &mut Map<String, Value> {
        let entry = self
            .properties
            .entry("context".to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        entry.as_object_mut().expect("context is an object")
    }

    /// Merge extractor output into `context`, later writers win per key.
    pub fn merge_context(&mut self, attributes: Map<String, Value>) {
        let ctx = self.context_mut();
        for (key, value) in attributes {
            ctx.insert(key, value);
        }
    }

    pub fn context_str(&self, key: &str) -> Option<&str> {
        self.context()?.get(key)?.as_str()
    }

    pub fn context_bool(&self, key: &str) -> Option<bool> {
        self.context()?.get(key)?.as_bool()
    }

    /// A context entry holding an array of strings, empty when absent.
    pub fn context_strs(&self, key: &str) -> Vec<&str> {
        self.context()
            .and_then(|c| c.get(key))
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Promote this node to a semantic type. The enhancement's labels are
    /// prepended; an explicit primary label moves to the front. A node that
    /// already carries a semantic type is left untouched.
    pub fn promote(
        &mut self,
        semantic_type: &str,
        labels: &[String],
        primary_label: Option<&str>,
    ) -> bool {
        if self.semantic_type.is_some() {
            return false;
        }
        self.semantic_type = Some(semantic_type.to_string());
        self.properties
            .insert("semanticType".into(), json!(semantic_type));
        for label in labels.iter().rev() {
            if !self.labels.contains(label) {
                self.labels.insert(0, label.clone());
            }
        }
        if let Some(primary) = primary_label {
            self.labels.retain(|l| l != primary);
            self.labels.insert(0, primary.to_string());
        }
        true
    }

    /// Append a non-primary label (e.g. `HttpEndpoint` granted by an edge
    /// rule) without disturbing the primary.
    pub fn add_label(&mut self, label: &str) {
        if !self.labels.iter().any(|l| l == label) {
            self.labels.push(label.to_string());
        }
    }
}

/// Properties attached to every edge; this struct is also the
/// `edgeProperties` half of the persisted cross-file-edge wire format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EdgeProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_type: Option<String>,
    pub source: EdgeOrigin,
    /// Detection confidence in [0, 1].
    pub confidence: f64,
    /// Schema-assigned weight in [0, 1].
    pub relationship_weight: f64,
    pub file_path: String,
    /// ISO-8601 UTC. Informational, never part of identity.
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
}

/// A directed edge produced by the parse pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParsedEdge {
    pub id: String,
    pub relationship_type: EdgeType,
    pub source_node_id: String,
    pub target_node_id: String,
    pub properties: EdgeProperties,
}

impl ParsedEdge {
    /// A structural edge observed directly in the AST.
    pub fn structural(
        relationship_type: EdgeType,
        source_node_id: &str,
        target_node_id: &str,
        file_path: &str,
    ) -> Self {
        let id =
            crate::identity::edge_id(relationship_type.as_str(), source_node_id, target_node_id);
        ParsedEdge {
            id,
            relationship_type,
            source_node_id: source_node_id.to_string(),
            target_node_id: target_node_id.to_string(),
            properties: EdgeProperties {
                core_type: Some(relationship_type.as_str().to_string()),
                semantic_type: None,
                source: EdgeOrigin::Ast,
                confidence: 1.0,
                relationship_weight: 1.0,
                file_path: file_path.to_string(),
                created_at: crate::identity::timestamp(),
                context: None,
            },
        }
    }

    /// A semantic edge created by a framework edge rule. Identity is keyed
    /// by the rule's semantic type so distinct rules sharing a relationship
    /// type (HTTP and RPC `EXPOSES`) never collide.
    pub fn framework(
        relationship_type: EdgeType,
        semantic_type: &str,
        source_node_id: &str,
        target_node_id: &str,
        relationship_weight: f64,
        file_path: &str,
    ) -> Self {
        let id = crate::identity::edge_id(semantic_type, source_node_id, target_node_id);
        ParsedEdge {
            id,
            relationship_type,
            source_node_id: source_node_id.to_string(),
            target_node_id: target_node_id.to_string(),
            properties: EdgeProperties {
                core_type: None,
                semantic_type: Some(semantic_type.to_string()),
                source: EdgeOrigin::Pattern,
                confidence: 0.8,
                relationship_weight,
                file_path: file_path.to_string(),
                created_at: crate::identity::timestamp(),
                context: None,
            },
        }
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.properties.context = Some(context);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.properties.confidence = confidence;
        self
    }

    pub fn with_origin(mut self, origin: EdgeOrigin) -> Self {
        self.properties.source = origin;
        self
    }
}

/// Indexing state of a project in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Parsing,
    Complete,
    Failed,
}

/// The project node owning a subgraph. Created with `status=parsing` before
/// any other mutation and always advanced to `complete` or `failed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub project_id: String,
    pub name: String,
    pub path: String,
    pub status: ProjectStatus,
    pub node_count: u64,
    pub edge_count: u64,
}

impl Project {
    pub fn new(project_id: &str, name: &str, path: &str) -> Self {
        Project {
            project_id: project_id.to_string(),
            name: name.to_string(),
            path: path.to_string(),
            status: ProjectStatus::Parsing,
            node_count: 0,
            edge_count: 0,
        }
    }
}

/// Persistence record for an edge whose endpoints live in different files,
/// saved before a subgraph delete and restored afterwards. Field names match
/// the wire format exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CrossFileEdge {
    pub start_node_id: String,
    pub end_node_id: String,
    pub edge_type: String,
    pub edge_properties: EdgeProperties,
}

impl CrossFileEdge {
    pub fn from_edge(edge: &ParsedEdge) -> Self {
        CrossFileEdge {
            start_node_id: edge.source_node_id.clone(),
            end_node_id: edge.target_node_id.clone(),
            edge_type: edge.relationship_type.as_str().to_string(),
            edge_properties: edge.properties.clone(),
        }
    }
}

/// Per-file tracking info the change detector compares against `stat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileTrackingInfo {
    pub file_path: String,
    pub mtime: i64,
    pub size: u64,
    pub content_hash: String,
}

/// Counters reported when a parse completes. `ambiguous_resolutions` exposes
/// how often name-based resolution had to pick between same-name candidates.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParseDiagnostics {
    pub files_parsed: u64,
    pub files_deleted: u64,
    pub files_skipped: u64,
    pub nodes_created: u64,
    pub edges_created: u64,
    pub deferred_resolved: u64,
    pub deferred_dropped: u64,
    pub ambiguous_resolutions: u64,
    pub cross_file_edges_saved: u64,
    pub cross_file_edges_restored: u64,
}

impl ParseDiagnostics {
    /// Fold per-kind counters into a stable, sorted summary string for logs.
    pub fn summary(&self) -> String {
        let fields: BTreeMap<&str, u64> = BTreeMap::from([
            ("files", self.files_parsed),
            ("nodes", self.nodes_created),
            ("edges", self.edges_created),
            ("ambiguous", self.ambiguous_resolutions),
        ]);
        fields
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
