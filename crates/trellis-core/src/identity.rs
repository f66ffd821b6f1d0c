//! Deterministic identity for nodes, edges, and projects
//!
//! IDs must survive re-parses and process restarts, so they are derived from
//! a cryptographic digest of stable inputs rather than a process-seeded
//! hasher. Two runs over identical inputs produce identical IDs.

use sha2::{Digest, Sha256};

use crate::model::CoreNodeType;

/// SHA-256 of `input`, truncated to 16 hex characters.
pub fn hash16(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut out = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Stable node ID: `{CoreType}:{hash16}` over core type, file path, optional
/// parent ID, and name. The type prefix keeps distinct kinds from ever
/// colliding even on a digest collision.
pub fn node_id(
    core_type: CoreNodeType,
    file_path: &str,
    name: &str,
    parent_id: Option<&str>,
) -> String {
    let mut input = String::with_capacity(file_path.len() + name.len() + 32);
    input.push_str(core_type.as_str());
    input.push_str("::");
    input.push_str(file_path);
    if let Some(parent) = parent_id {
        input.push_str("::");
        input.push_str(parent);
    }
    input.push_str("::");
    input.push_str(name);
    format!("{}:{}", core_type.as_str(), hash16(&input))
}

/// Stable edge ID: `{TYPE}:{hash16}` over the relationship (or semantic)
/// type and the endpoint node IDs.
pub fn edge_id(edge_type: &str, source_node_id: &str, target_node_id: &str) -> String {
    let input = format!("{edge_type}::{source_node_id}::{target_node_id}");
    format!("{edge_type}:{}", hash16(&input))
}

/// Deterministic project ID derived from the project's absolute path.
/// Callers may override it in the parse request.
pub fn project_id(absolute_path: &str) -> String {
    format!("project:{}", hash16(absolute_path))
}

/// Truncated SHA-256 of file contents, used for change detection and the
/// source-file node's `contentHash` property.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// ISO-8601 UTC timestamp for `createdAt` properties. Informational only;
/// identity never depends on it.
pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Placeholder names for constructs whose `name` getter yields nothing.
/// A single anonymous sibling is stable; two under the same parent would
/// collide, which the traversal detects and rejects per file.
pub const ANONYMOUS_CLASS: &str = "AnonymousClass";
pub const ANONYMOUS_FUNCTION: &str = "AnonymousFunction";
