//! Deferred-edge resolution (after all traversal)
//!
//! EXTENDS/IMPLEMENTS/TYPED_AS targets are known only by name at traversal
//! time. Once every node exists, each deferred edge is resolved by
//! `(name, kind)`, first against the freshly parsed set, then against stubs
//! loaded from the store. Unresolved targets are external types and are
//! dropped silently. Same-name-same-kind duplicates across files are a known
//! imprecision of name-based resolution: the first candidate in
//! deterministic order wins and the tie is counted.

use dashmap::DashMap;
use trellis_core::{CoreNodeType, ParsedEdge, ParsedNode};

use crate::traversal::DeferredEdge;

/// Name → node-ID index over one resolution scope. Thread-safe so future
/// callers can build it concurrently with traversal.
pub struct SymbolIndex {
    symbols: DashMap<(CoreNodeType, String), Vec<String>>,
}

impl SymbolIndex {
    pub fn new() -> Self {
        SymbolIndex {
            symbols: DashMap::new(),
        }
    }

    pub fn insert(&self, node: &ParsedNode) {
        self.symbols
            .entry((node.core_type, node.name().to_string()))
            .or_default()
            .push(node.id.clone());
    }

    /// Candidate node IDs for `(kind, name)`, in insertion order.
    pub fn candidates(&self, core_type: CoreNodeType, name: &str) -> Vec<String> {
        self.symbols
            .get(&(core_type, name.to_string()))
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}

impl Default for SymbolIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    pub resolved: u64,
    pub dropped: u64,
    pub ambiguous: u64,
}

/// Resolve every deferred edge against parsed nodes, then stubs.
pub fn resolve_deferred(
    deferred: &[DeferredEdge],
    parsed: &[ParsedNode],
    stubs: &[ParsedNode],
) -> (Vec<ParsedEdge>, ResolutionStats) {
    let parsed_index = SymbolIndex::new();
    for node in parsed {
        parsed_index.insert(node);
    }
    // Stub order out of the store is not guaranteed; sort for determinism.
    let stub_index = SymbolIndex::new();
    let mut sorted_stubs: Vec<&ParsedNode> = stubs.iter().collect();
    sorted_stubs.sort_by(|a, b| (a.file_path(), &a.id).cmp(&(b.file_path(), &b.id)));
    for node in sorted_stubs {
        stub_index.insert(node);
    }

    let mut edges = Vec::new();
    let mut stats = ResolutionStats::default();
    for edge in deferred {
        let mut target: Option<String> = None;
        for &target_type in edge.target_types {
            let candidates = parsed_index.candidates(target_type, &edge.target_name);
            let candidates = if candidates.is_empty() {
                stub_index.candidates(target_type, &edge.target_name)
            } else {
                candidates
            };
            if candidates.len() > 1 {
                stats.ambiguous += 1;
                tracing::debug!(
                    name = %edge.target_name,
                    kind = %target_type,
                    candidates = candidates.len(),
                    "ambiguous name resolution, first match wins"
                );
            }
            if let Some(first) = candidates.into_iter().next() {
                target = Some(first);
                break;
            }
        }
        match target {
            Some(target_id) => {
                let mut resolved = ParsedEdge::structural(
                    edge.edge_type,
                    &edge.source_node_id,
                    &target_id,
                    &edge.file_path,
                );
                resolved.properties.relationship_weight = edge.relationship_weight;
                edges.push(resolved);
                stats.resolved += 1;
            }
            None => {
                // External or library type.
                stats.dropped += 1;
            }
        }
    }
    (edges, stats)
}
