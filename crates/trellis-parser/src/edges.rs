//! Semantic edge detection (C7)
//!
//! Runs every edge rule over ordered pairs drawn from parsed nodes and
//! store-loaded stubs, requiring at least one parsed endpoint. Predicates
//! are pure functions of node context and the shared index, so enumeration
//! order cannot affect the result.

use serde_json::{Map, Value};
use trellis_core::{ParsedEdge, ParsedNode};
use trellis_schema::SchemaRegistry;

pub struct EdgeDetection {
    pub edges: Vec<ParsedEdge>,
    /// `(node_id, label)` pairs granted by rules to public parsed targets.
    pub label_grants: Vec<(String, &'static str)>,
}

pub fn detect_edges(
    parsed: &[ParsedNode],
    stubs: &[ParsedNode],
    registry: &SchemaRegistry,
    shared: &Map<String, Value>,
) -> EdgeDetection {
    let all: Vec<&ParsedNode> = parsed.iter().chain(stubs.iter()).collect();
    let parsed_len = parsed.len();

    let mut edges = Vec::new();
    let mut label_grants = Vec::new();
    for rule in registry.edge_rules() {
        for (i, source) in all.iter().enumerate() {
            for (j, target) in all.iter().enumerate() {
                if i == j {
                    continue;
                }
                // Pairs entirely inside the stub set were detected when
                // their own files were parsed.
                if i >= parsed_len && j >= parsed_len {
                    continue;
                }
                if source.id == target.id {
                    continue;
                }
                if !rule.predicate.matches(source, target, &all, shared) {
                    continue;
                }
                let mut edge = ParsedEdge::framework(
                    rule.relationship_type,
                    rule.semantic_type,
                    &source.id,
                    &target.id,
                    rule.relationship_weight,
                    source.file_path(),
                );
                if let Some(extractor) = &rule.context_extractor {
                    let context = extractor.extract(source, target);
                    if !context.is_empty() {
                        edge = edge.with_context(context);
                    }
                }
                edges.push(edge);

                if let Some(label) = rule.grants_target_label {
                    let public = target
                        .context_str("visibility")
                        .map(|v| v == "public")
                        .unwrap_or(true);
                    if j < parsed_len && public {
                        label_grants.push((target.id.clone(), label));
                    }
                }
            }
        }
    }
    EdgeDetection {
        edges,
        label_grants,
    }
}

/// Apply granted labels to the parsed nodes they name.
pub fn apply_label_grants(parsed: &mut [ParsedNode], grants: &[(String, &'static str)]) {
    for (node_id, label) in grants {
        if let Some(node) = parsed.iter_mut().find(|n| &n.id == node_id) {
            node.add_label(label);
        }
    }
}
