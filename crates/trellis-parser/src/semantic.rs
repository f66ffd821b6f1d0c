//! Semantic enhancement (C6)
//!
//! Applies framework enhancements to parsed nodes in priority order. The
//! first matching enhancement at the highest priority tier wins: it sets the
//! single semantic type, prepends labels, and runs its local context
//! extractors. Later (lower-priority) matches never overwrite.

use std::collections::HashMap;

use serde_json::{Map, Value, json};
use trellis_core::{CoreNodeType, ParsedNode};
use trellis_schema::SchemaRegistry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnhancementStats {
    pub promoted: u64,
}

/// Promote nodes in place. Returns how many received a semantic type.
pub fn enhance_nodes(nodes: &mut [ParsedNode], registry: &SchemaRegistry) -> EnhancementStats {
    // Import-based patterns consult the owning file node; capture the file
    // nodes (minus source text) before mutating anything.
    let file_nodes: HashMap<String, ParsedNode> = nodes
        .iter()
        .filter(|n| n.core_type == CoreNodeType::SourceFile)
        .map(|n| {
            let mut slim = n.clone();
            slim.set_source_code(String::new());
            (n.file_path().to_string(), slim)
        })
        .collect();

    let mut stats = EnhancementStats::default();
    for node in nodes.iter_mut() {
        let file = file_nodes.get(node.file_path());
        for enhancement in registry.enhancements_for(node.core_type) {
            let matched = enhancement
                .detection_patterns
                .iter()
                .find(|p| p.matches(node, file));
            let Some(pattern) = matched else {
                continue;
            };
            let labels: Vec<String> = enhancement.labels.iter().map(|l| l.to_string()).collect();
            if node.promote(enhancement.semantic_type, &labels, enhancement.primary_label) {
                node.properties
                    .insert("detectionConfidence".into(), json!(pattern.confidence));
                for extractor in &enhancement.context_extractors {
                    let attributes = extractor.extract(node);
                    node.merge_context(attributes);
                }
                stats.promoted += 1;
            }
            break;
        }
    }
    stats
}

/// Build the shared context edge detectors read: a global index written once
/// after enhancement, covering parsed nodes and stubs alike.
pub fn build_shared_context<'a>(
    nodes: impl Iterator<Item = &'a ParsedNode>,
) -> Map<String, Value> {
    let mut vendor_controllers: Vec<String> = Vec::new();
    for node in nodes {
        if node.semantic_type.as_deref() == Some("VendorController") {
            let name = node.name().to_string();
            if !vendor_controllers.contains(&name) {
                vendor_controllers.push(name);
            }
        }
    }
    vendor_controllers.sort();
    let mut shared = Map::new();
    shared.insert("vendorControllers".into(), json!(vendor_controllers));
    shared
}
