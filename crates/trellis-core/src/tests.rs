//! Unit tests for trellis-core

use crate::artifact::{ArtifactMetadata, GraphArtifact};
use crate::identity;
use crate::model::*;

#[test]
fn node_ids_are_deterministic() {
    let a = identity::node_id(CoreNodeType::Class, "src/order.controller.ts", "OrderController", None);
    let b = identity::node_id(CoreNodeType::Class, "src/order.controller.ts", "OrderController", None);
    assert_eq!(a, b);

    // Different names produce different IDs
    let c = identity::node_id(CoreNodeType::Class, "src/order.controller.ts", "UserController", None);
    assert_ne!(a, c);

    // The parent participates in identity
    let d = identity::node_id(
        CoreNodeType::Method,
        "src/order.controller.ts",
        "list",
        Some(a.as_str()),
    );
    let e = identity::node_id(
        CoreNodeType::Method,
        "src/order.controller.ts",
        "list",
        Some(c.as_str()),
    );
    assert_ne!(d, e);
}

#[test]
fn node_id_carries_core_type_prefix() {
    let id = identity::node_id(CoreNodeType::Method, "a.ts", "list", None);
    assert!(id.starts_with("Method:"));
    let hash = id.split(':').nth(1).unwrap();
    assert_eq!(hash.len(), 16);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn edge_ids_are_deterministic() {
    let a = identity::edge_id("CONTAINS", "SourceFile:aa", "Class:bb");
    let b = identity::edge_id("CONTAINS", "SourceFile:aa", "Class:bb");
    assert_eq!(a, b);
    assert!(a.starts_with("CONTAINS:"));

    // Direction matters
    let c = identity::edge_id("CONTAINS", "Class:bb", "SourceFile:aa");
    assert_ne!(a, c);
}

#[test]
fn content_hash_is_stable_prefix() {
    let h1 = identity::content_hash(b"export class A {}");
    let h2 = identity::content_hash(b"export class A {}");
    assert_eq!(h1, h2);
    assert_eq!(h1.len(), 16);
    assert_ne!(h1, identity::content_hash(b"export class B {}"));
}

#[test]
fn parsed_node_mandatory_properties() {
    let node = ParsedNode::new(
        CoreNodeType::Class,
        "OrderController",
        "src/order.controller.ts",
        3,
        40,
        "class OrderController {}",
        "project:1234",
        None,
    );
    for key in [
        "id",
        "name",
        "coreType",
        "filePath",
        "startLine",
        "endLine",
        "sourceCode",
        "createdAt",
        "projectId",
    ] {
        assert!(node.properties.contains_key(key), "missing {key}");
    }
    assert_eq!(node.name(), "OrderController");
    assert_eq!(node.file_path(), "src/order.controller.ts");
    assert_eq!(node.labels, vec!["Class".to_string()]);
    assert!(node.semantic_type.is_none());
}

#[test]
fn promote_sets_semantic_type_once() {
    let mut node = ParsedNode::new(
        CoreNodeType::Class,
        "OrderController",
        "a.ts",
        1,
        10,
        "",
        "project:1",
        None,
    );
    let promoted = node.promote(
        "NestController",
        &["NestController".to_string()],
        Some("Controller"),
    );
    assert!(promoted);
    assert_eq!(node.semantic_type.as_deref(), Some("NestController"));
    assert_eq!(node.labels[0], "Controller");

    // A lower-priority enhancement must not overwrite
    let second = node.promote("DomainService", &["Service".to_string()], None);
    assert!(!second);
    assert_eq!(node.semantic_type.as_deref(), Some("NestController"));
    assert_eq!(node.labels[0], "Controller");
}

#[test]
fn context_merge_accumulates() {
    let mut node = ParsedNode::new(
        CoreNodeType::Class,
        "UserService",
        "a.ts",
        1,
        10,
        "",
        "project:1",
        None,
    );
    let mut first = serde_json::Map::new();
    first.insert("isAbstract".into(), serde_json::json!(false));
    node.merge_context(first);

    let mut second = serde_json::Map::new();
    second.insert(
        "constructorParamTypes".into(),
        serde_json::json!(["UserRepository"]),
    );
    node.merge_context(second);

    assert_eq!(node.context_bool("isAbstract"), Some(false));
    assert_eq!(node.context_strs("constructorParamTypes"), vec!["UserRepository"]);
}

#[test]
fn structural_edge_defaults() {
    let edge = ParsedEdge::structural(EdgeType::Contains, "SourceFile:aa", "Class:bb", "a.ts");
    assert_eq!(edge.properties.confidence, 1.0);
    assert_eq!(edge.properties.source, EdgeOrigin::Ast);
    assert!(edge.id.starts_with("CONTAINS:"));
}

#[test]
fn framework_edge_defaults() {
    let edge = ParsedEdge::framework(
        EdgeType::Injects,
        "ConstructorInjection",
        "Class:aa",
        "Class:bb",
        0.9,
        "a.ts",
    );
    assert_eq!(edge.properties.confidence, 0.8);
    assert_eq!(edge.properties.source, EdgeOrigin::Pattern);
    assert_eq!(edge.properties.relationship_weight, 0.9);
    assert!(edge.id.starts_with("ConstructorInjection:"));
}

#[test]
fn cross_file_edge_wire_format() {
    let edge = ParsedEdge::framework(
        EdgeType::Exposes,
        "HttpExposure",
        "Class:aa",
        "Method:bb",
        1.0,
        "a.ts",
    );
    let record = CrossFileEdge::from_edge(&edge);
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["startNodeId"], "Class:aa");
    assert_eq!(json["endNodeId"], "Method:bb");
    assert_eq!(json["edgeType"], "EXPOSES");
    assert_eq!(json["edgeProperties"]["source"], "pattern");
    assert_eq!(json["edgeProperties"]["semanticType"], "HttpExposure");
    assert!(json["edgeProperties"]["createdAt"].is_string());
}

#[test]
fn containment_edge_classification() {
    assert!(EdgeType::Contains.is_containment());
    assert!(EdgeType::HasMember.is_containment());
    assert!(EdgeType::HasParameter.is_containment());
    assert!(EdgeType::DecoratedWith.is_containment());
    assert!(!EdgeType::Extends.is_containment());
    assert!(!EdgeType::Injects.is_containment());
}

#[test]
fn project_lifecycle_starts_parsing() {
    let project = Project::new("project:1234", "shop", "/srv/shop");
    assert_eq!(project.status, ProjectStatus::Parsing);
    assert_eq!(project.node_count, 0);
}

#[test]
fn artifact_round_trip() {
    let node = ParsedNode::new(
        CoreNodeType::SourceFile,
        "a.ts",
        "a.ts",
        1,
        1,
        "",
        "project:1",
        None,
    );
    let edge = ParsedEdge::structural(EdgeType::Contains, &node.id, "Class:bb", "a.ts");
    let artifact = GraphArtifact::build(
        &[node],
        &[edge],
        ArtifactMetadata {
            core_schema: "typescript".into(),
            framework_schemas: vec!["nestjs".into()],
            project_type: "nestjs".into(),
            project_id: "project:1".into(),
            generated: identity::timestamp(),
            incremental: None,
        },
    )
    .unwrap();

    let json = serde_json::to_string(&artifact).unwrap();
    let back: GraphArtifact = serde_json::from_str(&json).unwrap();
    assert_eq!(back.nodes.len(), 1);
    assert_eq!(back.edges.len(), 1);
    assert_eq!(back.edges[0].edge_type, "CONTAINS");
    assert_eq!(back.metadata.framework_schemas, vec!["nestjs".to_string()]);
}
