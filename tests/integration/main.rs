//! Integration tests for trellis
//!
//! End-to-end scenarios over real TypeScript fixture projects: full parses,
//! semantic promotion, dependency-injection and routing edges, and the
//! incremental re-parse engine (edit, delete, cross-file edge survival).

use std::path::Path;

use serde_json::json;
use trellis_core::{CoreNodeType, EdgeType, ParsedEdge, ParsedNode, ProjectStatus};
use trellis_parser::{ParseOptions, parse_project};
use trellis_schema::ProjectType;
use trellis_store::{GraphStore, MemoryStore};

const PROJECT: &str = "project:integration";

const ORDER_CONTROLLER: &str = r#"
import { Controller, Get, Post } from '@nestjs/common';

@Controller('orders')
export class OrderController {
  @Get()
  public list(): string[] {
    return [];
  }
}
"#;

const ORDER_CONTROLLER_WITH_CREATE: &str = r#"
import { Controller, Get, Post } from '@nestjs/common';

@Controller('orders')
export class OrderController {
  @Get()
  public list(): string[] {
    return [];
  }

  @Post()
  public create(): void {
  }
}
"#;

const USER_SERVICE: &str = r#"
import { Injectable } from '@nestjs/common';
import { OrderController } from './order.controller';
import { UserRepository } from './user.repository';

@Injectable()
export class UserService {
  constructor(private repo: UserRepository, private orders: OrderController) {}
}
"#;

const USER_REPOSITORY: &str = r#"
export class UserRepository {
  find(): void {
  }
}
"#;

fn write_base_project(dir: &Path) {
    std::fs::create_dir_all(dir.join("src")).unwrap();
    std::fs::write(dir.join("tsconfig.json"), "{}").unwrap();
    std::fs::write(dir.join("src/order.controller.ts"), ORDER_CONTROLLER).unwrap();
    std::fs::write(dir.join("src/user.service.ts"), USER_SERVICE).unwrap();
    std::fs::write(dir.join("src/user.repository.ts"), USER_REPOSITORY).unwrap();
}

fn options(dir: &Path, project_id: &str) -> ParseOptions {
    let mut opts = ParseOptions::new(dir, dir.join("tsconfig.json"));
    opts.project_id = Some(project_id.to_string());
    opts.project_type = ProjectType::Both;
    opts
}

fn incremental(dir: &Path, project_id: &str) -> ParseOptions {
    let mut opts = options(dir, project_id);
    opts.clear_existing = false;
    opts
}

fn node<'a>(nodes: &'a [ParsedNode], core_type: CoreNodeType, name: &str) -> &'a ParsedNode {
    nodes
        .iter()
        .find(|n| n.core_type == core_type && n.name() == name)
        .unwrap_or_else(|| panic!("no {core_type:?} named {name}"))
}

fn edge_between<'a>(
    edges: &'a [ParsedEdge],
    ty: EdgeType,
    src: &str,
    tgt: &str,
) -> &'a ParsedEdge {
    edges
        .iter()
        .find(|e| e.relationship_type == ty && e.source_node_id == src && e.target_node_id == tgt)
        .unwrap_or_else(|| panic!("no {ty} edge {src} -> {tgt}"))
}

async fn assert_no_dangling_edges(store: &MemoryStore, project_id: &str) {
    let edges = store.edges_for_project(project_id).await;
    for edge in &edges {
        assert!(
            store.get_node(&edge.source_node_id).await.unwrap().is_some(),
            "dangling source on {}",
            edge.id
        );
        assert!(
            store.get_node(&edge.target_node_id).await.unwrap().is_some(),
            "dangling target on {}",
            edge.id
        );
    }
}

// ── Controller exposes endpoint ─────────────────────────

#[tokio::test]
async fn controller_exposes_http_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    write_base_project(dir.path());
    let store = MemoryStore::new();
    parse_project(&store, &options(dir.path(), PROJECT)).await.unwrap();

    let nodes = store.nodes_for_project(PROJECT).await;
    let edges = store.edges_for_project(PROJECT).await;

    let file = node(&nodes, CoreNodeType::SourceFile, "order.controller.ts");
    let class = node(&nodes, CoreNodeType::Class, "OrderController");
    let method = node(&nodes, CoreNodeType::Method, "list");

    assert_eq!(class.semantic_type.as_deref(), Some("NestController"));
    assert_eq!(class.labels[0], "Controller");
    assert_eq!(method.semantic_type.as_deref(), Some("HttpEndpoint"));
    assert_eq!(method.labels[0], "HttpEndpoint");

    edge_between(&edges, EdgeType::Contains, &file.id, &class.id);
    edge_between(&edges, EdgeType::HasMember, &class.id, &method.id);

    let class_decorator = node(&nodes, CoreNodeType::Decorator, "Controller");
    let method_decorator = node(&nodes, CoreNodeType::Decorator, "Get");
    edge_between(&edges, EdgeType::DecoratedWith, &class.id, &class_decorator.id);
    edge_between(&edges, EdgeType::DecoratedWith, &method.id, &method_decorator.id);

    let exposes = edge_between(&edges, EdgeType::Exposes, &class.id, &method.id);
    let ctx = exposes.properties.context.as_ref().unwrap();
    assert_eq!(ctx["fullPath"], json!("/orders"));
    assert_eq!(ctx["httpMethod"], json!("GET"));
    assert_eq!(exposes.properties.semantic_type.as_deref(), Some("HttpExposure"));

    assert_no_dangling_edges(&store, PROJECT).await;
}

// ── Constructor dependency injection ────────────────────

#[tokio::test]
async fn constructor_injection_links_classes() {
    let dir = tempfile::tempdir().unwrap();
    write_base_project(dir.path());
    let store = MemoryStore::new();
    parse_project(&store, &options(dir.path(), PROJECT)).await.unwrap();

    let nodes = store.nodes_for_project(PROJECT).await;
    let edges = store.edges_for_project(PROJECT).await;

    let service = node(&nodes, CoreNodeType::Class, "UserService");
    let repo = node(&nodes, CoreNodeType::Class, "UserRepository");
    let injects = edge_between(&edges, EdgeType::Injects, &service.id, &repo.id);
    let ctx = injects.properties.context.as_ref().unwrap();
    assert_eq!(ctx["injectionType"], json!("constructor"));
    assert_eq!(ctx["parameterIndex"], json!(0));
    assert_eq!(ctx["injectionToken"], serde_json::Value::Null);
}

// ── Token-based injection ───────────────────────────────

#[tokio::test]
async fn token_injection_links_provider() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("tsconfig.json"), "{}").unwrap();
    std::fs::write(
        dir.path().join("src/consumer.service.ts"),
        r#"
import { Injectable, Inject } from '@nestjs/common';

@Injectable()
export class ConsumerService {
  constructor(@Inject('USER_SVC') private svc: IUserService) {}
}
"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("src/user.impl.ts"),
        r#"
import { Injectable } from '@nestjs/common';

@Injectable('USER_SVC')
export class UserServiceImpl {
  find(): void {
  }
}
"#,
    )
    .unwrap();

    let store = MemoryStore::new();
    parse_project(&store, &options(dir.path(), PROJECT)).await.unwrap();

    let nodes = store.nodes_for_project(PROJECT).await;
    let edges = store.edges_for_project(PROJECT).await;

    let consumer = node(&nodes, CoreNodeType::Class, "ConsumerService");
    let implementation = node(&nodes, CoreNodeType::Class, "UserServiceImpl");
    let injects = edge_between(&edges, EdgeType::Injects, &consumer.id, &implementation.id);
    let ctx = injects.properties.context.as_ref().unwrap();
    assert_eq!(ctx["injectionToken"], json!("USER_SVC"));
}

// ── Route definitions ───────────────────────────────────

const ROUTED_CONTROLLER: &str = r#"
export class OrderController {
  public list(): string[] {
    return [];
  }

  private secret(): void {
  }
}
"#;

fn routes_source(quote: char) -> String {
    format!(
        r#"
export const orderRoutes: ModuleRoute[] = [
  {{ method: {q}GET{q}, path: {q}/orders{q}, handler: {q}list{q}, controller: OrderController, authenticated: true }},
  {{ method: {q}GET{q}, path: {q}/secret{q}, handler: {q}secret{q}, controller: OrderController, authenticated: true }},
];
"#,
        q = quote
    )
}

async fn parse_routes_project(quote: char) -> (MemoryStore, Vec<ParsedNode>, Vec<ParsedEdge>) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("tsconfig.json"), "{}").unwrap();
    std::fs::write(dir.path().join("src/order.controller.ts"), ROUTED_CONTROLLER).unwrap();
    std::fs::write(dir.path().join("src/orders.routes.ts"), routes_source(quote)).unwrap();

    let store = MemoryStore::new();
    parse_project(&store, &options(dir.path(), PROJECT)).await.unwrap();
    let nodes = store.nodes_for_project(PROJECT).await;
    let edges = store.edges_for_project(PROJECT).await;
    (store, nodes, edges)
}

#[tokio::test]
async fn route_definition_binds_controller_and_handler() {
    let (_store, nodes, edges) = parse_routes_project('\'').await;

    let routes = node(&nodes, CoreNodeType::Variable, "orderRoutes");
    assert_eq!(routes.semantic_type.as_deref(), Some("RouteDefinition"));

    let controller = node(&nodes, CoreNodeType::Class, "OrderController");
    edge_between(&edges, EdgeType::RoutesTo, &routes.id, &controller.id);

    let list = node(&nodes, CoreNodeType::Method, "list");
    let handler_edge = edge_between(&edges, EdgeType::RoutesToHandler, &routes.id, &list.id);
    let ctx = handler_edge.properties.context.as_ref().unwrap();
    assert_eq!(ctx["routePath"], json!("/orders"));
    assert_eq!(ctx["authenticated"], json!(true));

    // Public handler gains the endpoint label; the private one does not
    assert!(list.labels.iter().any(|l| l == "HttpEndpoint"));
    let secret = node(&nodes, CoreNodeType::Method, "secret");
    edge_between(&edges, EdgeType::RoutesToHandler, &routes.id, &secret.id);
    assert!(!secret.labels.iter().any(|l| l == "HttpEndpoint"));
}

#[tokio::test]
async fn quote_styles_are_equivalent() {
    let (_s1, _n1, single) = parse_routes_project('\'').await;
    let (_s2, _n2, double) = parse_routes_project('"').await;
    let ids = |edges: &[ParsedEdge]| {
        let mut v: Vec<String> = edges
            .iter()
            .filter(|e| !e.relationship_type.is_structural())
            .map(|e| e.id.clone())
            .collect();
        v.sort();
        v
    };
    assert_eq!(ids(&single), ids(&double));
    assert!(!ids(&single).is_empty());
}

// ── Incremental edit ────────────────────────────────────

#[tokio::test]
async fn incremental_edit_preserves_identity_and_cross_file_edges() {
    let dir = tempfile::tempdir().unwrap();
    write_base_project(dir.path());
    let store = MemoryStore::new();
    parse_project(&store, &options(dir.path(), PROJECT)).await.unwrap();

    let before_nodes = store.nodes_for_project(PROJECT).await;
    let before_count = before_nodes.len();
    let list_before = node(&before_nodes, CoreNodeType::Method, "list").id.clone();
    let controller_id = node(&before_nodes, CoreNodeType::Class, "OrderController").id.clone();
    let service_id = node(&before_nodes, CoreNodeType::Class, "UserService").id.clone();

    // The service's INJECTS edge into the controller crosses files
    let before_edges = store.edges_for_project(PROJECT).await;
    edge_between(&before_edges, EdgeType::Injects, &service_id, &controller_id);

    std::fs::write(
        dir.path().join("src/order.controller.ts"),
        ORDER_CONTROLLER_WITH_CREATE,
    )
    .unwrap();

    let outcome = parse_project(&store, &incremental(dir.path(), PROJECT))
        .await
        .unwrap();
    // Only the edited file re-parsed
    assert_eq!(outcome.diagnostics.files_parsed, 1);

    let after_nodes = store.nodes_for_project(PROJECT).await;
    let after_edges = store.edges_for_project(PROJECT).await;

    // Identity stability for the untouched method
    let list_after = node(&after_nodes, CoreNodeType::Method, "list").id.clone();
    assert_eq!(list_before, list_after);

    // The new method and its decorator exist
    let create = node(&after_nodes, CoreNodeType::Method, "create");
    assert_eq!(create.semantic_type.as_deref(), Some("HttpEndpoint"));
    node(&after_nodes, CoreNodeType::Decorator, "Post");

    // Exactly the new method + decorator nodes were added
    assert_eq!(after_nodes.len(), before_count + 2);

    // Cross-file edge survived
    edge_between(&after_edges, EdgeType::Injects, &service_id, &controller_id);
    assert!(outcome.diagnostics.cross_file_edges_saved >= 1);

    let project = store.get_project(PROJECT).await.unwrap().unwrap();
    assert_eq!(project.status, ProjectStatus::Complete);
    assert_eq!(project.node_count as usize, after_nodes.len());

    assert_no_dangling_edges(&store, PROJECT).await;
}

// ── Deleting a file ─────────────────────────────────────

#[tokio::test]
async fn file_delete_removes_subgraph_without_dangling_edges() {
    let dir = tempfile::tempdir().unwrap();
    write_base_project(dir.path());
    let store = MemoryStore::new();
    parse_project(&store, &options(dir.path(), PROJECT)).await.unwrap();

    std::fs::remove_file(dir.path().join("src/order.controller.ts")).unwrap();
    let outcome = parse_project(&store, &incremental(dir.path(), PROJECT))
        .await
        .unwrap();
    assert_eq!(outcome.diagnostics.files_deleted, 1);

    let nodes = store.nodes_for_project(PROJECT).await;
    assert!(!nodes.iter().any(|n| n.file_path() == "src/order.controller.ts"));

    let edges = store.edges_for_project(PROJECT).await;
    assert!(!edges.iter().any(|e| e.relationship_type == EdgeType::Exposes));
    // INJECTS into the deleted controller is gone; the repo one survives
    let service_id = node(&nodes, CoreNodeType::Class, "UserService").id.clone();
    let repo_id = node(&nodes, CoreNodeType::Class, "UserRepository").id.clone();
    edge_between(&edges, EdgeType::Injects, &service_id, &repo_id);
    assert_eq!(
        edges
            .iter()
            .filter(|e| e.relationship_type == EdgeType::Injects)
            .count(),
        1
    );

    assert_no_dangling_edges(&store, PROJECT).await;
}

// ── Universal invariants ────────────────────────────────

fn sorted_ids(nodes: &[ParsedNode], edges: &[ParsedEdge]) -> (Vec<String>, Vec<String>) {
    let mut node_ids: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
    let mut edge_ids: Vec<String> = edges.iter().map(|e| e.id.clone()).collect();
    node_ids.sort();
    edge_ids.sort();
    (node_ids, edge_ids)
}

#[tokio::test]
async fn determinism_two_full_parses_agree() {
    let dir = tempfile::tempdir().unwrap();
    write_base_project(dir.path());

    let store_a = MemoryStore::new();
    parse_project(&store_a, &options(dir.path(), PROJECT)).await.unwrap();
    let store_b = MemoryStore::new();
    parse_project(&store_b, &options(dir.path(), PROJECT)).await.unwrap();

    let a = sorted_ids(
        &store_a.nodes_for_project(PROJECT).await,
        &store_a.edges_for_project(PROJECT).await,
    );
    let b = sorted_ids(
        &store_b.nodes_for_project(PROJECT).await,
        &store_b.edges_for_project(PROJECT).await,
    );
    assert_eq!(a, b);
}

#[tokio::test]
async fn incremental_parse_equals_full_parse() {
    let dir = tempfile::tempdir().unwrap();
    write_base_project(dir.path());

    // Full parse, then an edit applied incrementally
    let store = MemoryStore::new();
    parse_project(&store, &options(dir.path(), PROJECT)).await.unwrap();
    std::fs::write(
        dir.path().join("src/order.controller.ts"),
        ORDER_CONTROLLER_WITH_CREATE,
    )
    .unwrap();
    std::fs::remove_file(dir.path().join("src/user.repository.ts")).unwrap();
    parse_project(&store, &incremental(dir.path(), PROJECT)).await.unwrap();

    // Reference: a fresh full parse of the edited tree
    let reference = MemoryStore::new();
    parse_project(&reference, &options(dir.path(), PROJECT)).await.unwrap();

    let incremental_ids = sorted_ids(
        &store.nodes_for_project(PROJECT).await,
        &store.edges_for_project(PROJECT).await,
    );
    let full_ids = sorted_ids(
        &reference.nodes_for_project(PROJECT).await,
        &reference.edges_for_project(PROJECT).await,
    );
    assert_eq!(incremental_ids, full_ids);
}

#[tokio::test]
async fn identity_stable_under_unrelated_changes() {
    let dir = tempfile::tempdir().unwrap();
    write_base_project(dir.path());
    let store = MemoryStore::new();
    parse_project(&store, &options(dir.path(), PROJECT)).await.unwrap();
    let repo_id = {
        let nodes = store.nodes_for_project(PROJECT).await;
        node(&nodes, CoreNodeType::Class, "UserRepository").id.clone()
    };

    // Add an unrelated file; re-parse incrementally
    std::fs::write(
        dir.path().join("src/billing.service.ts"),
        "export class BillingService {}\n",
    )
    .unwrap();
    let outcome = parse_project(&store, &incremental(dir.path(), PROJECT))
        .await
        .unwrap();
    assert_eq!(outcome.diagnostics.files_parsed, 1);

    let nodes = store.nodes_for_project(PROJECT).await;
    assert_eq!(node(&nodes, CoreNodeType::Class, "UserRepository").id, repo_id);
}

#[tokio::test]
async fn labels_start_with_primary() {
    let dir = tempfile::tempdir().unwrap();
    write_base_project(dir.path());
    let store = MemoryStore::new();
    parse_project(&store, &options(dir.path(), PROJECT)).await.unwrap();

    for node in store.nodes_for_project(PROJECT).await {
        assert!(!node.labels.is_empty(), "{} has no labels", node.id);
        if node.semantic_type.is_none() {
            assert_eq!(node.labels[0], node.core_type.primary_label());
        }
    }
}

#[tokio::test]
async fn artifact_written_on_request() {
    let dir = tempfile::tempdir().unwrap();
    write_base_project(dir.path());
    let store = MemoryStore::new();
    let mut opts = options(dir.path(), PROJECT);
    opts.write_artifact = true;
    let outcome = parse_project(&store, &opts).await.unwrap();

    let path = outcome.artifact_path.unwrap();
    assert!(path.ends_with("code-graph.json"));
    let raw = std::fs::read_to_string(&path).unwrap();
    let artifact: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!(artifact["nodes"].as_array().unwrap().len() > 0);
    assert_eq!(artifact["metadata"]["projectId"], json!(PROJECT));
    assert_eq!(artifact["metadata"]["coreSchema"], json!("typescript"));
}
