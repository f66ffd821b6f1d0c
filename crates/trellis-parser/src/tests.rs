//! Unit tests for trellis-parser

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use trellis_core::{CoreNodeType, EdgeType, ParsedEdge, ParsedNode, ProjectStatus};
use trellis_schema::{ProjectType, SchemaRegistry};
use trellis_store::{GraphStore, MemoryStore};

use crate::ast::TsFile;
use crate::change;
use crate::context;
use crate::orchestrator::{ParseOptions, parse_project};
use crate::resolver;
use crate::traversal::{self, DeferredEdge, FileMeta};

const PROJECT: &str = "project:test";

fn registry() -> SchemaRegistry {
    SchemaRegistry::build(ProjectType::Both, Path::new(".")).unwrap()
}

/// Traverse and enrich a single in-memory source file.
fn parse_source(
    path: &str,
    source: &str,
) -> (Vec<ParsedNode>, Vec<ParsedEdge>, Vec<DeferredEdge>) {
    let registry = registry();
    let globs = registry.variables_globset().unwrap();
    let ts = TsFile::parse(path, source.to_string()).unwrap();
    let meta = FileMeta {
        size: source.len() as u64,
        mtime: 1_700_000_000,
        content_hash: trellis_core::content_hash(source.as_bytes()),
    };
    let mut out = traversal::traverse_file(&ts, &registry, PROJECT, &meta, &[], &globs).unwrap();
    context::enrich_file(&mut out, &ts);
    (out.nodes, out.edges, out.deferred)
}

fn find<'a>(nodes: &'a [ParsedNode], core_type: CoreNodeType, name: &str) -> &'a ParsedNode {
    nodes
        .iter()
        .find(|n| n.core_type == core_type && n.name() == name)
        .unwrap_or_else(|| panic!("no {core_type:?} named {name}"))
}

const CONTROLLER_TS: &str = r#"
import { Controller, Get } from '@nestjs/common';

@Controller('orders')
export class OrderController {
  @Get()
  public list(): string[] {
    return [];
  }
}
"#;

#[test]
fn traversal_builds_structural_graph() {
    let (nodes, edges, _) = parse_source("src/order.controller.ts", CONTROLLER_TS);

    let file = find(&nodes, CoreNodeType::SourceFile, "order.controller.ts");
    let class = find(&nodes, CoreNodeType::Class, "OrderController");
    let method = find(&nodes, CoreNodeType::Method, "list");
    let import = find(&nodes, CoreNodeType::Import, "@nestjs/common");
    find(&nodes, CoreNodeType::Decorator, "Controller");
    find(&nodes, CoreNodeType::Decorator, "Get");

    let has = |ty: EdgeType, src: &str, tgt: &str| {
        edges
            .iter()
            .any(|e| e.relationship_type == ty && e.source_node_id == src && e.target_node_id == tgt)
    };
    assert!(has(EdgeType::Contains, &file.id, &class.id));
    assert!(has(EdgeType::HasMember, &class.id, &method.id));
    assert!(has(EdgeType::Imports, &file.id, &import.id));
    let decorated: Vec<_> = edges
        .iter()
        .filter(|e| e.relationship_type == EdgeType::DecoratedWith)
        .collect();
    assert_eq!(decorated.len(), 2);
    assert!(decorated.iter().all(|e| e.properties.confidence == 1.0));
}

#[test]
fn traversal_is_deterministic() {
    let (first, first_edges, _) = parse_source("src/order.controller.ts", CONTROLLER_TS);
    let (second, second_edges, _) = parse_source("src/order.controller.ts", CONTROLLER_TS);
    let ids = |nodes: &[ParsedNode]| {
        let mut v: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
        v.sort();
        v
    };
    let edge_ids = |edges: &[ParsedEdge]| {
        let mut v: Vec<String> = edges.iter().map(|e| e.id.clone()).collect();
        v.sort();
        v
    };
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(edge_ids(&first_edges), edge_ids(&second_edges));
}

#[test]
fn class_context_captures_decorators_and_wiring() {
    let (nodes, _, _) = parse_source("src/order.controller.ts", CONTROLLER_TS);
    let class = find(&nodes, CoreNodeType::Class, "OrderController");
    assert_eq!(class.context_strs("decoratorNames"), vec!["Controller"]);
    let args = class.context().unwrap()["decoratorArgs"].as_object().unwrap();
    assert_eq!(args["Controller"], json!("orders"));

    let method = find(&nodes, CoreNodeType::Method, "list");
    assert_eq!(method.context_str("parentClassName"), Some("OrderController"));
    assert_eq!(method.context_str("visibility"), Some("public"));
    assert_eq!(method.context_strs("decoratorNames"), vec!["Get"]);

    let file = find(&nodes, CoreNodeType::SourceFile, "order.controller.ts");
    assert_eq!(file.context_strs("importedModules"), vec!["@nestjs/common"]);
    assert_eq!(file.context_bool("isTestFile"), Some(false));
}

#[test]
fn constructor_injection_context() {
    let source = r#"
import { Injectable, Inject } from '@nestjs/common';
import { UserRepository } from './user.repository';

@Injectable()
export class UserService {
  constructor(
    private repo: UserRepository,
    @Inject('USER_SVC') private svc: IUserService,
  ) {}
}
"#;
    let (nodes, _, _) = parse_source("src/user.service.ts", source);
    let class = find(&nodes, CoreNodeType::Class, "UserService");
    assert_eq!(
        class.context_strs("constructorParamTypes"),
        vec!["UserRepository", "IUserService"]
    );
    let tokens = class.context().unwrap()["injectTokens"].as_object().unwrap();
    assert_eq!(tokens["IUserService"], json!("USER_SVC"));

    let param = find(&nodes, CoreNodeType::Parameter, "svc");
    assert_eq!(param.context_str("injectToken"), Some("USER_SVC"));
    assert_eq!(param.context_str("typeName"), Some("IUserService"));
}

#[test]
fn skeletonization_collapses_bodies() {
    let source = r#"
export class Calc {
  add(a: number, b: number): number {
    return a + b;
  }
}

export function standalone(): number {
  return 42;
}
"#;
    let (nodes, _, _) = parse_source("src/calc.ts", source);
    let class = find(&nodes, CoreNodeType::Class, "Calc");
    let method = find(&nodes, CoreNodeType::Method, "add");
    assert!(class.source_code().contains(&format!("/* NodeID: {} */", method.id)));
    assert!(!class.source_code().contains("return a + b"));

    let file = find(&nodes, CoreNodeType::SourceFile, "calc.ts");
    let function = find(&nodes, CoreNodeType::Function, "standalone");
    assert!(file.source_code().contains(&format!("/* NodeID: {} */", function.id)));
    assert!(!file.source_code().contains("return 42"));
    // The method node itself keeps its full text
    assert!(method.source_code().contains("return a + b"));
}

#[test]
fn deferred_edges_resolve_by_name_and_kind() {
    let (mut nodes, _, mut deferred) = parse_source(
        "src/base.ts",
        "export class Base {}\nexport interface Marker {}\n",
    );
    let (child_nodes, _, child_deferred) = parse_source(
        "src/child.ts",
        "export class Child extends Base implements Marker {}\n",
    );
    nodes.extend(child_nodes);
    deferred.extend(child_deferred);

    let (edges, stats) = resolver::resolve_deferred(&deferred, &nodes, &[]);
    assert_eq!(stats.resolved, 2);
    assert_eq!(stats.ambiguous, 0);

    let base = find(&nodes, CoreNodeType::Class, "Base");
    let child = find(&nodes, CoreNodeType::Class, "Child");
    let marker = find(&nodes, CoreNodeType::Interface, "Marker");
    assert!(edges.iter().any(|e| e.relationship_type == EdgeType::Extends
        && e.source_node_id == child.id
        && e.target_node_id == base.id));
    assert!(edges.iter().any(|e| e.relationship_type == EdgeType::Implements
        && e.source_node_id == child.id
        && e.target_node_id == marker.id));
}

#[test]
fn unresolved_deferred_edges_drop_silently() {
    let (nodes, _, deferred) = parse_source(
        "src/ext.ts",
        "import { External } from 'lib';\nexport class Local extends External {}\n",
    );
    let (edges, stats) = resolver::resolve_deferred(&deferred, &nodes, &[]);
    assert_eq!(stats.resolved, 0);
    assert_eq!(stats.dropped, 1);
    assert!(edges.is_empty());
}

#[test]
fn duplicate_names_count_as_ambiguous() {
    let (mut nodes, _, _) = parse_source("src/a.ts", "export class Shared {}\n");
    let (b_nodes, _, _) = parse_source("src/b.ts", "export class Shared {}\n");
    let (c_nodes, _, deferred) =
        parse_source("src/c.ts", "export class User extends Shared {}\n");
    nodes.extend(b_nodes);
    nodes.extend(c_nodes);

    let (edges, stats) = resolver::resolve_deferred(&deferred, &nodes, &[]);
    assert_eq!(stats.resolved, 1);
    assert_eq!(stats.ambiguous, 1);
    // First match in deterministic order: a.ts precedes b.ts in the set
    let target = edges[0].target_node_id.clone();
    let winner = nodes.iter().find(|n| n.id == target).unwrap();
    assert_eq!(winner.file_path(), "src/a.ts");
}

#[test]
fn route_variables_only_in_schema_matched_files() {
    let source = r#"
export const orderRoutes: ModuleRoute[] = [
  { method: 'GET', path: '/orders', handler: 'list', controller: OrderController, authenticated: true },
];
"#;
    let (nodes, _, _) = parse_source("src/orders.routes.ts", source);
    let variable = find(&nodes, CoreNodeType::Variable, "orderRoutes");
    let routes = variable.context().unwrap()["routes"].as_array().unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0]["controllerName"], json!("OrderController"));
    assert_eq!(routes[0]["handler"], json!("'list'"));
    assert_eq!(routes[0]["authenticated"], json!(true));

    // The same source outside a routes file produces no Variable node
    let (plain, _, _) = parse_source("src/orders.ts", source);
    assert!(!plain.iter().any(|n| n.core_type == CoreNodeType::Variable));
}

#[test]
fn anonymous_default_export_gets_placeholder() {
    let (nodes, _, _) = parse_source("src/anon.ts", "export default class {}\n");
    let class = find(&nodes, CoreNodeType::Class, "AnonymousClass");
    assert_eq!(class.core_type, CoreNodeType::Class);
}

#[test]
fn excluded_node_types_are_skipped() {
    let registry = registry();
    let globs = registry.variables_globset().unwrap();
    let ts = TsFile::parse("src/a.ts", CONTROLLER_TS.to_string()).unwrap();
    let meta = FileMeta {
        size: 0,
        mtime: 0,
        content_hash: "0".into(),
    };
    let excluded = vec!["decorator".to_string()];
    let out =
        traversal::traverse_file(&ts, &registry, PROJECT, &meta, &excluded, &globs).unwrap();
    assert!(!out.nodes.iter().any(|n| n.core_type == CoreNodeType::Decorator));
}

// ── Filesystem-backed tests ─────────────────────────────

fn write_project(dir: &Path) {
    std::fs::create_dir_all(dir.join("src")).unwrap();
    std::fs::write(dir.join("tsconfig.json"), "{}").unwrap();
    std::fs::write(dir.join("src/order.controller.ts"), CONTROLLER_TS).unwrap();
    std::fs::write(
        dir.join("src/user.service.ts"),
        r#"
import { Injectable } from '@nestjs/common';
import { OrderController } from './order.controller';

@Injectable()
export class UserService {
  constructor(private orders: OrderController) {}
}
"#,
    )
    .unwrap();
}

fn options(dir: &Path) -> ParseOptions {
    let mut opts = ParseOptions::new(dir, dir.join("tsconfig.json"));
    opts.project_id = Some(PROJECT.to_string());
    opts.project_type = ProjectType::Both;
    opts
}

#[tokio::test]
async fn full_parse_completes_project() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());
    let store = MemoryStore::new();

    let outcome = parse_project(&store, &options(dir.path())).await.unwrap();
    assert_eq!(outcome.diagnostics.files_parsed, 2);
    assert!(outcome.node_count > 0);

    let project = store.get_project(PROJECT).await.unwrap().unwrap();
    assert_eq!(project.status, ProjectStatus::Complete);
    assert_eq!(project.node_count, outcome.node_count);

    // Semantic typing happened: the controller is promoted and exposes
    let nodes = store.nodes_for_project(PROJECT).await;
    let controller = nodes
        .iter()
        .find(|n| n.name() == "OrderController" && n.core_type == CoreNodeType::Class)
        .unwrap();
    assert_eq!(controller.semantic_type.as_deref(), Some("NestController"));
    assert_eq!(controller.labels[0], "Controller");

    let edges = store.edges_for_project(PROJECT).await;
    let exposes = edges
        .iter()
        .find(|e| e.relationship_type == EdgeType::Exposes)
        .unwrap();
    let ctx = exposes.properties.context.as_ref().unwrap();
    assert_eq!(ctx["fullPath"], json!("/orders"));
    assert_eq!(ctx["httpMethod"], json!("GET"));

    // Cross-file INJECTS from the service into the controller
    assert!(edges.iter().any(|e| e.relationship_type == EdgeType::Injects));
}

#[tokio::test]
async fn configuration_errors_fail_before_store_mutation() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());
    let store = MemoryStore::new();

    let mut opts = options(dir.path());
    opts.ts_config_path = dir.path().join("missing-tsconfig.json");
    let err = parse_project(&store, &opts).await.unwrap_err();
    assert!(err.to_string().contains("tsconfig"));
    assert!(store.get_project(PROJECT).await.unwrap().is_none());
}

#[tokio::test]
async fn change_detection_tracks_edits_and_deletes() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());
    let store = MemoryStore::new();
    parse_project(&store, &options(dir.path())).await.unwrap();

    // Unchanged project: nothing to do
    let (changes, _) = change::detect_changes(dir.path(), PROJECT, &store)
        .await
        .unwrap();
    assert!(changes.is_empty());

    // Rewriting identical bytes is not a change, even though mtime moves
    std::fs::write(dir.path().join("src/order.controller.ts"), CONTROLLER_TS).unwrap();
    let (changes, _) = change::detect_changes(dir.path(), PROJECT, &store)
        .await
        .unwrap();
    assert!(changes.files_to_reparse.is_empty());

    // A real edit re-parses exactly that file
    std::fs::write(
        dir.path().join("src/order.controller.ts"),
        format!("{CONTROLLER_TS}\n// trailing note\n"),
    )
    .unwrap();
    let (changes, _) = change::detect_changes(dir.path(), PROJECT, &store)
        .await
        .unwrap();
    assert_eq!(
        changes.files_to_reparse,
        vec!["src/order.controller.ts".to_string()]
    );
    assert!(changes.files_to_delete.is_empty());

    // Removing a file surfaces as a delete
    std::fs::remove_file(dir.path().join("src/user.service.ts")).unwrap();
    let (changes, _) = change::detect_changes(dir.path(), PROJECT, &store)
        .await
        .unwrap();
    assert_eq!(
        changes.files_to_delete,
        vec!["src/user.service.ts".to_string()]
    );
}

#[test]
fn background_job_reports_completion() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());
    let store: Arc<dyn GraphStore> = Arc::new(MemoryStore::new());

    let manager = crate::job::JobManager::new();
    let handle = manager.spawn(
        Arc::clone(&store),
        options(dir.path()),
        std::time::Duration::from_secs(60),
    );
    let job_id = handle.job_id;
    let outcome = handle.wait().unwrap();
    assert_eq!(outcome.project_id, PROJECT);
    assert!(outcome.node_count > 0);
    assert_eq!(manager.status(job_id), Some(crate::job::JobStatus::Complete));
}

#[test]
fn background_job_reports_errors() {
    let store: Arc<dyn GraphStore> = Arc::new(MemoryStore::new());
    let manager = crate::job::JobManager::new();
    let handle = manager.spawn(
        store,
        ParseOptions::new("/nonexistent/trellis-project", "/nonexistent/tsconfig.json"),
        std::time::Duration::from_secs(60),
    );
    let err = handle.wait().unwrap_err();
    assert!(err.to_string().contains("project path"));
}
