//! Schema-driven AST traversal (one pass per file)
//!
//! Walks a parsed source file depth-first in schema-declared child order,
//! creating core nodes and structural edges, queueing deferred name-based
//! relationships, and collapsing skeletonizable child bodies inside the
//! parent's cached source. Node creation order is deterministic for a fixed
//! file and schema.

use std::collections::{HashMap, HashSet};

use globset::GlobSet;
use tree_sitter::Node;
use trellis_core::{
    CoreNodeType, EdgeType, ParsedEdge, ParsedNode, Result, TrellisError, identity,
};
use trellis_schema::{AstField, AstGetter, AstRelation, CoreNodeKind, Extraction, SchemaRegistry};

use crate::ast::{self, TsFile};

/// Filesystem metadata attached to the source-file node.
#[derive(Debug, Clone)]
pub struct FileMeta {
    pub size: u64,
    pub mtime: i64,
    pub content_hash: String,
}

/// A structural edge whose target is known only by name; resolved after all
/// nodes exist.
#[derive(Debug, Clone)]
pub struct DeferredEdge {
    pub edge_type: EdgeType,
    pub source_node_id: String,
    pub target_name: String,
    pub target_types: &'static [CoreNodeType],
    pub file_path: String,
    pub relationship_weight: f64,
}

/// Everything one file's traversal produces. AST handles live only as long
/// as the `TsFile`; the context phase consumes them before they drop.
pub struct TraversalOutput<'a> {
    pub file_node_id: String,
    pub nodes: Vec<ParsedNode>,
    pub edges: Vec<ParsedEdge>,
    pub deferred: Vec<DeferredEdge>,
    pub ast_handles: HashMap<String, Node<'a>>,
}

pub fn traverse_file<'a>(
    ts: &'a TsFile,
    registry: &SchemaRegistry,
    project_id: &str,
    meta: &FileMeta,
    excluded_node_types: &[String],
    variables_globs: &GlobSet,
) -> Result<TraversalOutput<'a>> {
    let path = ts.path().to_string();
    let file_name = path.rsplit('/').next().unwrap_or(&path).to_string();
    let (start, end) = ast::line_range(ts.root());

    let mut file_node = ParsedNode::new(
        CoreNodeType::SourceFile,
        &file_name,
        &path,
        start,
        end,
        ts.source(),
        project_id,
        None,
    );
    file_node.properties.insert("size".into(), serde_json::json!(meta.size));
    file_node.properties.insert("mtime".into(), serde_json::json!(meta.mtime));
    file_node
        .properties
        .insert("contentHash".into(), serde_json::json!(meta.content_hash));

    let file_kind = registry
        .core
        .node_kind(CoreNodeType::SourceFile)
        .ok_or_else(|| TrellisError::Schema("core schema lacks SourceFile".into()))?;
    apply_property_definitions(&mut file_node, file_kind, ts, ts.root());

    let mut walk = Walk {
        ts,
        registry,
        project_id,
        path: &path,
        excluded: excluded_node_types,
        parse_variables: variables_globs.is_match(&path),
        nodes: Vec::new(),
        edges: Vec::new(),
        deferred: Vec::new(),
        ast_handles: HashMap::new(),
        anonymous_seen: HashSet::new(),
    };

    let file_node_id = file_node.id.clone();
    walk.ast_handles.insert(file_node_id.clone(), ts.root());
    walk.nodes.push(file_node);
    walk.visit_children(0, file_kind.clone(), ts.root())?;

    Ok(TraversalOutput {
        file_node_id,
        nodes: walk.nodes,
        edges: walk.edges,
        deferred: walk.deferred,
        ast_handles: walk.ast_handles,
    })
}

struct Walk<'a, 'r> {
    ts: &'a TsFile,
    registry: &'r SchemaRegistry,
    project_id: &'r str,
    path: &'r str,
    excluded: &'r [String],
    parse_variables: bool,
    nodes: Vec<ParsedNode>,
    edges: Vec<ParsedEdge>,
    deferred: Vec<DeferredEdge>,
    ast_handles: HashMap<String, Node<'a>>,
    /// `(parent_id, placeholder)` pairs already used; a repeat means two
    /// anonymous siblings would collide, which fails the file.
    anonymous_seen: HashSet<(String, String)>,
}

impl<'a> Walk<'a, '_> {
    /// Create the schema-declared children of `self.nodes[parent_idx]`,
    /// recursing into each child's own children.
    fn visit_children(
        &mut self,
        parent_idx: usize,
        parent_kind: CoreNodeKind,
        parent_ast: Node<'a>,
    ) -> Result<()> {
        for spec in &parent_kind.children {
            // Variable children only exist in files the schema opts in.
            if spec.child_type == CoreNodeType::Variable && !self.parse_variables {
                continue;
            }
            let Some(child_kind) = self.registry.core.node_kind(spec.child_type) else {
                continue;
            };
            let child_kind = child_kind.clone();
            for child_ast in self.enumerate(parent_ast, spec.getter) {
                if self.excluded.iter().any(|k| k == child_ast.kind()) {
                    continue;
                }
                let parent_id = self.nodes[parent_idx].id.clone();
                let Some(name) = self.child_name(&child_kind, child_ast, &parent_id)? else {
                    continue;
                };
                let (start, end) = ast::line_range(child_ast);
                let mut node = ParsedNode::new(
                    spec.child_type,
                    &name,
                    self.path,
                    start,
                    end,
                    self.ts.text(child_ast),
                    self.project_id,
                    Some(parent_id.as_str()),
                );
                apply_property_definitions(&mut node, &child_kind, self.ts, child_ast);
                self.queue_deferred(&child_kind, &node, child_ast);

                self.edges.push(ParsedEdge::structural(
                    spec.edge_type,
                    &parent_id,
                    &node.id,
                    self.path,
                ));

                if child_kind.skeletonize {
                    skeletonize_into(&mut self.nodes[parent_idx], self.ts.text(child_ast), &node.id);
                }

                let node_id = node.id.clone();
                self.ast_handles.insert(node_id, child_ast);
                let child_idx = self.nodes.len();
                self.nodes.push(node);
                self.visit_children(child_idx, child_kind.clone(), child_ast)?;
            }
        }
        Ok(())
    }

    fn enumerate(&self, parent: Node<'a>, getter: AstGetter) -> Vec<Node<'a>> {
        match getter {
            AstGetter::Classes => ast::top_level(self.ts, ast::CLASS_KINDS),
            AstGetter::Interfaces => ast::top_level(self.ts, ast::INTERFACE_KINDS),
            AstGetter::Enums => ast::top_level(self.ts, ast::ENUM_KINDS),
            AstGetter::Functions => ast::top_level(self.ts, ast::FUNCTION_KINDS),
            AstGetter::Methods => ast::class_methods(parent),
            AstGetter::Properties => ast::class_properties(parent),
            AstGetter::Parameters => ast::parameters_of(parent),
            AstGetter::Decorators => ast::decorators_of(parent),
            AstGetter::Imports => ast::imports_of(self.ts),
            AstGetter::Exports => ast::bare_exports_of(self.ts),
            AstGetter::VariableStatements => ast::top_level_variables(self.ts),
        }
    }

    /// The child's name, or a stable placeholder for anonymous constructs.
    /// Two anonymous siblings under one parent cannot be told apart, so the
    /// file is rejected rather than silently inventing identity.
    fn child_name(
        &mut self,
        kind: &CoreNodeKind,
        node: Node<'a>,
        parent_id: &str,
    ) -> Result<Option<String>> {
        match kind.core_type {
            CoreNodeType::Decorator => Ok(Some(ast::decorator_name(self.ts, node))),
            CoreNodeType::Import => {
                Ok(ast::module_specifier(self.ts, node)
                    .or_else(|| Some(self.ts.text(node).to_string())))
            }
            CoreNodeType::Export => Ok(Some(ast::export_name(self.ts, node))),
            core_type => {
                if let Some(name) = ast::name_of(self.ts, node) {
                    return Ok(Some(name));
                }
                let placeholder = match core_type {
                    CoreNodeType::Class => identity::ANONYMOUS_CLASS,
                    CoreNodeType::Function => identity::ANONYMOUS_FUNCTION,
                    _ => return Ok(None),
                };
                let key = (parent_id.to_string(), placeholder.to_string());
                if !self.anonymous_seen.insert(key) {
                    return Err(TrellisError::AnonymousCollision {
                        file: self.path.to_string(),
                        parent: parent_id.to_string(),
                    });
                }
                Ok(Some(placeholder.to_string()))
            }
        }
    }

    fn queue_deferred(&mut self, kind: &CoreNodeKind, node: &ParsedNode, node_ast: Node<'a>) {
        for rel in &kind.relationships {
            let weight = self
                .registry
                .core
                .edge_kind(rel.edge_type)
                .map(|k| k.relationship_weight)
                .unwrap_or(1.0);
            let names: Vec<String> = match rel.relation {
                AstRelation::BaseClass => {
                    ast::base_class(self.ts, node_ast).into_iter().collect()
                }
                AstRelation::Implements => {
                    if node.core_type == CoreNodeType::Interface {
                        ast::interface_extends(self.ts, node_ast)
                    } else {
                        ast::implemented_interfaces(self.ts, node_ast)
                    }
                }
                AstRelation::TypeAnnotation => ast::type_annotation_text(self.ts, node_ast)
                    .into_iter()
                    .collect(),
            };
            for name in names {
                let name = name.trim_end_matches("[]").trim().to_string();
                if rel.relation == AstRelation::TypeAnnotation && !references_declared_type(&name) {
                    continue;
                }
                if name.is_empty() {
                    continue;
                }
                self.deferred.push(DeferredEdge {
                    edge_type: rel.edge_type,
                    source_node_id: node.id.clone(),
                    target_name: name,
                    target_types: rel.target_types,
                    file_path: self.path.to_string(),
                    relationship_weight: weight,
                });
            }
        }
    }
}

/// Primitive and builtin type names never resolve to declared entities;
/// skip them instead of inflating the dropped-edge count.
fn references_declared_type(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

fn apply_property_definitions(
    node: &mut ParsedNode,
    kind: &CoreNodeKind,
    ts: &TsFile,
    node_ast: Node,
) {
    for def in &kind.properties {
        let value = match &def.extraction {
            Extraction::Static(value) => Some(value.clone()),
            Extraction::Ast(field) => eval_ast_field(ts, node_ast, *field),
        };
        if let Some(value) = value {
            node.properties.insert(def.name.to_string(), value);
        }
    }
}

fn eval_ast_field(ts: &TsFile, node: Node, field: AstField) -> Option<serde_json::Value> {
    use serde_json::json;
    let value = match field {
        AstField::IsExported => json!(ast::is_exported(node)),
        AstField::IsDefaultExport => json!(ast::is_default_export(ts, node)),
        AstField::IsAbstract => json!(ast::is_abstract(node)),
        AstField::IsAsync => json!(ast::has_modifier(ts, node, "async")),
        AstField::IsStatic => json!(ast::has_modifier(ts, node, "static")),
        AstField::IsReadonly => json!(ast::has_modifier(ts, node, "readonly")),
        AstField::IsOptional => {
            json!(node.kind() == "optional_parameter" || ast::has_question_token(ts, node))
        }
        AstField::IsRest => json!(ast::is_rest_parameter(node)),
        AstField::IsTypeOnly => json!(ast::is_type_only_import(ts, node)),
        AstField::Visibility => json!(ast::visibility_of(ts, node)),
        AstField::ReturnType => json!(ast::return_type_text(ts, node)?),
        AstField::TypeName => json!(ast::type_annotation_text(ts, node)?),
        AstField::ModuleSpecifier => json!(ast::module_specifier(ts, node)?),
    };
    Some(value)
}

/// Replace a skeletonizable child's body inside the parent's cached source
/// with `<signature> { /* NodeID: <id> */ }`. Children without a block body
/// are left alone.
fn skeletonize_into(parent: &mut ParsedNode, child_text: &str, child_id: &str) {
    let Some((signature, _)) = child_text.split_once('{') else {
        return;
    };
    let replacement = format!("{} {{ /* NodeID: {child_id} */ }}", signature.trim_end());
    let collapsed = parent.source_code().replacen(child_text, &replacement, 1);
    parent.set_source_code(collapsed);
}
