//! Context extraction (runs per file, before the AST drops)
//!
//! Pluggable extractors enrich nodes with the attributes everything
//! downstream needs. Anything an edge detector will later look at
//! (constructor parameter types, inject tokens, decorator arguments, route
//! rows) must be captured here, because detection runs against context
//! alone and has no AST for stub nodes.

use serde_json::{Map, Value, json};
use tree_sitter::Node;
use trellis_core::{CoreNodeType, ParsedNode};
use trellis_schema::clean_name;

use crate::ast::{self, TsFile};
use crate::traversal::TraversalOutput;

/// Framework-agnostic extractors applied to every node of a matching kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalExtractor {
    SourceFileInfo,
    ClassInfo,
    MethodInfo,
    PropertyInfo,
    ParameterInfo,
    VariableInfo,
}

pub const GLOBAL_EXTRACTORS: [GlobalExtractor; 6] = [
    GlobalExtractor::SourceFileInfo,
    GlobalExtractor::ClassInfo,
    GlobalExtractor::MethodInfo,
    GlobalExtractor::PropertyInfo,
    GlobalExtractor::ParameterInfo,
    GlobalExtractor::VariableInfo,
];

impl GlobalExtractor {
    pub fn node_type(&self) -> CoreNodeType {
        match self {
            GlobalExtractor::SourceFileInfo => CoreNodeType::SourceFile,
            GlobalExtractor::ClassInfo => CoreNodeType::Class,
            GlobalExtractor::MethodInfo => CoreNodeType::Method,
            GlobalExtractor::PropertyInfo => CoreNodeType::Property,
            GlobalExtractor::ParameterInfo => CoreNodeType::Parameter,
            GlobalExtractor::VariableInfo => CoreNodeType::Variable,
        }
    }

    pub fn extract(&self, node: &ParsedNode, ts: &TsFile, node_ast: Node) -> Map<String, Value> {
        match self {
            GlobalExtractor::SourceFileInfo => source_file_info(node, ts),
            GlobalExtractor::ClassInfo => class_info(ts, node_ast),
            GlobalExtractor::MethodInfo => method_info(ts, node_ast),
            GlobalExtractor::PropertyInfo => property_info(ts, node_ast),
            GlobalExtractor::ParameterInfo => parameter_info(ts, node_ast),
            GlobalExtractor::VariableInfo => variable_info(ts, node_ast),
        }
    }
}

/// Apply every matching extractor to every node of one file's traversal.
/// Extractor failures surface as missing attributes, never as errors.
pub fn enrich_file(out: &mut TraversalOutput<'_>, ts: &TsFile) {
    for idx in 0..out.nodes.len() {
        let Some(&node_ast) = out.ast_handles.get(&out.nodes[idx].id) else {
            continue;
        };
        for extractor in GLOBAL_EXTRACTORS {
            if extractor.node_type() != out.nodes[idx].core_type {
                continue;
            }
            let attributes = extractor.extract(&out.nodes[idx], ts, node_ast);
            out.nodes[idx].merge_context(attributes);
        }
    }
}

fn source_file_info(node: &ParsedNode, ts: &TsFile) -> Map<String, Value> {
    let path = node.file_path();
    let mut ctx = Map::new();
    ctx.insert(
        "extension".into(),
        json!(path.rsplit('.').next().unwrap_or_default()),
    );
    ctx.insert("relativePath".into(), json!(path));
    ctx.insert(
        "isTestFile".into(),
        json!(path.ends_with(".spec.ts") || path.ends_with(".test.ts")),
    );
    ctx.insert("isDeclarationFile".into(), json!(path.ends_with(".d.ts")));

    let imports = ast::imports_of(ts);
    let imported: Vec<String> = imports
        .iter()
        .filter_map(|i| ast::module_specifier(ts, *i))
        .collect();
    ctx.insert("importCount".into(), json!(imports.len()));
    ctx.insert(
        "exportCount".into(),
        json!(
            ast::named_children(ts.root())
                .iter()
                .filter(|n| n.kind() == "export_statement")
                .count()
        ),
    );
    let declarations = ast::top_level(ts, ast::CLASS_KINDS).len()
        + ast::top_level(ts, ast::INTERFACE_KINDS).len()
        + ast::top_level(ts, ast::ENUM_KINDS).len()
        + ast::top_level(ts, ast::FUNCTION_KINDS).len();
    ctx.insert("declarationCount".into(), json!(declarations));
    ctx.insert("importedModules".into(), json!(imported));
    ctx
}

fn class_info(ts: &TsFile, class: Node) -> Map<String, Value> {
    let mut ctx = Map::new();
    ctx.insert("isAbstract".into(), json!(ast::is_abstract(class)));
    ctx.insert("isDefaultExport".into(), json!(ast::is_default_export(ts, class)));
    insert_decorators(&mut ctx, ts, class);

    let methods = ast::class_methods(class);
    let properties = ast::class_properties(class);
    ctx.insert("methodCount".into(), json!(methods.len()));
    ctx.insert("propertyCount".into(), json!(properties.len()));
    ctx.insert(
        "implementsInterfaces".into(),
        json!(ast::implemented_interfaces(ts, class)),
    );

    // Constructor wiring: ordered parameter types plus @Inject tokens, the
    // raw material for dependency-injection detection.
    let mut param_types: Vec<String> = Vec::new();
    let mut inject_tokens = Map::new();
    if let Some(ctor) = methods
        .iter()
        .find(|m| ast::name_of(ts, **m).as_deref() == Some("constructor"))
    {
        for param in ast::parameters_of(*ctor) {
            let ty = ast::type_annotation_text(ts, param).unwrap_or_default();
            if !ty.is_empty() {
                param_types.push(ty.clone());
            }
            for decorator in ast::decorators_of(param) {
                if ast::decorator_name(ts, decorator) == "Inject" {
                    if let Some(token) = ast::decorator_first_arg(ts, decorator) {
                        inject_tokens.insert(ty.clone(), json!(clean_name(&token)));
                    }
                }
            }
        }
    }
    ctx.insert("constructorParamTypes".into(), json!(param_types));
    ctx.insert("injectTokens".into(), Value::Object(inject_tokens));

    // Property shapes feed vendor-client and DAL detection.
    let mut property_types: Vec<String> = Vec::new();
    let mut instantiated: Vec<String> = Vec::new();
    let mut string_arrays = Map::new();
    for property in &properties {
        if let Some(ty) = ast::type_annotation_text(ts, *property) {
            property_types.push(ty);
        }
        if let Some(value) = ast::initializer_of(*property) {
            if let Some(ty) = ast::new_expression_type(ts, value) {
                instantiated.push(ty);
            }
            if let Some(items) = ast::string_array_items(ts, value) {
                if let Some(name) = ast::name_of(ts, *property) {
                    string_arrays.insert(name, json!(items));
                }
            }
        }
    }
    ctx.insert("propertyTypes".into(), json!(property_types));
    ctx.insert("instantiatedTypes".into(), json!(instantiated));
    ctx.insert("stringArrayProperties".into(), Value::Object(string_arrays));
    ctx
}

fn method_info(ts: &TsFile, method: Node) -> Map<String, Value> {
    let mut ctx = Map::new();
    ctx.insert("isAsync".into(), json!(ast::has_modifier(ts, method, "async")));
    ctx.insert("isStatic".into(), json!(ast::has_modifier(ts, method, "static")));
    ctx.insert("visibility".into(), json!(ast::visibility_of(ts, method)));
    if let Some(rt) = ast::return_type_text(ts, method) {
        ctx.insert("returnType".into(), json!(rt));
    }
    insert_decorators(&mut ctx, ts, method);
    if let Some(parent) = ast::enclosing_type_name(ts, method) {
        ctx.insert("parentClassName".into(), json!(parent));
    }
    ctx
}

fn property_info(ts: &TsFile, property: Node) -> Map<String, Value> {
    let mut ctx = Map::new();
    if let Some(ty) = ast::type_annotation_text(ts, property) {
        ctx.insert("typeName".into(), json!(ty));
    }
    insert_decorators(&mut ctx, ts, property);
    if let Some(parent) = ast::enclosing_type_name(ts, property) {
        ctx.insert("parentClassName".into(), json!(parent));
    }
    ctx
}

fn parameter_info(ts: &TsFile, param: Node) -> Map<String, Value> {
    let mut ctx = Map::new();
    if let Some(ty) = ast::type_annotation_text(ts, param) {
        ctx.insert("typeName".into(), json!(ty));
    }
    if let Some(index) = ast::parameter_index(param) {
        ctx.insert("parameterIndex".into(), json!(index));
    }
    insert_decorators(&mut ctx, ts, param);
    for decorator in ast::decorators_of(param) {
        if ast::decorator_name(ts, decorator) == "Inject" {
            if let Some(token) = ast::decorator_first_arg(ts, decorator) {
                ctx.insert("injectToken".into(), json!(clean_name(&token)));
            }
        }
    }
    ctx
}

fn variable_info(ts: &TsFile, declarator: Node) -> Map<String, Value> {
    let mut ctx = Map::new();
    if let Some(ty) = ast::type_annotation_text(ts, declarator) {
        ctx.insert("typeName".into(), json!(ty));
    }
    let Some(value) = ast::initializer_of(declarator) else {
        return ctx;
    };
    if let Some(rows) = ast::object_array_rows(ts, value) {
        let routes: Vec<Value> = rows
            .into_iter()
            .map(|row| {
                let mut entry = Map::new();
                for (key, raw) in row {
                    let key = match clean_name(&key).as_str() {
                        "controller" => "controllerName".to_string(),
                        other => other.to_string(),
                    };
                    let value = match raw.trim() {
                        "true" => Value::Bool(true),
                        "false" => Value::Bool(false),
                        other => json!(other),
                    };
                    entry.insert(key, value);
                }
                Value::Object(entry)
            })
            .collect();
        if routes
            .iter()
            .filter_map(Value::as_object)
            .any(|r| r.contains_key("handler") || r.contains_key("path"))
        {
            ctx.insert("routes".into(), Value::Array(routes));
        }
    }
    ctx
}

fn insert_decorators(ctx: &mut Map<String, Value>, ts: &TsFile, node: Node) {
    let decorators = ast::decorators_of(node);
    let names: Vec<String> = decorators
        .iter()
        .map(|d| ast::decorator_name(ts, *d))
        .collect();
    let mut args = Map::new();
    for decorator in &decorators {
        let name = ast::decorator_name(ts, *decorator);
        let arg = ast::decorator_first_arg(ts, *decorator)
            .map(|a| clean_name(&a))
            .unwrap_or_default();
        args.insert(name, json!(arg));
    }
    ctx.insert("decoratorNames".into(), json!(names));
    ctx.insert("decoratorArgs".into(), Value::Object(args));
}
