//! Typed TypeScript AST adapter over tree-sitter
//!
//! The schema names getters (classes, methods, decorators, heritage, …);
//! this module is the one place that knows tree-sitter's grammar node kinds
//! and field names. Everything above it works with `Node` handles and these
//! functions. Decorator lookups tolerate both grammar layouts (decorators as
//! children of the declaration, or as preceding siblings in the class body).

use tree_sitter::{Node, Parser, Tree};
use trellis_core::{Result, TrellisError};

/// A parsed TypeScript source file. Owns the tree and the source text;
/// every `Node` handle is valid only while this lives.
pub struct TsFile {
    tree: Tree,
    source: String,
    path: String,
}

impl TsFile {
    pub fn parse(path: &str, source: String) -> Result<Self> {
        let language = if path.ends_with(".tsx") {
            tree_sitter_typescript::LANGUAGE_TSX
        } else {
            tree_sitter_typescript::LANGUAGE_TYPESCRIPT
        };
        let mut parser = Parser::new();
        parser
            .set_language(&language.into())
            .map_err(|e| TrellisError::Parse {
                file: path.to_string(),
                message: format!("language setup: {e}"),
            })?;
        let tree = parser.parse(&source, None).ok_or_else(|| TrellisError::Parse {
            file: path.to_string(),
            message: "tree-sitter returned no tree".to_string(),
        })?;
        Ok(TsFile {
            tree,
            source,
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn text(&self, node: Node) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or_default()
    }
}

/// 1-based line span of a node.
pub fn line_range(node: Node) -> (u32, u32) {
    (
        node.start_position().row as u32 + 1,
        node.end_position().row as u32 + 1,
    )
}

pub fn named_children<'a>(node: Node<'a>) -> Vec<Node<'a>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

pub fn all_children<'a>(node: Node<'a>) -> Vec<Node<'a>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

fn children_of_kind<'a>(node: Node<'a>, kinds: &[&str]) -> Vec<Node<'a>> {
    named_children(node)
        .into_iter()
        .filter(|c| kinds.contains(&c.kind()))
        .collect()
}

/// Export statements wrap what they export; descend into the declaration,
/// or the value for expression-bodied default exports
/// (`export default class {}`).
pub fn unwrap_export(node: Node) -> Node {
    if node.kind() == "export_statement" {
        if let Some(decl) = node.child_by_field_name("declaration") {
            return decl;
        }
        if let Some(value) = node.child_by_field_name("value") {
            return value;
        }
    }
    node
}

/// Top-level declarations of the given kinds, looking through
/// `export_statement` wrappers. Order is source order.
pub fn top_level<'a>(file: &'a TsFile, kinds: &[&str]) -> Vec<Node<'a>> {
    named_children(file.root())
        .into_iter()
        .map(unwrap_export)
        .filter(|n| kinds.contains(&n.kind()))
        .collect()
}

pub const CLASS_KINDS: &[&str] = &["class_declaration", "abstract_class_declaration", "class"];
pub const INTERFACE_KINDS: &[&str] = &["interface_declaration"];
pub const ENUM_KINDS: &[&str] = &["enum_declaration"];
pub const FUNCTION_KINDS: &[&str] = &[
    "function_declaration",
    "generator_function_declaration",
    "function_expression",
];
pub const METHOD_KINDS: &[&str] = &[
    "method_definition",
    "abstract_method_signature",
    "method_signature",
];
pub const PROPERTY_KINDS: &[&str] = &["public_field_definition", "property_signature"];

/// Name of a declaration, method, property, or parameter.
pub fn name_of(file: &TsFile, node: Node) -> Option<String> {
    let name_node = node
        .child_by_field_name("name")
        .or_else(|| node.child_by_field_name("pattern"))?;
    let text = file.text(name_node).trim().to_string();
    if text.is_empty() { None } else { Some(text) }
}

pub fn is_exported(node: Node) -> bool {
    node.parent().is_some_and(|p| p.kind() == "export_statement")
}

pub fn is_default_export(file: &TsFile, node: Node) -> bool {
    node.parent()
        .filter(|p| p.kind() == "export_statement")
        .is_some_and(|p| all_children(p).iter().any(|c| file.text(*c) == "default"))
}

/// `true` when the node carries the given anonymous keyword token
/// (`async`, `static`, `readonly`, …).
pub fn has_modifier(file: &TsFile, node: Node, modifier: &str) -> bool {
    all_children(node)
        .iter()
        .any(|c| !c.is_named() && file.text(*c) == modifier)
}

pub fn is_abstract(node: Node) -> bool {
    node.kind() == "abstract_class_declaration" || node.kind() == "abstract_method_signature"
}

/// `public`, `private`, or `protected`; TypeScript members default to public.
pub fn visibility_of(file: &TsFile, node: Node) -> &'static str {
    for child in all_children(node) {
        if child.kind() == "accessibility_modifier" {
            return match file.text(child) {
                "private" => "private",
                "protected" => "protected",
                _ => "public",
            };
        }
    }
    "public"
}

pub fn has_question_token(file: &TsFile, node: Node) -> bool {
    all_children(node)
        .iter()
        .any(|c| !c.is_named() && file.text(*c) == "?")
}

// ── Classes ─────────────────────────────────────────────

fn class_body(node: Node) -> Option<Node> {
    node.child_by_field_name("body")
}

pub fn class_methods(node: Node) -> Vec<Node> {
    class_body(node)
        .map(|b| children_of_kind(b, METHOD_KINDS))
        .unwrap_or_default()
}

pub fn class_properties(node: Node) -> Vec<Node> {
    class_body(node)
        .map(|b| children_of_kind(b, PROPERTY_KINDS))
        .unwrap_or_default()
}

/// Decorators attached to a declaration, member, or parameter. Looks at the
/// node's own `decorator` children first, then at preceding siblings.
pub fn decorators_of(node: Node) -> Vec<Node> {
    let own = children_of_kind(node, &["decorator"]);
    if !own.is_empty() {
        return own;
    }
    let mut preceding = Vec::new();
    let mut sibling = node.prev_named_sibling();
    while let Some(s) = sibling {
        if s.kind() != "decorator" {
            break;
        }
        preceding.push(s);
        sibling = s.prev_named_sibling();
    }
    preceding.reverse();
    preceding
}

/// Decorator name: `@Controller('orders')` → `Controller`.
pub fn decorator_name(file: &TsFile, decorator: Node) -> String {
    for child in named_children(decorator) {
        match child.kind() {
            "call_expression" => {
                if let Some(function) = child.child_by_field_name("function") {
                    return file.text(function).to_string();
                }
            }
            "identifier" | "member_expression" => return file.text(child).to_string(),
            _ => {}
        }
    }
    file.text(decorator).trim_start_matches('@').to_string()
}

/// First argument of a decorator call, raw text: `@Controller('orders')`
/// → `'orders'`. `None` when the decorator takes no arguments.
pub fn decorator_first_arg(file: &TsFile, decorator: Node) -> Option<String> {
    for child in named_children(decorator) {
        if child.kind() == "call_expression" {
            let args = child.child_by_field_name("arguments")?;
            let first = named_children(args).into_iter().next()?;
            return Some(file.text(first).to_string());
        }
    }
    None
}

/// Base class of a class declaration, from its `extends` clause.
pub fn base_class(file: &TsFile, class: Node) -> Option<String> {
    let heritage = children_of_kind(class, &["class_heritage"]).into_iter().next()?;
    let extends = children_of_kind(heritage, &["extends_clause"]).into_iter().next()?;
    let value = extends
        .child_by_field_name("value")
        .or_else(|| named_children(extends).into_iter().next())?;
    Some(strip_type_arguments(file.text(value)))
}

/// Interfaces named in a class `implements` clause.
pub fn implemented_interfaces(file: &TsFile, class: Node) -> Vec<String> {
    let Some(heritage) = children_of_kind(class, &["class_heritage"]).into_iter().next() else {
        return Vec::new();
    };
    children_of_kind(heritage, &["implements_clause"])
        .into_iter()
        .flat_map(|clause| named_children(clause))
        .map(|t| strip_type_arguments(file.text(t)))
        .collect()
}

/// Interfaces an interface extends.
pub fn interface_extends(file: &TsFile, interface: Node) -> Vec<String> {
    named_children(interface)
        .into_iter()
        .filter(|c| c.kind() == "extends_type_clause")
        .flat_map(|clause| named_children(clause))
        .map(|t| strip_type_arguments(file.text(t)))
        .collect()
}

// ── Functions, methods, parameters ──────────────────────

pub fn parameters_of(node: Node) -> Vec<Node> {
    let Some(params) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    children_of_kind(params, &["required_parameter", "optional_parameter"])
}

pub fn is_rest_parameter(param: Node) -> bool {
    param
        .child_by_field_name("pattern")
        .is_some_and(|p| p.kind() == "rest_pattern")
}

/// The type annotation's type text, without the leading `:`.
pub fn type_annotation_text(file: &TsFile, node: Node) -> Option<String> {
    let annotation = node.child_by_field_name("type")?;
    let ty = if annotation.kind() == "type_annotation" {
        named_children(annotation).into_iter().next()?
    } else {
        annotation
    };
    Some(strip_type_arguments(file.text(ty)))
}

pub fn return_type_text(file: &TsFile, node: Node) -> Option<String> {
    let annotation = node.child_by_field_name("return_type")?;
    let ty = named_children(annotation).into_iter().next()?;
    Some(file.text(ty).trim().to_string())
}

/// `UserRepository<User>` → `UserRepository`.
fn strip_type_arguments(text: &str) -> String {
    text.split('<').next().unwrap_or(text).trim().to_string()
}

/// Name of the class or interface lexically enclosing `node`.
pub fn enclosing_type_name(file: &TsFile, node: Node) -> Option<String> {
    let mut current = node.parent();
    while let Some(n) = current {
        if CLASS_KINDS.contains(&n.kind()) || INTERFACE_KINDS.contains(&n.kind()) {
            return name_of(file, n);
        }
        current = n.parent();
    }
    None
}

/// Zero-based position of a parameter within its formal-parameter list.
pub fn parameter_index(param: Node) -> Option<usize> {
    let list = param.parent()?;
    children_of_kind(list, &["required_parameter", "optional_parameter"])
        .iter()
        .position(|p| p.id() == param.id())
}

// ── Imports and exports ─────────────────────────────────

pub fn imports_of(file: &TsFile) -> Vec<Node<'_>> {
    children_of_kind(file.root(), &["import_statement"])
}

/// Export statements that do not wrap a declaration (re-exports and
/// export lists); exported declarations surface through their own getters.
pub fn bare_exports_of(file: &TsFile) -> Vec<Node<'_>> {
    children_of_kind(file.root(), &["export_statement"])
        .into_iter()
        .filter(|e| e.child_by_field_name("declaration").is_none())
        .collect()
}

/// Module specifier of an import or re-export, quotes stripped.
pub fn module_specifier(file: &TsFile, node: Node) -> Option<String> {
    let source = node.child_by_field_name("source")?;
    Some(file.text(source).trim_matches(['\'', '"', '`']).to_string())
}

pub fn is_type_only_import(file: &TsFile, node: Node) -> bool {
    all_children(node)
        .iter()
        .any(|c| !c.is_named() && file.text(*c) == "type")
}

/// A display name for a bare export statement: the export clause or the
/// re-exported module.
pub fn export_name(file: &TsFile, node: Node) -> String {
    if let Some(module) = module_specifier(file, node) {
        return format!("* from {module}");
    }
    for child in named_children(node) {
        if child.kind() == "export_clause" {
            let names: Vec<&str> = named_children(child)
                .into_iter()
                .map(|s| file.text(s))
                .collect();
            return names.join(", ");
        }
    }
    file.text(node).chars().take(40).collect()
}

// ── Variables ───────────────────────────────────────────

/// Top-level variable declarators (through `export` wrappers).
pub fn top_level_variables(file: &TsFile) -> Vec<Node<'_>> {
    named_children(file.root())
        .into_iter()
        .map(unwrap_export)
        .filter(|n| matches!(n.kind(), "lexical_declaration" | "variable_declaration"))
        .flat_map(|decl| children_of_kind(decl, &["variable_declarator"]))
        .collect()
}

pub fn initializer_of(node: Node) -> Option<Node> {
    node.child_by_field_name("value")
}

/// Items of a string-array initializer, raw text per item. `None` when the
/// initializer is not an array of strings.
pub fn string_array_items(file: &TsFile, value: Node) -> Option<Vec<String>> {
    if value.kind() != "array" {
        return None;
    }
    let items = named_children(value);
    if items.is_empty() || !items.iter().all(|i| i.kind() == "string") {
        return None;
    }
    Some(items.into_iter().map(|i| file.text(i).to_string()).collect())
}

/// The constructed type of a `new`-expression initializer.
pub fn new_expression_type(file: &TsFile, value: Node) -> Option<String> {
    if value.kind() != "new_expression" {
        return None;
    }
    let constructor = value.child_by_field_name("constructor")?;
    Some(strip_type_arguments(file.text(constructor)))
}

/// Rows of an array-of-object-literals initializer, as raw key/value text
/// pairs. Used for route tables; `None` when the shape doesn't fit.
pub fn object_array_rows(file: &TsFile, value: Node) -> Option<Vec<Vec<(String, String)>>> {
    if value.kind() != "array" {
        return None;
    }
    let objects = children_of_kind(value, &["object"]);
    if objects.is_empty() {
        return None;
    }
    let mut rows = Vec::new();
    for object in objects {
        let mut row = Vec::new();
        for pair in children_of_kind(object, &["pair"]) {
            let Some(key) = pair.child_by_field_name("key") else {
                continue;
            };
            let Some(val) = pair.child_by_field_name("value") else {
                continue;
            };
            row.push((file.text(key).to_string(), file.text(val).to_string()));
        }
        rows.push(row);
    }
    Some(rows)
}
