//! Framework enhancements
//!
//! An enhancement promotes a core node to a semantic type when one of its
//! detection patterns matches. Local context extractors run after promotion
//! and derive framework attributes from context the extraction phase already
//! captured (decorator names/arguments, property types, raw route rows).

use serde_json::{Map, Value, json};
use trellis_core::{CoreNodeType, ParsedNode};

use crate::edges::EdgeRule;
use crate::patterns::{DetectionPattern, clean_name};

/// Enhancement-local context extractors, dispatched by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorKind {
    /// `basePath` from the `Controller` decorator argument, and
    /// `permissionManager` from `UseGuards`.
    ControllerMeta,
    /// `providerToken` from the `Injectable` decorator argument.
    ProviderToken,
    /// `httpMethod` + `httpPath` from the matched HTTP verb decorator.
    EndpointMeta,
    /// `messagePattern` from `MessagePattern`/`EventPattern`.
    MessageHandlerMeta,
    /// `dals`: the declared `dals` string-array property, falling back to
    /// constructor parameter types with a DAL suffix.
    RepositoryDals,
    /// Re-writes `routes` with every string field cleaned.
    RouteTable,
}

const HTTP_VERBS: [&str; 5] = ["Get", "Post", "Put", "Delete", "Patch"];

impl ExtractorKind {
    pub fn extract(&self, node: &ParsedNode) -> Map<String, Value> {
        let mut out = Map::new();
        match self {
            ExtractorKind::ControllerMeta => {
                if let Some(arg) = decorator_arg(node, "Controller") {
                    out.insert("basePath".into(), json!(clean_name(&arg)));
                }
                if let Some(guard) = decorator_arg(node, "UseGuards") {
                    out.insert("permissionManager".into(), json!(clean_name(&guard)));
                }
            }
            ExtractorKind::ProviderToken => {
                if let Some(token) = decorator_arg(node, "Injectable") {
                    let token = clean_name(&token);
                    if !token.is_empty() {
                        out.insert("providerToken".into(), json!(token));
                    }
                }
            }
            ExtractorKind::EndpointMeta => {
                let names = node.context_strs("decoratorNames");
                if let Some(verb) = HTTP_VERBS.into_iter().find(|v| names.contains(v)) {
                    out.insert("httpMethod".into(), json!(verb.to_uppercase()));
                    let path = decorator_arg(node, verb)
                        .map(|a| clean_name(&a))
                        .unwrap_or_default();
                    out.insert("httpPath".into(), json!(path));
                }
            }
            ExtractorKind::MessageHandlerMeta => {
                let pattern = decorator_arg(node, "MessagePattern")
                    .or_else(|| decorator_arg(node, "EventPattern"));
                if let Some(pattern) = pattern {
                    out.insert("messagePattern".into(), json!(clean_name(&pattern)));
                }
            }
            ExtractorKind::RepositoryDals => {
                let declared: Vec<String> = node
                    .context()
                    .and_then(|c| c.get("stringArrayProperties"))
                    .and_then(Value::as_object)
                    .and_then(|p| p.get("dals"))
                    .and_then(Value::as_array)
                    .map(|a| {
                        a.iter()
                            .filter_map(Value::as_str)
                            .map(clean_name)
                            .collect()
                    })
                    .unwrap_or_default();
                let dals: Vec<String> = if declared.is_empty() {
                    node.context_strs("constructorParamTypes")
                        .iter()
                        .filter(|t| t.ends_with("DAL") || t.ends_with("Dal"))
                        .map(|t| t.to_string())
                        .collect()
                } else {
                    declared
                };
                out.insert("dals".into(), json!(dals));
            }
            ExtractorKind::RouteTable => {
                let Some(routes) = node
                    .context()
                    .and_then(|c| c.get("routes"))
                    .and_then(Value::as_array)
                else {
                    return out;
                };
                let cleaned: Vec<Value> = routes
                    .iter()
                    .filter_map(Value::as_object)
                    .map(|r| {
                        let mut row = Map::new();
                        for key in ["method", "path", "handler", "controllerName"] {
                            let v = r.get(key).and_then(Value::as_str).unwrap_or_default();
                            row.insert(key.into(), json!(clean_name(v)));
                        }
                        row.insert(
                            "authenticated".into(),
                            r.get("authenticated").cloned().unwrap_or(Value::Bool(false)),
                        );
                        Value::Object(row)
                    })
                    .collect();
                out.insert("routes".into(), Value::Array(cleaned));
            }
        }
        out
    }
}

/// First argument of the named decorator, as captured during extraction.
fn decorator_arg(node: &ParsedNode, decorator: &str) -> Option<String> {
    node.context()?
        .get("decoratorArgs")?
        .as_object()?
        .get(decorator)?
        .as_str()
        .map(|s| s.to_string())
}

/// A declarative rule promoting a core node to a semantic type.
#[derive(Debug, Clone)]
pub struct FrameworkEnhancement {
    pub name: &'static str,
    pub target_core_type: CoreNodeType,
    pub semantic_type: &'static str,
    /// A node matches when ANY pattern holds.
    pub detection_patterns: Vec<DetectionPattern>,
    pub context_extractors: Vec<ExtractorKind>,
    /// Edge rules that only make sense once this enhancement exists.
    pub additional_relationships: Vec<EdgeRule>,
    pub labels: Vec<&'static str>,
    pub primary_label: Option<&'static str>,
    pub priority: i32,
}

/// One framework's worth of enhancements and edge rules. Schemas apply in
/// descending priority order; ties fall back to insertion order, which is
/// deterministic for a fixed registry.
#[derive(Debug, Clone)]
pub struct FrameworkSchema {
    pub name: &'static str,
    pub priority: i32,
    pub enhancements: Vec<FrameworkEnhancement>,
    pub edge_rules: Vec<EdgeRule>,
}

impl FrameworkSchema {
    /// All edge rules, schema-level and enhancement-local.
    pub fn all_edge_rules(&self) -> impl Iterator<Item = &EdgeRule> {
        self.edge_rules.iter().chain(
            self.enhancements
                .iter()
                .flat_map(|e| e.additional_relationships.iter()),
        )
    }
}
