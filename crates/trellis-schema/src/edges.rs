//! Semantic edge rules
//!
//! Each rule pairs a named predicate with edge metadata. Predicates evaluate
//! over node `context{}` alone, never live AST, so a rule behaves the same
//! whether an endpoint was parsed this run or loaded from the store as a
//! stub. Names are compared exactly after quote/whitespace cleaning;
//! substring matching is deliberately absent.

use serde_json::{Map, Value, json};
use trellis_core::{CoreNodeType, EdgeDirection, EdgeType, ParsedNode};

/// A route-table entry captured off a route-definition variable.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteEntry {
    pub method: String,
    pub path: String,
    pub handler: String,
    pub controller_name: String,
    pub authenticated: bool,
}

/// Read the normalized route entries out of a node's context.
pub fn route_entries(node: &ParsedNode) -> Vec<RouteEntry> {
    let Some(routes) = node.context().and_then(|c| c.get("routes")).and_then(Value::as_array)
    else {
        return Vec::new();
    };
    routes
        .iter()
        .filter_map(Value::as_object)
        .map(|r| RouteEntry {
            method: str_field(r, "method"),
            path: str_field(r, "path"),
            handler: str_field(r, "handler"),
            controller_name: str_field(r, "controllerName"),
            authenticated: r.get("authenticated").and_then(Value::as_bool).unwrap_or(false),
        })
        .collect()
}

fn str_field(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

/// Named pairwise detectors for semantic edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgePredicate {
    /// Class depends on class through constructor parameter types or
    /// `@Inject` tokens.
    ConstructorInjection,
    /// Controller exposes an HTTP endpoint method declared in its own body.
    HttpExposure,
    /// Controller exposes a message-pattern handler declared in its body.
    RpcExposure,
    /// Repository names a data-access layer in its declared `dals`.
    DalUsage,
    /// Controller is guarded by a permission manager.
    PermissionGuard,
    /// Route-definition table names a controller.
    RouteToController,
    /// Route-definition table names a handler method on its controller.
    RouteToHandler,
    /// Service holds or constructs a `<Vendor>Client` for a vendor
    /// controller registered in the shared context.
    VendorClientCall,
}

impl EdgePredicate {
    pub fn matches(
        &self,
        source: &ParsedNode,
        target: &ParsedNode,
        _all: &[&ParsedNode],
        shared: &Map<String, Value>,
    ) -> bool {
        match self {
            EdgePredicate::ConstructorInjection => {
                if source.core_type != CoreNodeType::Class
                    || target.core_type != CoreNodeType::Class
                {
                    return false;
                }
                if source.context_strs("constructorParamTypes").iter().any(|t| *t == target.name())
                {
                    return true;
                }
                injection_token_for(source, target).is_some()
            }
            EdgePredicate::HttpExposure => {
                exposure(source, target, "NestController", "HttpEndpoint")
            }
            EdgePredicate::RpcExposure => {
                exposure(source, target, "NestController", "MessageHandler")
            }
            EdgePredicate::DalUsage => {
                semantic(source) == Some("Repository")
                    && semantic(target) == Some("DataAccessLayer")
                    && source.context_strs("dals").iter().any(|d| *d == target.name())
            }
            EdgePredicate::PermissionGuard => {
                semantic(source) == Some("NestController")
                    && semantic(target) == Some("PermissionManager")
                    && source.context_str("permissionManager") == Some(target.name())
            }
            EdgePredicate::RouteToController => {
                semantic(source) == Some("RouteDefinition")
                    && target.core_type == CoreNodeType::Class
                    && route_entries(source)
                        .iter()
                        .any(|r| r.controller_name == target.name())
            }
            EdgePredicate::RouteToHandler => {
                semantic(source) == Some("RouteDefinition")
                    && target.core_type == CoreNodeType::Method
                    && route_entries(source).iter().any(|r| {
                        r.handler == target.name()
                            && Some(r.controller_name.as_str())
                                == target.context_str("parentClassName")
                    })
            }
            EdgePredicate::VendorClientCall => {
                let source_is_service = matches!(
                    semantic(source),
                    Some("NestService") | Some("DomainService")
                );
                if !source_is_service || semantic(target) != Some("VendorController") {
                    return false;
                }
                let registered = shared
                    .get("vendorControllers")
                    .and_then(Value::as_array)
                    .is_some_and(|a| {
                        a.iter().filter_map(Value::as_str).any(|n| n == target.name())
                    });
                if !registered {
                    return false;
                }
                let vendor = target
                    .name()
                    .strip_suffix("VendorController")
                    .or_else(|| target.name().strip_suffix("Controller"))
                    .unwrap_or(target.name());
                let client = format!("{vendor}Client");
                source.context_strs("propertyTypes").iter().any(|t| *t == client)
                    || source.context_strs("instantiatedTypes").iter().any(|t| *t == client)
            }
        }
    }
}

fn semantic(node: &ParsedNode) -> Option<&str> {
    node.semantic_type.as_deref()
}

/// Shared shape of HTTP and RPC exposure: same file, and the method's
/// declaring class is the controller itself.
fn exposure(
    source: &ParsedNode,
    target: &ParsedNode,
    controller_type: &str,
    endpoint_type: &str,
) -> bool {
    semantic(source) == Some(controller_type)
        && semantic(target) == Some(endpoint_type)
        && source.file_path() == target.file_path()
        && target.context_str("parentClassName") == Some(source.name())
}

/// The `(paramType, token)` pair through which `target` is injected into
/// `source`, when the match is token-based.
fn injection_token_for<'a>(
    source: &'a ParsedNode,
    target: &ParsedNode,
) -> Option<(&'a str, &'a str)> {
    let provider_token = target.context_str("providerToken")?;
    let tokens = source.context()?.get("injectTokens")?.as_object()?;
    tokens
        .iter()
        .find(|(_, v)| v.as_str() == Some(provider_token))
        .map(|(k, v)| (k.as_str(), v.as_str().unwrap_or_default()))
}

/// Named edge-context extractors, run when a rule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeContextExtractor {
    /// `{injectionType, parameterIndex, injectionToken}`.
    Injection,
    /// `{httpMethod, fullPath}` from controller base path + endpoint path.
    HttpExposureMeta,
    /// `{messagePattern}` from the handler decorator.
    RpcExposureMeta,
    /// The matched route row: `{routeMethod, routePath, authenticated}`.
    RouteBinding,
}

impl EdgeContextExtractor {
    pub fn extract(&self, source: &ParsedNode, target: &ParsedNode) -> Map<String, Value> {
        let mut ctx = Map::new();
        match self {
            EdgeContextExtractor::Injection => {
                ctx.insert("injectionType".into(), json!("constructor"));
                let params = source.context_strs("constructorParamTypes");
                if let Some(idx) = params.iter().position(|t| *t == target.name()) {
                    ctx.insert("parameterIndex".into(), json!(idx));
                    let token = source
                        .context()
                        .and_then(|c| c.get("injectTokens"))
                        .and_then(Value::as_object)
                        .and_then(|t| t.get(target.name()))
                        .and_then(Value::as_str);
                    ctx.insert("injectionToken".into(), json!(token));
                } else if let Some((param_type, token)) = injection_token_for(source, target) {
                    let idx = params.iter().position(|t| *t == param_type);
                    ctx.insert("parameterIndex".into(), json!(idx));
                    ctx.insert("injectionToken".into(), json!(token));
                } else {
                    ctx.insert("parameterIndex".into(), Value::Null);
                    ctx.insert("injectionToken".into(), Value::Null);
                }
            }
            EdgeContextExtractor::HttpExposureMeta => {
                if let Some(method) = target.context_str("httpMethod") {
                    ctx.insert("httpMethod".into(), json!(method));
                }
                let base = source.context_str("basePath").unwrap_or_default();
                let path = target.context_str("httpPath").unwrap_or_default();
                ctx.insert("fullPath".into(), json!(join_paths(base, path)));
            }
            EdgeContextExtractor::RpcExposureMeta => {
                if let Some(pattern) = target.context_str("messagePattern") {
                    ctx.insert("messagePattern".into(), json!(pattern));
                }
            }
            EdgeContextExtractor::RouteBinding => {
                let matched = route_entries(source).into_iter().find(|r| {
                    r.handler == target.name() || r.controller_name == target.name()
                });
                if let Some(route) = matched {
                    ctx.insert("routeMethod".into(), json!(route.method));
                    ctx.insert("routePath".into(), json!(route.path));
                    ctx.insert("authenticated".into(), json!(route.authenticated));
                }
            }
        }
        ctx
    }
}

/// Join a controller base path and a method path into a full route path.
fn join_paths(base: &str, path: &str) -> String {
    let base = normalize_segment(base);
    let path = normalize_segment(path);
    match (base.is_empty(), path.is_empty()) {
        (true, true) => "/".to_string(),
        (false, true) => format!("/{base}"),
        (true, false) => format!("/{path}"),
        (false, false) => format!("/{base}/{path}"),
    }
}

fn normalize_segment(s: &str) -> String {
    s.trim().trim_matches('/').to_string()
}

/// A declarative semantic-edge rule.
#[derive(Debug, Clone)]
pub struct EdgeRule {
    pub name: &'static str,
    pub semantic_type: &'static str,
    pub relationship_type: EdgeType,
    pub relationship_weight: f64,
    pub direction: EdgeDirection,
    pub predicate: EdgePredicate,
    pub context_extractor: Option<EdgeContextExtractor>,
    /// A label granted to the target node when the rule fires and the
    /// target's visibility is public.
    pub grants_target_label: Option<&'static str>,
}
