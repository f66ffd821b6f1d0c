//! Detection-pattern DSL
//!
//! Patterns are tagged variants rather than closures so framework schemas
//! stay pure data: the engine dispatches on the variant. Every predicate
//! evaluates over the parsed node's `context{}` (written in the extraction
//! phase) and its owning file node, never over live AST, so patterns behave
//! identically for freshly parsed nodes and stubs loaded from the store.

use regex::Regex;
use trellis_core::ParsedNode;

/// Literal vs. regex matching. Literals match as substrings, mirroring the
/// "matches the regex or contains the substring" contract.
#[derive(Debug, Clone)]
pub enum PatternMatcher {
    Literal(String),
    Regex(Regex),
}

impl PatternMatcher {
    pub fn literal(s: &str) -> Self {
        PatternMatcher::Literal(s.to_string())
    }

    /// Panics on an invalid pattern; schemas are static data validated by
    /// their own unit tests.
    pub fn regex(pattern: &str) -> Self {
        PatternMatcher::Regex(Regex::new(pattern).expect("static schema regex"))
    }

    pub fn matches(&self, input: &str) -> bool {
        match self {
            PatternMatcher::Literal(s) => input.contains(s.as_str()),
            PatternMatcher::Regex(re) => re.is_match(input),
        }
    }
}

/// Named predicates for `function`-type detection patterns.
#[derive(Debug, Clone)]
pub enum NodePredicate {
    /// The node is a variable whose initializer is an array of route-shaped
    /// object literals.
    HasRouteArrayInitializer,
    /// The node is a class implementing the named interface.
    ImplementsInterface(String),
}

impl NodePredicate {
    pub fn evaluate(&self, node: &ParsedNode) -> bool {
        match self {
            NodePredicate::HasRouteArrayInitializer => node
                .context()
                .and_then(|c| c.get("routes"))
                .and_then(|v| v.as_array())
                .is_some_and(|a| !a.is_empty()),
            NodePredicate::ImplementsInterface(name) => node
                .context_strs("implementsInterfaces")
                .iter()
                .any(|i| i == name),
        }
    }
}

/// One way a framework schema recognizes a node.
#[derive(Debug, Clone)]
pub enum DetectionKind {
    /// The node carries the named decorator (exact name).
    Decorator(String),
    /// The owning file's path matches.
    Filename(PatternMatcher),
    /// The node's name matches.
    ClassName(PatternMatcher),
    /// The owning source file imports the named module (exact specifier).
    Import(String),
    /// A named predicate over the parsed node.
    Function(NodePredicate),
}

#[derive(Debug, Clone)]
pub struct DetectionPattern {
    pub kind: DetectionKind,
    pub confidence: f64,
    pub priority: i32,
}

impl DetectionPattern {
    pub fn new(kind: DetectionKind, confidence: f64, priority: i32) -> Self {
        DetectionPattern {
            kind,
            confidence,
            priority,
        }
    }

    /// Evaluate against a node and (optionally) its owning source-file node.
    /// Any failure to find expected context is a non-match, never an error.
    pub fn matches(&self, node: &ParsedNode, file: Option<&ParsedNode>) -> bool {
        match &self.kind {
            DetectionKind::Decorator(name) => node
                .context_strs("decoratorNames")
                .iter()
                .any(|d| d == name),
            DetectionKind::Filename(matcher) => matcher.matches(node.file_path()),
            DetectionKind::ClassName(matcher) => matcher.matches(node.name()),
            DetectionKind::Import(module) => file
                .map(|f| f.context_strs("importedModules").iter().any(|m| m == module))
                .unwrap_or(false),
            DetectionKind::Function(predicate) => predicate.evaluate(node),
        }
    }
}

/// Strip surrounding quotes and whitespace from a name captured out of
/// source text. Every name-based comparison goes through this, so single
/// and double quoting are indistinguishable to the detectors.
pub fn clean_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| {
            trimmed
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
        })
        .or_else(|| {
            trimmed
                .strip_prefix('`')
                .and_then(|s| s.strip_suffix('`'))
        })
        .unwrap_or(trimmed);
    trimmed.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trellis_core::CoreNodeType;

    fn class_node(name: &str, file: &str) -> ParsedNode {
        ParsedNode::new(CoreNodeType::Class, name, file, 1, 10, "", "project:1", None)
    }

    #[test]
    fn decorator_pattern_reads_context() {
        let mut node = class_node("OrderController", "src/order.controller.ts");
        let mut ctx = serde_json::Map::new();
        ctx.insert("decoratorNames".into(), json!(["Controller"]));
        node.merge_context(ctx);

        let hit = DetectionPattern::new(
            DetectionKind::Decorator("Controller".into()),
            1.0,
            10,
        );
        let miss = DetectionPattern::new(
            DetectionKind::Decorator("Injectable".into()),
            1.0,
            10,
        );
        assert!(hit.matches(&node, None));
        assert!(!miss.matches(&node, None));
    }

    #[test]
    fn filename_and_classname_patterns() {
        let node = class_node("UserRepository", "src/user.repository.ts");
        let by_file = DetectionPattern::new(
            DetectionKind::Filename(PatternMatcher::literal(".repository.ts")),
            0.9,
            5,
        );
        let by_name = DetectionPattern::new(
            DetectionKind::ClassName(PatternMatcher::regex(r"Repository$")),
            0.9,
            5,
        );
        assert!(by_file.matches(&node, None));
        assert!(by_name.matches(&node, None));
    }

    #[test]
    fn import_pattern_reads_file_context() {
        let node = class_node("AppModule", "src/app.module.ts");
        let mut file = ParsedNode::new(
            CoreNodeType::SourceFile,
            "app.module.ts",
            "src/app.module.ts",
            1,
            1,
            "",
            "project:1",
            None,
        );
        let mut ctx = serde_json::Map::new();
        ctx.insert("importedModules".into(), json!(["@nestjs/common"]));
        file.merge_context(ctx);

        let pattern = DetectionPattern::new(
            DetectionKind::Import("@nestjs/common".into()),
            0.8,
            5,
        );
        assert!(pattern.matches(&node, Some(&file)));
        assert!(!pattern.matches(&node, None));
    }

    #[test]
    fn clean_name_strips_quotes_and_whitespace() {
        assert_eq!(clean_name("'UserDAL'"), "UserDAL");
        assert_eq!(clean_name("\"UserDAL\""), "UserDAL");
        assert_eq!(clean_name("  `orders`  "), "orders");
        assert_eq!(clean_name("plain"), "plain");
        // Mismatched quotes stay as-is apart from trimming
        assert_eq!(clean_name("'odd\""), "'odd\"");
    }

    #[test]
    fn route_array_predicate() {
        let mut node = ParsedNode::new(
            CoreNodeType::Variable,
            "orderRoutes",
            "src/orders.routes.ts",
            1,
            8,
            "",
            "project:1",
            None,
        );
        assert!(!NodePredicate::HasRouteArrayInitializer.evaluate(&node));
        let mut ctx = serde_json::Map::new();
        ctx.insert(
            "routes".into(),
            json!([{"method": "GET", "path": "/orders", "handler": "list"}]),
        );
        node.merge_context(ctx);
        assert!(NodePredicate::HasRouteArrayInitializer.evaluate(&node));
    }
}
