//! Schema registry — read-only after construction
//!
//! Assembles the core schema plus the framework schemas selected by the
//! project type, validates cross-references at load time, and answers the
//! lookups the parse phases need. This is the only process-wide state the
//! pipeline shares, and it never mutates after `build`.

use std::collections::HashMap;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use trellis_core::{CoreNodeType, EdgeType, Result, TrellisError};

use crate::core::CoreSchema;
use crate::edges::EdgeRule;
use crate::enhance::{FrameworkEnhancement, FrameworkSchema};
use crate::{fairsquare, nestjs};

/// Which framework schemas to activate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectType {
    /// Sniff the project root and pick.
    Auto,
    NestJs,
    Fairsquare,
    Both,
    /// Core structural extraction only.
    Vanilla,
}

impl ProjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectType::Auto => "auto",
            ProjectType::NestJs => "nestjs",
            ProjectType::Fairsquare => "fairsquare",
            ProjectType::Both => "both",
            ProjectType::Vanilla => "vanilla",
        }
    }
}

impl std::str::FromStr for ProjectType {
    type Err = TrellisError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(ProjectType::Auto),
            "nestjs" => Ok(ProjectType::NestJs),
            "fairsquare" => Ok(ProjectType::Fairsquare),
            "both" => Ok(ProjectType::Both),
            "vanilla" => Ok(ProjectType::Vanilla),
            other => Err(TrellisError::Configuration(format!(
                "unknown project type: {other}"
            ))),
        }
    }
}

/// Sniff the project root: `@nestjs/` in package.json selects nestjs,
/// any `*.routes.ts` file selects fairsquare; both may hold at once.
pub fn detect_project_type(root: &Path) -> ProjectType {
    let has_nest = std::fs::read_to_string(root.join("package.json"))
        .map(|pkg| pkg.contains("@nestjs/"))
        .unwrap_or(false);
    let has_routes = contains_routes_file(root, 0);
    match (has_nest, has_routes) {
        (true, true) => ProjectType::Both,
        (true, false) => ProjectType::NestJs,
        (false, true) => ProjectType::Fairsquare,
        (false, false) => ProjectType::Vanilla,
    }
}

const DETECT_MAX_DEPTH: usize = 8;

fn contains_routes_file(dir: &Path, depth: usize) -> bool {
    if depth > DETECT_MAX_DEPTH {
        return false;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || name == "node_modules" || name == "dist" {
            continue;
        }
        if path.is_dir() {
            if contains_routes_file(&path, depth + 1) {
                return true;
            }
        } else if name.ends_with(".routes.ts") {
            return true;
        }
    }
    false
}

/// The assembled, validated schema set for one parse.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    pub core: CoreSchema,
    /// Sorted by descending priority.
    pub frameworks: Vec<FrameworkSchema>,
    resolved_type: ProjectType,
}

impl SchemaRegistry {
    /// Build the registry for `project_type`, resolving `Auto` against the
    /// project root. Fails fast on any schema inconsistency.
    pub fn build(project_type: ProjectType, root: &Path) -> Result<Self> {
        let resolved = match project_type {
            ProjectType::Auto => detect_project_type(root),
            other => other,
        };
        let mut frameworks = match resolved {
            ProjectType::NestJs => vec![nestjs::schema()],
            ProjectType::Fairsquare => vec![fairsquare::schema()],
            ProjectType::Both => vec![nestjs::schema(), fairsquare::schema()],
            ProjectType::Vanilla => vec![],
            ProjectType::Auto => unreachable!("auto resolved above"),
        };
        frameworks.sort_by(|a, b| b.priority.cmp(&a.priority));

        let registry = SchemaRegistry {
            core: CoreSchema::typescript(),
            frameworks,
            resolved_type: resolved,
        };
        registry.validate()?;
        tracing::debug!(
            project_type = resolved.as_str(),
            frameworks = registry.frameworks.len(),
            "schema registry built"
        );
        Ok(registry)
    }

    pub fn resolved_type(&self) -> ProjectType {
        self.resolved_type
    }

    pub fn framework_names(&self) -> Vec<String> {
        self.frameworks.iter().map(|f| f.name.to_string()).collect()
    }

    /// Enhancements targeting `core_type`, highest priority first
    /// (schema priority, then enhancement priority, then insertion order).
    pub fn enhancements_for(&self, core_type: CoreNodeType) -> Vec<&FrameworkEnhancement> {
        let mut out: Vec<(i32, i32, usize, &FrameworkEnhancement)> = Vec::new();
        for schema in &self.frameworks {
            for (idx, enhancement) in schema.enhancements.iter().enumerate() {
                if enhancement.target_core_type == core_type {
                    out.push((schema.priority, enhancement.priority, idx, enhancement));
                }
            }
        }
        out.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)).then(a.2.cmp(&b.2)));
        out.into_iter().map(|(_, _, _, e)| e).collect()
    }

    /// All edge rules in schema priority order.
    pub fn edge_rules(&self) -> Vec<&EdgeRule> {
        self.frameworks
            .iter()
            .flat_map(|f| f.all_edge_rules())
            .collect()
    }

    /// Glob set for files whose top-level variables become entities.
    pub fn variables_globset(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.core.parse_variables_from {
            let glob = Glob::new(pattern)
                .map_err(|e| TrellisError::Schema(format!("bad glob {pattern}: {e}")))?;
            builder.add(glob);
        }
        builder
            .build()
            .map_err(|e| TrellisError::Schema(format!("glob set: {e}")))
    }

    /// Load-time validation: every enhancement target must name a core node
    /// kind, and a relationship type may back multiple semantic meanings
    /// only when explicitly shared (`EXPOSES` by HTTP and RPC).
    fn validate(&self) -> Result<()> {
        for schema in &self.frameworks {
            for enhancement in &schema.enhancements {
                if !self.core.has_node_kind(enhancement.target_core_type) {
                    return Err(TrellisError::Schema(format!(
                        "{}/{}: target core type {} not in core schema",
                        schema.name, enhancement.name, enhancement.target_core_type
                    )));
                }
            }
        }

        let mut by_relationship: HashMap<EdgeType, Vec<&'static str>> = HashMap::new();
        for rule in self.edge_rules() {
            let semantics = by_relationship.entry(rule.relationship_type).or_default();
            if !semantics.contains(&rule.semantic_type) {
                semantics.push(rule.semantic_type);
            }
        }
        for (relationship, semantics) in &by_relationship {
            if semantics.len() > 1 && !SHARED_RELATIONSHIPS.contains(&relationship.as_str()) {
                return Err(TrellisError::Schema(format!(
                    "relationship {relationship} reused across semantics {semantics:?} without being declared shared"
                )));
            }
        }
        Ok(())
    }
}

/// Relationship types intentionally shared by several semantic meanings.
const SHARED_RELATIONSHIPS: &[&str] = &["EXPOSES"];
