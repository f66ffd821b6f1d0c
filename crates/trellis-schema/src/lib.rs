//! Trellis Schema — layered declarative schema for TypeScript extraction
//!
//! The core schema says which AST constructs become nodes and edges;
//! framework schemas promote core nodes to semantic types and add semantic
//! edge rules. Everything here is data plus pure evaluation; the parser
//! crate drives it.

pub mod core;
pub mod edges;
pub mod enhance;
pub mod fairsquare;
pub mod nestjs;
pub mod patterns;
pub mod registry;


pub use self::core::{
    AstField, AstGetter, AstRelation, Cardinality, ChildSpec, CoreEdgeKind, CoreNodeKind,
    CoreSchema, DeferredRelationshipSpec, Extraction, PropertyDefinition,
};
pub use edges::{EdgeContextExtractor, EdgePredicate, EdgeRule, RouteEntry, route_entries};
pub use enhance::{ExtractorKind, FrameworkEnhancement, FrameworkSchema};
pub use patterns::{DetectionKind, DetectionPattern, NodePredicate, PatternMatcher, clean_name};
pub use registry::{ProjectType, SchemaRegistry, detect_project_type};
