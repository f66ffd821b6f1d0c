//! Core (framework-agnostic) schema for TypeScript sources
//!
//! Pure data: which AST constructs become nodes, how children are
//! enumerated, which structural edges connect them, which properties are
//! lifted off the AST, and which relationships are deferred to name-based
//! resolution after traversal.

use trellis_core::{CoreNodeType, EdgeDirection, EdgeType};

/// Named child-enumeration getters on the AST adapter. The traversal
/// dispatches on these instead of the schema holding function pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstGetter {
    Classes,
    Interfaces,
    Enums,
    Functions,
    Methods,
    Properties,
    Parameters,
    Decorators,
    Imports,
    Exports,
    VariableStatements,
}

/// Scalar fields lifted off the AST into node properties during traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstField {
    IsExported,
    IsDefaultExport,
    IsAbstract,
    IsAsync,
    IsStatic,
    IsReadonly,
    IsOptional,
    IsRest,
    IsTypeOnly,
    Visibility,
    ReturnType,
    TypeName,
    ModuleSpecifier,
}

impl AstField {
    /// Property key this field is stored under.
    pub fn key(&self) -> &'static str {
        match self {
            AstField::IsExported => "isExported",
            AstField::IsDefaultExport => "isDefaultExport",
            AstField::IsAbstract => "isAbstract",
            AstField::IsAsync => "isAsync",
            AstField::IsStatic => "isStatic",
            AstField::IsReadonly => "isReadonly",
            AstField::IsOptional => "isOptional",
            AstField::IsRest => "isRest",
            AstField::IsTypeOnly => "isTypeOnly",
            AstField::Visibility => "visibility",
            AstField::ReturnType => "returnType",
            AstField::TypeName => "typeName",
            AstField::ModuleSpecifier => "moduleSpecifier",
        }
    }
}

/// How a schema-declared property is obtained.
#[derive(Debug, Clone)]
pub enum Extraction {
    /// A constant value.
    Static(serde_json::Value),
    /// Read from the live AST node during traversal.
    Ast(AstField),
}

#[derive(Debug, Clone)]
pub struct PropertyDefinition {
    pub name: &'static str,
    pub extraction: Extraction,
}

/// One child kind of a node kind: how to enumerate it and which structural
/// edge connects parent to child.
#[derive(Debug, Clone, Copy)]
pub struct ChildSpec {
    pub child_type: CoreNodeType,
    pub getter: AstGetter,
    pub edge_type: EdgeType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Single,
    Multi,
}

/// AST-side relations resolved by name after all nodes exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstRelation {
    /// `extends` clause of a class (single base).
    BaseClass,
    /// `implements` clause of a class, or `extends` of an interface.
    Implements,
    /// The type annotation of a property or parameter.
    TypeAnnotation,
}

/// A deferred structural edge: the target is known only by name at traversal
/// time. `target_types` are tried in declaration order; the first kind with
/// a name match wins.
#[derive(Debug, Clone)]
pub struct DeferredRelationshipSpec {
    pub edge_type: EdgeType,
    pub relation: AstRelation,
    pub cardinality: Cardinality,
    pub target_types: &'static [CoreNodeType],
}

#[derive(Debug, Clone)]
pub struct CoreNodeKind {
    pub core_type: CoreNodeType,
    pub properties: Vec<PropertyDefinition>,
    pub children: Vec<ChildSpec>,
    pub relationships: Vec<DeferredRelationshipSpec>,
    pub primary_label: &'static str,
    pub labels: &'static [&'static str],
    /// Members of the skeletonize set have their body collapsed to a
    /// one-line placeholder inside the parent's cached source.
    pub skeletonize: bool,
}

#[derive(Debug, Clone)]
pub struct CoreEdgeKind {
    pub edge_type: EdgeType,
    pub source_types: &'static [CoreNodeType],
    pub target_types: &'static [CoreNodeType],
    pub direction: EdgeDirection,
    pub relationship_weight: f64,
}

#[derive(Debug, Clone)]
pub struct CoreSchema {
    pub name: &'static str,
    pub node_kinds: Vec<CoreNodeKind>,
    pub edge_kinds: Vec<CoreEdgeKind>,
    /// Globs naming files whose top-level variable declarations are
    /// entity-worthy (route tables and the like).
    pub parse_variables_from: Vec<&'static str>,
}

impl CoreSchema {
    pub fn node_kind(&self, core_type: CoreNodeType) -> Option<&CoreNodeKind> {
        self.node_kinds.iter().find(|k| k.core_type == core_type)
    }

    pub fn edge_kind(&self, edge_type: EdgeType) -> Option<&CoreEdgeKind> {
        self.edge_kinds.iter().find(|k| k.edge_type == edge_type)
    }

    pub fn has_node_kind(&self, core_type: CoreNodeType) -> bool {
        self.node_kind(core_type).is_some()
    }

    /// The TypeScript core schema.
    pub fn typescript() -> Self {
        use CoreNodeType::*;
        use trellis_core::EdgeType as E;

        let node_kinds = vec![
            CoreNodeKind {
                core_type: SourceFile,
                properties: vec![PropertyDefinition {
                    name: "language",
                    extraction: Extraction::Static(serde_json::json!("typescript")),
                }],
                children: vec![
                    child(Import, AstGetter::Imports, E::Imports),
                    child(Export, AstGetter::Exports, E::Exports),
                    child(Class, AstGetter::Classes, E::Contains),
                    child(Interface, AstGetter::Interfaces, E::Contains),
                    child(Enum, AstGetter::Enums, E::Contains),
                    child(Function, AstGetter::Functions, E::Contains),
                    // Only materialized in files matching parse_variables_from.
                    child(Variable, AstGetter::VariableStatements, E::Contains),
                ],
                relationships: vec![],
                primary_label: "SourceFile",
                labels: &[],
                skeletonize: false,
            },
            CoreNodeKind {
                core_type: Class,
                properties: vec![
                    prop("isExported", AstField::IsExported),
                    prop("isDefaultExport", AstField::IsDefaultExport),
                    prop("isAbstract", AstField::IsAbstract),
                ],
                children: vec![
                    child(Decorator, AstGetter::Decorators, E::DecoratedWith),
                    child(Method, AstGetter::Methods, E::HasMember),
                    child(Property, AstGetter::Properties, E::HasMember),
                ],
                relationships: vec![
                    DeferredRelationshipSpec {
                        edge_type: E::Extends,
                        relation: AstRelation::BaseClass,
                        cardinality: Cardinality::Single,
                        target_types: &[Class],
                    },
                    DeferredRelationshipSpec {
                        edge_type: E::Implements,
                        relation: AstRelation::Implements,
                        cardinality: Cardinality::Multi,
                        target_types: &[Interface],
                    },
                ],
                primary_label: "Class",
                labels: &[],
                skeletonize: false,
            },
            CoreNodeKind {
                core_type: Interface,
                properties: vec![prop("isExported", AstField::IsExported)],
                children: vec![
                    child(Method, AstGetter::Methods, E::HasMember),
                    child(Property, AstGetter::Properties, E::HasMember),
                ],
                relationships: vec![DeferredRelationshipSpec {
                    edge_type: E::Extends,
                    relation: AstRelation::Implements,
                    cardinality: Cardinality::Multi,
                    target_types: &[Interface],
                }],
                primary_label: "Interface",
                labels: &[],
                skeletonize: false,
            },
            CoreNodeKind {
                core_type: Enum,
                properties: vec![prop("isExported", AstField::IsExported)],
                children: vec![],
                relationships: vec![],
                primary_label: "Enum",
                labels: &[],
                skeletonize: false,
            },
            CoreNodeKind {
                core_type: Function,
                properties: vec![
                    prop("isExported", AstField::IsExported),
                    prop("isAsync", AstField::IsAsync),
                ],
                children: vec![child(Parameter, AstGetter::Parameters, E::HasParameter)],
                relationships: vec![],
                primary_label: "Function",
                labels: &[],
                skeletonize: true,
            },
            CoreNodeKind {
                core_type: Method,
                properties: vec![
                    prop("isAsync", AstField::IsAsync),
                    prop("isStatic", AstField::IsStatic),
                    prop("visibility", AstField::Visibility),
                    prop("returnType", AstField::ReturnType),
                ],
                children: vec![
                    child(Decorator, AstGetter::Decorators, E::DecoratedWith),
                    child(Parameter, AstGetter::Parameters, E::HasParameter),
                ],
                relationships: vec![],
                primary_label: "Method",
                labels: &[],
                skeletonize: true,
            },
            CoreNodeKind {
                core_type: Property,
                properties: vec![
                    prop("isReadonly", AstField::IsReadonly),
                    prop("isOptional", AstField::IsOptional),
                    prop("typeName", AstField::TypeName),
                ],
                children: vec![child(Decorator, AstGetter::Decorators, E::DecoratedWith)],
                relationships: vec![DeferredRelationshipSpec {
                    edge_type: E::TypedAs,
                    relation: AstRelation::TypeAnnotation,
                    cardinality: Cardinality::Single,
                    target_types: &[Class, Interface],
                }],
                primary_label: "Property",
                labels: &[],
                skeletonize: true,
            },
            CoreNodeKind {
                core_type: Parameter,
                properties: vec![
                    prop("isOptional", AstField::IsOptional),
                    prop("isRest", AstField::IsRest),
                    prop("typeName", AstField::TypeName),
                ],
                children: vec![child(Decorator, AstGetter::Decorators, E::DecoratedWith)],
                relationships: vec![DeferredRelationshipSpec {
                    edge_type: E::TypedAs,
                    relation: AstRelation::TypeAnnotation,
                    cardinality: Cardinality::Single,
                    target_types: &[Class, Interface],
                }],
                primary_label: "Parameter",
                labels: &[],
                skeletonize: false,
            },
            CoreNodeKind {
                core_type: Decorator,
                properties: vec![],
                children: vec![],
                relationships: vec![],
                primary_label: "Decorator",
                labels: &[],
                skeletonize: false,
            },
            CoreNodeKind {
                core_type: Import,
                properties: vec![
                    prop("moduleSpecifier", AstField::ModuleSpecifier),
                    prop("isTypeOnly", AstField::IsTypeOnly),
                ],
                children: vec![],
                relationships: vec![],
                primary_label: "Import",
                labels: &[],
                skeletonize: false,
            },
            CoreNodeKind {
                core_type: Export,
                properties: vec![],
                children: vec![],
                relationships: vec![],
                primary_label: "Export",
                labels: &[],
                skeletonize: false,
            },
            CoreNodeKind {
                core_type: Variable,
                properties: vec![
                    prop("isExported", AstField::IsExported),
                    prop("typeName", AstField::TypeName),
                ],
                children: vec![],
                relationships: vec![],
                primary_label: "Variable",
                labels: &[],
                skeletonize: false,
            },
        ];

        let edge_kinds = vec![
            edge(E::Contains, &[SourceFile], ANY_DECLARATION, 1.0),
            edge(E::Imports, &[SourceFile], &[Import], 1.0),
            edge(E::Exports, &[SourceFile], &[Export], 1.0),
            edge(E::HasMember, &[Class, Interface], &[Method, Property], 1.0),
            edge(E::HasParameter, &[Method, Function], &[Parameter], 1.0),
            edge(
                E::DecoratedWith,
                &[Class, Method, Property, Parameter],
                &[Decorator],
                1.0,
            ),
            edge(E::Extends, &[Class, Interface], &[Class, Interface], 1.0),
            edge(E::Implements, &[Class], &[Interface], 1.0),
            edge(E::TypedAs, &[Property, Parameter], &[Class, Interface], 0.8),
        ];

        CoreSchema {
            name: "typescript",
            node_kinds,
            edge_kinds,
            parse_variables_from: vec!["**/*.routes.ts", "**/*.config.ts"],
        }
    }
}

const ANY_DECLARATION: &[CoreNodeType] = &[
    CoreNodeType::Class,
    CoreNodeType::Interface,
    CoreNodeType::Enum,
    CoreNodeType::Function,
    CoreNodeType::Variable,
];

fn child(child_type: CoreNodeType, getter: AstGetter, edge_type: EdgeType) -> ChildSpec {
    ChildSpec {
        child_type,
        getter,
        edge_type,
    }
}

fn prop(name: &'static str, field: AstField) -> PropertyDefinition {
    PropertyDefinition {
        name,
        extraction: Extraction::Ast(field),
    }
}

fn edge(
    edge_type: EdgeType,
    source_types: &'static [CoreNodeType],
    target_types: &'static [CoreNodeType],
    relationship_weight: f64,
) -> CoreEdgeKind {
    CoreEdgeKind {
        edge_type,
        source_types,
        target_types,
        direction: EdgeDirection::Out,
        relationship_weight,
    }
}
