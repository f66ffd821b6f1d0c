//! Fairsquare framework schema — custom repository/DAL and route-table
//! conventions layered on plain TypeScript.

use trellis_core::{CoreNodeType, EdgeDirection, EdgeType};

use crate::edges::{EdgeContextExtractor, EdgePredicate, EdgeRule};
use crate::enhance::{ExtractorKind, FrameworkEnhancement, FrameworkSchema};
use crate::patterns::{DetectionKind, DetectionPattern, NodePredicate, PatternMatcher};

pub fn schema() -> FrameworkSchema {
    FrameworkSchema {
        name: "fairsquare",
        priority: 5,
        enhancements: vec![
            FrameworkEnhancement {
                name: "repository",
                target_core_type: CoreNodeType::Class,
                semantic_type: "Repository",
                detection_patterns: vec![
                    DetectionPattern::new(
                        DetectionKind::ClassName(PatternMatcher::regex(r"Repository$")),
                        0.9,
                        8,
                    ),
                    DetectionPattern::new(
                        DetectionKind::Filename(PatternMatcher::literal(".repository.ts")),
                        0.8,
                        8,
                    ),
                ],
                context_extractors: vec![ExtractorKind::RepositoryDals],
                additional_relationships: vec![],
                labels: vec!["Repository"],
                primary_label: Some("Repository"),
                priority: 8,
            },
            FrameworkEnhancement {
                name: "data-access-layer",
                target_core_type: CoreNodeType::Class,
                semantic_type: "DataAccessLayer",
                detection_patterns: vec![DetectionPattern::new(
                    DetectionKind::ClassName(PatternMatcher::regex(r"(DAL|Dal)$")),
                    0.9,
                    8,
                )],
                context_extractors: vec![],
                additional_relationships: vec![],
                labels: vec!["DataAccessLayer"],
                primary_label: Some("DataAccessLayer"),
                priority: 8,
            },
            FrameworkEnhancement {
                name: "route-definition",
                target_core_type: CoreNodeType::Variable,
                semantic_type: "RouteDefinition",
                detection_patterns: vec![DetectionPattern::new(
                    DetectionKind::Function(NodePredicate::HasRouteArrayInitializer),
                    0.9,
                    9,
                )],
                context_extractors: vec![ExtractorKind::RouteTable],
                additional_relationships: vec![
                    EdgeRule {
                        name: "route-to-controller",
                        semantic_type: "RouteBinding",
                        relationship_type: EdgeType::RoutesTo,
                        relationship_weight: 1.0,
                        direction: EdgeDirection::Out,
                        predicate: EdgePredicate::RouteToController,
                        context_extractor: Some(EdgeContextExtractor::RouteBinding),
                        grants_target_label: None,
                    },
                    EdgeRule {
                        name: "route-to-handler",
                        semantic_type: "RouteHandlerBinding",
                        relationship_type: EdgeType::RoutesToHandler,
                        relationship_weight: 1.0,
                        direction: EdgeDirection::Out,
                        predicate: EdgePredicate::RouteToHandler,
                        context_extractor: Some(EdgeContextExtractor::RouteBinding),
                        grants_target_label: Some("HttpEndpoint"),
                    },
                ],
                labels: vec!["RouteDefinition"],
                primary_label: Some("RouteDefinition"),
                priority: 9,
            },
            FrameworkEnhancement {
                name: "vendor-controller",
                target_core_type: CoreNodeType::Class,
                semantic_type: "VendorController",
                detection_patterns: vec![DetectionPattern::new(
                    DetectionKind::ClassName(PatternMatcher::regex(r"VendorController$")),
                    0.9,
                    8,
                )],
                context_extractors: vec![],
                additional_relationships: vec![],
                labels: vec!["VendorController"],
                primary_label: Some("VendorController"),
                priority: 8,
            },
            FrameworkEnhancement {
                name: "domain-service",
                target_core_type: CoreNodeType::Class,
                semantic_type: "DomainService",
                detection_patterns: vec![DetectionPattern::new(
                    DetectionKind::Filename(PatternMatcher::literal(".service.ts")),
                    0.7,
                    5,
                )],
                context_extractors: vec![],
                additional_relationships: vec![],
                labels: vec!["DomainService"],
                primary_label: Some("Service"),
                priority: 5,
            },
        ],
        edge_rules: vec![
            EdgeRule {
                name: "uses-dal",
                semantic_type: "DalUsage",
                relationship_type: EdgeType::UsesDal,
                relationship_weight: 0.9,
                direction: EdgeDirection::Out,
                predicate: EdgePredicate::DalUsage,
                context_extractor: None,
                grants_target_label: None,
            },
            EdgeRule {
                name: "internal-api-call",
                semantic_type: "VendorApiCall",
                relationship_type: EdgeType::InternalApiCall,
                relationship_weight: 0.7,
                direction: EdgeDirection::Out,
                predicate: EdgePredicate::VendorClientCall,
                context_extractor: None,
                grants_target_label: None,
            },
        ],
    }
}
