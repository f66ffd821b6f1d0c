//! NestJS framework schema

use trellis_core::{CoreNodeType, EdgeDirection, EdgeType};

use crate::edges::{EdgeContextExtractor, EdgePredicate, EdgeRule};
use crate::enhance::{ExtractorKind, FrameworkEnhancement, FrameworkSchema};
use crate::patterns::{DetectionKind, DetectionPattern, NodePredicate, PatternMatcher};

pub fn schema() -> FrameworkSchema {
    FrameworkSchema {
        name: "nestjs",
        priority: 10,
        enhancements: vec![
            FrameworkEnhancement {
                name: "nest-controller",
                target_core_type: CoreNodeType::Class,
                semantic_type: "NestController",
                detection_patterns: vec![DetectionPattern::new(
                    DetectionKind::Decorator("Controller".into()),
                    1.0,
                    10,
                )],
                context_extractors: vec![ExtractorKind::ControllerMeta],
                additional_relationships: vec![],
                labels: vec!["NestController"],
                primary_label: Some("Controller"),
                priority: 10,
            },
            FrameworkEnhancement {
                name: "nest-service",
                target_core_type: CoreNodeType::Class,
                semantic_type: "NestService",
                detection_patterns: vec![DetectionPattern::new(
                    DetectionKind::Decorator("Injectable".into()),
                    1.0,
                    9,
                )],
                context_extractors: vec![ExtractorKind::ProviderToken],
                additional_relationships: vec![],
                labels: vec!["NestService"],
                primary_label: Some("Service"),
                priority: 9,
            },
            FrameworkEnhancement {
                name: "nest-module",
                target_core_type: CoreNodeType::Class,
                semantic_type: "NestModule",
                detection_patterns: vec![DetectionPattern::new(
                    DetectionKind::Decorator("Module".into()),
                    1.0,
                    9,
                )],
                context_extractors: vec![],
                additional_relationships: vec![],
                labels: vec!["NestModule"],
                primary_label: Some("Module"),
                priority: 9,
            },
            FrameworkEnhancement {
                name: "http-endpoint",
                target_core_type: CoreNodeType::Method,
                semantic_type: "HttpEndpoint",
                detection_patterns: ["Get", "Post", "Put", "Delete", "Patch"]
                    .into_iter()
                    .map(|verb| {
                        DetectionPattern::new(DetectionKind::Decorator(verb.into()), 1.0, 10)
                    })
                    .collect(),
                context_extractors: vec![ExtractorKind::EndpointMeta],
                additional_relationships: vec![],
                labels: vec!["HttpEndpoint"],
                primary_label: Some("HttpEndpoint"),
                priority: 10,
            },
            FrameworkEnhancement {
                name: "message-handler",
                target_core_type: CoreNodeType::Method,
                semantic_type: "MessageHandler",
                detection_patterns: vec![
                    DetectionPattern::new(
                        DetectionKind::Decorator("MessagePattern".into()),
                        1.0,
                        9,
                    ),
                    DetectionPattern::new(
                        DetectionKind::Decorator("EventPattern".into()),
                        1.0,
                        9,
                    ),
                ],
                context_extractors: vec![ExtractorKind::MessageHandlerMeta],
                additional_relationships: vec![],
                labels: vec!["MessageHandler"],
                primary_label: Some("MessageHandler"),
                priority: 9,
            },
            FrameworkEnhancement {
                name: "permission-manager",
                target_core_type: CoreNodeType::Class,
                semantic_type: "PermissionManager",
                detection_patterns: vec![
                    DetectionPattern::new(
                        DetectionKind::ClassName(PatternMatcher::regex(r"Guard$")),
                        0.9,
                        8,
                    ),
                    DetectionPattern::new(
                        DetectionKind::Function(NodePredicate::ImplementsInterface(
                            "CanActivate".into(),
                        )),
                        1.0,
                        8,
                    ),
                ],
                context_extractors: vec![],
                additional_relationships: vec![],
                labels: vec!["PermissionManager"],
                primary_label: Some("PermissionManager"),
                priority: 8,
            },
        ],
        edge_rules: vec![
            EdgeRule {
                name: "constructor-injection",
                semantic_type: "DependencyInjection",
                relationship_type: EdgeType::Injects,
                relationship_weight: 0.9,
                direction: EdgeDirection::Out,
                predicate: EdgePredicate::ConstructorInjection,
                context_extractor: Some(EdgeContextExtractor::Injection),
                grants_target_label: None,
            },
            EdgeRule {
                name: "http-exposure",
                semantic_type: "HttpExposure",
                relationship_type: EdgeType::Exposes,
                relationship_weight: 1.0,
                direction: EdgeDirection::Out,
                predicate: EdgePredicate::HttpExposure,
                context_extractor: Some(EdgeContextExtractor::HttpExposureMeta),
                grants_target_label: None,
            },
            EdgeRule {
                name: "rpc-exposure",
                semantic_type: "RpcExposure",
                relationship_type: EdgeType::Exposes,
                relationship_weight: 1.0,
                direction: EdgeDirection::Out,
                predicate: EdgePredicate::RpcExposure,
                context_extractor: Some(EdgeContextExtractor::RpcExposureMeta),
                grants_target_label: None,
            },
            EdgeRule {
                name: "permission-guard",
                semantic_type: "PermissionGuard",
                relationship_type: EdgeType::ProtectedBy,
                relationship_weight: 0.8,
                direction: EdgeDirection::Out,
                predicate: EdgePredicate::PermissionGuard,
                context_extractor: None,
                grants_target_label: None,
            },
        ],
    }
}
