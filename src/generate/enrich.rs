//! Enrichment pipeline - ordered plugins mutating generated units
//!
//! Enrichers run after unit building, in ascending priority order with ties
//! broken by registration order. Each must be idempotent against mutations
//! it recognizes: running the pipeline twice over the same prototype leaves
//! it unchanged.

use thiserror::Error;
use tracing::debug;

use crate::parser::ast::{
    is_builtin_marker, Declaration, FnDecl, Identifier, Member, Param, SourceUnit, Spanned,
    TypeRef,
};
use crate::prototype::PrototypeDescription;
use crate::template::TemplateRegistry;

/// Error raised by an enricher for a single prototype; isolated by the
/// orchestrator, never fatal to the round.
#[derive(Debug, Error)]
#[error("enricher {enricher} failed: {message}")]
pub struct EnrichError {
    pub enricher: String,
    pub message: String,
}

impl EnrichError {
    pub fn new(enricher: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            enricher: enricher.into(),
            message: message.into(),
        }
    }
}

/// Round state an enricher may consult
pub struct EnrichContext<'a> {
    pub registry: &'a TemplateRegistry,
}

/// A single enrichment plugin
pub trait Enricher {
    fn name(&self) -> &'static str;

    /// Pipeline position; lower runs earlier, ties keep registration order
    fn priority(&self) -> i32 {
        0
    }

    fn enrich(
        &self,
        prototype: &mut PrototypeDescription,
        ctx: &EnrichContext,
    ) -> Result<(), EnrichError>;
}

/// Ordered list of enrichers applied to every prototype
pub struct EnrichmentPipeline {
    enrichers: Vec<Box<dyn Enricher>>,
}

impl EnrichmentPipeline {
    /// Empty pipeline
    pub fn empty() -> Self {
        Self {
            enrichers: Vec::new(),
        }
    }

    /// Pipeline with the built-in enrichers registered
    pub fn standard() -> Self {
        let mut pipeline = Self::empty();
        pipeline.register(Box::new(AccessorEnricher));
        pipeline.register(Box::new(MarkerCleanupEnricher));
        pipeline
    }

    /// Register an enricher; it runs at its priority slot, after earlier
    /// registrations of the same priority.
    pub fn register(&mut self, enricher: Box<dyn Enricher>) {
        self.enrichers.push(enricher);
        // Stable sort keeps registration order within a priority
        self.enrichers.sort_by_key(|e| e.priority());
    }

    pub fn len(&self) -> usize {
        self.enrichers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enrichers.is_empty()
    }

    /// Run every enricher over one prototype; the first failure aborts that
    /// prototype only.
    pub fn run(
        &self,
        prototype: &mut PrototypeDescription,
        ctx: &EnrichContext,
    ) -> Result<(), EnrichError> {
        for enricher in &self.enrichers {
            debug!("Enriching {} with {}", prototype.name, enricher.name());
            enricher.enrich(prototype, ctx)?;
        }
        Ok(())
    }
}

impl Default for EnrichmentPipeline {
    fn default() -> Self {
        Self::standard()
    }
}

/// Synthetic span for generated nodes
fn span() -> std::ops::Range<usize> {
    0..0
}

/// Adds accessor signatures for every field: `get_x()` on the contract and
/// the implementation, `set_x(value)` alongside.
pub struct AccessorEnricher;

impl AccessorEnricher {
    fn accessors_for(declaration: &Declaration) -> Vec<FnDecl> {
        let mut accessors = Vec::new();
        for field in declaration.fields() {
            let field_name = field.name.node.as_str();
            accessors.push(FnDecl {
                annotations: vec![],
                name: Spanned::new(Identifier::new(format!("get_{}", field_name)), span()),
                params: vec![],
                ret: Some(field.ty.clone()),
            });
            accessors.push(FnDecl {
                annotations: vec![],
                name: Spanned::new(Identifier::new(format!("set_{}", field_name)), span()),
                params: vec![Spanned::new(
                    Param {
                        name: Spanned::new(Identifier::new("value"), span()),
                        ty: field.ty.clone(),
                    },
                    span(),
                )],
                ret: None,
            });
        }
        accessors
    }

    fn insert_accessors(target: &mut Declaration, accessors: &[FnDecl]) {
        for accessor in accessors {
            // Idempotent: a member with the same name means it was already
            // added (or hand-written)
            if !target.has_member_named(accessor.name.node.as_str()) {
                target
                    .members
                    .push(Spanned::new(Member::Function(accessor.clone()), span()));
            }
        }
    }
}

impl Enricher for AccessorEnricher {
    fn name(&self) -> &'static str {
        "accessors"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn enrich(
        &self,
        prototype: &mut PrototypeDescription,
        _ctx: &EnrichContext,
    ) -> Result<(), EnrichError> {
        let accessors = Self::accessors_for(&prototype.declaration);
        if let Some(unit) = prototype.interface.as_mut() {
            if let Some(decl) = unit.declarations.first_mut() {
                Self::insert_accessors(&mut decl.node, &accessors);
            }
        }
        if let Some(unit) = prototype.implementation.as_mut() {
            if let Some(decl) = unit.declarations.first_mut() {
                Self::insert_accessors(&mut decl.node, &accessors);
            }
        }
        Ok(())
    }
}

/// Strips generation markers (`@prototype`, `@template`, `@compiled`, and
/// applied template annotations) from generated units so emitted code does
/// not retrigger the generator.
pub struct MarkerCleanupEnricher;

impl MarkerCleanupEnricher {
    fn cleanup_unit(unit: &mut SourceUnit, registry: &TemplateRegistry) {
        let resolver = unit.clone();
        for decl in unit.declarations.iter_mut() {
            Self::cleanup_declaration(&mut decl.node, &resolver, registry);
        }
    }

    fn cleanup_declaration(
        declaration: &mut Declaration,
        resolver: &SourceUnit,
        registry: &TemplateRegistry,
    ) {
        declaration.annotations.retain(|a| {
            let simple = a.node.simple_name();
            if is_builtin_marker(simple) {
                return false;
            }
            !registry.contains(&resolver.resolve_name(&a.node.name.node))
        });
        for member in declaration.members.iter_mut() {
            if let Member::Nested(nested) = &mut member.node {
                Self::cleanup_declaration(nested, resolver, registry);
            }
        }
    }
}

impl Enricher for MarkerCleanupEnricher {
    fn name(&self) -> &'static str {
        "marker-cleanup"
    }

    fn priority(&self) -> i32 {
        100
    }

    fn enrich(
        &self,
        prototype: &mut PrototypeDescription,
        ctx: &EnrichContext,
    ) -> Result<(), EnrichError> {
        if let Some(unit) = prototype.interface.as_mut() {
            Self::cleanup_unit(unit, ctx.registry);
        }
        if let Some(unit) = prototype.implementation.as_mut() {
            Self::cleanup_unit(unit, ctx.registry);
        }
        for (_, unit) in prototype.custom_units.iter_mut() {
            Self::cleanup_unit(unit, ctx.registry);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::units::build_units;
    use crate::parser::parse;

    fn prototype(source: &str) -> PrototypeDescription {
        let unit = parse(source).expect("Should parse");
        let decl = unit.declarations[0].node.clone();
        let name = unit.qualify(decl.name.node.as_str());
        let mut proto = PrototypeDescription::new(name, decl, "test.pf");
        proto.package = unit.package_name().cloned();
        proto.imports = unit.imports.iter().map(|i| i.node.clone()).collect();
        build_units(&mut proto);
        proto
    }

    #[test]
    fn test_accessors_added_to_both_units() {
        let mut proto = prototype(
            "package demo\n@prototype\nrecord User { field name: string }",
        );
        let registry = TemplateRegistry::new();
        let ctx = EnrichContext {
            registry: &registry,
        };
        AccessorEnricher.enrich(&mut proto, &ctx).unwrap();

        let contract = &proto.interface.as_ref().unwrap().declarations[0].node;
        assert!(contract.has_member_named("get_name"));
        assert!(contract.has_member_named("set_name"));

        let implementation = &proto.implementation.as_ref().unwrap().declarations[0].node;
        assert!(implementation.has_member_named("get_name"));
        assert!(implementation.has_member_named("set_name"));
    }

    #[test]
    fn test_accessor_enricher_is_idempotent() {
        let mut proto = prototype(
            "package demo\n@prototype\nrecord User { field name: string }",
        );
        let registry = TemplateRegistry::new();
        let ctx = EnrichContext {
            registry: &registry,
        };
        AccessorEnricher.enrich(&mut proto, &ctx).unwrap();
        let after_first = proto.interface.as_ref().unwrap().declarations[0]
            .node
            .members
            .len();
        AccessorEnricher.enrich(&mut proto, &ctx).unwrap();
        let after_second = proto.interface.as_ref().unwrap().declarations[0]
            .node
            .members
            .len();
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn test_marker_cleanup_strips_generation_annotations() {
        let mut proto = prototype(
            "package demo\n@prototype(interface: true)\nrecord User { field name: string }",
        );
        let registry = TemplateRegistry::new();
        let ctx = EnrichContext {
            registry: &registry,
        };
        MarkerCleanupEnricher.enrich(&mut proto, &ctx).unwrap();

        let contract = &proto.interface.as_ref().unwrap().declarations[0].node;
        assert!(contract.annotations.is_empty());
        // The source declaration itself keeps its markers
        assert!(proto.declaration.has_annotation("prototype"));
    }

    #[test]
    fn test_pipeline_priority_order() {
        struct Recorder {
            name: &'static str,
            priority: i32,
        }
        impl Enricher for Recorder {
            fn name(&self) -> &'static str {
                self.name
            }
            fn priority(&self) -> i32 {
                self.priority
            }
            fn enrich(
                &self,
                prototype: &mut PrototypeDescription,
                _ctx: &EnrichContext,
            ) -> Result<(), EnrichError> {
                prototype.origin.push_str(self.name);
                Ok(())
            }
        }

        let mut pipeline = EnrichmentPipeline::empty();
        pipeline.register(Box::new(Recorder {
            name: "b",
            priority: 20,
        }));
        pipeline.register(Box::new(Recorder {
            name: "a",
            priority: 10,
        }));
        // Same priority as "a": registration order breaks the tie
        pipeline.register(Box::new(Recorder {
            name: "c",
            priority: 10,
        }));

        let mut proto = prototype("package demo\n@prototype\nrecord User {}");
        proto.origin.clear();
        let registry = TemplateRegistry::new();
        let ctx = EnrichContext {
            registry: &registry,
        };
        pipeline.run(&mut proto, &ctx).unwrap();
        assert_eq!(proto.origin, "acb");
    }

    #[test]
    fn test_pipeline_failure_stops_that_prototype() {
        struct Failing;
        impl Enricher for Failing {
            fn name(&self) -> &'static str {
                "failing"
            }
            fn enrich(
                &self,
                _prototype: &mut PrototypeDescription,
                _ctx: &EnrichContext,
            ) -> Result<(), EnrichError> {
                Err(EnrichError::new("failing", "boom"))
            }
        }

        let mut pipeline = EnrichmentPipeline::empty();
        pipeline.register(Box::new(Failing));

        let mut proto = prototype("package demo\n@prototype\nrecord User {}");
        let registry = TemplateRegistry::new();
        let ctx = EnrichContext {
            registry: &registry,
        };
        let result = pipeline.run(&mut proto, &ctx);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("boom"));
    }

    #[test]
    fn test_standard_pipeline_composition() {
        let pipeline = EnrichmentPipeline::standard();
        assert_eq!(pipeline.len(), 2);
    }
}
