//! Generation orchestration - single entry point per round
//!
//! The orchestrator parses every catalog entry exactly once, resolves the
//! round's templates, populates the prototype store, applies templates, and
//! runs the enrichment pipeline. A round-completion marker makes the whole
//! step idempotent: the host may re-invoke the generator any number of times
//! within one build and only the first invocation does work.

mod enrich;
pub mod units;

pub use enrich::{
    AccessorEnricher, EnrichContext, EnrichError, Enricher, EnrichmentPipeline,
    MarkerCleanupEnricher,
};

use std::collections::HashSet;

use tracing::{error, info};

use crate::catalog::{CatalogEntry, SourceCatalog};
use crate::config::GeneratorConfig;
use crate::host::SourceProvider;
use crate::parser::ast::{
    Declaration, QualifiedName, SourceUnit, COMPILED_MARKER, PROTOTYPE_MARKER,
};
use crate::parser::parse;
use crate::prototype::{PrototypeDescription, PrototypeProperties, PrototypeStore};
use crate::template::{resolve_templates, TemplateRegistry};

/// Everything one orchestration run produced
pub struct GenerationOutcome {
    pub prototypes: PrototypeStore,
    pub registry: TemplateRegistry,
    /// Templates the resolver gave up on (warnings, not errors)
    pub unresolved_templates: Vec<QualifiedName>,
    /// Per-prototype processing failures, isolated from the rest
    pub failures: Vec<(QualifiedName, String)>,
    /// True when the round-completion marker suppressed all work
    pub skipped: bool,
}

impl GenerationOutcome {
    fn empty() -> Self {
        Self {
            prototypes: PrototypeStore::new(),
            registry: TemplateRegistry::new(),
            unresolved_templates: Vec::new(),
            failures: Vec::new(),
            skipped: false,
        }
    }
}

/// Run the generation pipeline over one round's catalog.
pub fn process_sources(
    catalog: SourceCatalog,
    provider: &dyn SourceProvider,
    pipeline: &EnrichmentPipeline,
    config: &GeneratorConfig,
) -> GenerationOutcome {
    let mut outcome = GenerationOutcome::empty();

    // Idempotency guard: a prior successful round suppresses everything
    let marker = config.marker_path();
    if marker.exists() {
        info!(
            "Round already complete ({}); nothing to generate",
            marker.display()
        );
        outcome.skipped = true;
        return outcome;
    }

    // Parse every catalog entry exactly once; a failure drops that entry only
    let mut parsed: Vec<(CatalogEntry, SourceUnit)> = Vec::new();
    for entry in catalog.into_entries() {
        match parse(&entry.source) {
            Ok(unit) => parsed.push((entry, unit)),
            Err(errors) => {
                let origin = entry
                    .triggers
                    .first()
                    .map(|t| t.origin.clone())
                    .unwrap_or_else(|| "<unknown>".to_string());
                for err in errors {
                    error!(
                        "Parse failure in {}:\n{}",
                        origin,
                        err.format(&entry.source, &origin)
                    );
                }
            }
        }
    }

    // Templates resolve fully before any prototype applying them is built
    let mut seeds = Vec::new();
    for (_, unit) in &parsed {
        for decl in &unit.declarations {
            if decl.node.is_template() {
                seeds.push((unit.qualify(decl.node.name.node.as_str()), unit.clone()));
            }
        }
    }
    let lookup = |name: &QualifiedName| provider.lookup(name);
    let resolution = resolve_templates(
        seeds,
        &mut outcome.registry,
        &lookup,
        config.provisional_passes,
        config.stall_passes,
    );
    outcome.unresolved_templates = resolution.unresolved;

    // Populate the prototype store from the catalog triggers
    for (entry, unit) in &parsed {
        for trigger in &entry.triggers {
            let Some(chain) = locate(unit, &trigger.element) else {
                error!(
                    "Trigger references unknown element {} ({})",
                    trigger.element, trigger.origin
                );
                continue;
            };
            let target = *chain.last().unwrap();
            if !is_generation_target(target, unit, &outcome.registry) {
                continue;
            }
            install_prototype(
                &mut outcome.prototypes,
                unit,
                &chain,
                &outcome.registry,
                &trigger.origin,
            );
        }
    }

    // Enrichment pipeline; a failure poisons one prototype, not the round
    let ctx = EnrichContext {
        registry: &outcome.registry,
    };
    for prototype in outcome.prototypes.iter_mut() {
        match pipeline.run(prototype, &ctx) {
            Ok(()) => prototype.processed = true,
            Err(err) => {
                error!("Failed processing prototype {}: {}", prototype.name, err);
                outcome.failures.push((prototype.name.clone(), err.to_string()));
            }
        }
    }

    info!(
        "Round produced {} prototypes, {} templates applied",
        outcome.prototypes.len(),
        resolution.applied.len()
    );
    outcome
}

/// Find a declaration by simple name, returning the chain of enclosing
/// declarations (outermost first) ending at the target itself.
fn locate<'u>(unit: &'u SourceUnit, element: &str) -> Option<Vec<&'u Declaration>> {
    fn walk<'u>(
        decl: &'u Declaration,
        element: &str,
        chain: &mut Vec<&'u Declaration>,
    ) -> bool {
        chain.push(decl);
        if decl.name.node.as_str() == element {
            return true;
        }
        for nested in decl.nested() {
            if walk(nested, element, chain) {
                return true;
            }
        }
        chain.pop();
        false
    }

    for decl in &unit.declarations {
        let mut chain = Vec::new();
        if walk(&decl.node, element, &mut chain) {
            return Some(chain);
        }
    }
    None
}

/// A declaration is a generation target when it carries `@prototype` or
/// references an applied template. Templates themselves are never targets.
fn is_generation_target(
    declaration: &Declaration,
    unit: &SourceUnit,
    registry: &TemplateRegistry,
) -> bool {
    if declaration.is_template() {
        return false;
    }
    declaration.has_annotation(PROTOTYPE_MARKER)
        || declaration
            .annotations
            .iter()
            .any(|a| registry.contains(&unit.resolve_name(&a.node.name.node)))
}

/// Create the prototype for the end of `chain` on first sight.
fn install_prototype(
    store: &mut PrototypeStore,
    unit: &SourceUnit,
    chain: &[&Declaration],
    registry: &TemplateRegistry,
    origin: &str,
) {
    let target = *chain.last().unwrap();

    let mut segments: Vec<String> = unit
        .package_name()
        .map(|p| p.segments.clone())
        .unwrap_or_default();
    for decl in chain {
        segments.push(decl.name.node.as_str().to_string());
    }
    let name = QualifiedName::new(segments.clone());

    if store.contains(&name) {
        return;
    }
    info!("Processing prototype: {} ({})", name, origin);

    let mut prototype = PrototypeDescription::new(name.clone(), target.clone(), origin);
    prototype.package = unit.package_name().cloned();
    prototype.imports = unit.imports.iter().map(|i| i.node.clone()).collect();

    // Nested prototypes link to their enclosing prototype and are emitted
    // only through their root
    if chain.len() > 1 {
        let enclosing = chain[chain.len() - 2];
        if is_generation_target(enclosing, unit, registry) {
            prototype.parent = Some(QualifiedName::new(segments[..segments.len() - 1].to_vec()));
        }
    }

    apply_templates(&mut prototype, unit, registry);

    if let Some(ann) = prototype.declaration.annotation(COMPILED_MARKER) {
        prototype.compiled = Some(ann.class_arg("form").cloned().unwrap_or_else(|| name.clone()));
    }

    units::build_units(&mut prototype);
    store.insert(prototype);
}

/// Expand every applied template referenced by the prototype's declaration:
/// splice contributed members, layer configuration defaults beneath the
/// declaration's own `@prototype` arguments, and follow template-of-template
/// references transitively.
fn apply_templates(
    prototype: &mut PrototypeDescription,
    unit: &SourceUnit,
    registry: &TemplateRegistry,
) {
    let mut properties = PrototypeProperties::default();
    let mut queue: Vec<QualifiedName> = prototype
        .declaration
        .annotations
        .iter()
        .map(|a| unit.resolve_name(&a.node.name.node))
        .collect();
    let mut seen: HashSet<String> = HashSet::new();

    let mut next = 0;
    while next < queue.len() {
        let name = queue[next].clone();
        next += 1;
        if !seen.insert(name.to_string()) {
            continue;
        }
        let Some(template) = registry.get(&name) else {
            continue;
        };
        info!("Applying template {} to {}", name, prototype.name);
        for member in template.members() {
            // Idempotent: members already present (hand-written or spliced
            // by an earlier application) stay untouched
            if !prototype.declaration.has_member_named(member.node.name()) {
                prototype.declaration.members.push(member.clone());
            }
        }
        if let Some(defaults) = &template.defaults {
            properties.overlay(defaults);
        }
        queue.extend(template.references.iter().cloned());
    }

    // The declaration's own configuration wins over template defaults
    if let Some(own) = prototype.declaration.annotation(PROTOTYPE_MARKER).cloned() {
        properties.overlay(&own);
    }
    prototype.properties = properties;
}
