//! Template resolution - iterative fixpoint over template references
//!
//! Templates may reference each other before either is fully known: the host
//! can present files in any order, and a referenced template may not be in
//! the current batch at all. Rather than building a dependency graph up
//! front (impossible, since dependencies surface lazily through external
//! lookup), resolution sweeps a worklist repeatedly:
//!
//! - an entry whose references are all satisfied is applied and removed;
//! - a reference to a pending entry blocks in early passes, so forward
//!   declarations get a chance to register before strict order is demanded;
//! - once sweeps stall past the provisional cap, pending references are
//!   force-resolved to break the stall;
//! - references that resolve to nothing after external lookup are ordinary
//!   annotations and never block.
//!
//! The sweep stops when the worklist drains or when consecutive no-progress
//! passes hit the stall cap; leftovers are reported as warnings and the
//! round proceeds without them.

use tracing::{debug, error, info, warn};

use crate::parser::ast::{QualifiedName, SourceUnit};
use crate::parser::parse;

use super::registry::{template_references, TemplateDefinition, TemplateRegistry};

/// External lookup function: fully-qualified name to source text
pub type ExternalLookup<'a> = &'a dyn Fn(&QualifiedName) -> Option<String>;

/// What a resolution run produced
#[derive(Debug, Default)]
pub struct ResolutionOutcome {
    /// Templates applied, in application order
    pub applied: Vec<QualifiedName>,
    /// Templates still pending when the sweep gave up
    pub unresolved: Vec<QualifiedName>,
}

/// One pending template: its parsed unit and resolution state
struct WorkEntry {
    name: QualifiedName,
    unit: SourceUnit,
    references: Vec<QualifiedName>,
    resolved: bool,
}

/// Resolve a batch of template units against the registry.
///
/// `seeds` are the templates supplied directly by the current round; they
/// start resolved. Externally discovered dependencies enter unresolved and
/// earn their flag once their own references are satisfied. Every applied
/// template lands in the registry, ready for prototype expansion.
pub fn resolve_templates(
    seeds: Vec<(QualifiedName, SourceUnit)>,
    registry: &mut TemplateRegistry,
    lookup: ExternalLookup,
    provisional_passes: u32,
    stall_passes: u32,
) -> ResolutionOutcome {
    let mut outcome = ResolutionOutcome::default();
    let mut worklist: Vec<WorkEntry> = Vec::new();

    for (name, unit) in seeds {
        match TemplateDefinition::from_unit(&name, &unit) {
            Ok(def) => worklist.push(WorkEntry {
                references: def.references.clone(),
                name,
                unit,
                resolved: true,
            }),
            Err(err) => error!("Dropping template {}: {}", name, err),
        }
    }

    // Names that already failed lookup or parsing; never retried
    let mut missing: Vec<QualifiedName> = Vec::new();

    let mut stalled = 0u32;
    let mut pass = 0u32;
    while !worklist.is_empty() {
        pass += 1;
        let mut progressed = false;
        let mut restarted = false;

        'sweep: for idx in 0..worklist.len() {
            let references = worklist[idx].references.clone();
            let mut blocked = false;

            for reference in &references {
                // Already applied templates satisfy their dependents
                if registry.contains(reference) {
                    continue;
                }
                if let Some(pos) = worklist.iter().position(|e| &e.name == reference) {
                    if worklist[pos].resolved {
                        if stalled < provisional_passes {
                            // Wait for the referenced template to be applied
                            blocked = true;
                        }
                        // Past the provisional cap a pending-but-resolved
                        // reference no longer blocks; the stall must break.
                    } else if stalled >= provisional_passes {
                        debug!(
                            "Force-resolving stalled template {} (pass {})",
                            worklist[pos].name, pass
                        );
                        worklist[pos].resolved = true;
                        restarted = true;
                        break 'sweep;
                    } else {
                        blocked = true;
                    }
                } else if !missing.contains(reference) {
                    match lookup(reference) {
                        Some(source) => match parse(&source) {
                            Ok(unit) => match TemplateDefinition::from_unit(reference, &unit) {
                                Ok(def) => {
                                    info!("Discovered external template: {}", reference);
                                    worklist.push(WorkEntry {
                                        references: def.references.clone(),
                                        name: reference.clone(),
                                        unit,
                                        resolved: false,
                                    });
                                    progressed = true;
                                    break 'sweep;
                                }
                                Err(err) => {
                                    error!("Ignoring external source for {}: {}", reference, err);
                                    missing.push(reference.clone());
                                }
                            },
                            Err(errors) => {
                                error!(
                                    "Failed to parse external template {}: {}",
                                    reference,
                                    errors
                                        .iter()
                                        .map(|e| e.to_string())
                                        .collect::<Vec<_>>()
                                        .join("; ")
                                );
                                missing.push(reference.clone());
                            }
                        },
                        // Not a template at all; an ordinary annotation
                        None => missing.push(reference.clone()),
                    }
                }
            }

            if blocked {
                // A template-of-a-template that cannot expand yet
                worklist[idx].resolved = false;
            } else {
                let mut entry = worklist.remove(idx);
                entry.resolved = true;
                match TemplateDefinition::from_unit(&entry.name, &entry.unit) {
                    Ok(def) => {
                        info!("Processing template: {}", entry.name);
                        registry.register(def);
                        outcome.applied.push(entry.name);
                    }
                    Err(err) => error!("Dropping template {}: {}", entry.name, err),
                }
                progressed = true;
                break 'sweep;
            }
        }

        if progressed {
            stalled = 0;
            continue;
        }
        if restarted {
            // A force-resolve changed state without shrinking the worklist;
            // keep the stall count so the breaker stays armed.
            continue;
        }
        stalled += 1;
        if stalled >= stall_passes {
            break;
        }
    }

    for entry in worklist {
        warn!("Possible template not processed: {}", entry.name);
        outcome.unresolved.push(entry.name);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(name: &str, source: &str) -> (QualifiedName, SourceUnit) {
        (
            QualifiedName::from_dotted(name),
            parse(source).expect("Should parse"),
        )
    }

    fn no_lookup(_: &QualifiedName) -> Option<String> {
        None
    }

    #[test]
    fn test_single_template_applies() {
        let mut registry = TemplateRegistry::new();
        let outcome = resolve_templates(
            vec![seed(
                "demo.audited",
                "package demo\n@template\nmarker audited { field at: long }",
            )],
            &mut registry,
            &no_lookup,
            2,
            3,
        );
        assert_eq!(outcome.applied.len(), 1);
        assert!(outcome.unresolved.is_empty());
        assert!(registry.contains(&QualifiedName::from_dotted("demo.audited")));
    }

    #[test]
    fn test_chain_applies_dependencies_first() {
        // a references b, b references c; insertion order is a, b, c
        let seeds = vec![
            seed(
                "demo.a",
                "package demo\n@template\n@b\nmarker a { field fa: int }",
            ),
            seed(
                "demo.b",
                "package demo\n@template\n@c\nmarker b { field fb: int }",
            ),
            seed("demo.c", "package demo\n@template\nmarker c { field fc: int }"),
        ];
        let mut registry = TemplateRegistry::new();
        let outcome = resolve_templates(seeds, &mut registry, &no_lookup, 2, 3);

        let applied: Vec<_> = outcome.applied.iter().map(|n| n.to_string()).collect();
        assert_eq!(applied, vec!["demo.c", "demo.b", "demo.a"]);
        assert!(outcome.unresolved.is_empty());
    }

    #[test]
    fn test_mutual_references_force_resolve() {
        // a references b and b references a; the stall breaker must fire and
        // both must still apply
        let seeds = vec![
            seed("demo.a", "package demo\n@template\n@b\nmarker a {}"),
            seed("demo.b", "package demo\n@template\n@a\nmarker b {}"),
        ];
        let mut registry = TemplateRegistry::new();
        let outcome = resolve_templates(seeds, &mut registry, &no_lookup, 2, 3);

        assert_eq!(outcome.applied.len(), 2);
        assert!(outcome.unresolved.is_empty());
        assert!(registry.contains(&QualifiedName::from_dotted("demo.a")));
        assert!(registry.contains(&QualifiedName::from_dotted("demo.b")));
    }

    #[test]
    fn test_cycle_reported_when_breaker_disabled() {
        // With the provisional cap at the stall cap the breaker never fires;
        // the sweep must still terminate and report the cycle members
        let seeds = vec![
            seed("demo.a", "package demo\n@template\n@b\nmarker a {}"),
            seed("demo.b", "package demo\n@template\n@a\nmarker b {}"),
        ];
        let mut registry = TemplateRegistry::new();
        let outcome = resolve_templates(seeds, &mut registry, &no_lookup, 3, 3);

        assert!(outcome.applied.is_empty());
        assert_eq!(outcome.unresolved.len(), 2);
    }

    #[test]
    fn test_external_dependency_fetched_and_applied() {
        let lookup = |name: &QualifiedName| {
            if name.to_string() == "demo.base.versioned" {
                Some(
                    "package demo.base\n@template\nmarker versioned { field version: int }"
                        .to_string(),
                )
            } else {
                None
            }
        };
        let seeds = vec![seed(
            "demo.audited",
            "package demo\nuse demo.base.versioned\n@template\n@versioned\nmarker audited {}",
        )];
        let mut registry = TemplateRegistry::new();
        let outcome = resolve_templates(seeds, &mut registry, &lookup, 2, 3);

        let applied: Vec<_> = outcome.applied.iter().map(|n| n.to_string()).collect();
        assert_eq!(applied, vec!["demo.base.versioned", "demo.audited"]);
        assert!(registry.contains(&QualifiedName::from_dotted("demo.base.versioned")));
    }

    #[test]
    fn test_unknown_reference_does_not_block() {
        // @indexed resolves to nothing; it is an ordinary annotation
        let seeds = vec![seed(
            "demo.audited",
            "package demo\n@template\n@indexed\nmarker audited {}",
        )];
        let mut registry = TemplateRegistry::new();
        let outcome = resolve_templates(seeds, &mut registry, &no_lookup, 2, 3);

        assert_eq!(outcome.applied.len(), 1);
        assert!(outcome.unresolved.is_empty());
    }

    #[test]
    fn test_unparsable_external_source_is_dropped() {
        let lookup = |name: &QualifiedName| {
            if name.simple_name() == "broken" {
                Some("marker {{{ not valid".to_string())
            } else {
                None
            }
        };
        let seeds = vec![seed(
            "demo.audited",
            "package demo\nuse demo.ext.broken\n@template\n@broken\nmarker audited {}",
        )];
        let mut registry = TemplateRegistry::new();
        let outcome = resolve_templates(seeds, &mut registry, &lookup, 2, 3);

        // The dependent still applies; the broken source is just dropped
        assert_eq!(outcome.applied.len(), 1);
        assert_eq!(outcome.applied[0].to_string(), "demo.audited");
        assert!(!registry.contains(&QualifiedName::from_dotted("demo.ext.broken")));
    }

    #[test]
    fn test_empty_seed_list() {
        let mut registry = TemplateRegistry::new();
        let outcome = resolve_templates(vec![], &mut registry, &no_lookup, 2, 3);
        assert!(outcome.applied.is_empty());
        assert!(outcome.unresolved.is_empty());
    }
}
