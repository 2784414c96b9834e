//! ProtoForge - a source-to-source generator for annotated declarations
//!
//! This library reads PF declaration files, expands templates (reusable
//! declaration fragments) into the declarations referencing them, applies an
//! ordered chain of enrichment plugins, and emits canonicalized generated
//! source files. One invocation processes one round; a completion marker
//! keeps repeated invocations within the same build idempotent.
//!
//! # Example
//!
//! ```rust
//! use protoforge::host::{MemoryOutputSink, MemorySourceProvider};
//! use protoforge::{run_round, EnrichmentPipeline, GeneratorConfig};
//!
//! let mut provider = MemorySourceProvider::new();
//! provider.add_discovery(
//!     "User",
//!     "prototype",
//!     "package demo\n@prototype\nrecord User { field name: string }",
//!     "users.pf",
//! );
//!
//! let dir = tempfile::tempdir().unwrap();
//! let config = GeneratorConfig::default().with_output_root(dir.path());
//! let mut sink = MemoryOutputSink::new();
//!
//! let report = run_round(&provider, &mut sink, &EnrichmentPipeline::standard(), &config);
//! assert_eq!(report.emitted, 2); // UserImpl and UserContract
//! ```

pub mod catalog;
pub mod config;
pub mod emit;
pub mod error;
pub mod generate;
pub mod host;
pub mod parser;
pub mod prototype;
pub mod template;

pub use catalog::SourceCatalog;
pub use config::{ConfigError, GeneratorConfig};
pub use emit::{EmissionReport, EmitError};
pub use error::ParseError;
pub use generate::{EnrichContext, EnrichError, Enricher, EnrichmentPipeline};
pub use host::{FsOutputSink, FsSourceProvider, OutputSink, SourceProvider};
pub use parser::{parse, SourceUnit};
pub use prototype::{PrototypeDescription, PrototypeProperties};
pub use template::{TemplateDefinition, TemplateRegistry};

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;

use tracing::error;

use parser::ast::QualifiedName;

/// Summary of one generator round
#[derive(Debug, Default)]
pub struct RoundReport {
    /// True when the round-completion marker suppressed all work
    pub skipped: bool,
    /// Total artifacts that reached durable storage
    pub emitted: usize,
    /// Files written to explicit path overrides
    pub written: Vec<PathBuf>,
    /// Artifacts handed to the host output channel
    pub delegated: Vec<QualifiedName>,
    /// Templates the resolver gave up on
    pub unresolved_templates: Vec<QualifiedName>,
    /// Per-unit failures (parse, enrichment, emission), all non-fatal
    pub failures: Vec<String>,
}

/// Run one complete generator round: discovery, template resolution,
/// generation, enrichment, emission, and the completion marker.
///
/// Never fails: per-unit problems are logged and isolated, and an unexpected
/// internal error is caught at this boundary so the host always receives a
/// normal report.
pub fn run_round(
    provider: &dyn SourceProvider,
    sink: &mut dyn OutputSink,
    pipeline: &EnrichmentPipeline,
    config: &GeneratorConfig,
) -> RoundReport {
    let result = catch_unwind(AssertUnwindSafe(|| {
        run_round_inner(provider, sink, pipeline, config)
    }));
    match result {
        Ok(report) => report,
        Err(_) => {
            error!("Generator round failed unexpectedly; nothing further to process");
            RoundReport::default()
        }
    }
}

fn run_round_inner(
    provider: &dyn SourceProvider,
    sink: &mut dyn OutputSink,
    pipeline: &EnrichmentPipeline,
    config: &GeneratorConfig,
) -> RoundReport {
    let mut catalog = SourceCatalog::new();
    for discovery in provider.discover() {
        catalog.file(&discovery.source).trigger(
            discovery.element,
            discovery.annotation,
            discovery.origin,
        );
    }

    let outcome = generate::process_sources(catalog, provider, pipeline, config);
    if outcome.skipped {
        return RoundReport {
            skipped: true,
            ..RoundReport::default()
        };
    }

    let mut failures: Vec<String> = outcome
        .failures
        .iter()
        .map(|(name, err)| format!("{}: {}", name, err))
        .collect();

    let emission = emit::emit_prototypes(&outcome.prototypes, sink, config);
    failures.extend(emission.failures.iter().cloned());

    if let Err(err) = emit::write_round_marker(config, &emission) {
        error!("Unable to write round marker: {}", err);
    }

    RoundReport {
        skipped: false,
        emitted: emission.emitted(),
        written: emission.written,
        delegated: emission.delegated,
        unresolved_templates: outcome.unresolved_templates,
        failures,
    }
}

/// Convenience entry point: scan filesystem source roots and write generated
/// files under the configured output root.
pub fn generate_from_roots(roots: Vec<PathBuf>, config: &GeneratorConfig) -> RoundReport {
    let provider = FsSourceProvider::new(roots, config.extension.clone());
    let mut sink =
        FsOutputSink::new(config.output_root.clone()).with_extension(config.extension.clone());
    run_round(&provider, &mut sink, &EnrichmentPipeline::standard(), config)
}
