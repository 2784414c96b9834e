//! Emission layer - serialize processed prototypes exactly once
//!
//! Artifacts with an explicit path override are written straight to the
//! filesystem under `<path>/<package-dirs>/<TypeName>.<ext>`; everything
//! else goes through the host's managed output channel keyed by
//! fully-qualified name. Failures are logged per artifact and never abort
//! the round.

pub mod canonical;
pub mod printer;

pub use canonical::{canonicalize_declaration, canonicalize_unit};
pub use printer::print_unit;

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{error, info};

use crate::config::GeneratorConfig;
use crate::host::OutputSink;
use crate::parser::ast::{QualifiedName, SourceUnit};
use crate::prototype::{ArtifactKind, PrototypeDescription, PrototypeStore};

/// Errors that can occur while writing a single artifact
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("unable to create directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("unable to write file {path}: {source}")]
    WriteFile { path: PathBuf, source: io::Error },

    #[error("unable to hand {name} to the host output channel: {source}")]
    Sink { name: String, source: io::Error },
}

/// What one emission run wrote
#[derive(Debug, Default)]
pub struct EmissionReport {
    /// Files written to explicit path overrides
    pub written: Vec<PathBuf>,
    /// Artifacts handed to the host output sink
    pub delegated: Vec<QualifiedName>,
    /// Prototypes skipped because a compiled form already exists
    pub skipped_compiled: usize,
    /// Per-artifact failures, logged and skipped
    pub failures: Vec<String>,
}

impl EmissionReport {
    /// Total artifacts that reached durable storage
    pub fn emitted(&self) -> usize {
        self.written.len() + self.delegated.len()
    }
}

/// Emit every processed, root-level prototype in the store.
pub fn emit_prototypes(
    store: &PrototypeStore,
    sink: &mut dyn OutputSink,
    config: &GeneratorConfig,
) -> EmissionReport {
    let mut report = EmissionReport::default();

    for prototype in store.iter() {
        if !prototype.processed {
            continue;
        }
        // Nested prototypes ride along inside their root's units
        if prototype.is_nested() {
            continue;
        }
        if prototype.compiled.is_some() {
            info!(
                "Skipping {}: compiled form {} already exists",
                prototype.name,
                prototype.compiled.as_ref().unwrap()
            );
            report.skipped_compiled += 1;
            continue;
        }

        // A mix-in prototype's implementation lives in the mix-in target
        if prototype.properties.mix_in_class.is_none() {
            if let Some(unit) = &prototype.implementation {
                emit_unit(
                    unit,
                    prototype,
                    ArtifactKind::Implementation,
                    sink,
                    config,
                    &mut report,
                );
            }
        }
        if let Some(unit) = &prototype.interface {
            emit_unit(
                unit,
                prototype,
                ArtifactKind::Interface,
                sink,
                config,
                &mut report,
            );
        }
        for (_, unit) in &prototype.custom_units {
            emit_unit(
                unit,
                prototype,
                ArtifactKind::Implementation,
                sink,
                config,
                &mut report,
            );
        }
    }

    report
}

fn emit_unit(
    unit: &SourceUnit,
    prototype: &PrototypeDescription,
    kind: ArtifactKind,
    sink: &mut dyn OutputSink,
    config: &GeneratorConfig,
    report: &mut EmissionReport,
) {
    let mut unit = unit.clone();
    canonicalize_unit(&mut unit);
    let text = print_unit(&unit);

    let Some(declaration) = unit.primary() else {
        return;
    };
    let simple = declaration.node.name.node.as_str();
    let full_name = match unit.package_name() {
        Some(package) => package.child(simple),
        None => QualifiedName::simple(simple),
    };

    match prototype.properties.path_override(kind) {
        Some(base) => match write_to_path(base, &unit, simple, &text, config) {
            Ok(path) => {
                info!("Writing {}", path.display());
                report.written.push(path);
            }
            Err(err) => {
                error!("{}", err);
                report.failures.push(err.to_string());
            }
        },
        None => match sink.write(&full_name, &text) {
            Ok(()) => {
                info!("Writing {} through host output", full_name);
                report.delegated.push(full_name);
            }
            Err(source) => {
                let err = EmitError::Sink {
                    name: full_name.to_string(),
                    source,
                };
                error!("{}", err);
                report.failures.push(err.to_string());
            }
        },
    }
}

/// Write under `<base>/<package-as-dirs>/<TypeName>.<ext>`, creating parent
/// directories as needed.
fn write_to_path(
    base: &str,
    unit: &SourceUnit,
    simple: &str,
    text: &str,
    config: &GeneratorConfig,
) -> Result<PathBuf, EmitError> {
    let mut path = PathBuf::from(base);
    if let Some(package) = unit.package_name() {
        for segment in &package.segments {
            path.push(segment);
        }
    }
    fs::create_dir_all(&path).map_err(|source| EmitError::CreateDir {
        path: path.clone(),
        source,
    })?;
    path.push(format!("{}.{}", simple, config.extension));
    fs::write(&path, text).map_err(|source| EmitError::WriteFile {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Write the round-completion marker; its existence suppresses the next
/// invocation within the same build.
pub fn write_round_marker(config: &GeneratorConfig, report: &EmissionReport) -> io::Result<PathBuf> {
    fs::create_dir_all(&config.output_root)?;
    let path = config.marker_path();
    fs::write(&path, format!("units={}\n", report.emitted()))?;
    Ok(path)
}
