//! Host integration capabilities
//!
//! The generator core stays ignorant of which build host is in play. Hosts
//! supply two capabilities: a [`SourceProvider`] that delivers discovery
//! tuples and backs by-name lookups outside the current batch, and an
//! [`OutputSink`] that receives units with no explicit output path.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::parser::ast::QualifiedName;
use crate::parser::{self, Member};

/// One discovery tuple delivered by the host
#[derive(Debug, Clone)]
pub struct Discovery {
    /// Simple name of the annotated declaration
    pub element: String,
    /// Unqualified name of the triggering annotation
    pub annotation: String,
    /// Raw source text of the file holding the declaration
    pub source: String,
    /// Opaque origin label, used only for diagnostics
    pub origin: String,
}

/// Capability: locate round inputs and fetch declarations by name
pub trait SourceProvider {
    /// All discovery tuples for the current round
    fn discover(&self) -> Vec<Discovery>;

    /// Fetch the source text of a declaration outside the current batch
    fn lookup(&self, name: &QualifiedName) -> Option<String>;
}

/// Capability: host-managed output channel keyed by fully-qualified name
pub trait OutputSink {
    fn write(&mut self, name: &QualifiedName, contents: &str) -> io::Result<()>;
}

/// Filesystem-backed provider scanning one or more source roots
pub struct FsSourceProvider {
    roots: Vec<PathBuf>,
    extension: String,
}

impl FsSourceProvider {
    pub fn new(roots: Vec<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            roots,
            extension: extension.into(),
        }
    }

    /// Map `a.b.C` to `<root>/a/b/C.<ext>`
    fn name_to_file(&self, root: &Path, name: &QualifiedName) -> PathBuf {
        let mut path = root.to_path_buf();
        for segment in &name.segments {
            path.push(segment);
        }
        path.set_extension(&self.extension);
        path
    }

    fn collect_files(&self, dir: &Path, files: &mut Vec<PathBuf>) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Unable to scan {}: {}", dir.display(), err);
                return;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                self.collect_files(&path, files);
            } else if path.extension().and_then(|e| e.to_str()) == Some(self.extension.as_str()) {
                files.push(path);
            }
        }
    }
}

impl SourceProvider for FsSourceProvider {
    /// Scan the roots for source files and report every annotated top-level
    /// declaration. Files that fail to parse are skipped here; the
    /// orchestrator re-parses catalog entries and reports errors with
    /// context.
    fn discover(&self) -> Vec<Discovery> {
        let mut discoveries = Vec::new();
        let mut files = Vec::new();
        for root in &self.roots {
            self.collect_files(root, &mut files);
        }
        files.sort();

        for file in files {
            let source = match fs::read_to_string(&file) {
                Ok(source) => source,
                Err(err) => {
                    warn!("Unable to read {}: {}", file.display(), err);
                    continue;
                }
            };
            let unit = match parser::parse(&source) {
                Ok(unit) => unit,
                Err(_) => {
                    debug!("Skipping unparsable file during discovery: {}", file.display());
                    continue;
                }
            };
            let origin = file.display().to_string();
            for decl in &unit.declarations {
                for ann in &decl.node.annotations {
                    discoveries.push(Discovery {
                        element: decl.node.name.node.as_str().to_string(),
                        annotation: ann.node.simple_name().to_string(),
                        source: source.clone(),
                        origin: origin.clone(),
                    });
                }
                // Nested annotated declarations trigger through their file too
                for nested in decl.node.members.iter().filter_map(|m| match &m.node {
                    Member::Nested(d) => Some(d),
                    _ => None,
                }) {
                    for ann in &nested.annotations {
                        discoveries.push(Discovery {
                            element: nested.name.node.as_str().to_string(),
                            annotation: ann.node.simple_name().to_string(),
                            source: source.clone(),
                            origin: origin.clone(),
                        });
                    }
                }
            }
        }
        discoveries
    }

    fn lookup(&self, name: &QualifiedName) -> Option<String> {
        for root in &self.roots {
            let file = self.name_to_file(root, name);
            if file.exists() {
                match fs::read_to_string(&file) {
                    Ok(source) => {
                        debug!("External lookup hit: {} ({})", name, file.display());
                        return Some(source);
                    }
                    Err(err) => warn!("Unable to read {}: {}", file.display(), err),
                }
            }
        }
        None
    }
}

/// In-memory provider for tests and embedded use
#[derive(Debug, Default)]
pub struct MemorySourceProvider {
    discoveries: Vec<Discovery>,
    external: HashMap<String, String>,
}

impl MemorySourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_discovery(
        &mut self,
        element: impl Into<String>,
        annotation: impl Into<String>,
        source: impl Into<String>,
        origin: impl Into<String>,
    ) -> &mut Self {
        self.discoveries.push(Discovery {
            element: element.into(),
            annotation: annotation.into(),
            source: source.into(),
            origin: origin.into(),
        });
        self
    }

    /// Register a source reachable only through external lookup
    pub fn add_external(&mut self, name: impl Into<String>, source: impl Into<String>) -> &mut Self {
        self.external.insert(name.into(), source.into());
        self
    }
}

impl SourceProvider for MemorySourceProvider {
    fn discover(&self) -> Vec<Discovery> {
        self.discoveries.clone()
    }

    fn lookup(&self, name: &QualifiedName) -> Option<String> {
        self.external.get(&name.to_string()).cloned()
    }
}

/// Filesystem sink writing under a fixed output root
pub struct FsOutputSink {
    root: PathBuf,
    extension: String,
}

impl FsOutputSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: "pf".to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }
}

impl OutputSink for FsOutputSink {
    fn write(&mut self, name: &QualifiedName, contents: &str) -> io::Result<()> {
        let mut path = self.root.clone();
        for segment in &name.segments {
            path.push(segment);
        }
        path.set_extension(&self.extension);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)
    }
}

/// Sink that collects output in memory, for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryOutputSink {
    pub written: Vec<(String, String)>,
}

impl MemoryOutputSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents_of(&self, name: &str) -> Option<&str> {
        self.written
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.as_str())
    }
}

impl OutputSink for MemoryOutputSink {
    fn write(&mut self, name: &QualifiedName, contents: &str) -> io::Result<()> {
        self.written.push((name.to_string(), contents.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_provider_roundtrip() {
        let mut provider = MemorySourceProvider::new();
        provider.add_discovery("User", "prototype", "record User {}", "users.pf");
        provider.add_external("demo.common.audited", "marker audited {}");

        assert_eq!(provider.discover().len(), 1);
        assert_eq!(
            provider
                .lookup(&QualifiedName::from_dotted("demo.common.audited"))
                .as_deref(),
            Some("marker audited {}")
        );
        assert!(provider
            .lookup(&QualifiedName::from_dotted("demo.missing"))
            .is_none());
    }

    #[test]
    fn test_fs_provider_scan_and_lookup() {
        let dir = tempfile::tempdir().expect("Should create tempdir");
        let pkg_dir = dir.path().join("demo");
        fs::create_dir_all(&pkg_dir).unwrap();
        fs::write(
            pkg_dir.join("User.pf"),
            "package demo\n@prototype\nrecord User { field name: string }\n",
        )
        .unwrap();

        let provider = FsSourceProvider::new(vec![dir.path().to_path_buf()], "pf");
        let discoveries = provider.discover();
        assert_eq!(discoveries.len(), 1);
        assert_eq!(discoveries[0].element, "User");
        assert_eq!(discoveries[0].annotation, "prototype");

        let source = provider.lookup(&QualifiedName::from_dotted("demo.User"));
        assert!(source.is_some());
    }

    #[test]
    fn test_fs_sink_writes_package_path() {
        let dir = tempfile::tempdir().expect("Should create tempdir");
        let mut sink = FsOutputSink::new(dir.path());
        sink.write(&QualifiedName::from_dotted("demo.users.User"), "record User {}")
            .expect("Should write");

        let written = dir.path().join("demo/users/User.pf");
        assert!(written.exists());
        assert_eq!(fs::read_to_string(written).unwrap(), "record User {}");
    }
}
