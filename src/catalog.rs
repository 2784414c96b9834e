//! Source catalog - groups raw source text by originating file
//!
//! Discovery may report the same file several times (once per annotated
//! element). The catalog collapses those reports into one entry per source
//! text so each file is parsed exactly once per round, while remembering
//! every element/annotation pair that caused inclusion.

/// A single reason a source file entered the round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    /// Simple name of the annotated declaration
    pub element: String,
    /// Unqualified name of the triggering annotation
    pub annotation: String,
    /// Opaque origin label, used only for diagnostics
    pub origin: String,
}

/// One catalog entry: a source text and its inclusion triggers
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub source: String,
    pub triggers: Vec<Trigger>,
}

impl CatalogEntry {
    fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            triggers: Vec::new(),
        }
    }

    /// Record an element/annotation pair; duplicates collapse
    pub fn trigger(
        &mut self,
        element: impl Into<String>,
        annotation: impl Into<String>,
        origin: impl Into<String>,
    ) -> &mut Self {
        let trigger = Trigger {
            element: element.into(),
            annotation: annotation.into(),
            origin: origin.into(),
        };
        if !self.triggers.contains(&trigger) {
            self.triggers.push(trigger);
        }
        self
    }
}

/// Catalog of source files queued for one round, in discovery order
#[derive(Debug, Default)]
pub struct SourceCatalog {
    entries: Vec<CatalogEntry>,
}

impl SourceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for the given source text, created on first sight
    pub fn file(&mut self, source: &str) -> &mut CatalogEntry {
        if let Some(idx) = self.entries.iter().position(|e| e.source == source) {
            &mut self.entries[idx]
        } else {
            self.entries.push(CatalogEntry::new(source));
            self.entries.last_mut().unwrap()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    /// Consume the catalog; entries are parsed once and discarded
    pub fn into_entries(self) -> Vec<CatalogEntry> {
        self.entries
    }
}
