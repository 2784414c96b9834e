//! Prototype model - the canonical record for every generation target

use crate::parser::ast::{
    Annotation, AnnotationValue, Declaration, QualifiedName, SourceUnit, PROTOTYPE_MARKER,
};

/// The two standing artifact flavors a prototype can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Implementation,
    Interface,
}

/// Typed per-prototype configuration, assembled from template defaults and
/// the declaration's own `@prototype` arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct PrototypeProperties {
    pub generate_implementation: bool,
    pub generate_interface: bool,
    pub mix_in_class: Option<QualifiedName>,
    pub base_path: Option<String>,
    pub implementation_path: Option<String>,
    pub interface_path: Option<String>,
}

impl Default for PrototypeProperties {
    fn default() -> Self {
        Self {
            generate_implementation: true,
            generate_interface: true,
            mix_in_class: None,
            base_path: None,
            implementation_path: None,
            interface_path: None,
        }
    }
}

impl PrototypeProperties {
    /// Overlay configuration arguments from an annotation. Only keys present
    /// in the annotation change; callers layer template defaults first and
    /// the declaration's own `@prototype` last.
    pub fn overlay(&mut self, ann: &Annotation) {
        if let Some(value) = ann.bool_arg("implementation") {
            self.generate_implementation = value;
        }
        if let Some(value) = ann.bool_arg("interface") {
            self.generate_interface = value;
        }
        if let Some(value) = ann.arg("mixin") {
            self.mix_in_class = match value {
                AnnotationValue::ClassRef(name) => Some(name.clone()),
                AnnotationValue::Keyword(name) => Some(QualifiedName::simple(name.clone())),
                _ => None,
            };
        }
        if let Some(value) = ann.str_arg("base") {
            self.base_path = Some(value.to_string());
        }
        if let Some(value) = ann.str_arg("impl_path") {
            self.implementation_path = Some(value.to_string());
        }
        if let Some(value) = ann.str_arg("contract_path") {
            self.interface_path = Some(value.to_string());
        }
    }

    /// Properties read from a declaration's own `@prototype` annotation
    pub fn from_declaration(decl: &Declaration) -> Self {
        let mut properties = Self::default();
        if let Some(ann) = decl.annotation(PROTOTYPE_MARKER) {
            properties.overlay(ann);
        }
        properties
    }

    /// Explicit output path for the given artifact flavor: the kind-specific
    /// override wins, then the base path, then none (host-managed output).
    pub fn path_override(&self, kind: ArtifactKind) -> Option<&str> {
        let specific = match kind {
            ArtifactKind::Implementation => self.implementation_path.as_deref(),
            ArtifactKind::Interface => self.interface_path.as_deref(),
        };
        specific.or(self.base_path.as_deref())
    }
}

/// Canonical record for one discovered generation target.
///
/// Created when a declaration with a generation annotation is first seen,
/// mutated by the orchestrator (template application, then enrichment),
/// frozen once `processed`, and consumed exactly once by emission.
#[derive(Debug, Clone)]
pub struct PrototypeDescription {
    /// Fully-qualified name of the source declaration
    pub name: QualifiedName,
    /// The source declaration tree (templates already applied)
    pub declaration: Declaration,
    /// Package of the originating unit, carried into generated units
    pub package: Option<QualifiedName>,
    /// Imports of the originating unit, carried into generated units
    pub imports: Vec<QualifiedName>,
    pub properties: PrototypeProperties,
    /// Generated implementation unit, if any
    pub implementation: Option<SourceUnit>,
    /// Generated interface unit, if any
    pub interface: Option<SourceUnit>,
    /// Custom artifacts contributed by enrichers, in registration order
    pub custom_units: Vec<(String, SourceUnit)>,
    /// Prior compiled form; set suppresses emission entirely
    pub compiled: Option<QualifiedName>,
    /// Name of the enclosing prototype for nested declarations
    pub parent: Option<QualifiedName>,
    /// Set once the full enrichment pipeline has run
    pub processed: bool,
    /// Origin label of the discovery that produced this prototype
    pub origin: String,
}

impl PrototypeDescription {
    pub fn new(name: QualifiedName, declaration: Declaration, origin: impl Into<String>) -> Self {
        let properties = PrototypeProperties::from_declaration(&declaration);
        Self {
            name,
            declaration,
            package: None,
            imports: Vec::new(),
            properties,
            implementation: None,
            interface: None,
            custom_units: Vec::new(),
            compiled: None,
            parent: None,
            processed: false,
            origin: origin.into(),
        }
    }

    /// Nested prototypes are only emitted through their root ancestor
    pub fn is_nested(&self) -> bool {
        self.parent.is_some()
    }

    /// Simple name of the source declaration
    pub fn simple_name(&self) -> &str {
        self.name.simple_name()
    }

    /// Register a custom artifact; re-registration by name overwrites
    pub fn add_custom_unit(&mut self, name: impl Into<String>, unit: SourceUnit) {
        let name = name.into();
        match self.custom_units.iter().position(|(n, _)| *n == name) {
            Some(idx) => self.custom_units[idx].1 = unit,
            None => self.custom_units.push((name, unit)),
        }
    }

    pub fn custom_unit(&self, name: &str) -> Option<&SourceUnit> {
        self.custom_units
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, u)| u)
    }
}

/// Prototypes discovered in one round, in processing order
#[derive(Debug, Default)]
pub struct PrototypeStore {
    prototypes: Vec<PrototypeDescription>,
}

impl PrototypeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &QualifiedName) -> bool {
        self.prototypes.iter().any(|p| &p.name == name)
    }

    pub fn get(&self, name: &QualifiedName) -> Option<&PrototypeDescription> {
        self.prototypes.iter().find(|p| &p.name == name)
    }

    pub fn get_mut(&mut self, name: &QualifiedName) -> Option<&mut PrototypeDescription> {
        self.prototypes.iter_mut().find(|p| &p.name == name)
    }

    /// Insert a prototype; an existing entry with the same name is replaced
    pub fn insert(&mut self, prototype: PrototypeDescription) {
        match self
            .prototypes
            .iter()
            .position(|p| p.name == prototype.name)
        {
            Some(idx) => self.prototypes[idx] = prototype,
            None => self.prototypes.push(prototype),
        }
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PrototypeDescription> {
        self.prototypes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PrototypeDescription> {
        self.prototypes.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn declaration(source: &str) -> Declaration {
        parse(source).expect("Should parse").declarations[0].node.clone()
    }

    #[test]
    fn test_properties_defaults() {
        let properties = PrototypeProperties::default();
        assert!(properties.generate_implementation);
        assert!(properties.generate_interface);
        assert!(properties.mix_in_class.is_none());
        assert!(properties.path_override(ArtifactKind::Implementation).is_none());
    }

    #[test]
    fn test_properties_from_annotation() {
        let decl = declaration(
            r#"
            @prototype(implementation: false, interface: true, base: "/out",
                       contract_path: "/contracts", mixin: demo.Base)
            record User {}
        "#,
        );
        let properties = PrototypeProperties::from_declaration(&decl);
        assert!(!properties.generate_implementation);
        assert!(properties.generate_interface);
        assert_eq!(properties.mix_in_class.as_ref().unwrap().to_string(), "demo.Base");
        assert_eq!(properties.path_override(ArtifactKind::Implementation), Some("/out"));
        assert_eq!(properties.path_override(ArtifactKind::Interface), Some("/contracts"));
    }

    #[test]
    fn test_properties_overlay_order() {
        // Template defaults first, declaration's own annotation last
        let template = declaration("@template(interface: false, base: \"/t\") marker m {}");
        let own = declaration("@prototype(interface: true) record User {}");

        let mut properties = PrototypeProperties::default();
        properties.overlay(template.annotation("template").unwrap());
        properties.overlay(own.annotation("prototype").unwrap());

        assert!(properties.generate_interface);
        assert_eq!(properties.base_path.as_deref(), Some("/t"));
    }

    #[test]
    fn test_store_insert_and_replace() {
        let mut store = PrototypeStore::new();
        let name = QualifiedName::from_dotted("demo.User");
        let decl = declaration("record User { field a: int }");

        store.insert(PrototypeDescription::new(name.clone(), decl.clone(), "users.pf"));
        assert_eq!(store.len(), 1);

        let mut replacement = PrototypeDescription::new(name.clone(), decl, "users.pf");
        replacement.processed = true;
        store.insert(replacement);
        assert_eq!(store.len(), 1);
        assert!(store.get(&name).unwrap().processed);
    }

    #[test]
    fn test_custom_unit_overwrites_by_name() {
        let decl = declaration("record User {}");
        let mut prototype =
            PrototypeDescription::new(QualifiedName::from_dotted("demo.User"), decl, "users.pf");

        let unit_a = parse("record A {}").unwrap();
        let unit_b = parse("record B {}").unwrap();
        prototype.add_custom_unit("extra", unit_a);
        prototype.add_custom_unit("extra", unit_b);

        assert_eq!(prototype.custom_units.len(), 1);
        assert_eq!(
            prototype.custom_unit("extra").unwrap().declarations[0]
                .node
                .name
                .node
                .as_str(),
            "B"
        );
    }

    #[test]
    fn test_nested_flag() {
        let decl = declaration("record Line {}");
        let mut prototype =
            PrototypeDescription::new(QualifiedName::from_dotted("demo.Order.Line"), decl, "o.pf");
        assert!(!prototype.is_nested());
        prototype.parent = Some(QualifiedName::from_dotted("demo.Order"));
        assert!(prototype.is_nested());
    }
}
