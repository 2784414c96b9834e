//! Template registry for storing and retrieving resolved templates

use thiserror::Error;
use tracing::debug;

use crate::parser::ast::{
    is_builtin_marker, Annotation, Declaration, Member, QualifiedName, SourceUnit, Spanned,
    TEMPLATE_MARKER,
};

/// Errors that can occur during template operations
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Template source text failed to parse
    #[error("failed to parse template source for {name}: {details}")]
    ParseFailed { name: String, details: String },

    /// The source unit holds no matching template declaration
    #[error("no template declaration named {name} in source unit")]
    MissingDeclaration { name: String },
}

/// A template ready for application: the marker declaration whose members
/// and annotations are contributed to referencing declarations.
#[derive(Debug, Clone)]
pub struct TemplateDefinition {
    /// Fully-qualified template name
    pub name: QualifiedName,
    /// The marker declaration supplying contributed members
    pub declaration: Declaration,
    /// Configuration defaults from the `@template(...)` arguments
    pub defaults: Option<Annotation>,
    /// Other templates this one references, fully qualified; applied
    /// transitively to referencing prototypes
    pub references: Vec<QualifiedName>,
}

impl TemplateDefinition {
    /// Extract the template definition for `name` from a parsed unit.
    ///
    /// The unit must contain a declaration with the template's simple name
    /// that carries the template marker; external units fetched by lookup
    /// hold exactly one such declaration.
    pub fn from_unit(name: &QualifiedName, unit: &SourceUnit) -> Result<Self, TemplateError> {
        let declaration = unit
            .declarations
            .iter()
            .map(|d| &d.node)
            .find(|d| d.name.node.as_str() == name.simple_name() && d.is_template())
            .ok_or_else(|| TemplateError::MissingDeclaration {
                name: name.to_string(),
            })?
            .clone();

        let defaults = declaration.annotation(TEMPLATE_MARKER).cloned();
        let references = template_references(&declaration, unit);

        Ok(Self {
            name: name.clone(),
            declaration,
            defaults,
            references,
        })
    }

    /// Members this template contributes to referencing declarations
    pub fn members(&self) -> &[Spanned<Member>] {
        &self.declaration.members
    }
}

/// Annotations on a template declaration that reference other templates,
/// resolved against the unit's imports and package. Built-in markers are
/// never template references.
pub fn template_references(declaration: &Declaration, unit: &SourceUnit) -> Vec<QualifiedName> {
    declaration
        .annotations
        .iter()
        .map(|a| unit.resolve_name(&a.node.name.node))
        .filter(|name| !is_builtin_marker(name.simple_name()))
        .collect()
}

/// Registry of applied templates, keyed uniquely by fully-qualified name.
///
/// Everything stored here has passed resolution; re-registration of the same
/// name overwrites rather than duplicates.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: Vec<TemplateDefinition>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolved template; returns true when an existing entry was
    /// overwritten.
    pub fn register(&mut self, definition: TemplateDefinition) -> bool {
        match self
            .templates
            .iter()
            .position(|t| t.name == definition.name)
        {
            Some(idx) => {
                debug!("Re-registering template: {}", definition.name);
                self.templates[idx] = definition;
                true
            }
            None => {
                debug!("Registering template: {}", definition.name);
                self.templates.push(definition);
                false
            }
        }
    }

    pub fn get(&self, name: &QualifiedName) -> Option<&TemplateDefinition> {
        self.templates.iter().find(|t| &t.name == name)
    }

    pub fn contains(&self, name: &QualifiedName) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &QualifiedName> {
        self.templates.iter().map(|t| &t.name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
