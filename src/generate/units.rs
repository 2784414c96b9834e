//! Building generated units from a prototype's source declaration

use crate::parser::ast::{
    DeclKind, Declaration, Identifier, Member, QualifiedName, SourceUnit, Spanned,
};
use crate::prototype::PrototypeDescription;

/// Synthetic span for generated nodes
fn span() -> std::ops::Range<usize> {
    0..0
}

/// Name of the generated interface unit for a declaration
pub fn contract_name(simple: &str) -> String {
    format!("{}Contract", simple)
}

/// Name of the generated implementation unit for a declaration
pub fn implementation_name(simple: &str) -> String {
    format!("{}Impl", simple)
}

/// Wrap a generated declaration in a unit carrying the prototype's package
/// and imports.
pub fn make_unit(prototype: &PrototypeDescription, declaration: Declaration) -> SourceUnit {
    SourceUnit {
        package: prototype
            .package
            .clone()
            .map(|p| Spanned::new(p, span())),
        imports: prototype
            .imports
            .iter()
            .cloned()
            .map(|i| Spanned::new(i, span()))
            .collect(),
        declarations: vec![Spanned::new(declaration, span())],
    }
}

/// Populate the prototype's standing artifacts according to its properties.
///
/// The interface unit carries the declaration's function signatures; the
/// implementation unit carries fields, functions, and nested declarations.
/// Both inherit the source declaration's annotations (cleanup of generation
/// markers is an enrichment concern).
pub fn build_units(prototype: &mut PrototypeDescription) {
    if prototype.properties.generate_interface {
        let contract = build_contract(&prototype.declaration);
        prototype.interface = Some(make_unit(prototype, contract));
    }
    if prototype.properties.generate_implementation {
        let implementation = build_implementation(&prototype.declaration);
        prototype.implementation = Some(make_unit(prototype, implementation));
    }
}

fn build_contract(declaration: &Declaration) -> Declaration {
    let members = declaration
        .members
        .iter()
        .filter(|m| matches!(m.node, Member::Function(_)))
        .cloned()
        .collect();

    Declaration {
        kind: DeclKind::Iface,
        name: Spanned::new(
            Identifier::new(contract_name(declaration.name.node.as_str())),
            span(),
        ),
        annotations: declaration.annotations.clone(),
        members,
    }
}

fn build_implementation(declaration: &Declaration) -> Declaration {
    Declaration {
        kind: DeclKind::Record,
        name: Spanned::new(
            Identifier::new(implementation_name(declaration.name.node.as_str())),
            span(),
        ),
        annotations: declaration.annotations.clone(),
        members: declaration.members.clone(),
    }
}

/// Fully-qualified names of a prototype's standing artifacts
pub fn artifact_name(prototype: &PrototypeDescription, simple: String) -> QualifiedName {
    match prototype.name.qualifier() {
        Some(qualifier) => qualifier.child(simple),
        None => QualifiedName::simple(simple),
    }
}
