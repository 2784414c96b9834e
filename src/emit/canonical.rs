//! Canonical ordering of generated units
//!
//! Emitted files must be byte-stable across runs for identical logical
//! content; build caches key on output bytes. Two rules make that hold:
//! imports are sorted by qualified name, and members are grouped (fields,
//! functions, nested declarations) and alphabetized within each group.

use crate::parser::ast::{Declaration, Member, SourceUnit};

/// Canonicalize a unit in place: sorted, deduplicated imports and ordered
/// members throughout the declaration tree.
pub fn canonicalize_unit(unit: &mut SourceUnit) {
    unit.imports
        .sort_by(|a, b| a.node.segments.cmp(&b.node.segments));
    unit.imports.dedup_by(|a, b| a.node == b.node);

    for declaration in unit.declarations.iter_mut() {
        canonicalize_declaration(&mut declaration.node);
    }
}

/// Order a declaration's members: fields, then functions, then nested
/// declarations, each group alphabetized. Nested declarations are ordered
/// recursively.
pub fn canonicalize_declaration(declaration: &mut Declaration) {
    declaration
        .members
        .sort_by(|a, b| {
            member_rank(&a.node)
                .cmp(&member_rank(&b.node))
                .then_with(|| a.node.name().cmp(b.node.name()))
        });

    for member in declaration.members.iter_mut() {
        if let Member::Nested(nested) = &mut member.node {
            canonicalize_declaration(nested);
        }
    }
}

fn member_rank(member: &Member) -> u8 {
    match member {
        Member::Field(_) => 0,
        Member::Function(_) => 1,
        Member::Nested(_) => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn test_imports_sorted_and_deduplicated() {
        let mut unit = parse(
            r#"
            package demo
            use z.last.Thing
            use a.first.Thing
            use m.middle.Thing
            use a.first.Thing
            record X {}
        "#,
        )
        .expect("Should parse");
        canonicalize_unit(&mut unit);

        let imports: Vec<_> = unit.imports.iter().map(|i| i.node.to_string()).collect();
        assert_eq!(
            imports,
            vec!["a.first.Thing", "m.middle.Thing", "z.last.Thing"]
        );
    }

    #[test]
    fn test_members_grouped_and_alphabetized() {
        let mut unit = parse(
            r#"
            record X {
                fn zebra()
                field beta: int
                fn alpha()
                field alpha: int
                record Nested {}
            }
        "#,
        )
        .expect("Should parse");
        canonicalize_unit(&mut unit);

        let names: Vec<_> = unit.declarations[0]
            .node
            .members
            .iter()
            .map(|m| m.node.name().to_string())
            .collect();
        assert_eq!(names, vec!["alpha", "beta", "alpha", "zebra", "Nested"]);
    }

    #[test]
    fn test_nested_declarations_ordered_recursively() {
        let mut unit = parse(
            r#"
            record X {
                record Inner {
                    fn b()
                    field a: int
                }
            }
        "#,
        )
        .expect("Should parse");
        canonicalize_unit(&mut unit);

        let inner = unit.declarations[0].node.nested().next().unwrap();
        let names: Vec<_> = inner.members.iter().map(|m| m.node.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_canonicalization_is_idempotent() {
        let mut unit = parse(
            r#"
            use b.B
            use a.A
            record X { fn f() field g: int }
        "#,
        )
        .expect("Should parse");
        canonicalize_unit(&mut unit);
        let once = unit.clone();
        canonicalize_unit(&mut unit);
        assert_eq!(unit, once);
    }
}
