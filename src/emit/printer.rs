//! Deterministic pretty-printing of source units
//!
//! The printer is intentionally rigid: one layout, no configuration. Byte
//! stability of emitted files matters more than style knobs.

use crate::parser::ast::{
    Annotation, AnnotationValue, Declaration, FnDecl, Member, SourceUnit,
};

const INDENT: &str = "    ";

/// Render a unit as PF source text
pub fn print_unit(unit: &SourceUnit) -> String {
    let mut out = String::new();

    if let Some(package) = &unit.package {
        out.push_str(&format!("package {}\n", package.node));
    }

    if !unit.imports.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        for import in &unit.imports {
            out.push_str(&format!("use {}\n", import.node));
        }
    }

    for declaration in &unit.declarations {
        if !out.is_empty() {
            out.push('\n');
        }
        print_declaration(&declaration.node, 0, &mut out);
    }

    out
}

fn print_declaration(declaration: &Declaration, level: usize, out: &mut String) {
    let pad = INDENT.repeat(level);

    for annotation in &declaration.annotations {
        out.push_str(&pad);
        out.push_str(&format_annotation(&annotation.node));
        out.push('\n');
    }

    if declaration.members.is_empty() {
        out.push_str(&format!(
            "{}{} {} {{}}\n",
            pad,
            declaration.kind.keyword(),
            declaration.name.node
        ));
        return;
    }

    out.push_str(&format!(
        "{}{} {} {{\n",
        pad,
        declaration.kind.keyword(),
        declaration.name.node
    ));

    let mut last_group = None;
    for member in &declaration.members {
        let group = member_group(&member.node);
        if let Some(last) = last_group {
            if last != group {
                out.push('\n');
            }
        }
        last_group = Some(group);

        match &member.node {
            Member::Field(field) => {
                for annotation in &field.annotations {
                    out.push_str(&format!(
                        "{}{}{}\n",
                        pad,
                        INDENT,
                        format_annotation(&annotation.node)
                    ));
                }
                out.push_str(&format!(
                    "{}{}field {}: {}\n",
                    pad, INDENT, field.name.node, field.ty.node
                ));
            }
            Member::Function(function) => {
                for annotation in &function.annotations {
                    out.push_str(&format!(
                        "{}{}{}\n",
                        pad,
                        INDENT,
                        format_annotation(&annotation.node)
                    ));
                }
                out.push_str(&format!(
                    "{}{}{}\n",
                    pad,
                    INDENT,
                    format_signature(function)
                ));
            }
            Member::Nested(nested) => {
                print_declaration(nested, level + 1, out);
            }
        }
    }

    out.push_str(&format!("{}}}\n", pad));
}

fn member_group(member: &Member) -> u8 {
    match member {
        Member::Field(_) => 0,
        Member::Function(_) => 1,
        Member::Nested(_) => 2,
    }
}

fn format_signature(function: &FnDecl) -> String {
    let params = function
        .params
        .iter()
        .map(|p| format!("{}: {}", p.node.name.node, p.node.ty.node))
        .collect::<Vec<_>>()
        .join(", ");
    match &function.ret {
        Some(ret) => format!("fn {}({}): {}", function.name.node, params, ret.node),
        None => format!("fn {}({})", function.name.node, params),
    }
}

fn format_annotation(annotation: &Annotation) -> String {
    if annotation.args.is_empty() {
        format!("@{}", annotation.name.node)
    } else {
        let args = annotation
            .args
            .iter()
            .map(|(key, value)| format!("{}: {}", key.node, format_value(&value.node)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("@{}({})", annotation.name.node, args)
    }
}

fn format_value(value: &AnnotationValue) -> String {
    match value {
        AnnotationValue::Bool(b) => b.to_string(),
        AnnotationValue::Int(n) => n.to_string(),
        AnnotationValue::Str(s) => format!("\"{}\"", s),
        AnnotationValue::Keyword(k) => k.clone(),
        AnnotationValue::ClassRef(name) => name.to_string(),
        AnnotationValue::Array(values) => {
            let items = values
                .iter()
                .map(format_value)
                .collect::<Vec<_>>()
                .join(", ");
            format!("[{}]", items)
        }
    }
}
