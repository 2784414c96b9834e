//! Parser implementation using chumsky

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::parser::ast::*;
use crate::parser::lexer::Token;

/// Parse PF source code into a source unit
pub fn parse(input: &str) -> Result<SourceUnit, Vec<crate::ParseError>> {
    let len = input.len();

    // Create a logos lexer and convert to token stream
    let token_iter = crate::parser::lexer::lex(input).map(|(tok, span)| (tok, span.into()));

    // Turn the token iterator into a stream that chumsky can use
    let token_stream = Stream::from_iter(token_iter)
        // Split (Token, SimpleSpan) into token and span parts
        .map((len..len).into(), |(t, s): (_, _)| (t, s));

    unit_parser()
        .parse(token_stream)
        .into_result()
        .map_err(|errs| errs.into_iter().map(|e| e.into()).collect())
}

/// Helper to extract span range from chumsky's MapExtra
fn span_range(e: &impl chumsky::span::Span<Offset = usize>) -> std::ops::Range<usize> {
    e.start()..e.end()
}

fn unit_parser<'a, I>() -> impl Parser<'a, I, SourceUnit, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    // Basic token parsers
    let identifier = select! {
        Token::Ident(s) => Identifier::new(s),
    }
    .map_with(|id, e| Spanned::new(id, span_range(&e.span())));

    let string_literal = select! {
        Token::String(s) => s,
    }
    .map_with(|s, e| Spanned::new(s, span_range(&e.span())));

    let integer = select! {
        Token::Int(n) => n,
    }
    .map_with(|n, e| Spanned::new(n, span_range(&e.span())));

    // Qualified name: identifier { "." identifier }
    let qualified = identifier
        .clone()
        .separated_by(just(Token::Dot))
        .at_least(1)
        .collect::<Vec<_>>()
        .map_with(|segments: Vec<Spanned<Identifier>>, e| {
            Spanned::new(
                QualifiedName::new(segments.into_iter().map(|s| s.node.0).collect()),
                span_range(&e.span()),
            )
        });

    // Annotation argument values; arrays nest
    let value = recursive(|value| {
        choice((
            just(Token::True).to(AnnotationValue::Bool(true)),
            just(Token::False).to(AnnotationValue::Bool(false)),
            just(Token::Minus)
                .ignore_then(integer.clone())
                .map(|n| AnnotationValue::Int(-n.node)),
            integer.clone().map(|n| AnnotationValue::Int(n.node)),
            string_literal.clone().map(|s| AnnotationValue::Str(s.node)),
            value
                .separated_by(just(Token::Comma))
                .allow_trailing()
                .collect::<Vec<_>>()
                .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
                .map(|values: Vec<Spanned<AnnotationValue>>| {
                    AnnotationValue::Array(values.into_iter().map(|v| v.node).collect())
                }),
            // Bare identifiers are enum-like keywords; dotted names reference
            // other declarations
            qualified.clone().map(|q| {
                if q.node.is_simple() {
                    AnnotationValue::Keyword(q.node.simple_name().to_string())
                } else {
                    AnnotationValue::ClassRef(q.node)
                }
            }),
        ))
        .map_with(|v, e| Spanned::new(v, span_range(&e.span())))
    });

    // Annotation: @name or @name(key: value, ...)
    let annotation_arg = identifier
        .clone()
        .then_ignore(just(Token::Colon))
        .then(value.clone());

    let annotation = just(Token::At)
        .ignore_then(qualified.clone())
        .then(
            annotation_arg
                .separated_by(just(Token::Comma))
                .allow_trailing()
                .collect::<Vec<_>>()
                .delimited_by(just(Token::ParenOpen), just(Token::ParenClose))
                .or_not(),
        )
        .map_with(|(name, args), e| {
            Spanned::new(
                Annotation {
                    name,
                    args: args.unwrap_or_default(),
                },
                span_range(&e.span()),
            )
        });

    // Type reference
    let type_ref = qualified
        .clone()
        .map(|q| Spanned::new(TypeRef { name: q.node }, q.span));

    // Function parameter: name: type
    let param = identifier
        .clone()
        .then_ignore(just(Token::Colon))
        .then(type_ref.clone())
        .map_with(|(name, ty), e| Spanned::new(Param { name, ty }, span_range(&e.span())));

    // Field member: field name: type
    let field_decl = annotation
        .clone()
        .repeated()
        .collect::<Vec<_>>()
        .then_ignore(just(Token::Field))
        .then(identifier.clone())
        .then_ignore(just(Token::Colon))
        .then(type_ref.clone())
        .map(|((annotations, name), ty)| FieldDecl {
            annotations,
            name,
            ty,
        });

    // Function member: fn name(params) or fn name(params): type
    let fn_decl = annotation
        .clone()
        .repeated()
        .collect::<Vec<_>>()
        .then_ignore(just(Token::Fn))
        .then(identifier.clone())
        .then(
            param
                .separated_by(just(Token::Comma))
                .allow_trailing()
                .collect::<Vec<_>>()
                .delimited_by(just(Token::ParenOpen), just(Token::ParenClose)),
        )
        .then(just(Token::Colon).ignore_then(type_ref.clone()).or_not())
        .map(|(((annotations, name), params), ret)| FnDecl {
            annotations,
            name,
            params,
            ret,
        });

    // Recursive declaration parser (records may nest records)
    let declaration = recursive(|decl| {
        let kind = choice((
            just(Token::Record).to(DeclKind::Record),
            just(Token::Iface).to(DeclKind::Iface),
            just(Token::Marker).to(DeclKind::Marker),
        ));

        let member = choice((
            field_decl.clone().map(Member::Field),
            fn_decl.clone().map(Member::Function),
            decl.clone()
                .map(|d: Spanned<Declaration>| Member::Nested(d.node)),
        ))
        .map_with(|m, e| Spanned::new(m, span_range(&e.span())));

        annotation
            .clone()
            .repeated()
            .collect::<Vec<_>>()
            .then(kind)
            .then(identifier.clone())
            .then(
                member
                    .repeated()
                    .collect::<Vec<_>>()
                    .delimited_by(just(Token::BraceOpen), just(Token::BraceClose)),
            )
            .map(|(((annotations, kind), name), members)| Declaration {
                kind,
                name,
                annotations,
                members,
            })
            .map_with(|d, e| Spanned::new(d, span_range(&e.span())))
            .boxed()
    });

    // Unit header
    let package = just(Token::Package).ignore_then(qualified.clone());
    let import = just(Token::Use).ignore_then(qualified.clone());

    package
        .or_not()
        .then(import.repeated().collect::<Vec<_>>())
        .then(declaration.repeated().collect::<Vec<_>>())
        .then_ignore(end())
        .map(|((package, imports), declarations)| SourceUnit {
            package,
            imports,
            declarations,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_unit() {
        let unit = parse("").expect("Should parse");
        assert!(unit.package.is_none());
        assert!(unit.declarations.is_empty());
    }

    #[test]
    fn test_parse_package_and_imports() {
        let unit = parse(
            r#"
            package demo.users
            use demo.common.audited
            use demo.base.Identifiable
        "#,
        )
        .expect("Should parse");
        assert_eq!(unit.package_name().unwrap().to_string(), "demo.users");
        assert_eq!(unit.imports.len(), 2);
        assert_eq!(unit.imports[0].node.to_string(), "demo.common.audited");
    }

    #[test]
    fn test_parse_record_with_members() {
        let unit = parse(
            r#"
            package demo

            record User {
                field name: string
                field age: int
                fn describe(): string
            }
        "#,
        )
        .expect("Should parse");
        assert_eq!(unit.declarations.len(), 1);
        let decl = &unit.declarations[0].node;
        assert_eq!(decl.kind, DeclKind::Record);
        assert_eq!(decl.name.node.as_str(), "User");
        assert_eq!(decl.fields().count(), 2);
        assert_eq!(decl.functions().count(), 1);
    }

    #[test]
    fn test_parse_annotations() {
        let unit = parse(
            r#"
            package demo

            @audited
            @prototype(implementation: true, interface: false, base: "/out")
            record User {
                field name: string
            }
        "#,
        )
        .expect("Should parse");
        let decl = &unit.declarations[0].node;
        assert_eq!(decl.annotations.len(), 2);
        let proto = decl.annotation("prototype").expect("Should have prototype");
        assert_eq!(proto.bool_arg("implementation"), Some(true));
        assert_eq!(proto.bool_arg("interface"), Some(false));
        assert_eq!(proto.str_arg("base"), Some("/out"));
    }

    #[test]
    fn test_parse_annotation_value_kinds() {
        let unit = parse(
            r#"
            @meta(flag: true, count: 3, neg: -7, label: "x", mode: strict,
                  target: demo.base.Entity, tags: ["a", "b"])
            record Thing {}
        "#,
        )
        .expect("Should parse");
        let ann = unit.declarations[0].node.annotation("meta").unwrap();
        assert_eq!(ann.arg("flag"), Some(&AnnotationValue::Bool(true)));
        assert_eq!(ann.arg("count"), Some(&AnnotationValue::Int(3)));
        assert_eq!(ann.arg("neg"), Some(&AnnotationValue::Int(-7)));
        assert_eq!(
            ann.arg("label"),
            Some(&AnnotationValue::Str("x".to_string()))
        );
        assert_eq!(
            ann.arg("mode"),
            Some(&AnnotationValue::Keyword("strict".to_string()))
        );
        assert_eq!(
            ann.arg("target"),
            Some(&AnnotationValue::ClassRef(QualifiedName::from_dotted(
                "demo.base.Entity"
            )))
        );
        assert_eq!(
            ann.arg("tags"),
            Some(&AnnotationValue::Array(vec![
                AnnotationValue::Str("a".to_string()),
                AnnotationValue::Str("b".to_string()),
            ]))
        );
    }

    #[test]
    fn test_parse_template_marker_declaration() {
        let unit = parse(
            r#"
            package demo.common

            @template
            marker audited {
                field created_at: long
                field updated_at: long
            }
        "#,
        )
        .expect("Should parse");
        let decl = &unit.declarations[0].node;
        assert_eq!(decl.kind, DeclKind::Marker);
        assert!(decl.is_template());
        assert_eq!(decl.fields().count(), 2);
    }

    #[test]
    fn test_parse_nested_declaration() {
        let unit = parse(
            r#"
            package demo

            @prototype
            record Order {
                field id: string

                @prototype
                record Line {
                    field sku: string
                }
            }
        "#,
        )
        .expect("Should parse");
        let decl = &unit.declarations[0].node;
        assert_eq!(decl.nested().count(), 1);
        let nested = decl.nested().next().unwrap();
        assert_eq!(nested.name.node.as_str(), "Line");
        assert!(nested.has_annotation("prototype"));
    }

    #[test]
    fn test_parse_fn_with_params() {
        let unit = parse(
            r#"
            record Svc {
                fn find(id: string, limit: int): demo.users.User
                fn clear()
            }
        "#,
        )
        .expect("Should parse");
        let decl = &unit.declarations[0].node;
        let find = decl.functions().next().unwrap();
        assert_eq!(find.params.len(), 2);
        assert_eq!(
            find.ret.as_ref().unwrap().node.name.to_string(),
            "demo.users.User"
        );
        let clear = decl.functions().nth(1).unwrap();
        assert!(clear.params.is_empty());
        assert!(clear.ret.is_none());
    }

    #[test]
    fn test_parse_member_annotations() {
        let unit = parse(
            r#"
            record User {
                @indexed
                field name: string
            }
        "#,
        )
        .expect("Should parse");
        let field = unit.declarations[0].node.fields().next().unwrap();
        assert_eq!(field.annotations.len(), 1);
        assert_eq!(field.annotations[0].node.simple_name(), "indexed");
    }

    #[test]
    fn test_parse_error_reports_span() {
        let result = parse("record { }");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_multiple_declarations() {
        let unit = parse(
            r#"
            package demo

            record A {}
            iface B {}
            marker c {}
        "#,
        )
        .expect("Should parse");
        assert_eq!(unit.declarations.len(), 3);
        assert_eq!(unit.declarations[1].node.kind, DeclKind::Iface);
        assert_eq!(unit.declarations[2].node.kind, DeclKind::Marker);
    }
}
