use winnow::combinator::{alt, cut_err, delimited, opt, preceded, repeat, separated};
use winnow::error::{ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::stream::Stream;
use winnow::token::{any, take_till, take_while};

use crate::types::{Collection, CompareOp, Expr, Literal, Template, TemplatePart};

// -- Whitespace -------------------------------------------------------------

fn ws(input: &mut &str) -> ModalResult<()> {
    take_while(0.., |c: char| c.is_whitespace())
        .void()
        .parse_next(input)
}

// -- Identifiers ------------------------------------------------------------

/// Identifiers may contain `-` after the first character so that technology
/// attributes such as `unencrypted-storage` read naturally as members.
fn ident<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        take_while(1, |c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| {
            c.is_ascii_alphanumeric() || c == '_' || c == '-'
        }),
    )
        .take()
        .parse_next(input)
}

// -- Literals ---------------------------------------------------------------

fn string_literal(input: &mut &str) -> ModalResult<String> {
    let quote = alt(('"', '\'')).parse_next(input)?;
    let mut s = String::new();
    loop {
        let ch = cut_err(any)
            .context(StrContext::Expected(StrContextValue::Description(
                "closing quote",
            )))
            .parse_next(input)?;
        match ch {
            c if c == quote => return Ok(s),
            '\\' => {
                let esc = cut_err(any).parse_next(input)?;
                match esc {
                    '"' => s.push('"'),
                    '\'' => s.push('\''),
                    '\\' => s.push('\\'),
                    'n' => s.push('\n'),
                    't' => s.push('\t'),
                    other => {
                        s.push('\\');
                        s.push(other);
                    }
                }
            }
            c => s.push(c),
        }
    }
}

fn digits<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    take_while(1.., |c: char| c.is_ascii_digit()).parse_next(input)
}

fn number(input: &mut &str) -> ModalResult<Literal> {
    alt((
        (opt('-'), digits, '.', digits)
            .take()
            .try_map(|s: &str| s.parse::<f64>())
            .map(Literal::Float),
        (opt('-'), digits)
            .take()
            .try_map(|s: &str| s.parse::<i64>())
            .map(Literal::Int),
    ))
    .parse_next(input)
}

// -- Comparison operators ---------------------------------------------------

fn compare_op(input: &mut &str) -> ModalResult<CompareOp> {
    alt((
        ">=".value(CompareOp::Gte),
        ">".value(CompareOp::Gt),
        "<=".value(CompareOp::Lte),
        "<".value(CompareOp::Lt),
        "==".value(CompareOp::Eq),
        "!=".value(CompareOp::Neq),
    ))
    .parse_next(input)
}

// -- Expressions (precedence: OR < AND < NOT < comparison < member) --------

fn arguments(input: &mut &str) -> ModalResult<Vec<Expr>> {
    let args: Vec<Expr> = separated(0.., expr, (ws, ',')).parse_next(input)?;
    ws.parse_next(input)?;
    Ok(args)
}

fn name_or_call(input: &mut &str) -> ModalResult<Expr> {
    let name = ident.parse_next(input)?;
    match name {
        "true" => return Ok(Expr::Literal(Literal::Bool(true))),
        "false" => return Ok(Expr::Literal(Literal::Bool(false))),
        "null" => return Ok(Expr::Literal(Literal::Null)),
        _ => {}
    }

    let checkpoint = input.checkpoint();
    ws.parse_next(input)?;
    if opt('(').parse_next(input)?.is_some() {
        let args = arguments(input)?;
        cut_err(')')
            .context(StrContext::Expected(StrContextValue::CharLiteral(')')))
            .parse_next(input)?;
        return Ok(Expr::Call(name.to_owned(), args));
    }
    input.reset(&checkpoint);

    if name == "category" {
        return Ok(Expr::Category);
    }
    Ok(Collection::from_name(name).map_or_else(|| Expr::Var(name.to_owned()), Expr::Collection))
}

fn list(input: &mut &str) -> ModalResult<Expr> {
    '['.parse_next(input)?;
    let items = arguments(input)?;
    cut_err(']')
        .context(StrContext::Expected(StrContextValue::CharLiteral(']')))
        .parse_next(input)?;
    Ok(Expr::List(items))
}

fn primary(input: &mut &str) -> ModalResult<Expr> {
    ws.parse_next(input)?;
    alt((
        delimited('(', expr, (ws, cut_err(')'))),
        list,
        string_literal.map(|s| Expr::Literal(Literal::String(s))),
        number.map(Expr::Literal),
        name_or_call,
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "expression",
    )))
    .parse_next(input)
}

fn postfix(input: &mut &str) -> ModalResult<Expr> {
    let mut expr = primary(input)?;
    loop {
        let checkpoint = input.checkpoint();
        ws.parse_next(input)?;
        if opt('.').parse_next(input)?.is_none() {
            input.reset(&checkpoint);
            return Ok(expr);
        }
        let name = cut_err(ident)
            .context(StrContext::Expected(StrContextValue::Description(
                "member name",
            )))
            .parse_next(input)?;
        expr = Expr::Member(Box::new(expr), name.to_owned());
    }
}

fn comparison(input: &mut &str) -> ModalResult<Expr> {
    let lhs = postfix(input)?;
    let checkpoint = input.checkpoint();
    ws.parse_next(input)?;
    match opt(compare_op).parse_next(input)? {
        Some(op) => {
            let rhs = cut_err(postfix).parse_next(input)?;
            Ok(Expr::Compare {
                lhs: Box::new(lhs),
                op,
                rhs: Box::new(rhs),
            })
        }
        None => {
            input.reset(&checkpoint);
            Ok(lhs)
        }
    }
}

fn unary(input: &mut &str) -> ModalResult<Expr> {
    ws.parse_next(input)?;
    if opt('!').parse_next(input)?.is_some() {
        let inner = cut_err(unary).parse_next(input)?;
        Ok(Expr::Not(Box::new(inner)))
    } else {
        comparison(input)
    }
}

fn and_expr(input: &mut &str) -> ModalResult<Expr> {
    let first = unary(input)?;
    let rest: Vec<Expr> = repeat(0.., preceded((ws, "&&"), cut_err(unary))).parse_next(input)?;
    Ok(rest
        .into_iter()
        .fold(first, |acc, r| Expr::And(Box::new(acc), Box::new(r))))
}

fn or_expr(input: &mut &str) -> ModalResult<Expr> {
    let first = and_expr(input)?;
    let rest: Vec<Expr> =
        repeat(0.., preceded((ws, "||"), cut_err(and_expr))).parse_next(input)?;
    Ok(rest
        .into_iter()
        .fold(first, |acc, r| Expr::Or(Box::new(acc), Box::new(r))))
}

fn expr(input: &mut &str) -> ModalResult<Expr> {
    ws.parse_next(input)?;
    or_expr(input)
}

// -- Top-level parsers ------------------------------------------------------

pub(crate) fn expression(input: &mut &str) -> ModalResult<Expr> {
    let parsed = expr(input)?;
    ws.parse_next(input)?;
    Ok(parsed)
}

fn template_part(input: &mut &str) -> ModalResult<TemplatePart> {
    alt((
        "{{".value(TemplatePart::Text("{".to_owned())),
        "}}".value(TemplatePart::Text("}".to_owned())),
        delimited('{', cut_err(expr), (ws, cut_err('}'))).map(TemplatePart::Expr),
        take_till(1.., ['{', '}']).map(|s: &str| TemplatePart::Text(s.to_owned())),
    ))
    .parse_next(input)
}

pub(crate) fn template(input: &mut &str) -> ModalResult<Template> {
    let raw: Vec<TemplatePart> = repeat(0.., template_part).parse_next(input)?;
    let mut parts: Vec<TemplatePart> = Vec::with_capacity(raw.len());
    for part in raw {
        match (parts.last_mut(), part) {
            (Some(TemplatePart::Text(prev)), TemplatePart::Text(next)) => prev.push_str(&next),
            (_, part) => parts.push(part),
        }
    }
    Ok(Template { parts })
}

#[cfg(test)]
mod tests {
    use crate::parse::{parse_expr, parse_template};

    use super::*;

    fn var(name: &str) -> Expr {
        Expr::var(name)
    }

    #[test]
    fn parse_variable() {
        assert_eq!(parse_expr("asset").unwrap(), var("asset"));
    }

    #[test]
    fn parse_member_chain_with_hyphen() {
        let result = parse_expr("asset.technology.unencrypted-storage").unwrap();
        assert_eq!(
            result,
            var("asset").member("technology").member("unencrypted-storage")
        );
    }

    #[test]
    fn parse_reserved_roots() {
        assert_eq!(
            parse_expr("technical_assets").unwrap(),
            Expr::Collection(Collection::TechnicalAssets)
        );
        assert_eq!(
            parse_expr("category.id").unwrap(),
            Expr::Category.member("id")
        );
    }

    #[test]
    fn parse_and_or_precedence() {
        let result = parse_expr("a || b && c").unwrap();
        match result {
            Expr::Or(left, right) => {
                assert_eq!(*left, var("a"));
                assert!(matches!(*right, Expr::And(_, _)));
            }
            other => panic!("expected Or, got {other:?}"),
        }
    }

    #[test]
    fn parse_parenthesized_grouping() {
        let result = parse_expr("(a || b) && c").unwrap();
        match result {
            Expr::And(left, right) => {
                assert!(matches!(*left, Expr::Or(_, _)));
                assert_eq!(*right, var("c"));
            }
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn parse_not_binds_tighter_than_and() {
        let result = parse_expr("!a.out_of_scope && b").unwrap();
        match result {
            Expr::And(left, _) => assert!(matches!(*left, Expr::Not(_))),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn parse_all_comparison_ops() {
        let ops = [
            ("==", CompareOp::Eq),
            ("!=", CompareOp::Neq),
            (">", CompareOp::Gt),
            (">=", CompareOp::Gte),
            ("<", CompareOp::Lt),
            ("<=", CompareOp::Lte),
        ];
        for (sym, expected_op) in ops {
            let input = format!("x {sym} 1");
            match parse_expr(&input).unwrap() {
                Expr::Compare { op, .. } => assert_eq!(op, expected_op, "failed for {sym}"),
                other => panic!("expected Compare for {sym}, got {other:?}"),
            }
        }
    }

    #[test]
    fn parse_all_literal_types() {
        let cases = [
            ("42", Literal::Int(42)),
            ("-7", Literal::Int(-7)),
            ("3.5", Literal::Float(3.5)),
            ("true", Literal::Bool(true)),
            ("false", Literal::Bool(false)),
            ("null", Literal::Null),
            (r#""hello""#, Literal::String("hello".into())),
            ("'single'", Literal::String("single".into())),
        ];
        for (literal, expected) in cases {
            assert_eq!(
                parse_expr(literal).unwrap(),
                Expr::Literal(expected),
                "failed for {literal}"
            );
        }
    }

    #[test]
    fn parse_string_with_escapes() {
        let result = parse_expr(r#""a\"b\\c""#).unwrap();
        assert_eq!(result, Expr::Literal(Literal::String("a\"b\\c".into())));
    }

    #[test]
    fn parse_call_and_list() {
        let result = parse_expr("contains(asset.tags, 'pci') || count([a, b]) > 1").unwrap();
        match result {
            Expr::Or(left, right) => {
                assert!(matches!(*left, Expr::Call(ref name, ref args) if name == "contains" && args.len() == 2));
                assert!(matches!(*right, Expr::Compare { op: CompareOp::Gt, .. }));
            }
            other => panic!("expected Or, got {other:?}"),
        }
    }

    #[test]
    fn parse_empty_call_and_list() {
        assert_eq!(parse_expr("f()").unwrap(), Expr::Call("f".into(), vec![]));
        assert_eq!(parse_expr("[ ]").unwrap(), Expr::List(vec![]));
    }

    #[test]
    fn identifier_prefixed_with_keyword_is_a_variable() {
        assert_eq!(parse_expr("nullable").unwrap(), var("nullable"));
        assert_eq!(parse_expr("trueish").unwrap(), var("trueish"));
    }

    #[test]
    fn surrounding_whitespace_ignored() {
        assert_eq!(parse_expr("  asset.id   ").unwrap(), var("asset").member("id"));
    }

    #[test]
    fn reject_trailing_operator() {
        assert!(parse_expr("a &&").is_err());
    }

    #[test]
    fn reject_unterminated_string() {
        assert!(parse_expr("\"open").is_err());
    }

    #[test]
    fn reject_trailing_garbage() {
        let err = parse_expr("a b").unwrap_err();
        assert_eq!(err.offset(), 2);
    }

    #[test]
    fn template_with_interpolation() {
        let t = parse_template("Unencrypted {asset.title} ({asset.id})").unwrap();
        assert_eq!(
            t.parts,
            vec![
                TemplatePart::Text("Unencrypted ".into()),
                TemplatePart::Expr(var("asset").member("title")),
                TemplatePart::Text(" (".into()),
                TemplatePart::Expr(var("asset").member("id")),
                TemplatePart::Text(")".into()),
            ]
        );
    }

    #[test]
    fn template_brace_escapes_merge_with_text() {
        let t = parse_template("a {{literal}} b").unwrap();
        assert_eq!(t.parts, vec![TemplatePart::Text("a {literal} b".into())]);
    }

    #[test]
    fn template_empty() {
        assert!(parse_template("").unwrap().parts.is_empty());
    }

    #[test]
    fn template_rejects_unclosed_interpolation() {
        assert!(parse_template("at {asset.id").is_err());
        assert!(parse_template("stray } brace").is_err());
    }
}
