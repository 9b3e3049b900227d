use std::collections::{HashMap, VecDeque};

use serde_yaml::{Mapping, Value as Yaml};
use tracing::trace;

use crate::parse::{parse_expr, parse_template};
use crate::types::{
    Binding, Block, BuildError, BuildErrorKind, Builtin, CompiledExpr, CompiledTemplate,
    CompiledTemplatePart, Expr, Level, Literal, Program, RiskLevel, RiskTemplate, Stmt, StmtKind,
    Template, TemplatePart, YamlPath, RESERVED_NAMES,
};

pub(crate) fn build_program(value: &Yaml, path: YamlPath) -> Result<Program, BuildError> {
    let body = build_block(value, &path)?;
    trace!(path = %path, statements = body.stmts.len(), "program built");
    Ok(Program { path, body })
}

fn yaml_type(value: &Yaml) -> &'static str {
    match value {
        Yaml::Null => "null",
        Yaml::Bool(_) => "bool",
        Yaml::Number(_) => "number",
        Yaml::String(_) => "string",
        Yaml::Sequence(_) => "sequence",
        Yaml::Mapping(_) => "mapping",
        Yaml::Tagged(_) => "tagged value",
    }
}

fn mismatch(path: &YamlPath, expected: &'static str, found: &Yaml) -> BuildError {
    BuildError::new(
        path,
        BuildErrorKind::TypeMismatch {
            expected,
            found: yaml_type(found),
        },
    )
}

fn key_str<'v>(key: &'v Yaml, path: &YamlPath, expected: &'static str) -> Result<&'v str, BuildError> {
    key.as_str().ok_or_else(|| mismatch(path, expected, key))
}

/// A block is a mapping of statements, a sequence of such mappings, or null (empty).
fn build_block(value: &Yaml, path: &YamlPath) -> Result<Block, BuildError> {
    let mut stmts = Vec::new();
    match value {
        Yaml::Null => {}
        Yaml::Mapping(map) => build_statements(map, path, &mut stmts)?,
        Yaml::Sequence(items) => {
            for (i, item) in items.iter().enumerate() {
                let item_path = path.index(i);
                match item {
                    Yaml::Mapping(map) => build_statements(map, &item_path, &mut stmts)?,
                    other => return Err(mismatch(&item_path, "statement mapping", other)),
                }
            }
        }
        other => return Err(mismatch(path, "statement block", other)),
    }
    Ok(Block { stmts })
}

fn build_statements(map: &Mapping, path: &YamlPath, out: &mut Vec<Stmt>) -> Result<(), BuildError> {
    for (key, body) in map {
        let keyword = key_str(key, path, "statement keyword")?;
        let stmt_path = path.key(keyword);
        let kind = match keyword {
            "let" => build_let(body, &stmt_path)?,
            "for" => build_for(body, &stmt_path)?,
            "if" => build_if(body, &stmt_path)?,
            "risk" => StmtKind::Risk(Box::new(build_risk(body, &stmt_path)?)),
            other => {
                return Err(BuildError::new(
                    &stmt_path,
                    BuildErrorKind::UnknownKeyword {
                        keyword: other.to_owned(),
                    },
                ))
            }
        };
        trace!(path = %stmt_path, "statement built");
        let mut source = Mapping::new();
        source.insert(key.clone(), body.clone());
        out.push(Stmt {
            kind,
            path: stmt_path,
            source: Yaml::Mapping(source),
        });
    }
    Ok(())
}

fn body_mapping<'v>(body: &'v Yaml, path: &YamlPath) -> Result<&'v Mapping, BuildError> {
    body.as_mapping()
        .ok_or_else(|| mismatch(path, "mapping", body))
}

/// Collect the fields of a statement body, rejecting unknown ones.
fn fields<'v>(
    map: &'v Mapping,
    path: &YamlPath,
    statement: &'static str,
    allowed: &[&str],
) -> Result<HashMap<&'v str, &'v Yaml>, BuildError> {
    let mut out = HashMap::new();
    for (key, value) in map {
        let name = key_str(key, path, "field name")?;
        if !allowed.contains(&name) {
            return Err(BuildError::new(
                &path.key(name),
                BuildErrorKind::UnknownField {
                    statement,
                    field: name.to_owned(),
                },
            ));
        }
        out.insert(name, value);
    }
    Ok(out)
}

fn required<'v>(
    fields: &HashMap<&str, &'v Yaml>,
    path: &YamlPath,
    statement: &'static str,
    field: &'static str,
) -> Result<&'v Yaml, BuildError> {
    fields
        .get(field)
        .copied()
        .ok_or_else(|| BuildError::new(path, BuildErrorKind::MissingField { statement, field }))
}

fn check_name(name: &str, path: &YamlPath) -> Result<(), BuildError> {
    if RESERVED_NAMES.contains(&name) {
        return Err(BuildError::new(
            path,
            BuildErrorKind::ReservedName {
                name: name.to_owned(),
            },
        ));
    }
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(BuildError::new(
            path,
            BuildErrorKind::InvalidName {
                name: name.to_owned(),
            },
        ))
    }
}

fn build_let(body: &Yaml, path: &YamlPath) -> Result<StmtKind, BuildError> {
    let map = body_mapping(body, path)?;
    let mut bindings = Vec::with_capacity(map.len());
    let mut exprs = Vec::with_capacity(map.len());
    for (key, value) in map {
        let name = key_str(key, path, "variable name")?;
        let binding_path = path.key(name);
        check_name(name, &binding_path)?;
        let expr = build_expr(value, &binding_path)?;
        let compiled = compile_expr(&expr, &binding_path)?;
        exprs.push(expr);
        bindings.push(Binding {
            name: name.to_owned(),
            expr: compiled,
            path: binding_path,
        });
    }

    let order = binding_order(&bindings, &exprs, path)?;
    let mut slots: Vec<Option<Binding>> = bindings.into_iter().map(Some).collect();
    let sorted = order
        .into_iter()
        .filter_map(|i| slots.get_mut(i).and_then(Option::take))
        .collect();
    Ok(StmtKind::Let(sorted))
}

/// Dependencies of binding `i`: the bindings of the same `let` its expression names.
fn binding_deps(bindings: &[Binding], exprs: &[Expr]) -> Vec<Vec<usize>> {
    let index: HashMap<&str, usize> = bindings
        .iter()
        .enumerate()
        .map(|(i, b)| (b.name.as_str(), i))
        .collect();
    exprs
        .iter()
        .map(|expr| {
            expr.free_vars()
                .into_iter()
                .filter_map(|name| index.get(name).copied())
                .collect()
        })
        .collect()
}

/// Kahn's algorithm over the bindings of one `let`, stable in declaration order.
fn binding_order(bindings: &[Binding], exprs: &[Expr], path: &YamlPath) -> Result<Vec<usize>, BuildError> {
    let deps = binding_deps(bindings, exprs);

    // dependents[d] = bindings that must wait for d
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); bindings.len()];
    let mut in_degree: Vec<usize> = vec![0; bindings.len()];
    for (i, ds) in deps.iter().enumerate() {
        for &d in ds {
            dependents[d].push(i);
            in_degree[i] += 1;
        }
    }

    let mut queue: VecDeque<usize> = (0..bindings.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut sorted = Vec::with_capacity(bindings.len());
    while let Some(i) = queue.pop_front() {
        for &dependent in &dependents[i] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                queue.push_back(dependent);
            }
        }
        sorted.push(i);
    }

    if sorted.len() != bindings.len() {
        let cycle = find_cycle(&deps)
            .into_iter()
            .map(|i| bindings[i].name.clone())
            .collect();
        return Err(BuildError::new(path, BuildErrorKind::CyclicBinding { cycle }));
    }
    Ok(sorted)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DfsState {
    Unvisited,
    InStack,
    Done,
}

/// DFS-based cycle finder for error reporting. The first node is repeated at the end.
fn find_cycle(deps: &[Vec<usize>]) -> Vec<usize> {
    let mut state = vec![DfsState::Unvisited; deps.len()];
    let mut stack = Vec::new();
    for node in 0..deps.len() {
        if state[node] == DfsState::Unvisited {
            if let Some(cycle) = dfs(node, deps, &mut state, &mut stack) {
                return cycle;
            }
        }
    }
    Vec::new()
}

fn dfs(
    node: usize,
    deps: &[Vec<usize>],
    state: &mut [DfsState],
    stack: &mut Vec<usize>,
) -> Option<Vec<usize>> {
    state[node] = DfsState::InStack;
    stack.push(node);

    for &next in &deps[node] {
        match state[next] {
            DfsState::InStack => {
                let pos = stack.iter().position(|&n| n == next)?;
                let mut cycle = stack[pos..].to_vec();
                cycle.push(next);
                return Some(cycle);
            }
            DfsState::Unvisited => {
                if let Some(cycle) = dfs(next, deps, state, stack) {
                    return Some(cycle);
                }
            }
            DfsState::Done => {}
        }
    }

    stack.pop();
    state[node] = DfsState::Done;
    None
}

fn build_for(body: &Yaml, path: &YamlPath) -> Result<StmtKind, BuildError> {
    let map = body_mapping(body, path)?;
    let fields = fields(map, path, "for", &["var", "in", "do"])?;

    let var_value = required(&fields, path, "for", "var")?;
    let var_path = path.key("var");
    let var = var_value
        .as_str()
        .ok_or_else(|| mismatch(&var_path, "variable name", var_value))?;
    check_name(var, &var_path)?;

    let in_path = path.key("in");
    let source = build_expr(required(&fields, path, "for", "in")?, &in_path)?;
    let source = compile_expr(&source, &in_path)?;

    let body = build_block(required(&fields, path, "for", "do")?, &path.key("do"))?;

    Ok(StmtKind::For {
        var: var.to_owned(),
        source,
        body,
    })
}

fn build_if(body: &Yaml, path: &YamlPath) -> Result<StmtKind, BuildError> {
    let map = body_mapping(body, path)?;
    let fields = fields(map, path, "if", &["cond", "then", "else"])?;

    let cond_path = path.key("cond");
    let cond = build_expr(required(&fields, path, "if", "cond")?, &cond_path)?;
    let cond = compile_expr(&cond, &cond_path)?;
    let then = build_block(required(&fields, path, "if", "then")?, &path.key("then"))?;
    let otherwise = fields
        .get("else")
        .map(|value| build_block(value, &path.key("else")))
        .transpose()?;

    Ok(StmtKind::If {
        cond,
        then,
        otherwise,
    })
}

const RISK_FIELDS: &[&str] = &[
    "assets",
    "key",
    "title",
    "severity",
    "likelihood",
    "impact",
    "data_breach_probability",
    "data_flow",
    "trust_boundary",
];

fn build_risk(body: &Yaml, path: &YamlPath) -> Result<RiskTemplate, BuildError> {
    let empty = Mapping::new();
    let map = match body {
        Yaml::Null => &empty,
        other => body_mapping(other, path)?,
    };
    let fields = fields(map, path, "risk", RISK_FIELDS)?;

    let field_expr = |name: &str| -> Result<Option<CompiledExpr>, BuildError> {
        fields
            .get(name)
            .map(|value| {
                let p = path.key(name);
                compile_expr(&build_expr(value, &p)?, &p)
            })
            .transpose()
    };
    let field_template = |name: &str| -> Result<Option<CompiledTemplate>, BuildError> {
        fields
            .get(name)
            .map(|value| build_template(value, &path.key(name)))
            .transpose()
    };

    let assets = fields
        .get("assets")
        .map(|value| {
            let p = path.key("assets");
            match value {
                Yaml::Sequence(items) => items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        let ip = p.index(i);
                        compile_expr(&build_expr(item, &ip)?, &ip)
                    })
                    .collect::<Result<Vec<_>, _>>(),
                single => Ok(vec![compile_expr(&build_expr(single, &p)?, &p)?]),
            }
        })
        .transpose()?;

    Ok(RiskTemplate {
        assets,
        key: field_template("key")?,
        title: field_template("title")?,
        severity: build_level(fields.get("severity").copied(), path)?,
        likelihood: build_level(fields.get("likelihood").copied(), path)?,
        impact: build_level(fields.get("impact").copied(), path)?,
        data_breach_probability: build_level(fields.get("data_breach_probability").copied(), path)?,
        data_flow: field_expr("data_flow")?,
        trust_boundary: field_expr("trust_boundary")?,
    })
}

/// A level is a vocabulary word checked now, or a template checked at run time.
fn build_level<T: RiskLevel>(value: Option<&Yaml>, path: &YamlPath) -> Result<Option<Level<T>>, BuildError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let path = path.key(T::FIELD);
    let text = value
        .as_str()
        .ok_or_else(|| mismatch(&path, "level name", value))?;
    if text.contains('{') {
        return Ok(Some(Level::Dynamic(build_template(value, &path)?)));
    }
    T::from_label(text.trim())
        .map(|level| Some(Level::Fixed(level)))
        .ok_or_else(|| {
            BuildError::new(
                &path,
                BuildErrorKind::InvalidLevel {
                    field: T::FIELD,
                    value: text.to_owned(),
                },
            )
        })
}

fn build_template(value: &Yaml, path: &YamlPath) -> Result<CompiledTemplate, BuildError> {
    let template = match value {
        Yaml::String(text) => parse_template(text).map_err(|e| BuildError::new(path, e.into()))?,
        Yaml::Bool(b) => Template::text(b.to_string()),
        Yaml::Number(n) => Template::text(n.to_string()),
        other => return Err(mismatch(path, "text", other)),
    };
    let parts = template
        .parts
        .iter()
        .map(|part| match part {
            TemplatePart::Text(text) => Ok(CompiledTemplatePart::Text(text.clone())),
            TemplatePart::Expr(expr) => compile_expr(expr, path).map(CompiledTemplatePart::Expr),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CompiledTemplate { parts })
}

/// Turn a YAML node into an expression.
fn build_expr(value: &Yaml, path: &YamlPath) -> Result<Expr, BuildError> {
    match value {
        Yaml::Null => Ok(Expr::Literal(Literal::Null)),
        Yaml::Bool(b) => Ok(Expr::Literal(Literal::Bool(*b))),
        Yaml::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Ok(Expr::Literal(Literal::Int(i))),
            (None, Some(f)) => Ok(Expr::Literal(Literal::Float(f))),
            (None, None) => Err(mismatch(path, "number", value)),
        },
        Yaml::String(text) => parse_expr(text).map_err(|e| BuildError::new(path, e.into())),
        Yaml::Sequence(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| build_expr(item, &path.index(i)))
            .collect::<Result<Vec<_>, _>>()
            .map(Expr::List),
        Yaml::Mapping(map) => build_operator(map, path),
        Yaml::Tagged(_) => Err(mismatch(path, "expression", value)),
    }
}

/// `all: [..]`, `any: [..]` or `not: expr`.
fn build_operator(map: &Mapping, path: &YamlPath) -> Result<Expr, BuildError> {
    if map.len() != 1 {
        return Err(BuildError::new(
            path,
            BuildErrorKind::AmbiguousExpression { found: map.len() },
        ));
    }
    let Some((key, operand)) = map.iter().next() else {
        return Err(BuildError::new(path, BuildErrorKind::AmbiguousExpression { found: 0 }));
    };
    let name = key_str(key, path, "operator name")?;
    let op_path = path.key(name);
    match name {
        "not" => Ok(Expr::Not(Box::new(build_expr(operand, &op_path)?))),
        "all" | "any" => {
            let items = operand
                .as_sequence()
                .ok_or_else(|| mismatch(&op_path, "sequence", operand))?;
            let mut operands = items
                .iter()
                .enumerate()
                .map(|(i, item)| build_expr(item, &op_path.index(i)));
            let is_all = name == "all";
            let Some(first) = operands.next().transpose()? else {
                return Ok(Expr::Literal(Literal::Bool(is_all)));
            };
            operands.try_fold(first, |acc, next: Result<Expr, BuildError>| {
                let next = next?;
                Ok(if is_all { acc.and(next) } else { acc.or(next) })
            })
        }
        other => Err(BuildError::new(
            &op_path,
            BuildErrorKind::UnknownOperator {
                name: other.to_owned(),
            },
        )),
    }
}

/// Resolve function names and check arity.
fn compile_expr(expr: &Expr, path: &YamlPath) -> Result<CompiledExpr, BuildError> {
    let boxed = |e: &Expr| compile_expr(e, path).map(Box::new);
    Ok(match expr {
        Expr::Literal(lit) => CompiledExpr::Literal(lit.clone()),
        Expr::Var(name) => CompiledExpr::Var(name.clone()),
        Expr::Collection(c) => CompiledExpr::Collection(*c),
        Expr::Category => CompiledExpr::Category,
        Expr::Member(inner, name) => CompiledExpr::Member(boxed(inner)?, name.clone()),
        Expr::Call(name, args) => {
            let builtin = Builtin::from_name(name).ok_or_else(|| {
                BuildError::new(path, BuildErrorKind::UnknownFunction { name: name.clone() })
            })?;
            if args.len() != builtin.arity() {
                return Err(BuildError::new(
                    path,
                    BuildErrorKind::Arity {
                        name: builtin.name(),
                        expected: builtin.arity(),
                        found: args.len(),
                    },
                ));
            }
            let args = args
                .iter()
                .map(|a| compile_expr(a, path))
                .collect::<Result<Vec<_>, _>>()?;
            CompiledExpr::Call(builtin, args)
        }
        Expr::List(items) => CompiledExpr::List(
            items
                .iter()
                .map(|i| compile_expr(i, path))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Expr::Not(inner) => CompiledExpr::Not(boxed(inner)?),
        Expr::And(a, b) => CompiledExpr::And(boxed(a)?, boxed(b)?),
        Expr::Or(a, b) => CompiledExpr::Or(boxed(a)?, boxed(b)?),
        Expr::Compare { lhs, op, rhs } => CompiledExpr::Compare {
            lhs: boxed(lhs)?,
            op: *op,
            rhs: boxed(rhs)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(text: &str) -> Result<Program, BuildError> {
        let value: Yaml = serde_yaml::from_str(text).unwrap();
        build_program(&value, YamlPath::root())
    }

    fn let_order(program: &Program) -> Vec<String> {
        match &program.body.stmts[0].kind {
            StmtKind::Let(bindings) => bindings.iter().map(|b| b.name.clone()).collect(),
            other => panic!("expected let, got {other:?}"),
        }
    }

    #[test]
    fn let_bindings_sorted_by_dependency() {
        let program = build("let: { c: b && a, b: a, a: true, d: 1 }").unwrap();
        assert_eq!(let_order(&program), vec!["a", "d", "b", "c"]);
    }

    #[test]
    fn let_two_node_cycle() {
        let err = build("let: { a: b, b: a }").unwrap_err();
        match err.kind {
            BuildErrorKind::CyclicBinding { cycle } => assert_eq!(cycle, vec!["a", "b", "a"]),
            other => panic!("expected cycle, got {other:?}"),
        }
        assert_eq!(err.path.to_string(), "let");
    }

    #[test]
    fn let_self_reference_is_a_cycle() {
        let err = build("let: { a: a.id }").unwrap_err();
        assert!(matches!(err.kind, BuildErrorKind::CyclicBinding { ref cycle } if cycle == &["a", "a"]));
    }

    #[test]
    fn let_three_node_cycle_repeats_start() {
        let err = build("let: { a: b, b: c, c: a, d: 1 }").unwrap_err();
        match err.kind {
            BuildErrorKind::CyclicBinding { cycle } => {
                assert_eq!(cycle.len(), 4);
                assert_eq!(cycle.first(), cycle.last());
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn unknown_keyword_with_path() {
        let err = build("- let: { x: 1 }\n- loop: {}\n").unwrap_err();
        assert!(matches!(err.kind, BuildErrorKind::UnknownKeyword { ref keyword } if keyword == "loop"));
        assert_eq!(err.path.to_string(), "[1].loop");
    }

    #[test]
    fn loop_body_must_be_block() {
        let err = build("for: { var: a, in: technical_assets, do: 42 }").unwrap_err();
        assert!(matches!(
            err.kind,
            BuildErrorKind::TypeMismatch {
                expected: "statement block",
                found: "number"
            }
        ));
        assert_eq!(err.path.to_string(), "for.do");
    }

    #[test]
    fn missing_and_unknown_fields() {
        let err = build("for: { var: a, do: {} }").unwrap_err();
        assert!(matches!(
            err.kind,
            BuildErrorKind::MissingField {
                statement: "for",
                field: "in"
            }
        ));
        let err = build("if: { cond: true, then: {}, otherwise: {} }").unwrap_err();
        assert!(matches!(err.kind, BuildErrorKind::UnknownField { statement: "if", .. }));
    }

    #[test]
    fn reserved_and_invalid_names() {
        let err = build("for: { var: technical_assets, in: data_flows, do: {} }").unwrap_err();
        assert!(matches!(err.kind, BuildErrorKind::ReservedName { .. }));
        let err = build("let: { '1x': 1 }").unwrap_err();
        assert!(matches!(err.kind, BuildErrorKind::InvalidName { .. }));
    }

    #[test]
    fn unknown_function_and_arity() {
        let err = build("let: { n: size(technical_assets) }").unwrap_err();
        assert!(matches!(err.kind, BuildErrorKind::UnknownFunction { .. }));
        let err = build("let: { n: count(technical_assets, data_flows) }").unwrap_err();
        assert!(matches!(
            err.kind,
            BuildErrorKind::Arity {
                name: "count",
                expected: 1,
                found: 2
            }
        ));
        assert_eq!(err.path.to_string(), "let.n");
    }

    #[test]
    fn syntax_error_located() {
        let err = build("if: { cond: 'a &&', then: {} }").unwrap_err();
        assert!(matches!(err.kind, BuildErrorKind::Syntax(_)));
        assert_eq!(err.path.to_string(), "if.cond");
    }

    #[test]
    fn invalid_level_word() {
        let err = build("risk: { severity: severe }").unwrap_err();
        assert!(matches!(
            err.kind,
            BuildErrorKind::InvalidLevel { field: "severity", .. }
        ));
        assert_eq!(err.path.to_string(), "risk.severity");
        assert!(build("risk: { severity: '{category.id}' }").is_ok());
    }

    #[test]
    fn structured_operators() {
        let program = build(
            r"
if:
  cond:
    all:
      - a.internet
      - any: [a.out_of_scope, { not: a.redundant }]
  then: {}
",
        )
        .unwrap();
        assert_eq!(program.statement_count(), 1);

        let err = build("if: { cond: { some: [] }, then: {} }").unwrap_err();
        assert!(matches!(err.kind, BuildErrorKind::UnknownOperator { .. }));
        let err = build("if: { cond: { all: [], any: [] }, then: {} }").unwrap_err();
        assert!(matches!(err.kind, BuildErrorKind::AmbiguousExpression { found: 2 }));
    }

    #[test]
    fn empty_all_is_true_and_empty_any_is_false() {
        assert_eq!(
            build_expr(&serde_yaml::from_str("all: []").unwrap(), &YamlPath::root()).unwrap(),
            Expr::Literal(Literal::Bool(true))
        );
        assert_eq!(
            build_expr(&serde_yaml::from_str("any: []").unwrap(), &YamlPath::root()).unwrap(),
            Expr::Literal(Literal::Bool(false))
        );
    }

    #[test]
    fn scalar_block_rejected_at_root() {
        let err = build("just a string").unwrap_err();
        assert!(err.path.is_root());
    }
}
