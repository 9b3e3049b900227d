use std::fmt;

/// Comparison operators supported in rule expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Literal constants: YAML scalars and literals written in expression strings.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// Model collections addressable by name from any rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    TechnicalAssets,
    DataFlows,
    TrustBoundaries,
    DataAssets,
}

/// User-facing expression AST produced by the parser. Function names are
/// plain strings; they are resolved into [`CompiledExpr`] by the builder.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Var(String),
    Collection(Collection),
    Category,
    Member(Box<Expr>, String),
    Call(String, Vec<Expr>),
    List(Vec<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        lhs: Box<Expr>,
        op: CompareOp,
        rhs: Box<Expr>,
    },
}

/// Functions callable from expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// `count(list)`
    Count,
    /// `contains(list, item)`
    Contains,
    /// `has_tag(entity, tag)`
    HasTag,
    /// `tagged(list, tag)`: the entities of `list` carrying `tag`, order kept.
    Tagged,
    /// `with_attribute(list, attr)`: the assets of `list` whose technology has `attr`.
    WithAttribute,
    /// `assets_with_attribute(attr)`: all assets whose technology has `attr`, by id.
    AssetsWithAttribute,
}

/// Expression with function calls resolved. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CompiledExpr {
    Literal(Literal),
    Var(String),
    Collection(Collection),
    Category,
    Member(Box<CompiledExpr>, String),
    Call(Builtin, Vec<CompiledExpr>),
    List(Vec<CompiledExpr>),
    Not(Box<CompiledExpr>),
    And(Box<CompiledExpr>, Box<CompiledExpr>),
    Or(Box<CompiledExpr>, Box<CompiledExpr>),
    Compare {
        lhs: Box<CompiledExpr>,
        op: CompareOp,
        rhs: Box<CompiledExpr>,
    },
}

/// A piece of a text template.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Text(String),
    Expr(Expr),
}

/// Text with `{expr}` interpolations, as written in `title:` or `key:`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    pub parts: Vec<TemplatePart>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CompiledTemplatePart {
    Text(String),
    Expr(CompiledExpr),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct CompiledTemplate {
    pub(crate) parts: Vec<CompiledTemplatePart>,
}

/// Names that always refer to built-in roots and cannot be bound by `let` or `for`.
pub const RESERVED_NAMES: &[&str] = &[
    "technical_assets",
    "data_flows",
    "trust_boundaries",
    "data_assets",
    "category",
    "true",
    "false",
    "null",
];

impl Collection {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "technical_assets" => Some(Collection::TechnicalAssets),
            "data_flows" => Some(Collection::DataFlows),
            "trust_boundaries" => Some(Collection::TrustBoundaries),
            "data_assets" => Some(Collection::DataAssets),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Collection::TechnicalAssets => "technical_assets",
            Collection::DataFlows => "data_flows",
            Collection::TrustBoundaries => "trust_boundaries",
            Collection::DataAssets => "data_assets",
        }
    }
}

impl Builtin {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "count" => Some(Builtin::Count),
            "contains" => Some(Builtin::Contains),
            "has_tag" => Some(Builtin::HasTag),
            "tagged" => Some(Builtin::Tagged),
            "with_attribute" => Some(Builtin::WithAttribute),
            "assets_with_attribute" => Some(Builtin::AssetsWithAttribute),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Count => "count",
            Builtin::Contains => "contains",
            Builtin::HasTag => "has_tag",
            Builtin::Tagged => "tagged",
            Builtin::WithAttribute => "with_attribute",
            Builtin::AssetsWithAttribute => "assets_with_attribute",
        }
    }

    #[must_use]
    pub fn arity(self) -> usize {
        match self {
            Builtin::Count | Builtin::AssetsWithAttribute => 1,
            Builtin::Contains | Builtin::HasTag | Builtin::Tagged | Builtin::WithAttribute => 2,
        }
    }
}

impl Expr {
    #[must_use]
    pub fn var(name: impl Into<String>) -> Expr {
        Expr::Var(name.into())
    }

    #[must_use]
    pub fn member(self, name: impl Into<String>) -> Expr {
        Expr::Member(Box::new(self), name.into())
    }

    #[must_use]
    pub fn and(self, other: Expr) -> Expr {
        Expr::And(Box::new(self), Box::new(other))
    }

    #[must_use]
    pub fn or(self, other: Expr) -> Expr {
        Expr::Or(Box::new(self), Box::new(other))
    }

    /// Root variable names referenced by this expression, in first-use order.
    #[must_use]
    pub fn free_vars(&self) -> Vec<&str> {
        let mut out = Vec::new();
        collect_vars(self, &mut out);
        out
    }
}

fn collect_vars<'e>(expr: &'e Expr, out: &mut Vec<&'e str>) {
    match expr {
        Expr::Var(name) => {
            if !out.contains(&name.as_str()) {
                out.push(name);
            }
        }
        Expr::Member(inner, _) | Expr::Not(inner) => collect_vars(inner, out),
        Expr::Call(_, args) | Expr::List(args) => {
            for arg in args {
                collect_vars(arg, out);
            }
        }
        Expr::And(a, b) | Expr::Or(a, b) => {
            collect_vars(a, out);
            collect_vars(b, out);
        }
        Expr::Compare { lhs, rhs, .. } => {
            collect_vars(lhs, out);
            collect_vars(rhs, out);
        }
        Expr::Literal(_) | Expr::Collection(_) | Expr::Category => {}
    }
}

impl Template {
    /// A template consisting of a single literal text part.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![TemplatePart::Text(text.into())],
        }
    }

    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.parts
            .iter()
            .all(|part| matches!(part, TemplatePart::Text(_)))
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "=="),
            CompareOp::Neq => write!(f, "!="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Gte => write!(f, ">="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Lte => write!(f, "<="),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Bool(v) => write!(f, "{v}"),
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Float(v) => write!(f, "{v}"),
            Literal::String(v) => write!(f, "{v:?}"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(lit) => write!(f, "{lit}"),
            Expr::Var(name) => write!(f, "{name}"),
            Expr::Collection(c) => write!(f, "{}", c.name()),
            Expr::Category => write!(f, "category"),
            Expr::Member(inner, name) => write!(f, "{inner}.{name}"),
            Expr::Call(name, args) => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Expr::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Expr::Not(inner) => write!(f, "!{inner}"),
            Expr::And(a, b) => write!(f, "({a} && {b})"),
            Expr::Or(a, b) => write!(f, "({a} || {b})"),
            Expr::Compare { lhs, op, rhs } => write!(f, "({lhs} {op} {rhs})"),
        }
    }
}
