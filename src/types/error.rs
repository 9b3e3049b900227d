use thiserror::Error;

use super::path::YamlPath;
use crate::parse::ParseError;

/// A malformed rule program, located by its YAML path.
#[derive(Debug, Error)]
#[error("{path}: {kind}")]
pub struct BuildError {
    pub path: YamlPath,
    pub kind: BuildErrorKind,
}

#[derive(Debug, Error)]
pub enum BuildErrorKind {
    #[error("unknown statement keyword '{keyword}'")]
    UnknownKeyword { keyword: String },

    #[error("unknown field '{field}' in '{statement}'")]
    UnknownField {
        statement: &'static str,
        field: String,
    },

    #[error("missing required field '{field}' in '{statement}'")]
    MissingField {
        statement: &'static str,
        field: &'static str,
    },

    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("cyclic binding detected: {}", cycle.join(" -> "))]
    CyclicBinding { cycle: Vec<String> },

    #[error("'{name}' is reserved and cannot be bound")]
    ReservedName { name: String },

    #[error("'{name}' is not a valid variable name")]
    InvalidName { name: String },

    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("function '{name}' expects {expected} argument(s), got {found}")]
    Arity {
        name: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("unknown expression operator '{name}'")]
    UnknownOperator { name: String },

    #[error("expression mapping must have exactly one key, found {found}")]
    AmbiguousExpression { found: usize },

    #[error("invalid {field} '{value}'")]
    InvalidLevel { field: &'static str, value: String },

    #[error(transparent)]
    Syntax(#[from] ParseError),
}

impl BuildError {
    pub(crate) fn new(path: &YamlPath, kind: BuildErrorKind) -> Self {
        Self {
            path: path.clone(),
            kind,
        }
    }
}

/// The model cannot be bound to a scope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("a model is already bound to this scope")]
    AlreadyBound,

    #[error("{collection} entry '{key}' declares mismatching id '{id}'")]
    KeyMismatch {
        collection: &'static str,
        key: String,
        id: String,
    },

    #[error("data flow '{flow}' is declared on asset '{asset}' but names source '{source_id}'")]
    FlowSourceMismatch {
        flow: String,
        asset: String,
        source_id: String,
    },

    #[error("data flow '{flow}' targets unknown technical asset '{target}'")]
    UnknownFlowTarget { flow: String, target: String },

    #[error("duplicate data flow id '{flow}'")]
    DuplicateFlow { flow: String },

    #[error("'{owner}' references unknown data asset '{data_asset}'")]
    UnknownDataAsset { owner: String, data_asset: String },

    #[error("trust boundary '{boundary}' references unknown technical asset '{asset}'")]
    UnknownBoundaryAsset { boundary: String, asset: String },

    #[error("trust boundary '{boundary}' nests unknown trust boundary '{nested}'")]
    UnknownNestedBoundary { boundary: String, nested: String },

    #[error("technical asset '{asset}' is inside both '{first}' and '{second}'")]
    AssetInMultipleBoundaries {
        asset: String,
        first: String,
        second: String,
    },
}

/// A runtime failure, carrying the statement that was executing.
///
/// `fragment` is the YAML text of the innermost failing statement;
/// `path` locates it in the rule program.
#[derive(Debug, Clone, Error)]
#[error("{kind} (at {path})")]
pub struct EvalError {
    pub path: YamlPath,
    pub fragment: String,
    pub kind: EvalErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalErrorKind {
    #[error("no model is bound to the scope")]
    ModelNotBound,

    #[error("unbound variable '{name}'")]
    UnboundVariable { name: String },

    #[error("{found} has no member '{member}'")]
    UnknownMember { member: String, found: &'static str },

    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("cannot compare {lhs} {op} {rhs}")]
    Incomparable {
        lhs: &'static str,
        op: String,
        rhs: &'static str,
    },

    #[error("risk implicates no technical asset")]
    NoAssets,

    #[error("risk id '{id}' emitted twice")]
    DuplicateRiskId { id: String },

    #[error("invalid {field} '{value}'")]
    InvalidLevel { field: &'static str, value: String },
}

impl EvalError {
    /// The error message without location.
    #[must_use]
    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

/// A reverse lookup could not resolve the requested risk id.
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    #[error("no risk '{risk_id}' is produced by category '{category}'")]
    NotFound { risk_id: String, category: String },

    #[error(transparent)]
    Evaluation(#[from] EvalError),
}
