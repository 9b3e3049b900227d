use std::fmt;

use super::error::{BuildError, EvalError, LookupError};
use super::expr::{CompiledExpr, CompiledTemplate};
use super::path::YamlPath;
use super::risk::{
    DataBreachProbability, Risk, RiskExploitationImpact, RiskExploitationLikelihood, RiskSeverity,
};
use super::scope::Scope;
use crate::model::TechnicalAsset;

/// An executable rule body, built once from a YAML value and reused across
/// any number of evaluations.
///
/// # Example
///
/// ```
/// use riskscript::{Model, Program, RiskCategory, Scope, TechnicalAsset};
///
/// let program = Program::from_yaml_str(
///     r#"
/// for:
///   var: asset
///   in: technical_assets
///   do:
///     if:
///       cond: asset.technology.unencrypted-storage
///       then:
///         risk: { title: "Unencrypted storage at {asset.title}" }
/// "#,
/// )
/// .unwrap();
///
/// let category = RiskCategory::new("data-unencrypted");
/// let model = Model::new()
///     .with_asset(TechnicalAsset::new("db1").with_attribute("unencrypted-storage", true))
///     .with_asset(TechnicalAsset::new("db2"));
///
/// let mut scope = Scope::new(&category);
/// scope.bind(&model).unwrap();
/// let risks = program.run(scope).unwrap();
/// assert_eq!(risks.len(), 1);
/// assert_eq!(risks[0].id, "data-unencrypted/db1");
/// ```
#[derive(Debug, Clone)]
pub struct Program {
    pub(crate) path: YamlPath,
    pub(crate) body: Block,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Block {
    pub(crate) stmts: Vec<Stmt>,
}

/// One statement with the location and raw YAML it was built from.
#[derive(Debug, Clone)]
pub(crate) struct Stmt {
    pub(crate) kind: StmtKind,
    pub(crate) path: YamlPath,
    pub(crate) source: serde_yaml::Value,
}

#[derive(Debug, Clone)]
pub(crate) enum StmtKind {
    /// Bindings in evaluation order (dependencies first).
    Let(Vec<Binding>),
    For {
        var: String,
        source: CompiledExpr,
        body: Block,
    },
    If {
        cond: CompiledExpr,
        then: Block,
        otherwise: Option<Block>,
    },
    Risk(Box<RiskTemplate>),
}

#[derive(Debug, Clone)]
pub(crate) struct Binding {
    pub(crate) name: String,
    pub(crate) expr: CompiledExpr,
    pub(crate) path: YamlPath,
}

#[derive(Debug, Clone)]
pub(crate) enum Level<T> {
    Fixed(T),
    Dynamic(CompiledTemplate),
}

#[derive(Debug, Clone, Default)]
pub(crate) struct RiskTemplate {
    pub(crate) assets: Option<Vec<CompiledExpr>>,
    pub(crate) key: Option<CompiledTemplate>,
    pub(crate) title: Option<CompiledTemplate>,
    pub(crate) severity: Option<Level<RiskSeverity>>,
    pub(crate) likelihood: Option<Level<RiskExploitationLikelihood>>,
    pub(crate) impact: Option<Level<RiskExploitationImpact>>,
    pub(crate) data_breach_probability: Option<Level<DataBreachProbability>>,
    pub(crate) data_flow: Option<CompiledExpr>,
    pub(crate) trust_boundary: Option<CompiledExpr>,
}

impl Stmt {
    pub(crate) fn keyword(&self) -> &'static str {
        match self.kind {
            StmtKind::Let(_) => "let",
            StmtKind::For { .. } => "for",
            StmtKind::If { .. } => "if",
            StmtKind::Risk(_) => "risk",
        }
    }

    /// The statement's YAML text, used as the diagnostic fragment.
    pub(crate) fn fragment(&self) -> String {
        serde_yaml::to_string(&self.source).unwrap_or_default()
    }
}

impl Block {
    fn count(&self) -> usize {
        self.stmts
            .iter()
            .map(|stmt| {
                1 + match &stmt.kind {
                    StmtKind::For { body, .. } => body.count(),
                    StmtKind::If {
                        then, otherwise, ..
                    } => then.count() + otherwise.as_ref().map_or(0, Block::count),
                    StmtKind::Let(_) | StmtKind::Risk(_) => 0,
                }
            })
            .sum()
    }
}

impl Program {
    /// Build a program from a decoded YAML value.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] with the path of the first offending node.
    pub fn build(value: &serde_yaml::Value) -> Result<Self, BuildError> {
        crate::build::build_program(value, YamlPath::root())
    }

    /// Decode `text` as YAML and build it.
    ///
    /// # Errors
    ///
    /// Returns [`RiskScriptError::Yaml`](crate::RiskScriptError::Yaml) for
    /// malformed YAML or [`RiskScriptError::Build`](crate::RiskScriptError::Build).
    pub fn from_yaml_str(text: &str) -> Result<Self, crate::RiskScriptError> {
        let value: serde_yaml::Value = serde_yaml::from_str(text)?;
        Ok(Self::build(&value)?)
    }

    /// Evaluate against the scope's bound model, consuming the scope.
    ///
    /// Risks come back in emission order. On error no risk is returned.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError`] carrying the failing statement's path and YAML.
    pub fn run(&self, scope: Scope<'_>) -> Result<Vec<Risk>, EvalError> {
        crate::interpret::run(self, scope)
    }

    /// Re-run the evaluation and return the technical assets implicated by
    /// the risk `risk_id`, in the order they appear in that id.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::NotFound`] if no emission produces `risk_id`,
    /// or [`LookupError::Evaluation`] if the evaluation itself fails.
    pub fn lookup_assets_for_risk<'a>(
        &self,
        scope: Scope<'a>,
        risk_id: &str,
    ) -> Result<Vec<&'a TechnicalAsset>, LookupError> {
        crate::interpret::lookup(self, scope, risk_id)
    }

    /// Total number of statements, nested ones included.
    #[must_use]
    pub fn statement_count(&self) -> usize {
        self.body.count()
    }

    /// Location of the program root inside its source document.
    #[must_use]
    pub fn path(&self) -> &YamlPath {
        &self.path
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "program at {} (", self.path)?;
        for (i, stmt) in self.body.stmts.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", stmt.keyword())?;
        }
        write!(f, ")")
    }
}
