//! Interpreter for YAML-authored threat-model risk rules.
//!
//! A rule's `risk:` body is built once into an immutable [`Program`], bound
//! to a [`Scope`] carrying a [`RiskCategory`] and an architecture [`Model`],
//! and run to produce [`Risk`]s with reproducible identifiers. The same
//! program answers the reverse question of which technical assets a given
//! risk id implicates.

mod build;
mod error;
mod interpret;
pub mod model;
pub mod parse;
mod rule;
pub mod technology;
mod types;

pub use error::RiskScriptError;
pub use model::{
    Confidentiality, Criticality, DataAsset, DataFlow, Model, TechnicalAsset, TrustBoundary,
};
pub use rule::{load_rules_dir, RiskRule};
pub use technology::{Technology, TechnologyConfig, TechnologyError, TechnologyMap};
pub use types::{
    risk_id, BindError, BuildError, BuildErrorKind, Builtin, Collection, CompareOp,
    DataBreachProbability, EvalError, EvalErrorKind, Expr, Literal, LookupError, PathSegment,
    Program, Risk, RiskCategory, RiskExploitationImpact, RiskExploitationLikelihood, RiskLevel,
    RiskSeverity, Scope, Template, TemplatePart, Value, YamlPath, RESERVED_NAMES,
    RISK_ID_KEY_SEPARATOR, RISK_ID_SEPARATOR,
};
