mod category;
mod error;
mod expr;
mod path;
mod program;
mod risk;
mod scope;
mod value;

pub use category::RiskCategory;
pub use error::{BindError, BuildError, BuildErrorKind, EvalError, EvalErrorKind, LookupError};
pub(crate) use expr::{CompiledExpr, CompiledTemplate, CompiledTemplatePart};
pub use expr::{Builtin, Collection, CompareOp, Expr, Literal, Template, TemplatePart, RESERVED_NAMES};
pub use path::{PathSegment, YamlPath};
pub(crate) use program::{Binding, Block, Level, RiskTemplate, Stmt, StmtKind};
pub use program::Program;
pub use risk::{
    risk_id, DataBreachProbability, Risk, RiskExploitationImpact, RiskExploitationLikelihood,
    RiskLevel, RiskSeverity, RISK_ID_KEY_SEPARATOR, RISK_ID_SEPARATOR,
};
pub use scope::Scope;
pub use value::Value;
