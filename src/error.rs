use std::path::PathBuf;

use thiserror::Error;

use crate::parse::ParseError;
use crate::technology::TechnologyError;
use crate::types::{BindError, BuildError, EvalError, LookupError};

/// Unified error type covering rule loading, building, binding and evaluation.
///
/// Returned by convenience methods like [`RiskRule::from_file()`](crate::RiskRule::from_file)
/// and [`load_rules_dir()`](crate::load_rules_dir).
#[derive(Debug, Error)]
pub enum RiskScriptError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Technology(#[from] TechnologyError),

    #[error("rule file has no '{field}'")]
    MissingField { field: &'static str },

    #[error("error loading rule from '{}': {source}", path.display())]
    RuleLoad {
        path: PathBuf,
        #[source]
        source: Box<RiskScriptError>,
    },

    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
