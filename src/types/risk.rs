use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between the category and asset parts of a risk identifier.
pub const RISK_ID_SEPARATOR: &str = "/";

/// Marks the rule-supplied key, so a key never reads as one more asset id.
pub const RISK_ID_KEY_SEPARATOR: &str = "#";

/// A named, ordered scale used to score risks.
///
/// Implemented by [`RiskSeverity`], [`RiskExploitationLikelihood`],
/// [`RiskExploitationImpact`] and [`DataBreachProbability`]. Rule authors write
/// the kebab-case label (e.g. `very-likely`).
pub trait RiskLevel: Copy + fmt::Debug + Send + Sync + 'static {
    /// The rule field that carries this level, used in error messages.
    const FIELD: &'static str;

    fn all() -> &'static [Self];

    fn label(self) -> &'static str;

    #[must_use]
    fn from_label(label: &str) -> Option<Self> {
        Self::all().iter().copied().find(|l| l.label() == label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskSeverity {
    Low,
    Medium,
    Elevated,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskExploitationLikelihood {
    Unlikely,
    Likely,
    VeryLikely,
    Frequent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskExploitationImpact {
    Low,
    Medium,
    High,
    VeryHigh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataBreachProbability {
    Improbable,
    Possible,
    Probable,
}

impl RiskLevel for RiskSeverity {
    const FIELD: &'static str = "severity";

    fn all() -> &'static [Self] {
        &[
            RiskSeverity::Low,
            RiskSeverity::Medium,
            RiskSeverity::Elevated,
            RiskSeverity::High,
            RiskSeverity::Critical,
        ]
    }

    fn label(self) -> &'static str {
        match self {
            RiskSeverity::Low => "low",
            RiskSeverity::Medium => "medium",
            RiskSeverity::Elevated => "elevated",
            RiskSeverity::High => "high",
            RiskSeverity::Critical => "critical",
        }
    }
}

impl RiskLevel for RiskExploitationLikelihood {
    const FIELD: &'static str = "likelihood";

    fn all() -> &'static [Self] {
        &[
            RiskExploitationLikelihood::Unlikely,
            RiskExploitationLikelihood::Likely,
            RiskExploitationLikelihood::VeryLikely,
            RiskExploitationLikelihood::Frequent,
        ]
    }

    fn label(self) -> &'static str {
        match self {
            RiskExploitationLikelihood::Unlikely => "unlikely",
            RiskExploitationLikelihood::Likely => "likely",
            RiskExploitationLikelihood::VeryLikely => "very-likely",
            RiskExploitationLikelihood::Frequent => "frequent",
        }
    }
}

impl RiskLevel for RiskExploitationImpact {
    const FIELD: &'static str = "impact";

    fn all() -> &'static [Self] {
        &[
            RiskExploitationImpact::Low,
            RiskExploitationImpact::Medium,
            RiskExploitationImpact::High,
            RiskExploitationImpact::VeryHigh,
        ]
    }

    fn label(self) -> &'static str {
        match self {
            RiskExploitationImpact::Low => "low",
            RiskExploitationImpact::Medium => "medium",
            RiskExploitationImpact::High => "high",
            RiskExploitationImpact::VeryHigh => "very-high",
        }
    }
}

impl RiskLevel for DataBreachProbability {
    const FIELD: &'static str = "data_breach_probability";

    fn all() -> &'static [Self] {
        &[
            DataBreachProbability::Improbable,
            DataBreachProbability::Possible,
            DataBreachProbability::Probable,
        ]
    }

    fn label(self) -> &'static str {
        match self {
            DataBreachProbability::Improbable => "improbable",
            DataBreachProbability::Possible => "possible",
            DataBreachProbability::Probable => "probable",
        }
    }
}

impl RiskExploitationLikelihood {
    #[must_use]
    pub fn weight(self) -> u32 {
        match self {
            RiskExploitationLikelihood::Unlikely => 1,
            RiskExploitationLikelihood::Likely => 2,
            RiskExploitationLikelihood::VeryLikely => 3,
            RiskExploitationLikelihood::Frequent => 4,
        }
    }
}

impl RiskExploitationImpact {
    #[must_use]
    pub fn weight(self) -> u32 {
        match self {
            RiskExploitationImpact::Low => 1,
            RiskExploitationImpact::Medium => 2,
            RiskExploitationImpact::High => 3,
            RiskExploitationImpact::VeryHigh => 4,
        }
    }
}

impl RiskSeverity {
    /// Severity derived from likelihood weight times impact weight.
    #[must_use]
    pub fn calculate(likelihood: RiskExploitationLikelihood, impact: RiskExploitationImpact) -> Self {
        match likelihood.weight() * impact.weight() {
            0..=1 => RiskSeverity::Low,
            2..=3 => RiskSeverity::Medium,
            4..=8 => RiskSeverity::Elevated,
            9..=12 => RiskSeverity::High,
            _ => RiskSeverity::Critical,
        }
    }
}

macro_rules! display_label {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.label())
                }
            }
        )*
    };
}

display_label!(
    RiskSeverity,
    RiskExploitationLikelihood,
    RiskExploitationImpact,
    DataBreachProbability
);

/// A discovered risk.
///
/// `id` is derived from the category id, the implicated asset ids and the
/// optional rule-supplied key (see [`risk_id`]), so evaluating the same rule
/// against an unchanged model always reproduces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct Risk {
    pub id: String,
    pub category_id: String,
    pub severity: RiskSeverity,
    pub likelihood: RiskExploitationLikelihood,
    pub impact: RiskExploitationImpact,
    pub data_breach_probability: DataBreachProbability,
    pub title: String,
    pub technical_asset_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_flow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_boundary_id: Option<String>,
}

impl fmt::Display for Risk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.id, self.severity, self.title)
    }
}

/// Build a risk identifier: category id, then each asset id, joined by
/// [`RISK_ID_SEPARATOR`], then the key after [`RISK_ID_KEY_SEPARATOR`] if
/// present and non-empty.
///
/// `%`, `/` and `#` inside any part are percent-encoded, so distinct inputs
/// always give distinct identifiers.
#[must_use]
pub fn risk_id(category_id: &str, asset_ids: &[String], key: Option<&str>) -> String {
    let mut id = escape_id_part(category_id).into_owned();
    for asset_id in asset_ids {
        id.push_str(RISK_ID_SEPARATOR);
        id.push_str(&escape_id_part(asset_id));
    }
    if let Some(key) = key.filter(|k| !k.is_empty()) {
        id.push_str(RISK_ID_KEY_SEPARATOR);
        id.push_str(&escape_id_part(key));
    }
    id
}

fn escape_id_part(part: &str) -> Cow<'_, str> {
    if !part.contains(['%', '/', '#']) {
        return Cow::Borrowed(part);
    }
    let mut escaped = String::with_capacity(part.len() + 4);
    for c in part.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            '/' => escaped.push_str("%2F"),
            '#' => escaped.push_str("%23"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}
