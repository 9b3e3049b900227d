use serde::{Deserialize, Serialize};

use super::risk::{RiskExploitationImpact, RiskExploitationLikelihood};

/// Static metadata of a risk rule, decoded from the top level of the rule file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskCategory {
    pub id: String,
    pub title: String,
    pub description: String,
    pub impact: String,
    pub asvs: String,
    pub cheat_sheet: String,
    pub action: String,
    pub mitigation: String,
    pub check: String,
    pub function: String,
    pub stride: String,
    pub detection_logic: String,
    pub risk_assessment: String,
    pub false_positives: String,
    pub model_failure_possible_reason: bool,
    pub cwe: u32,
    /// Likelihood used when a `risk` statement does not give one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_likelihood: Option<RiskExploitationLikelihood>,
    /// Impact used when a `risk` statement does not give one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_impact: Option<RiskExploitationImpact>,
}

impl RiskCategory {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn with_defaults(
        mut self,
        likelihood: RiskExploitationLikelihood,
        impact: RiskExploitationImpact,
    ) -> Self {
        self.default_likelihood = Some(likelihood);
        self.default_impact = Some(impact);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_ignores_unrelated_keys() {
        let yaml = r"
id: unencrypted-asset
title: Unencrypted Technical Assets
cwe: 311
stride: information-disclosure
default_likelihood: unlikely
supported-tags: [database]
risk:
  - let: { x: 1 }
";
        let category: RiskCategory = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(category.id, "unencrypted-asset");
        assert_eq!(category.cwe, 311);
        assert_eq!(
            category.default_likelihood,
            Some(RiskExploitationLikelihood::Unlikely)
        );
        assert_eq!(category.default_impact, None);
    }
}
