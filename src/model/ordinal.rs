use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Confidentiality classification of a data asset or technical asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Confidentiality {
    #[default]
    Public,
    Internal,
    Restricted,
    Confidential,
    StrictlyConfidential,
}

/// Integrity or availability rating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Criticality {
    #[default]
    Archive,
    Operational,
    Important,
    Critical,
    MissionCritical,
}

impl Confidentiality {
    pub const ALL: [Confidentiality; 5] = [
        Confidentiality::Public,
        Confidentiality::Internal,
        Confidentiality::Restricted,
        Confidentiality::Confidential,
        Confidentiality::StrictlyConfidential,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Confidentiality::Public => "public",
            Confidentiality::Internal => "internal",
            Confidentiality::Restricted => "restricted",
            Confidentiality::Confidential => "confidential",
            Confidentiality::StrictlyConfidential => "strictly-confidential",
        }
    }
}

impl Criticality {
    pub const ALL: [Criticality; 5] = [
        Criticality::Archive,
        Criticality::Operational,
        Criticality::Important,
        Criticality::Critical,
        Criticality::MissionCritical,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Criticality::Archive => "archive",
            Criticality::Operational => "operational",
            Criticality::Important => "important",
            Criticality::Critical => "critical",
            Criticality::MissionCritical => "mission-critical",
        }
    }
}

impl FromStr for Confidentiality {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|c| c.label() == s).ok_or(())
    }
}

impl FromStr for Criticality {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|c| c.label() == s).ok_or(())
    }
}

impl fmt::Display for Confidentiality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_from_str() {
        for c in Confidentiality::ALL {
            assert_eq!(c.label().parse::<Confidentiality>(), Ok(c));
        }
        for c in Criticality::ALL {
            assert_eq!(c.label().parse::<Criticality>(), Ok(c));
        }
    }

    #[test]
    fn ordering_follows_declaration() {
        assert!(Confidentiality::StrictlyConfidential > Confidentiality::Internal);
        assert!(Criticality::MissionCritical > Criticality::Important);
    }

    #[test]
    fn deserializes_kebab_case() {
        let c: Confidentiality = serde_yaml::from_str("strictly-confidential").unwrap();
        assert_eq!(c, Confidentiality::StrictlyConfidential);
        let c: Criticality = serde_yaml::from_str("mission-critical").unwrap();
        assert_eq!(c, Criticality::MissionCritical);
    }
}
