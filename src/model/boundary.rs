use serde::{Deserialize, Serialize};

use super::ordinal::{Confidentiality, Criticality};

/// A trust boundary grouping technical assets, possibly nested in another boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustBoundary {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub boundary_type: String,
    pub tags: Vec<String>,
    pub technical_assets_inside: Vec<String>,
    pub trust_boundaries_nested: Vec<String>,
}

/// A piece of data processed, stored or transferred by the architecture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataAsset {
    pub id: String,
    pub title: String,
    pub description: String,
    pub usage: String,
    pub quantity: String,
    pub confidentiality: Confidentiality,
    pub integrity: Criticality,
    pub availability: Criticality,
    pub tags: Vec<String>,
}

impl TrustBoundary {
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
    pub fn with_type(mut self, boundary_type: impl Into<String>) -> Self {
        self.boundary_type = boundary_type.into();
        self
    }

    #[must_use]
    pub fn with_asset(mut self, asset_id: impl Into<String>) -> Self {
        self.technical_assets_inside.push(asset_id.into());
        self
    }

    #[must_use]
    pub fn with_nested(mut self, boundary_id: impl Into<String>) -> Self {
        self.trust_boundaries_nested.push(boundary_id.into());
        self
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

impl DataAsset {
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
    pub fn with_confidentiality(mut self, confidentiality: Confidentiality) -> Self {
        self.confidentiality = confidentiality;
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}
