use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ordinal::{Confidentiality, Criticality};

/// A component of the architecture: a process, a datastore or an external entity.
///
/// `technologies` holds technology names as written in the model; `attributes`
/// holds their flattened attribute bag and is filled by
/// [`Model::resolve_technologies`](super::Model::resolve_technologies) or
/// set directly with [`with_attribute`](Self::with_attribute).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnicalAsset {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub asset_type: String,
    pub usage: String,
    pub encryption: String,
    pub machine: String,
    pub internet: bool,
    pub out_of_scope: bool,
    pub multi_tenant: bool,
    pub redundant: bool,
    pub confidentiality: Confidentiality,
    pub integrity: Criticality,
    pub availability: Criticality,
    pub tags: Vec<String>,
    pub technologies: Vec<String>,
    pub data_assets_processed: Vec<String>,
    pub data_assets_stored: Vec<String>,
    pub communication_links: Vec<DataFlow>,
    #[serde(skip)]
    pub attributes: BTreeMap<String, bool>,
}

/// A directed communication link from one technical asset to another.
///
/// Data flows are declared on their source asset, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataFlow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub source: String,
    pub target: String,
    pub protocol: String,
    pub authentication: String,
    pub authorization: String,
    pub usage: String,
    pub vpn: bool,
    pub ip_filtered: bool,
    pub readonly: bool,
    pub tags: Vec<String>,
    pub data_assets_sent: Vec<String>,
    pub data_assets_received: Vec<String>,
}

impl TechnicalAsset {
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
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn with_technology(mut self, name: impl Into<String>) -> Self {
        self.technologies.push(name.into());
        self
    }

    /// Set a flattened technology attribute directly.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: bool) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn with_confidentiality(mut self, confidentiality: Confidentiality) -> Self {
        self.confidentiality = confidentiality;
        self
    }

    #[must_use]
    pub fn with_integrity(mut self, integrity: Criticality) -> Self {
        self.integrity = integrity;
        self
    }

    #[must_use]
    pub fn with_out_of_scope(mut self, out_of_scope: bool) -> Self {
        self.out_of_scope = out_of_scope;
        self
    }

    #[must_use]
    pub fn with_internet(mut self, internet: bool) -> Self {
        self.internet = internet;
        self
    }

    #[must_use]
    pub fn with_data_processed(mut self, data_asset_id: impl Into<String>) -> Self {
        self.data_assets_processed.push(data_asset_id.into());
        self
    }

    #[must_use]
    pub fn with_data_stored(mut self, data_asset_id: impl Into<String>) -> Self {
        self.data_assets_stored.push(data_asset_id.into());
        self
    }

    /// Add an outgoing data flow. The flow's `source` is set to this asset.
    #[must_use]
    pub fn with_flow(mut self, mut flow: DataFlow) -> Self {
        flow.source.clone_from(&self.id);
        self.communication_links.push(flow);
        self
    }

    /// Look up a flattened technology attribute. Absent attributes are `false`.
    #[must_use]
    pub fn attribute(&self, name: &str) -> bool {
        self.attributes.get(name).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

impl DataFlow {
    #[must_use]
    pub fn new(id: impl Into<String>, target: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            target: target.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    #[must_use]
    pub fn with_authentication(mut self, authentication: impl Into<String>) -> Self {
        self.authentication = authentication.into();
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn with_data_sent(mut self, data_asset_id: impl Into<String>) -> Self {
        self.data_assets_sent.push(data_asset_id.into());
        self
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}
