//! The architecture model rules are evaluated against.
//!
//! Collections are keyed by id in [`BTreeMap`]s so that iterating them is
//! always in id order; data flows are kept in declaration order on their
//! source asset.

mod asset;
mod boundary;
mod ordinal;

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

pub use asset::{DataFlow, TechnicalAsset};
pub use boundary::{DataAsset, TrustBoundary};
pub use ordinal::{Confidentiality, Criticality};

use crate::technology::{TechnologyError, TechnologyMap};
use crate::types::BindError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Model {
    pub title: String,
    pub technical_assets: BTreeMap<String, TechnicalAsset>,
    pub data_assets: BTreeMap<String, DataAsset>,
    pub trust_boundaries: BTreeMap<String, TrustBoundary>,
}

impl Model {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a model from YAML. Entries without an explicit `id` take their
    /// map key as id, and data flows without a `source` take their owning asset.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_yaml::Error`] on malformed input.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        let mut model: Model = serde_yaml::from_str(text)?;
        model.fill_ids();
        Ok(model)
    }

    fn fill_ids(&mut self) {
        for (key, asset) in &mut self.technical_assets {
            if asset.id.is_empty() {
                asset.id.clone_from(key);
            }
            for flow in &mut asset.communication_links {
                if flow.source.is_empty() {
                    flow.source.clone_from(&asset.id);
                }
            }
        }
        for (key, data) in &mut self.data_assets {
            if data.id.is_empty() {
                data.id.clone_from(key);
            }
        }
        for (key, boundary) in &mut self.trust_boundaries {
            if boundary.id.is_empty() {
                boundary.id.clone_from(key);
            }
        }
    }

    #[must_use]
    pub fn with_asset(mut self, asset: TechnicalAsset) -> Self {
        self.technical_assets.insert(asset.id.clone(), asset);
        self
    }

    #[must_use]
    pub fn with_data_asset(mut self, data: DataAsset) -> Self {
        self.data_assets.insert(data.id.clone(), data);
        self
    }

    #[must_use]
    pub fn with_trust_boundary(mut self, boundary: TrustBoundary) -> Self {
        self.trust_boundaries.insert(boundary.id.clone(), boundary);
        self
    }

    /// Fill every asset's attribute bag from its technology names.
    ///
    /// The map must already be flattened with
    /// [`TechnologyMap::propagate_attributes`]. An asset's bag is the union of
    /// the attributes that are true for any of its technologies.
    ///
    /// # Errors
    ///
    /// Returns [`TechnologyError::Unknown`] for a technology name missing from `technologies`.
    pub fn resolve_technologies(&mut self, technologies: &TechnologyMap) -> Result<(), TechnologyError> {
        for asset in self.technical_assets.values_mut() {
            let resolved = technologies.get_all(&asset.technologies)?;
            let mut attributes = BTreeMap::new();
            for technology in resolved {
                for (name, &value) in &technology.attributes {
                    let entry = attributes.entry(name.clone()).or_insert(false);
                    *entry |= value;
                }
            }
            asset.attributes = attributes;
        }
        Ok(())
    }

    #[must_use]
    pub fn asset(&self, id: &str) -> Option<&TechnicalAsset> {
        self.technical_assets.get(id)
    }

    #[must_use]
    pub fn data_asset(&self, id: &str) -> Option<&DataAsset> {
        self.data_assets.get(id)
    }

    #[must_use]
    pub fn trust_boundary(&self, id: &str) -> Option<&TrustBoundary> {
        self.trust_boundaries.get(id)
    }

    /// All data flows, sorted by id.
    #[must_use]
    pub fn data_flows(&self) -> Vec<&DataFlow> {
        let mut flows: Vec<&DataFlow> = self
            .technical_assets
            .values()
            .flat_map(|a| a.communication_links.iter())
            .collect();
        flows.sort_by(|a, b| a.id.cmp(&b.id));
        flows
    }

    /// Data flows targeting `asset_id`, sorted by id.
    #[must_use]
    pub fn incoming_flows(&self, asset_id: &str) -> Vec<&DataFlow> {
        let mut flows: Vec<&DataFlow> = self
            .technical_assets
            .values()
            .flat_map(|a| a.communication_links.iter())
            .filter(|f| f.target == asset_id)
            .collect();
        flows.sort_by(|a, b| a.id.cmp(&b.id));
        flows
    }

    /// The trust boundary directly containing `asset_id`, if any.
    #[must_use]
    pub fn trust_boundary_of(&self, asset_id: &str) -> Option<&TrustBoundary> {
        self.trust_boundaries
            .values()
            .find(|b| b.technical_assets_inside.iter().any(|a| a == asset_id))
    }

    /// Assets whose technology attribute `attribute` is true, sorted by id.
    #[must_use]
    pub fn assets_with_attribute(&self, attribute: &str) -> Vec<&TechnicalAsset> {
        self.technical_assets
            .values()
            .filter(|a| a.attribute(attribute))
            .collect()
    }

    /// Check referential integrity between assets, data flows, data assets
    /// and trust boundaries.
    ///
    /// # Errors
    ///
    /// Returns the first [`BindError`] found.
    pub fn validate(&self) -> Result<(), BindError> {
        let mut flow_ids: HashSet<&str> = HashSet::new();
        for (key, asset) in &self.technical_assets {
            check_key("technical asset", key, &asset.id)?;
            self.check_data_refs(&asset.id, &asset.data_assets_processed)?;
            self.check_data_refs(&asset.id, &asset.data_assets_stored)?;
            for flow in &asset.communication_links {
                if flow.source != asset.id {
                    return Err(BindError::FlowSourceMismatch {
                        flow: flow.id.clone(),
                        asset: asset.id.clone(),
                        source_id: flow.source.clone(),
                    });
                }
                if !self.technical_assets.contains_key(&flow.target) {
                    return Err(BindError::UnknownFlowTarget {
                        flow: flow.id.clone(),
                        target: flow.target.clone(),
                    });
                }
                if !flow_ids.insert(&flow.id) {
                    return Err(BindError::DuplicateFlow {
                        flow: flow.id.clone(),
                    });
                }
                self.check_data_refs(&flow.id, &flow.data_assets_sent)?;
                self.check_data_refs(&flow.id, &flow.data_assets_received)?;
            }
        }

        for (key, data) in &self.data_assets {
            check_key("data asset", key, &data.id)?;
        }

        let mut owner: HashMap<&str, &str> = HashMap::new();
        for (key, boundary) in &self.trust_boundaries {
            check_key("trust boundary", key, &boundary.id)?;
            for asset in &boundary.technical_assets_inside {
                if !self.technical_assets.contains_key(asset) {
                    return Err(BindError::UnknownBoundaryAsset {
                        boundary: boundary.id.clone(),
                        asset: asset.clone(),
                    });
                }
                if let Some(first) = owner.insert(asset, &boundary.id) {
                    return Err(BindError::AssetInMultipleBoundaries {
                        asset: asset.clone(),
                        first: first.to_owned(),
                        second: boundary.id.clone(),
                    });
                }
            }
            for nested in &boundary.trust_boundaries_nested {
                if !self.trust_boundaries.contains_key(nested) {
                    return Err(BindError::UnknownNestedBoundary {
                        boundary: boundary.id.clone(),
                        nested: nested.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_data_refs(&self, owner: &str, ids: &[String]) -> Result<(), BindError> {
        match ids.iter().find(|id| !self.data_assets.contains_key(*id)) {
            Some(missing) => Err(BindError::UnknownDataAsset {
                owner: owner.to_owned(),
                data_asset: missing.clone(),
            }),
            None => Ok(()),
        }
    }
}

fn check_key(collection: &'static str, key: &str, id: &str) -> Result<(), BindError> {
    if key == id {
        Ok(())
    } else {
        Err(BindError::KeyMismatch {
            collection,
            key: key.to_owned(),
            id: id.to_owned(),
        })
    }
}
