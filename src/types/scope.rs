use std::collections::HashSet;

use tracing::debug;

use super::category::RiskCategory;
use super::error::BindError;
use super::risk::Risk;
use super::value::Value;
use crate::model::{Model, TechnicalAsset};

type Frame<'a> = Vec<(String, Value<'a>)>;

/// Mutable state of exactly one evaluation of one rule against one model.
///
/// A scope is consumed by [`Program::run`](super::Program::run) or
/// [`Program::lookup_assets_for_risk`](super::Program::lookup_assets_for_risk),
/// so it cannot be reused for a second evaluation.
///
/// # Example
///
/// ```
/// use riskscript::{Model, RiskCategory, Scope, TechnicalAsset};
///
/// let category = RiskCategory::new("data-unencrypted");
/// let model = Model::new().with_asset(TechnicalAsset::new("db1"));
///
/// let mut scope = Scope::new(&category);
/// scope.bind(&model).unwrap();
/// assert!(scope.is_bound());
/// ```
#[derive(Debug)]
pub struct Scope<'a> {
    category: &'a RiskCategory,
    model: Option<&'a Model>,
    frames: Vec<Frame<'a>>,
    risks: Vec<Risk>,
    emitted: HashSet<String>,
}

impl<'a> Scope<'a> {
    #[must_use]
    pub fn new(category: &'a RiskCategory) -> Self {
        Self {
            category,
            model: None,
            frames: Vec::new(),
            risks: Vec::new(),
            emitted: HashSet::new(),
        }
    }

    /// Bind the architecture model this scope evaluates against.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::AlreadyBound`] if a model is already bound, or the
    /// first referential-integrity violation found in `model`.
    pub fn bind(&mut self, model: &'a Model) -> Result<(), BindError> {
        if self.model.is_some() {
            return Err(BindError::AlreadyBound);
        }
        model.validate()?;
        debug!(
            category = %self.category.id,
            assets = model.technical_assets.len(),
            "model bound to scope"
        );
        self.model = Some(model);
        Ok(())
    }

    #[must_use]
    pub fn category(&self) -> &'a RiskCategory {
        self.category
    }

    #[must_use]
    pub fn model(&self) -> Option<&'a Model> {
        self.model
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.model.is_some()
    }

    pub(crate) fn push_frame(&mut self) {
        self.frames.push(Vec::new());
    }

    pub(crate) fn pop_frame(&mut self) {
        self.frames.pop();
    }

    /// Bind `name` in the innermost frame, shadowing any earlier binding.
    pub(crate) fn define(&mut self, name: &str, value: Value<'a>) {
        if self.frames.is_empty() {
            self.push_frame();
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.push((name.to_owned(), value));
        }
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<&Value<'a>> {
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(bound, _)| bound == name)
            .map(|(_, value)| value)
    }

    /// Every asset-valued binding currently visible, outer frame first, in
    /// binding order, without duplicates.
    pub(crate) fn bound_assets(&self) -> Vec<&'a TechnicalAsset> {
        let mut assets: Vec<&'a TechnicalAsset> = Vec::new();
        for (name, value) in self.frames.iter().flatten() {
            if let Value::Asset(asset) = value {
                if self.lookup(name).is_some_and(|v| matches!(v, Value::Asset(a) if a.id == asset.id))
                    && !assets.iter().any(|a| a.id == asset.id)
                {
                    assets.push(*asset);
                }
            }
        }
        assets
    }

    /// Record an emitted risk id. Returns `false` if it was emitted before.
    pub(crate) fn record_emission(&mut self, id: &str) -> bool {
        self.emitted.insert(id.to_owned())
    }

    pub(crate) fn push_risk(&mut self, risk: Risk) {
        self.risks.push(risk);
    }

    pub(crate) fn drain(self) -> Vec<Risk> {
        self.risks
    }

    #[cfg(test)]
    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }
}
