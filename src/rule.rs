//! Rule files: category metadata plus a `risk:` program in one YAML document.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::build::build_program;
use crate::model::{Model, TechnicalAsset};
use crate::types::{Program, Risk, RiskCategory, Scope, YamlPath};
use crate::RiskScriptError;

/// The parts of a rule file that are not category metadata.
#[derive(Debug, Deserialize)]
struct RuleBody {
    #[serde(default, rename = "supported-tags")]
    supported_tags: Vec<String>,
    risk: Option<serde_yaml::Value>,
}

/// A loaded rule: its category, the tags it applies to and its program.
///
/// # Example
///
/// ```
/// use riskscript::{Model, RiskRule, TechnicalAsset};
///
/// let rule = RiskRule::from_yaml(
///     r"
/// id: internet-exposed
/// title: Internet-exposed asset
/// risk:
///   for:
///     var: asset
///     in: technical_assets
///     do:
///       if: { cond: asset.internet, then: { risk: { impact: high } } }
/// ",
/// )
/// .unwrap();
///
/// let model = Model::new()
///     .with_asset(TechnicalAsset::new("web").with_internet(true))
///     .with_asset(TechnicalAsset::new("db"));
/// let risks = rule.generate_risks(&model).unwrap();
/// assert_eq!(risks[0].id, "internet-exposed/web");
/// ```
#[derive(Debug, Clone)]
pub struct RiskRule {
    category: RiskCategory,
    supported_tags: Vec<String>,
    program: Program,
}

impl RiskRule {
    #[must_use]
    pub fn new(category: RiskCategory, supported_tags: Vec<String>, program: Program) -> Self {
        Self {
            category,
            supported_tags,
            program,
        }
    }

    /// Decode a rule file. The category is read from the whole document,
    /// then `supported-tags` and the `risk` program in a second pass.
    ///
    /// # Errors
    ///
    /// Returns [`RiskScriptError::Yaml`] on malformed YAML,
    /// [`RiskScriptError::MissingField`] without an `id` or `risk` key, and
    /// [`RiskScriptError::Build`] for an invalid program.
    pub fn from_yaml(text: &str) -> Result<Self, RiskScriptError> {
        let category: RiskCategory = serde_yaml::from_str(text)?;
        if category.id.is_empty() {
            return Err(RiskScriptError::MissingField { field: "id" });
        }
        let body: RuleBody = serde_yaml::from_str(text)?;
        let risk = body
            .risk
            .ok_or(RiskScriptError::MissingField { field: "risk" })?;
        let program = build_program(&risk, YamlPath::root().key("risk"))?;
        debug!(
            category = %category.id,
            statements = program.statement_count(),
            "rule decoded"
        );
        Ok(Self::new(category, body.supported_tags, program))
    }

    /// # Errors
    ///
    /// Returns [`RiskScriptError::Io`] if the file cannot be read, otherwise as
    /// [`from_yaml`](Self::from_yaml).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RiskScriptError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    #[must_use]
    pub fn category(&self) -> &RiskCategory {
        &self.category
    }

    #[must_use]
    pub fn supported_tags(&self) -> &[String] {
        &self.supported_tags
    }

    #[must_use]
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Whether this rule is relevant for `asset`: true when the rule declares
    /// no tags or the asset carries one of them.
    #[must_use]
    pub fn applies_to(&self, asset: &TechnicalAsset) -> bool {
        self.supported_tags.is_empty() || self.supported_tags.iter().any(|tag| asset.has_tag(tag))
    }

    /// Bind `model` to a fresh scope and run the program.
    ///
    /// # Errors
    ///
    /// Returns [`RiskScriptError::Bind`] for a malformed model or
    /// [`RiskScriptError::Eval`] if evaluation fails.
    pub fn generate_risks(&self, model: &Model) -> Result<Vec<Risk>, RiskScriptError> {
        let mut scope = Scope::new(&self.category);
        scope.bind(model)?;
        Ok(self.program.run(scope)?)
    }

    /// The assets implicated by a risk previously produced by this rule.
    ///
    /// # Errors
    ///
    /// Returns [`RiskScriptError::Bind`] for a malformed model or
    /// [`RiskScriptError::Lookup`] if the id is not produced.
    pub fn technical_assets_by_risk_id<'a>(
        &'a self,
        model: &'a Model,
        risk_id: &str,
    ) -> Result<Vec<&'a TechnicalAsset>, RiskScriptError> {
        let mut scope = Scope::new(&self.category);
        scope.bind(model)?;
        Ok(self.program.lookup_assets_for_risk(scope, risk_id)?)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

fn is_rule_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
}

/// Load every `*.yaml` / `*.yml` rule under `dir`, recursively, in path order.
/// Hidden files and directories are skipped.
///
/// # Errors
///
/// Stops at the first file that fails to load, returning
/// [`RiskScriptError::RuleLoad`] with its path.
pub fn load_rules_dir(dir: impl AsRef<Path>) -> Result<Vec<RiskRule>, RiskScriptError> {
    let dir = dir.as_ref();
    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
    {
        let entry = entry?;
        if entry.file_type().is_file() && is_rule_file(entry.path()) {
            paths.push(entry.into_path());
        }
    }
    paths.sort();

    let mut rules = Vec::with_capacity(paths.len());
    for path in paths {
        let rule = RiskRule::from_file(&path).map_err(|source| RiskScriptError::RuleLoad {
            path: path.clone(),
            source: Box::new(source),
        })?;
        debug!(path = %path.display(), category = %rule.category.id, "rule loaded");
        rules.push(rule);
    }
    info!(dir = %dir.display(), rules = rules.len(), "risk rules loaded");
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULE: &str = r"
id: unencrypted-asset
title: Unencrypted Technical Asset
cwe: 311
supported-tags: [database, storage]
risk:
  - for:
      var: asset
      in: technical_assets
      do:
        if:
          cond: asset.technology.unencrypted-storage
          then:
            risk: { title: 'Unencrypted {asset.id}' }
";

    #[test]
    fn two_pass_decode() {
        let rule = RiskRule::from_yaml(RULE).unwrap();
        assert_eq!(rule.category().id, "unencrypted-asset");
        assert_eq!(rule.category().cwe, 311);
        assert_eq!(rule.supported_tags(), ["database", "storage"]);
        assert_eq!(rule.program().path().to_string(), "risk");
        assert_eq!(rule.program().statement_count(), 3);
    }

    #[test]
    fn applies_to_by_tag() {
        let rule = RiskRule::from_yaml(RULE).unwrap();
        assert!(rule.applies_to(&TechnicalAsset::new("db").with_tag("database")));
        assert!(!rule.applies_to(&TechnicalAsset::new("web").with_tag("frontend")));

        let untagged = RiskRule::new(
            RiskCategory::new("any"),
            Vec::new(),
            rule.program().clone(),
        );
        assert!(untagged.applies_to(&TechnicalAsset::new("web")));
    }

    #[test]
    fn missing_risk_and_id() {
        assert!(matches!(
            RiskRule::from_yaml("id: x\ntitle: no program\n"),
            Err(RiskScriptError::MissingField { field: "risk" })
        ));
        assert!(matches!(
            RiskRule::from_yaml("title: no id\nrisk: {}\n"),
            Err(RiskScriptError::MissingField { field: "id" })
        ));
    }

    #[test]
    fn build_error_paths_are_prefixed() {
        let err = RiskRule::from_yaml("id: x\nrisk:\n  - loop: {}\n").unwrap_err();
        match err {
            RiskScriptError::Build(e) => assert_eq!(e.path.to_string(), "risk[0].loop"),
            other => panic!("expected build error, got {other:?}"),
        }
    }

    #[test]
    fn generate_and_lookup() {
        let rule = RiskRule::from_yaml(RULE).unwrap();
        let model = Model::new()
            .with_asset(TechnicalAsset::new("db").with_attribute("unencrypted-storage", true))
            .with_asset(TechnicalAsset::new("web"));
        let risks = rule.generate_risks(&model).unwrap();
        assert_eq!(risks.len(), 1);
        assert_eq!(risks[0].title, "Unencrypted db");

        let assets = rule
            .technical_assets_by_risk_id(&model, &risks[0].id)
            .unwrap();
        assert_eq!(assets[0].id, "db");
        assert!(matches!(
            rule.technical_assets_by_risk_id(&model, "unencrypted-asset/web"),
            Err(RiskScriptError::Lookup(_))
        ));
    }
}
