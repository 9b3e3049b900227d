use riskscript::{
    BindError, BuildErrorKind, DataFlow, EvalErrorKind, LookupError, Model, Program,
    RiskCategory, RiskScriptError, RiskSeverity, Scope, TechnicalAsset, TrustBoundary,
};

const UNENCRYPTED: &str = r"
for:
  var: asset
  in: technical_assets
  do:
    if:
      cond: asset.technology.unencrypted-storage
      then:
        risk: {}
";

fn category() -> RiskCategory {
    RiskCategory::new("data-unencrypted").with_title("Unencrypted Data")
}

fn storage_model() -> Model {
    Model::new()
        .with_asset(TechnicalAsset::new("db1").with_attribute("unencrypted-storage", true))
        .with_asset(TechnicalAsset::new("db2").with_attribute("unencrypted-storage", false))
}

#[test]
fn unencrypted_storage_scenario() {
    let program = Program::from_yaml_str(UNENCRYPTED).unwrap();
    let category = category();
    let model = storage_model();

    let mut scope = Scope::new(&category);
    scope.bind(&model).unwrap();
    let risks = program.run(scope).unwrap();
    assert_eq!(risks.len(), 1);
    assert_eq!(risks[0].id, "data-unencrypted/db1");
    assert_eq!(risks[0].technical_asset_ids, ["db1"]);
    assert_eq!(risks[0].title, "Unencrypted Data at db1");
    assert_eq!(risks[0].severity, RiskSeverity::Elevated);

    let mut scope = Scope::new(&category);
    scope.bind(&model).unwrap();
    let assets = program
        .lookup_assets_for_risk(scope, "data-unencrypted/db1")
        .unwrap();
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].id, "db1");

    let mut scope = Scope::new(&category);
    scope.bind(&model).unwrap();
    assert!(matches!(
        program.lookup_assets_for_risk(scope, "data-unencrypted/db2"),
        Err(LookupError::NotFound { .. })
    ));
}

#[test]
fn empty_program_produces_nothing() {
    for text in ["", "[]", "{}"] {
        let program = Program::from_yaml_str(text).unwrap();
        assert_eq!(program.statement_count(), 0);
        let category = category();
        let model = storage_model();
        let mut scope = Scope::new(&category);
        scope.bind(&model).unwrap();
        assert!(program.run(scope).unwrap().is_empty());
    }
}

#[test]
fn empty_model_produces_nothing() {
    let program = Program::from_yaml_str(UNENCRYPTED).unwrap();
    let category = category();
    let model = Model::new();
    let mut scope = Scope::new(&category);
    scope.bind(&model).unwrap();
    assert!(program.run(scope).unwrap().is_empty());
}

#[test]
fn fragment_is_innermost_failing_statement() {
    let text = r"
- let: { limit: 2 }
- for:
    var: asset
    in: technical_assets
    do:
      if:
        cond: asset.encrypted
        then: {}
";
    let program = Program::from_yaml_str(text).unwrap();
    let category = category();
    let model = storage_model();
    let mut scope = Scope::new(&category);
    scope.bind(&model).unwrap();
    let err = program.run(scope).unwrap_err();

    assert_eq!(err.path.to_string(), "[1].for.do.if");
    assert_eq!(
        err.kind,
        EvalErrorKind::UnknownMember {
            member: "encrypted".into(),
            found: "technical asset",
        }
    );
    let inner: serde_yaml::Value =
        serde_yaml::from_str("if: { cond: asset.encrypted, then: {} }").unwrap();
    assert_eq!(err.fragment, serde_yaml::to_string(&inner).unwrap());
    assert!(!err.fragment.contains("limit"));
}

#[test]
fn cyclic_let_rejected_at_build() {
    let err = Program::from_yaml_str("let: { a: b, b: c, c: a }").unwrap_err();
    match err {
        RiskScriptError::Build(e) => {
            assert_eq!(e.path.to_string(), "let");
            match e.kind {
                BuildErrorKind::CyclicBinding { cycle } => {
                    assert_eq!(cycle.first(), cycle.last());
                    assert_eq!(cycle.len(), 4);
                }
                other => panic!("expected cycle, got {other:?}"),
            }
        }
        other => panic!("expected build error, got {other:?}"),
    }
}

#[test]
fn malformed_yaml_is_not_a_build_error() {
    assert!(matches!(
        Program::from_yaml_str("for: [unclosed"),
        Err(RiskScriptError::Yaml(_))
    ));
}

#[test]
fn scope_binds_once() {
    let category = category();
    let model = storage_model();
    let other = Model::new();
    let mut scope = Scope::new(&category);
    assert!(!scope.is_bound());
    scope.bind(&model).unwrap();
    assert_eq!(scope.bind(&other), Err(BindError::AlreadyBound));
    assert_eq!(scope.model(), Some(&model));
}

#[test]
fn unbound_scope_fails_both_modes() {
    let program = Program::from_yaml_str(UNENCRYPTED).unwrap();
    let category = category();

    let err = program.run(Scope::new(&category)).unwrap_err();
    assert_eq!(err.kind, EvalErrorKind::ModelNotBound);

    match program.lookup_assets_for_risk(Scope::new(&category), "data-unencrypted/db1") {
        Err(LookupError::Evaluation(e)) => assert_eq!(e.kind, EvalErrorKind::ModelNotBound),
        other => panic!("expected evaluation error, got {other:?}"),
    }
}

#[test]
fn dangling_references_rejected_on_bind() {
    let category = category();

    let model = Model::new().with_asset(
        TechnicalAsset::new("web").with_flow(DataFlow::new("web-to-db", "db")),
    );
    let mut scope = Scope::new(&category);
    assert_eq!(
        scope.bind(&model),
        Err(BindError::UnknownFlowTarget {
            flow: "web-to-db".into(),
            target: "db".into(),
        })
    );
    assert!(!scope.is_bound());

    let model = Model::new()
        .with_asset(TechnicalAsset::new("web"))
        .with_trust_boundary(TrustBoundary::new("dmz").with_asset("web"))
        .with_trust_boundary(TrustBoundary::new("lan").with_asset("web"));
    let mut scope = Scope::new(&category);
    assert!(matches!(
        scope.bind(&model),
        Err(BindError::AssetInMultipleBoundaries { .. })
    ));
}

#[test]
fn same_asset_twice_needs_a_key() {
    let text = r"
for:
  var: flow
  in: data_flows
  do:
    risk: { assets: flow.source }
";
    let program = Program::from_yaml_str(text).unwrap();
    let category = category();
    let model = Model::new()
        .with_asset(
            TechnicalAsset::new("web")
                .with_flow(DataFlow::new("web-to-db", "db"))
                .with_flow(DataFlow::new("web-to-cache", "cache")),
        )
        .with_asset(TechnicalAsset::new("db"))
        .with_asset(TechnicalAsset::new("cache"));
    let mut scope = Scope::new(&category);
    scope.bind(&model).unwrap();
    let err = program.run(scope).unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::DuplicateRiskId {
            id: "data-unencrypted/web".into()
        }
    );

    let keyed = Program::from_yaml_str(&text.replace(
        "{ assets: flow.source }",
        "{ assets: flow.source, key: '{flow.id}' }",
    ))
    .unwrap();
    let mut scope = Scope::new(&category);
    scope.bind(&model).unwrap();
    let ids: Vec<String> = keyed.run(scope).unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, ["data-unencrypted/web#web-to-cache", "data-unencrypted/web#web-to-db"]);
}

#[test]
fn null_condition_is_false() {
    let text = r"
for:
  var: asset
  in: technical_assets
  do:
    if:
      cond: asset.trust_boundary
      then:
        risk: {}
";
    let program = Program::from_yaml_str(text).unwrap();
    let category = category();
    let model = storage_model();
    let mut scope = Scope::new(&category);
    scope.bind(&model).unwrap();
    assert!(program.run(scope).unwrap().is_empty());
}

#[test]
fn keyed_risk_and_asset_pair_have_distinct_ids() {
    let text = r#"
- for:
    var: a
    in: technical_assets
    do:
      risk: { assets: [a], key: web }
- for:
    var: a
    in: technical_assets
    do:
      for:
        var: b
        in: technical_assets
        do:
          if:
            cond: "a.id == 'api' && b.id == 'web'"
            then:
              risk: { assets: [a, b] }
"#;
    let program = Program::from_yaml_str(text).unwrap();
    let category = RiskCategory::new("c");
    let model = Model::new()
        .with_asset(TechnicalAsset::new("api"))
        .with_asset(TechnicalAsset::new("web"));

    let mut scope = Scope::new(&category);
    scope.bind(&model).unwrap();
    let ids: Vec<String> = program.run(scope).unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, ["c/api#web", "c/web#web", "c/api/web"]);

    let mut scope = Scope::new(&category);
    scope.bind(&model).unwrap();
    let pair: Vec<&str> = program
        .lookup_assets_for_risk(scope, "c/api/web")
        .unwrap()
        .into_iter()
        .map(|asset| asset.id.as_str())
        .collect();
    assert_eq!(pair, ["api", "web"]);

    let mut scope = Scope::new(&category);
    scope.bind(&model).unwrap();
    let keyed = program.lookup_assets_for_risk(scope, "c/api#web").unwrap();
    assert_eq!(keyed.len(), 1);
    assert_eq!(keyed[0].id, "api");
}

#[test]
fn separators_inside_asset_ids_are_encoded() {
    let program = Program::from_yaml_str(UNENCRYPTED).unwrap();
    let category = category();
    let model = Model::new()
        .with_asset(TechnicalAsset::new("eu/db#1").with_attribute("unencrypted-storage", true));
    let mut scope = Scope::new(&category);
    scope.bind(&model).unwrap();
    let risks = program.run(scope).unwrap();
    assert_eq!(risks[0].id, "data-unencrypted/eu%2Fdb%231");
    assert_eq!(risks[0].technical_asset_ids, ["eu/db#1"]);
}
