use std::sync::Arc;
use std::thread;

use riskscript::{DataFlow, Model, Program, Risk, RiskCategory, Scope, TechnicalAsset};

const RULE: &str = r"
- let: { threshold: 1 }
- for:
    var: asset
    in: technical_assets
    do:
      - if:
          cond:
            all:
              - asset.technology.unencrypted-storage
              - count(asset.data_flows) >= threshold
          then:
            risk: { title: 'Unencrypted {asset.id}', impact: high }
      - for:
          var: flow
          in: asset.data_flows
          do:
            if:
              cond: flow.protocol == 'http'
              then:
                risk:
                  assets: [flow.source, flow.target]
                  key: '{flow.id}'
                  data_flow: flow
";

fn first_model() -> Model {
    Model::new()
        .with_asset(
            TechnicalAsset::new("db")
                .with_attribute("unencrypted-storage", true)
                .with_flow(DataFlow::new("db-to-backup", "backup").with_protocol("http")),
        )
        .with_asset(TechnicalAsset::new("backup"))
}

fn second_model() -> Model {
    Model::new()
        .with_asset(
            TechnicalAsset::new("web")
                .with_flow(DataFlow::new("web-to-api", "api").with_protocol("http"))
                .with_flow(DataFlow::new("web-to-cdn", "cdn").with_protocol("https")),
        )
        .with_asset(
            TechnicalAsset::new("api")
                .with_attribute("unencrypted-storage", true)
                .with_flow(DataFlow::new("api-to-web", "web").with_protocol("http")),
        )
        .with_asset(TechnicalAsset::new("cdn"))
}

fn run(program: &Program, category: &RiskCategory, model: &Model) -> Vec<Risk> {
    let mut scope = Scope::new(category);
    scope.bind(model).unwrap();
    program.run(scope).unwrap()
}

#[test]
fn shared_program_across_threads() {
    let program = Arc::new(Program::from_yaml_str(RULE).unwrap());
    let category = Arc::new(RiskCategory::new("plaintext"));
    let models = [Arc::new(first_model()), Arc::new(second_model())];

    let baseline: Vec<Vec<Risk>> = models
        .iter()
        .map(|model| run(&program, &category, model))
        .collect();
    assert_eq!(baseline[0].len(), 2);
    assert_eq!(baseline[1].len(), 3);

    let mut handles = vec![];
    for i in 0..8 {
        let program = Arc::clone(&program);
        let category = Arc::clone(&category);
        let model = Arc::clone(&models[i % 2]);
        handles.push(thread::spawn(move || {
            (i % 2, run(&program, &category, &model))
        }));
    }

    for handle in handles {
        let (which, risks) = handle.join().unwrap();
        assert_eq!(risks, baseline[which], "thread result differs from baseline");
    }
}

#[test]
fn concurrent_lookups_resolve_their_own_model() {
    let program = Arc::new(Program::from_yaml_str(RULE).unwrap());
    let category = Arc::new(RiskCategory::new("plaintext"));

    let lookups = [
        (first_model(), "plaintext/db/backup#db-to-backup", vec!["db", "backup"]),
        (second_model(), "plaintext/api", vec!["api"]),
        (second_model(), "plaintext/web/api#web-to-api", vec!["web", "api"]),
    ];

    let handles: Vec<_> = lookups
        .into_iter()
        .map(|(model, risk_id, expected)| {
            let program = Arc::clone(&program);
            let category = Arc::clone(&category);
            thread::spawn(move || {
                let mut scope = Scope::new(&category);
                scope.bind(&model).unwrap();
                let ids: Vec<String> = program
                    .lookup_assets_for_risk(scope, risk_id)
                    .unwrap()
                    .into_iter()
                    .map(|asset| asset.id.clone())
                    .collect();
                (ids, expected)
            })
        })
        .collect();

    for handle in handles {
        let (ids, expected) = handle.join().unwrap();
        assert_eq!(ids, expected);
    }
}
