use std::sync::Arc;
use std::thread;

use riskscript::{DataFlow, Model, Program, RiskCategory, Scope, TechnicalAsset};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let program = Arc::new(
        Program::from_yaml_str(
            r#"
for:
  var: flow
  in: data_flows
  do:
    if:
      cond: "flow.source.internet && flow.authentication == ''"
      then:
        risk:
          assets: [flow.target]
          key: '{flow.id}'
          data_flow: flow
          likelihood: very-likely
"#,
        )
        .expect("failed to build program"),
    );
    let category = Arc::new(RiskCategory::new("missing-authentication").with_title("Missing Authentication"));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let program = Arc::clone(&program);
            let category = Arc::clone(&category);
            thread::spawn(move || {
                // Each thread evaluates its own model with a fresh scope
                let mut web = TechnicalAsset::new("web").with_internet(true);
                for j in 0..=i {
                    let mut flow = DataFlow::new(format!("web-to-api{j}"), format!("api{j}"));
                    if j % 2 == 1 {
                        flow = flow.with_authentication("token");
                    }
                    web = web.with_flow(flow);
                }
                let mut model = Model::new().with_asset(web);
                for j in 0..=i {
                    model = model.with_asset(TechnicalAsset::new(format!("api{j}")));
                }

                let mut scope = Scope::new(&category);
                scope.bind(&model).expect("model should be consistent");
                let result = program.run(scope).map(|risks| {
                    risks.into_iter().map(|r| r.id).collect::<Vec<_>>()
                });
                println!("Thread {i}: {result:?}");
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
}
