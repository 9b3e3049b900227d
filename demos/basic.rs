use riskscript::{Model, RiskRule, TechnologyMap};
use tracing_subscriber::EnvFilter;

const RULE: &str = r#"
id: unencrypted-asset
title: Unencrypted Technical Asset
function: operations
stride: information-disclosure
cwe: 311
supported-tags: [database]
risk:
  - let: { sensitive: "'confidential'" }
  - for:
      var: asset
      in: assets_with_attribute('is-data-store')
      do:
        if:
          cond:
            all:
              - asset.technology.unencrypted-storage
              - asset.confidentiality >= sensitive
          then:
            risk:
              title: 'Unencrypted storage at {asset.title}'
              impact: high
"#;

const MODEL: &str = r#"
title: Web Shop
technical_assets:
  web:
    title: Web Frontend
    internet: true
    technologies: [web-server]
    communication_links:
      - id: web-to-files
        target: files
        protocol: nfs
  files:
    title: Upload Store
    confidentiality: confidential
    technologies: [local-file-system]
  db:
    title: Orders DB
    confidentiality: strictly-confidential
    technologies: [database]
"#;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let rule = RiskRule::from_yaml(RULE).expect("failed to load rule");
    println!("{}", rule.program());

    let mut technologies = TechnologyMap::load_default().expect("failed to load technologies");
    technologies
        .propagate_attributes()
        .expect("failed to propagate technology attributes");
    let mut model = Model::from_yaml(MODEL).expect("failed to parse model");
    model
        .resolve_technologies(&technologies)
        .expect("failed to resolve technologies");

    match rule.generate_risks(&model) {
        Ok(risks) if risks.is_empty() => println!("No risks found."),
        Ok(risks) => {
            for risk in &risks {
                println!("{risk}");
                let assets = rule
                    .technical_assets_by_risk_id(&model, &risk.id)
                    .expect("risk id should resolve");
                for asset in assets {
                    println!("  implicates {} ({})", asset.id, asset.title);
                }
            }
        }
        Err(e) => eprintln!("error: {e}"),
    }
}
