use tracing::{debug, trace};

use crate::model::{DataAsset, DataFlow, Model, TechnicalAsset, TrustBoundary};
use crate::types::{
    risk_id, Block, Builtin, Collection, CompareOp, CompiledExpr, CompiledTemplate, CompiledTemplatePart,
    DataBreachProbability, EvalError, EvalErrorKind, Level, LookupError, Program, Risk,
    RiskCategory, RiskExploitationImpact, RiskExploitationLikelihood, RiskLevel, RiskSeverity,
    RiskTemplate, Scope, Stmt, StmtKind, Value,
};

enum Mode<'q> {
    Collect,
    Find { risk_id: &'q str },
}

struct Interpreter<'a, 'q> {
    scope: Scope<'a>,
    model: &'a Model,
    category: &'a RiskCategory,
    mode: Mode<'q>,
    emitted: usize,
    found: Option<Vec<&'a TechnicalAsset>>,
}

pub(crate) fn run(program: &Program, scope: Scope<'_>) -> Result<Vec<Risk>, EvalError> {
    let mut interpreter = Interpreter::new(program, scope, Mode::Collect)?;
    debug!(category = %interpreter.category.id, "evaluating rule");
    interpreter.exec_block(&program.body)?;
    let risks = interpreter.scope.drain();
    debug!(category = %interpreter.category.id, risks = risks.len(), "rule evaluated");
    Ok(risks)
}

pub(crate) fn lookup<'a>(
    program: &Program,
    scope: Scope<'a>,
    risk_id: &str,
) -> Result<Vec<&'a TechnicalAsset>, LookupError> {
    let mut interpreter = Interpreter::new(program, scope, Mode::Find { risk_id })?;
    debug!(category = %interpreter.category.id, risk_id, "looking up risk");
    interpreter.exec_block(&program.body)?;
    debug!(
        category = %interpreter.category.id,
        emissions = interpreter.emitted,
        found = interpreter.found.is_some(),
        "lookup finished"
    );
    interpreter.found.ok_or_else(|| LookupError::NotFound {
        risk_id: risk_id.to_owned(),
        category: interpreter.category.id.clone(),
    })
}

impl<'a, 'q> Interpreter<'a, 'q> {
    fn new(program: &Program, scope: Scope<'a>, mode: Mode<'q>) -> Result<Self, EvalError> {
        let Some(model) = scope.model() else {
            return Err(EvalError {
                path: program.path.clone(),
                fragment: String::new(),
                kind: EvalErrorKind::ModelNotBound,
            });
        };
        Ok(Self {
            category: scope.category(),
            scope,
            model,
            mode,
            emitted: 0,
            found: None,
        })
    }

    fn exec_block(&mut self, block: &Block) -> Result<(), EvalError> {
        self.scope.push_frame();
        let result = block.stmts.iter().try_for_each(|stmt| self.exec_stmt(stmt));
        self.scope.pop_frame();
        result
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<(), EvalError> {
        let fail = |kind: EvalErrorKind| EvalError {
            path: stmt.path.clone(),
            fragment: stmt.fragment(),
            kind,
        };
        match &stmt.kind {
            StmtKind::Let(bindings) => {
                for binding in bindings {
                    let value = self.eval(&binding.expr).map_err(|kind| EvalError {
                        path: binding.path.clone(),
                        fragment: stmt.fragment(),
                        kind,
                    })?;
                    self.scope.define(&binding.name, value);
                }
                Ok(())
            }
            StmtKind::For { var, source, body } => {
                let items = match self.eval(source).map_err(fail)? {
                    Value::List(items) => items,
                    other => {
                        return Err(fail(EvalErrorKind::TypeMismatch {
                            expected: "list",
                            found: other.type_name(),
                        }))
                    }
                };
                trace!(path = %stmt.path, var = %var, items = items.len(), "loop");
                for item in items {
                    self.scope.push_frame();
                    self.scope.define(var, item);
                    let result = self.exec_block(body);
                    self.scope.pop_frame();
                    result?;
                }
                Ok(())
            }
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                if self.condition(cond).map_err(fail)? {
                    self.exec_block(then)
                } else if let Some(otherwise) = otherwise {
                    self.exec_block(otherwise)
                } else {
                    Ok(())
                }
            }
            StmtKind::Risk(template) => self.emit(template).map_err(fail),
        }
    }

    fn condition(&self, expr: &CompiledExpr) -> Result<bool, EvalErrorKind> {
        let value = self.eval(expr)?;
        value.truthy().ok_or(EvalErrorKind::TypeMismatch {
            expected: "bool",
            found: value.type_name(),
        })
    }

    fn eval(&self, expr: &CompiledExpr) -> Result<Value<'a>, EvalErrorKind> {
        match expr {
            CompiledExpr::Literal(lit) => Ok(Value::from(lit)),
            CompiledExpr::Var(name) => {
                self.scope
                    .lookup(name)
                    .cloned()
                    .ok_or_else(|| EvalErrorKind::UnboundVariable { name: name.clone() })
            }
            CompiledExpr::Collection(collection) => Ok(self.collection(*collection)),
            CompiledExpr::Category => Ok(Value::Category(self.category)),
            CompiledExpr::Member(inner, name) => {
                let target = self.eval(inner)?;
                self.member(&target, name)
            }
            CompiledExpr::Call(builtin, args) => self.call(*builtin, args),
            CompiledExpr::List(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            CompiledExpr::Not(inner) => Ok(Value::Bool(!self.condition(inner)?)),
            CompiledExpr::And(a, b) => Ok(Value::Bool(self.condition(a)? && self.condition(b)?)),
            CompiledExpr::Or(a, b) => Ok(Value::Bool(self.condition(a)? || self.condition(b)?)),
            CompiledExpr::Compare { lhs, op, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                lhs.compare(*op, &rhs)
                    .map(Value::Bool)
                    .ok_or_else(|| EvalErrorKind::Incomparable {
                        lhs: lhs.type_name(),
                        op: op.to_string(),
                        rhs: rhs.type_name(),
                    })
            }
        }
    }

    fn collection(&self, collection: Collection) -> Value<'a> {
        let model = self.model;
        Value::List(match collection {
            Collection::TechnicalAssets => model.technical_assets.values().map(Value::Asset).collect(),
            Collection::DataFlows => model.data_flows().into_iter().map(Value::Flow).collect(),
            Collection::TrustBoundaries => model.trust_boundaries.values().map(Value::Boundary).collect(),
            Collection::DataAssets => model.data_assets.values().map(Value::Data).collect(),
        })
    }

    fn data_list(&self, ids: &[String]) -> Value<'a> {
        let model = self.model;
        Value::List(
            ids.iter()
                .filter_map(|id| model.data_asset(id))
                .map(Value::Data)
                .collect(),
        )
    }

    fn member(&self, target: &Value<'a>, name: &str) -> Result<Value<'a>, EvalErrorKind> {
        let value = match target {
            Value::Asset(asset) => self.asset_member(*asset, name),
            Value::Technology(asset) => Some(Value::Bool(asset.attribute(name))),
            Value::Flow(flow) => self.flow_member(*flow, name),
            Value::Boundary(boundary) => self.boundary_member(*boundary, name),
            Value::Data(data) => data_member(*data, name),
            Value::Category(category) => category_member(*category, name),
            Value::List(items) if name == "count" => Some(Value::Int(len_i64(items.len()))),
            _ => None,
        };
        value.ok_or_else(|| EvalErrorKind::UnknownMember {
            member: name.to_owned(),
            found: target.type_name(),
        })
    }

    fn asset_member(&self, asset: &'a TechnicalAsset, name: &str) -> Option<Value<'a>> {
        let model = self.model;
        Some(match name {
            "id" => Value::from(asset.id.as_str()),
            "title" => Value::from(asset.title.as_str()),
            "description" => Value::from(asset.description.as_str()),
            "type" => Value::from(asset.asset_type.as_str()),
            "usage" => Value::from(asset.usage.as_str()),
            "encryption" => Value::from(asset.encryption.as_str()),
            "machine" => Value::from(asset.machine.as_str()),
            "internet" => Value::Bool(asset.internet),
            "out_of_scope" => Value::Bool(asset.out_of_scope),
            "multi_tenant" => Value::Bool(asset.multi_tenant),
            "redundant" => Value::Bool(asset.redundant),
            "confidentiality" => Value::Confidentiality(asset.confidentiality),
            "integrity" => Value::Criticality(asset.integrity),
            "availability" => Value::Criticality(asset.availability),
            "tags" => strings(&asset.tags),
            "technologies" => strings(&asset.technologies),
            "technology" => Value::Technology(asset),
            "data_flows" => Value::List(asset.communication_links.iter().map(Value::Flow).collect()),
            "incoming_flows" => Value::List(model.incoming_flows(&asset.id).into_iter().map(Value::Flow).collect()),
            "data_assets_processed" => self.data_list(&asset.data_assets_processed),
            "data_assets_stored" => self.data_list(&asset.data_assets_stored),
            "trust_boundary" => model
                .trust_boundary_of(&asset.id)
                .map_or(Value::Null, Value::Boundary),
            _ => return None,
        })
    }

    fn flow_member(&self, flow: &'a DataFlow, name: &str) -> Option<Value<'a>> {
        let model = self.model;
        Some(match name {
            "id" => Value::from(flow.id.as_str()),
            "title" => Value::from(flow.title.as_str()),
            "description" => Value::from(flow.description.as_str()),
            "protocol" => Value::from(flow.protocol.as_str()),
            "authentication" => Value::from(flow.authentication.as_str()),
            "authorization" => Value::from(flow.authorization.as_str()),
            "usage" => Value::from(flow.usage.as_str()),
            "vpn" => Value::Bool(flow.vpn),
            "ip_filtered" => Value::Bool(flow.ip_filtered),
            "readonly" => Value::Bool(flow.readonly),
            "source" => model.asset(&flow.source).map_or(Value::Null, Value::Asset),
            "target" => model.asset(&flow.target).map_or(Value::Null, Value::Asset),
            "tags" => strings(&flow.tags),
            "data_assets_sent" => self.data_list(&flow.data_assets_sent),
            "data_assets_received" => self.data_list(&flow.data_assets_received),
            _ => return None,
        })
    }

    fn boundary_member(&self, boundary: &'a TrustBoundary, name: &str) -> Option<Value<'a>> {
        let model = self.model;
        Some(match name {
            "id" => Value::from(boundary.id.as_str()),
            "title" => Value::from(boundary.title.as_str()),
            "description" => Value::from(boundary.description.as_str()),
            "type" => Value::from(boundary.boundary_type.as_str()),
            "tags" => strings(&boundary.tags),
            "technical_assets" => Value::List(
                boundary
                    .technical_assets_inside
                    .iter()
                    .filter_map(|id| model.asset(id))
                    .map(Value::Asset)
                    .collect(),
            ),
            "trust_boundaries" => Value::List(
                boundary
                    .trust_boundaries_nested
                    .iter()
                    .filter_map(|id| model.trust_boundary(id))
                    .map(Value::Boundary)
                    .collect(),
            ),
            _ => return None,
        })
    }

    fn call(&self, builtin: Builtin, args: &[CompiledExpr]) -> Result<Value<'a>, EvalErrorKind> {
        let args = args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<Result<Vec<_>, _>>()?;
        match (builtin, args.as_slice()) {
            (Builtin::Count, [list]) => Ok(Value::Int(len_i64(as_list(list)?.len()))),
            (Builtin::Contains, [list, item]) => Ok(Value::Bool(
                as_list(list)?
                    .iter()
                    .any(|v| v.compare(CompareOp::Eq, item) == Some(true)),
            )),
            (Builtin::HasTag, [entity, tag]) => {
                let tag = as_str(tag)?;
                Ok(Value::Bool(entity_tags(entity)?.iter().any(|t| t == tag)))
            }
            (Builtin::Tagged, [list, tag]) => {
                let tag = as_str(tag)?;
                let mut out = Vec::new();
                for item in as_list(list)? {
                    if entity_tags(item)?.iter().any(|t| t == tag) {
                        out.push(item.clone());
                    }
                }
                Ok(Value::List(out))
            }
            (Builtin::WithAttribute, [list, attribute]) => {
                let attribute = as_str(attribute)?;
                let mut out = Vec::new();
                for item in as_list(list)? {
                    match item {
                        Value::Asset(asset) if asset.attribute(attribute) => out.push(item.clone()),
                        Value::Asset(_) => {}
                        other => {
                            return Err(EvalErrorKind::TypeMismatch {
                                expected: "technical asset",
                                found: other.type_name(),
                            })
                        }
                    }
                }
                Ok(Value::List(out))
            }
            (Builtin::AssetsWithAttribute, [attribute]) => Ok(Value::List(
                self.model
                    .assets_with_attribute(as_str(attribute)?)
                    .into_iter()
                    .map(Value::Asset)
                    .collect(),
            )),
            // arity is checked when the program is built
            _ => Err(EvalErrorKind::TypeMismatch {
                expected: builtin.name(),
                found: "mismatched argument count",
            }),
        }
    }

    fn render(&self, template: &CompiledTemplate) -> Result<String, EvalErrorKind> {
        let mut out = String::new();
        for part in &template.parts {
            match part {
                CompiledTemplatePart::Text(text) => out.push_str(text),
                CompiledTemplatePart::Expr(expr) => out.push_str(&self.eval(expr)?.to_string()),
            }
        }
        Ok(out)
    }

    fn level<T: RiskLevel>(&self, level: Option<&Level<T>>) -> Result<Option<T>, EvalErrorKind> {
        match level {
            None => Ok(None),
            Some(Level::Fixed(value)) => Ok(Some(*value)),
            Some(Level::Dynamic(template)) => {
                let text = self.render(template)?;
                T::from_label(text.trim())
                    .map(Some)
                    .ok_or(EvalErrorKind::InvalidLevel {
                        field: T::FIELD,
                        value: text,
                    })
            }
        }
    }

    fn implicated_assets(&self, template: &RiskTemplate) -> Result<Vec<&'a TechnicalAsset>, EvalErrorKind> {
        let Some(exprs) = &template.assets else {
            return Ok(self.scope.bound_assets());
        };
        let mut assets: Vec<&'a TechnicalAsset> = Vec::new();
        for expr in exprs {
            collect_assets(self.eval(expr)?, &mut assets)?;
        }
        Ok(assets)
    }

    fn flow_ref(&self, expr: Option<&CompiledExpr>) -> Result<Option<String>, EvalErrorKind> {
        let Some(expr) = expr else {
            return Ok(None);
        };
        match self.eval(expr)? {
            Value::Null => Ok(None),
            Value::Flow(flow) => Ok(Some(flow.id.clone())),
            other => Err(EvalErrorKind::TypeMismatch {
                expected: "data flow",
                found: other.type_name(),
            }),
        }
    }

    fn boundary_ref(&self, expr: Option<&CompiledExpr>) -> Result<Option<String>, EvalErrorKind> {
        let Some(expr) = expr else {
            return Ok(None);
        };
        match self.eval(expr)? {
            Value::Null => Ok(None),
            Value::Boundary(boundary) => Ok(Some(boundary.id.clone())),
            other => Err(EvalErrorKind::TypeMismatch {
                expected: "trust boundary",
                found: other.type_name(),
            }),
        }
    }

    fn emit(&mut self, template: &RiskTemplate) -> Result<(), EvalErrorKind> {
        let assets = self.implicated_assets(template)?;
        if assets.is_empty() {
            return Err(EvalErrorKind::NoAssets);
        }
        let asset_ids: Vec<String> = assets.iter().map(|a| a.id.clone()).collect();
        let key = template.key.as_ref().map(|k| self.render(k)).transpose()?;
        let id = risk_id(&self.category.id, &asset_ids, key.as_deref());

        let title = match &template.title {
            Some(title) => self.render(title)?,
            None => format!("{} at {}", self.category.title, asset_ids.join(", ")),
        };
        let likelihood = self
            .level(template.likelihood.as_ref())?
            .or(self.category.default_likelihood)
            .unwrap_or(RiskExploitationLikelihood::Likely);
        let impact = self
            .level(template.impact.as_ref())?
            .or(self.category.default_impact)
            .unwrap_or(RiskExploitationImpact::Medium);
        let severity = self
            .level(template.severity.as_ref())?
            .unwrap_or_else(|| RiskSeverity::calculate(likelihood, impact));
        let data_breach_probability = self
            .level(template.data_breach_probability.as_ref())?
            .unwrap_or(DataBreachProbability::Possible);
        let data_flow_id = self.flow_ref(template.data_flow.as_ref())?;
        let trust_boundary_id = self.boundary_ref(template.trust_boundary.as_ref())?;

        if !self.scope.record_emission(&id) {
            return Err(EvalErrorKind::DuplicateRiskId { id });
        }
        self.emitted += 1;
        trace!(risk_id = %id, %severity, "risk emitted");

        match self.mode {
            Mode::Find { risk_id } => {
                if id == risk_id {
                    self.found = Some(assets);
                }
            }
            Mode::Collect => self.scope.push_risk(Risk {
                id,
                category_id: self.category.id.clone(),
                severity,
                likelihood,
                impact,
                data_breach_probability,
                title,
                technical_asset_ids: asset_ids,
                data_flow_id,
                trust_boundary_id,
            }),
        }
        Ok(())
    }
}

fn data_member<'a>(data: &'a DataAsset, name: &str) -> Option<Value<'a>> {
    Some(match name {
        "id" => Value::from(data.id.as_str()),
        "title" => Value::from(data.title.as_str()),
        "description" => Value::from(data.description.as_str()),
        "usage" => Value::from(data.usage.as_str()),
        "quantity" => Value::from(data.quantity.as_str()),
        "confidentiality" => Value::Confidentiality(data.confidentiality),
        "integrity" => Value::Criticality(data.integrity),
        "availability" => Value::Criticality(data.availability),
        "tags" => strings(&data.tags),
        _ => return None,
    })
}

fn category_member<'a>(category: &'a RiskCategory, name: &str) -> Option<Value<'a>> {
    Some(match name {
        "id" => Value::from(category.id.as_str()),
        "title" => Value::from(category.title.as_str()),
        "description" => Value::from(category.description.as_str()),
        "impact" => Value::from(category.impact.as_str()),
        "stride" => Value::from(category.stride.as_str()),
        "function" => Value::from(category.function.as_str()),
        "cwe" => Value::Int(i64::from(category.cwe)),
        _ => return None,
    })
}

fn strings<'a>(items: &[String]) -> Value<'a> {
    Value::List(items.iter().map(|s| Value::from(s.as_str())).collect())
}

fn len_i64(len: usize) -> i64 {
    i64::try_from(len).unwrap_or(i64::MAX)
}

fn as_list<'v, 'a>(value: &'v Value<'a>) -> Result<&'v [Value<'a>], EvalErrorKind> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(EvalErrorKind::TypeMismatch {
            expected: "list",
            found: other.type_name(),
        }),
    }
}

fn as_str<'v>(value: &'v Value<'_>) -> Result<&'v str, EvalErrorKind> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(EvalErrorKind::TypeMismatch {
            expected: "string",
            found: other.type_name(),
        }),
    }
}

fn entity_tags<'a>(value: &Value<'a>) -> Result<&'a [String], EvalErrorKind> {
    value.tags().ok_or(EvalErrorKind::TypeMismatch {
        expected: "taggable entity",
        found: value.type_name(),
    })
}

/// Flatten assets and lists of assets, keeping the first occurrence of each.
fn collect_assets<'a>(value: Value<'a>, out: &mut Vec<&'a TechnicalAsset>) -> Result<(), EvalErrorKind> {
    match value {
        Value::Asset(asset) => {
            if !out.iter().any(|a| a.id == asset.id) {
                out.push(asset);
            }
            Ok(())
        }
        Value::List(items) => items.into_iter().try_for_each(|item| collect_assets(item, out)),
        Value::Null => Ok(()),
        other => Err(EvalErrorKind::TypeMismatch {
            expected: "technical asset",
            found: other.type_name(),
        }),
    }
}
