use std::cmp::Ordering;
use std::fmt;

use super::category::RiskCategory;
use super::expr::{CompareOp, Literal};
use crate::model::{Confidentiality, Criticality, DataAsset, DataFlow, TechnicalAsset, TrustBoundary};

/// A runtime value. Model entities are borrowed from the bound model, never copied.
#[derive(Debug, Clone)]
pub enum Value<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Confidentiality(Confidentiality),
    Criticality(Criticality),
    List(Vec<Value<'a>>),
    Asset(&'a TechnicalAsset),
    Flow(&'a DataFlow),
    Boundary(&'a TrustBoundary),
    Data(&'a DataAsset),
    /// The flattened technology attribute bag of an asset.
    Technology(&'a TechnicalAsset),
    Category(&'a RiskCategory),
}

impl<'a> Value<'a> {
    /// Name of this value's type, as used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Confidentiality(_) => "confidentiality",
            Value::Criticality(_) => "criticality",
            Value::List(_) => "list",
            Value::Asset(_) => "technical asset",
            Value::Flow(_) => "data flow",
            Value::Boundary(_) => "trust boundary",
            Value::Data(_) => "data asset",
            Value::Technology(_) => "technology",
            Value::Category(_) => "category",
        }
    }

    /// Boolean reading of a condition. `null` is false; non-boolean values have none.
    #[must_use]
    pub fn truthy(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Null => Some(false),
            _ => None,
        }
    }

    /// Identifier of a model entity.
    #[must_use]
    pub fn entity_id(&self) -> Option<&'a str> {
        match self {
            Value::Asset(a) | Value::Technology(a) => Some(&a.id),
            Value::Flow(f) => Some(&f.id),
            Value::Boundary(b) => Some(&b.id),
            Value::Data(d) => Some(&d.id),
            Value::Category(c) => Some(&c.id),
            _ => None,
        }
    }

    /// Tags of a taggable model entity.
    #[must_use]
    pub fn tags(&self) -> Option<&'a [String]> {
        match self {
            Value::Asset(a) => Some(&a.tags),
            Value::Flow(f) => Some(&f.tags),
            Value::Boundary(b) => Some(&b.tags),
            Value::Data(d) => Some(&d.tags),
            _ => None,
        }
    }

    /// Compare this value to another using the given operator.
    ///
    /// Entities compare by identity (their id) and only support `==`/`!=`;
    /// `null` equals only `null`. Confidentiality and criticality ratings
    /// order by rank and compare against their label strings. Returns `None`
    /// for incompatible types or unsupported operations.
    #[must_use]
    pub fn compare(&self, op: CompareOp, other: &Value<'_>) -> Option<bool> {
        if let Some(equal) = self.identity_eq(other) {
            return match op {
                CompareOp::Eq => Some(equal),
                CompareOp::Neq => Some(!equal),
                _ => None,
            };
        }
        let ord = self.partial_cmp_value(other)?;
        Some(match op {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Neq => ord != Ordering::Equal,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Gte => ord != Ordering::Less,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Lte => ord != Ordering::Greater,
        })
    }

    fn identity_eq(&self, other: &Value<'_>) -> Option<bool> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(true),
            (Value::Null, _) | (_, Value::Null) => Some(false),
            (Value::Asset(a), Value::Asset(b)) => Some(a.id == b.id),
            (Value::Flow(a), Value::Flow(b)) => Some(a.id == b.id),
            (Value::Boundary(a), Value::Boundary(b)) => Some(a.id == b.id),
            (Value::Data(a), Value::Data(b)) => Some(a.id == b.id),
            (Value::Category(a), Value::Category(b)) => Some(a.id == b.id),
            (Value::List(a), Value::List(b)) => Some(
                a.len() == b.len()
                    && a
                        .iter()
                        .zip(b)
                        .all(|(x, y)| x.compare(CompareOp::Eq, y) == Some(true)),
            ),
            _ => None,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn partial_cmp_value(&self, other: &Value<'_>) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            (Value::Confidentiality(a), Value::Confidentiality(b)) => Some(a.cmp(b)),
            (Value::Criticality(a), Value::Criticality(b)) => Some(a.cmp(b)),
            (Value::Confidentiality(a), Value::String(s)) => {
                s.parse::<Confidentiality>().ok().map(|b| a.cmp(&b))
            }
            (Value::String(s), Value::Confidentiality(b)) => {
                s.parse::<Confidentiality>().ok().map(|a| a.cmp(b))
            }
            (Value::Criticality(a), Value::String(s)) => {
                s.parse::<Criticality>().ok().map(|b| a.cmp(&b))
            }
            (Value::String(s), Value::Criticality(b)) => {
                s.parse::<Criticality>().ok().map(|a| a.cmp(b))
            }
            _ => None,
        }
    }
}

impl From<&Literal> for Value<'_> {
    fn from(lit: &Literal) -> Self {
        match lit {
            Literal::Null => Value::Null,
            Literal::Bool(v) => Value::Bool(*v),
            Literal::Int(v) => Value::Int(*v),
            Literal::Float(v) => Value::Float(*v),
            Literal::String(v) => Value::String(v.clone()),
        }
    }
}

impl From<bool> for Value<'_> {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value<'_> {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value<'_> {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value<'_> {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// Template rendering: strings are unquoted, entities render as their id,
/// lists as comma-separated elements and `null` as nothing.
impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
            Value::Confidentiality(v) => write!(f, "{v}"),
            Value::Criticality(v) => write!(f, "{v}"),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Value::Technology(asset) => f.write_str(&asset.technologies.join(", ")),
            Value::Asset(_) | Value::Flow(_) | Value::Boundary(_) | Value::Data(_) | Value::Category(_) => {
                f.write_str(self.entity_id().unwrap_or_default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Float(3.5).to_string(), "3.5");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::String("hello".into()).to_string(), "hello");
        assert_eq!(Value::Null.to_string(), "");
        let asset = TechnicalAsset::new("db1");
        assert_eq!(Value::Asset(&asset).to_string(), "db1");
        assert_eq!(
            Value::List(vec![Value::Asset(&asset), Value::Int(2)]).to_string(),
            "db1, 2"
        );
    }

    #[test]
    fn compare_int() {
        let a = Value::Int(10);
        let b = Value::Int(20);
        assert_eq!(a.compare(CompareOp::Eq, &b), Some(false));
        assert_eq!(a.compare(CompareOp::Neq, &b), Some(true));
        assert_eq!(a.compare(CompareOp::Lt, &b), Some(true));
        assert_eq!(a.compare(CompareOp::Lte, &b), Some(true));
        assert_eq!(a.compare(CompareOp::Gt, &b), Some(false));
        assert_eq!(a.compare(CompareOp::Gte, &a), Some(true));
    }

    #[test]
    fn compare_int_float_cross_type() {
        let i = Value::Int(10);
        let f = Value::Float(10.0);
        assert_eq!(i.compare(CompareOp::Eq, &f), Some(true));
        assert_eq!(Value::Float(10.5).compare(CompareOp::Gt, &i), Some(true));
    }

    #[test]
    fn compare_string() {
        let a = Value::from("apple");
        let b = Value::from("banana");
        assert_eq!(a.compare(CompareOp::Lt, &b), Some(true));
        assert_eq!(a.compare(CompareOp::Eq, &a), Some(true));
    }

    #[test]
    fn compare_entities_by_id() {
        let a = TechnicalAsset::new("a");
        let a_again = TechnicalAsset::new("a").with_title("other title");
        let b = TechnicalAsset::new("b");
        assert_eq!(Value::Asset(&a).compare(CompareOp::Eq, &Value::Asset(&a_again)), Some(true));
        assert_eq!(Value::Asset(&a).compare(CompareOp::Neq, &Value::Asset(&b)), Some(true));
        assert_eq!(Value::Asset(&a).compare(CompareOp::Lt, &Value::Asset(&b)), None);
    }

    #[test]
    fn compare_null() {
        let a = TechnicalAsset::new("a");
        assert_eq!(Value::Null.compare(CompareOp::Eq, &Value::Null), Some(true));
        assert_eq!(Value::Asset(&a).compare(CompareOp::Eq, &Value::Null), Some(false));
        assert_eq!(Value::Asset(&a).compare(CompareOp::Neq, &Value::Null), Some(true));
        assert_eq!(Value::Int(1).compare(CompareOp::Gt, &Value::Null), None);
    }

    #[test]
    fn compare_ratings_with_labels() {
        let c = Value::Confidentiality(Confidentiality::Confidential);
        assert_eq!(c.compare(CompareOp::Gte, &Value::from("restricted")), Some(true));
        assert_eq!(c.compare(CompareOp::Eq, &Value::from("confidential")), Some(true));
        assert_eq!(c.compare(CompareOp::Lt, &Value::from("strictly-confidential")), Some(true));
        assert_eq!(c.compare(CompareOp::Eq, &Value::from("secret")), None);

        let i = Value::Criticality(Criticality::Critical);
        assert_eq!(Value::from("important").compare(CompareOp::Lt, &i), Some(true));
    }

    #[test]
    fn compare_type_mismatch_returns_none() {
        let i = Value::Int(1);
        let s = Value::from("hello");
        assert_eq!(i.compare(CompareOp::Eq, &s), None);
        assert_eq!(s.compare(CompareOp::Eq, &Value::Bool(true)), None);
    }

    #[test]
    fn truthiness() {
        assert_eq!(Value::Bool(true).truthy(), Some(true));
        assert_eq!(Value::Null.truthy(), Some(false));
        assert_eq!(Value::Int(1).truthy(), None);
    }
}
