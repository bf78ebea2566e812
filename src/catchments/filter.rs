use std::collections::BTreeSet;

use serde_json::{json, Map, Value};

/// Catchment feature attributes a filter can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attr {
    Type,
    State,
    YearLevel,
}

impl Attr {
    pub fn to_str(&self) -> &'static str {
        match self {
            Attr::Type => "type",
            Attr::State => "state",
            Attr::YearLevel => "year_level",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    Str(String),
    Int(i64),
    Null,
}

impl Literal {
    fn to_json(&self) -> Value {
        match self {
            Literal::Str(s) => Value::String(s.clone()),
            Literal::Int(i) => json!(i),
            Literal::Null => Value::Null,
        }
    }

    /// Strict comparison: no coercion between strings and numbers; a missing attribute is null.
    fn matches(&self, value: Option<&Value>) -> bool {
        match (self, value) {
            (Literal::Null, None | Some(Value::Null)) => true,
            (Literal::Str(s), Some(Value::String(v))) => s == v,
            (Literal::Int(i), Some(Value::Number(n))) => n.as_i64() == Some(*i) || n.as_f64() == Some(*i as f64),
            _ => false,
        }
    }
}

/// Immutable boolean filter tree, evaluated per feature by the rendering engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterExpression {
    Any(Vec<FilterExpression>),
    All(Vec<FilterExpression>),
    Eq(Attr, Literal),
    In(Attr, Vec<Literal>),
}

impl FilterExpression {
    pub fn eq_str(attr: Attr, value: &str) -> Self { FilterExpression::Eq(attr, Literal::Str(value.to_string())) }

    /// `year_level` equal to one of `years` (a single year becomes an equality test).
    pub fn year_in(years: &[u8]) -> Self {
        match years {
            [year] => FilterExpression::Eq(Attr::YearLevel, Literal::Int(i64::from(*year))),
            _ => FilterExpression::In(Attr::YearLevel, years.iter().map(|y| Literal::Int(i64::from(*y))).collect()),
        }
    }

    /// Engine expression syntax, e.g. `["==", ["get", "type"], "Primary"]`.
    pub fn to_json(&self) -> Value {
        match self {
            FilterExpression::Any(children) | FilterExpression::All(children) => {
                let op = if matches!(self, FilterExpression::Any(_)) { "any" } else { "all" };
                let mut out = vec![json!(op)];
                out.extend(children.iter().map(FilterExpression::to_json));
                Value::Array(out)
            }
            FilterExpression::Eq(attr, literal) => json!(["==", ["get", attr.to_str()], literal.to_json()]),
            FilterExpression::In(attr, literals) => {
                let values: Vec<Value> = literals.iter().map(Literal::to_json).collect();
                json!(["in", ["get", attr.to_str()], ["literal", values]])
            }
        }
    }

    /// Values the tree compares the `type` attribute against.
    pub fn type_names(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_type_names(&mut out);
        out
    }

    fn collect_type_names<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            FilterExpression::Any(children) | FilterExpression::All(children) => {
                children.iter().for_each(|c| c.collect_type_names(out));
            }
            FilterExpression::Eq(Attr::Type, Literal::Str(s)) => { out.insert(s.as_str()); }
            FilterExpression::In(Attr::Type, literals) => {
                out.extend(literals.iter().filter_map(|l| match l {
                    Literal::Str(s) => Some(s.as_str()),
                    _ => None,
                }));
            }
            FilterExpression::Eq(..) | FilterExpression::In(..) => {}
        }
    }

    /// Evaluate against a feature's properties.
    pub fn matches(&self, properties: &Map<String, Value>) -> bool {
        match self {
            FilterExpression::Any(children) => children.iter().any(|c| c.matches(properties)),
            FilterExpression::All(children) => children.iter().all(|c| c.matches(properties)),
            FilterExpression::Eq(attr, literal) => literal.matches(properties.get(attr.to_str())),
            FilterExpression::In(attr, literals) => {
                let value = properties.get(attr.to_str());
                literals.iter().any(|l| l.matches(value))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(value: Value) -> Map<String, Value> { value.as_object().cloned().unwrap_or_default() }

    #[test]
    fn emits_engine_syntax() {
        let expr = FilterExpression::Any(vec![FilterExpression::All(vec![
            FilterExpression::eq_str(Attr::State, "QLD"),
            FilterExpression::eq_str(Attr::Type, "Junior Secondary"),
            FilterExpression::year_in(&[7, 8]),
        ])]);
        assert_eq!(expr.to_json(), json!(["any", ["all",
            ["==", ["get", "state"], "QLD"],
            ["==", ["get", "type"], "Junior Secondary"],
            ["in", ["get", "year_level"], ["literal", [7, 8]]],
        ]]));

        assert_eq!(FilterExpression::year_in(&[11]).to_json(), json!(["==", ["get", "year_level"], 11]));
        assert_eq!(FilterExpression::Eq(Attr::YearLevel, Literal::Null).to_json(), json!(["==", ["get", "year_level"], null]));
    }

    #[test]
    fn evaluates_strictly() {
        let expr = FilterExpression::All(vec![
            FilterExpression::eq_str(Attr::Type, "Secondary"),
            FilterExpression::Eq(Attr::YearLevel, Literal::Null),
        ]);
        assert!(expr.matches(&props(json!({ "type": "Secondary" }))));
        assert!(expr.matches(&props(json!({ "type": "Secondary", "year_level": null }))));
        assert!(!expr.matches(&props(json!({ "type": "Secondary", "year_level": 7 }))));

        let years = FilterExpression::year_in(&[7, 8]);
        assert!(years.matches(&props(json!({ "year_level": 8 }))));
        assert!(!years.matches(&props(json!({ "year_level": "8" }))));
        assert!(!FilterExpression::Any(vec![]).matches(&props(json!({}))));
    }

    #[test]
    fn collects_type_names() {
        let expr = FilterExpression::Any(vec![
            FilterExpression::All(vec![FilterExpression::eq_str(Attr::State, "NSW"), FilterExpression::eq_str(Attr::Type, "Future")]),
            FilterExpression::In(Attr::Type, vec![Literal::Str("Primary".into()), Literal::Int(3)]),
        ]);
        assert_eq!(expr.type_names().into_iter().collect::<Vec<_>>(), vec!["Future", "Primary"]);
    }
}
