//! Filter documents.
//!
//! A small, backend-neutral predicate language over dotted paths. Backends
//! translate it into their own query language; the in-memory store evaluates
//! it directly with `Filter::matches`.

use std::cmp::Ordering;

use serde_json::Value;

use super::{Document, path};

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals value (numbers compare numerically).
    Eq(String, Value),
    /// Field equals one of the values.
    In(String, Vec<Value>),
    /// Field present (`true`) or absent (`false`). `null` counts as absent.
    Exists(String, bool),
    Lt(String, Value),
    Lte(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(path.into(), value.into())
    }

    pub fn is_in<V: Into<Value>>(path: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In(path.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn exists(path: impl Into<String>) -> Self {
        Filter::Exists(path.into(), true)
    }

    pub fn missing(path: impl Into<String>) -> Self {
        Filter::Exists(path.into(), false)
    }

    pub fn lte(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Lte(path.into(), value.into())
    }

    pub fn gt(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Gt(path.into(), value.into())
    }

    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(filters.into_iter().collect())
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(filters.into_iter().collect())
    }

    /// Evaluate against a document.
    ///
    /// Comparisons against a missing field, or between values of different
    /// kinds, never match. An empty `And` matches everything, an empty `Or`
    /// matches nothing.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::Eq(p, expected) => {
                path::get(doc, p).is_some_and(|actual| values_equal(actual, expected))
            }
            Filter::In(p, candidates) => path::get(doc, p)
                .is_some_and(|actual| candidates.iter().any(|c| values_equal(actual, c))),
            Filter::Exists(p, wanted) => {
                let present = path::get(doc, p).is_some_and(|v| !v.is_null());
                present == *wanted
            }
            Filter::Lt(p, bound) => cmp_field(doc, p, bound) == Some(Ordering::Less),
            Filter::Lte(p, bound) => matches!(
                cmp_field(doc, p, bound),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Filter::Gt(p, bound) => cmp_field(doc, p, bound) == Some(Ordering::Greater),
            Filter::Gte(p, bound) => matches!(
                cmp_field(doc, p, bound),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(doc)),
        }
    }
}

fn cmp_field(doc: &Document, p: &str, bound: &Value) -> Option<Ordering> {
    path::get(doc, p).and_then(|actual| compare_values(actual, bound))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

/// Ordering between two scalars of the same kind; `None` otherwise.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn doc() -> Document {
        match json!({
            "type": "email",
            "priority": 3,
            "receivedTime": 1_000,
            "gone": null,
            "message": {"to": "a@b.c", "attempt": 2.0}
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[rstest]
    #[case::eq(Filter::eq("type", "email"), true)]
    #[case::eq_nested(Filter::eq("message.to", "a@b.c"), true)]
    #[case::eq_int_vs_float(Filter::eq("message.attempt", 2), true)]
    #[case::eq_missing(Filter::eq("missing", 1), false)]
    #[case::is_in(Filter::is_in("type", ["sms", "email"]), true)]
    #[case::not_in(Filter::is_in("type", ["sms"]), false)]
    #[case::exists(Filter::exists("receivedTime"), true)]
    #[case::null_is_missing(Filter::missing("gone"), true)]
    #[case::missing(Filter::missing("rejectedTime"), true)]
    #[case::lte_equal(Filter::lte("receivedTime", 1_000), true)]
    #[case::lte_less(Filter::lte("receivedTime", 999), false)]
    #[case::gt(Filter::gt("priority", 2), true)]
    #[case::lt_missing(Filter::Lt("nope".into(), json!(5)), false)]
    #[case::kind_mismatch(Filter::lte("type", 5), false)]
    #[case::empty_and(Filter::and([]), true)]
    #[case::empty_or(Filter::or([]), false)]
    fn evaluates(#[case] filter: Filter, #[case] expected: bool) {
        assert_eq!(filter.matches(&doc()), expected);
    }

    #[test]
    fn combinators_nest() {
        let f = Filter::and([
            Filter::eq("type", "email"),
            Filter::or([Filter::missing("nextReceivableTime"), Filter::lte("nextReceivableTime", 5)]),
            Filter::missing("rejectedTime"),
        ]);
        assert!(f.matches(&doc()));
    }
}
