//! Collection queries: equality/range filters, ordering and limits

use crate::path::get_field;
use crate::store::QueryDocument;
use crate::Document;
use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use std::cmp::Ordering;

/// Comparison operator for a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

/// A single predicate on a (dotted) field
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    /// Check the predicate against a document.
    ///
    /// Documents without the field, or whose value is not comparable with
    /// the filter value, never match.
    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        let Some(actual) = get_field(document, &self.field) else {
            return false;
        };
        if self.op == FilterOp::Eq && actual == &self.value {
            return true;
        }
        let Some(ordering) = compare_values(actual, &self.value) else {
            return false;
        };
        match self.op {
            FilterOp::Eq => ordering == Ordering::Equal,
            FilterOp::Lt => ordering == Ordering::Less,
            FilterOp::Lte => ordering != Ordering::Greater,
            FilterOp::Gt => ordering == Ordering::Greater,
            FilterOp::Gte => ordering != Ordering::Less,
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// Ordering clause
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Query over one collection
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    /// Query every document of a collection
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    /// Add a filter
    #[must_use]
    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Eq, value)
    }

    #[must_use]
    pub fn where_gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Gte, value)
    }

    #[must_use]
    pub fn where_lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Lte, value)
    }

    /// Order results by a field
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    /// Cap the number of results
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check every filter, plus presence of the ordering field
    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        if let Some(order) = &self.order_by {
            if get_field(document, &order.field).is_none() {
                return false;
            }
        }
        self.filters.iter().all(|f| f.matches(document))
    }

    /// Filter, sort and truncate a set of candidate documents
    #[must_use]
    pub fn apply(&self, candidates: impl IntoIterator<Item = QueryDocument>) -> Vec<QueryDocument> {
        let mut results: Vec<QueryDocument> = candidates
            .into_iter()
            .filter(|doc| self.matches(&doc.data))
            .collect();

        // Id order keeps ties deterministic
        results.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some(order) = &self.order_by {
            results.sort_by(|a, b| {
                let ordering = match (
                    get_field(&a.data, &order.field),
                    get_field(&b.data, &order.field),
                ) {
                    (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
                    _ => Ordering::Equal,
                };
                match order.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = self.limit {
            results.truncate(limit);
        }
        results
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s).ok()
}

/// Compare two JSON values of the same kind.
///
/// RFC 3339 strings compare chronologically, so timestamps with different
/// fractional precision still order correctly. Values of different kinds
/// are not comparable.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => match (parse_timestamp(x), parse_timestamp(y)) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => Some(x.cmp(y)),
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(id: &str, value: Value) -> QueryDocument {
        QueryDocument {
            id: id.to_string(),
            data: value.as_object().cloned().unwrap(),
        }
    }

    fn ids(docs: &[QueryDocument]) -> Vec<&str> {
        docs.iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn test_timestamps_compare_chronologically() {
        let a = json!("2024-05-01T10:00:00Z");
        let b = json!("2024-05-01T10:00:00.5Z");
        let c = json!("2024-05-01T12:00:00+02:00");
        assert_eq!(compare_values(&a, &b), Some(Ordering::Less));
        assert_eq!(compare_values(&a, &c), Some(Ordering::Equal));
    }

    #[test]
    fn test_mixed_kinds_are_not_comparable() {
        assert_eq!(compare_values(&json!(1), &json!("1")), None);
        let filter = Filter {
            field: "timestamp".into(),
            op: FilterOp::Gte,
            value: json!("2024-01-01T00:00:00Z"),
        };
        assert!(!filter.matches(&entry("a", json!({"timestamp": 5})).data));
    }

    #[test]
    fn test_range_is_inclusive() {
        let docs = vec![
            entry("a", json!({"t": "2024-01-01T00:00:00Z"})),
            entry("b", json!({"t": "2024-01-02T00:00:00Z"})),
            entry("c", json!({"t": "2024-01-03T00:00:00Z"})),
        ];
        let query = Query::collection("logs")
            .where_gte("t", "2024-01-01T00:00:00Z")
            .where_lte("t", "2024-01-02T00:00:00Z")
            .order_by("t", Direction::Ascending);
        assert_eq!(ids(&query.apply(docs)), vec!["a", "b"]);
    }

    #[test]
    fn test_order_descending_with_limit() {
        let docs = vec![
            entry("a", json!({"n": 1})),
            entry("b", json!({"n": 3})),
            entry("c", json!({"n": 2})),
            entry("d", json!({"other": true})),
        ];
        let query = Query::collection("x")
            .order_by("n", Direction::Descending)
            .limit(2);
        assert_eq!(ids(&query.apply(docs)), vec!["b", "c"]);
    }

    #[test]
    fn test_equality_on_nested_field() {
        let docs = vec![
            entry("a", json!({"state": {"status": true}})),
            entry("b", json!({"state": {"status": false}})),
        ];
        let query = Query::collection("x").where_eq("state.status", true);
        assert_eq!(ids(&query.apply(docs)), vec!["a"]);
    }
}
