//! Count-query filter construction.
//!
//! Every secondary count is a term filter on fields inside one nested
//! document path, optionally narrowed by a "qualifying" predicate. The
//! qualifying clauses are attached as a boolean `should` with
//! `minimum_should_match: 1`, so at least one of them must hold. A
//! qualified count is always taken over the same key as its unqualified
//! counterpart; nothing checks at runtime that it is a subset.

use serde_json::{json, Map, Value};

/// A single `term` match on a nested field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermMatch {
    /// Full field path (e.g. `arms.interventions.intervention_type`).
    pub field: String,
    /// Exact value to match.
    pub value: String,
}

/// Filter for a `_count` request.
#[derive(Debug, Clone, PartialEq)]
pub struct CountFilter {
    /// Nested document path the terms live under.
    pub path: String,
    /// Terms that must all match within one nested document.
    pub terms: Vec<TermMatch>,
    /// Extra clauses of which at least one must match.
    pub qualifying: Vec<Value>,
}

impl CountFilter {
    /// Start a filter over the given nested path.
    pub fn nested(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            terms: Vec::new(),
            qualifying: Vec::new(),
        }
    }

    /// Require an exact term match on a nested field.
    pub fn term(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.terms.push(TermMatch {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Narrow the count with qualifying clauses.
    pub fn qualified_by(mut self, clauses: Vec<Value>) -> Self {
        self.qualifying = clauses;
        self
    }

    /// Whether this filter carries a qualifying predicate.
    pub fn is_qualified(&self) -> bool {
        !self.qualifying.is_empty()
    }

    /// The matched term values joined with `/`, e.g. `drug/aspirin`.
    pub fn key(&self) -> String {
        self.terms
            .iter()
            .map(|t| t.value.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Render the `query` clause.
    pub fn to_query(&self) -> Value {
        let must: Vec<Value> = self
            .terms
            .iter()
            .map(|t| {
                let mut term = Map::new();
                term.insert(t.field.clone(), Value::String(t.value.clone()));
                json!({ "term": term })
            })
            .collect();

        let nested = json!({
            "nested": {
                "path": self.path,
                "score_mode": "avg",
                "query": { "bool": { "must": must } }
            }
        });

        if self.is_qualified() {
            json!({
                "bool": {
                    "must": [nested],
                    "should": self.qualifying,
                    "minimum_should_match": 1
                }
            })
        } else {
            json!({ "bool": { "must": [nested] } })
        }
    }

    /// Render the full `_count` request body.
    pub fn to_body(&self) -> Value {
        json!({ "query": self.to_query() })
    }
}
