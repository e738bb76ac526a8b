//! Aggregation tree model parsed from search responses.
//!
//! The backend returns aggregations as loosely shaped JSON: bucket
//! aggregations carry a `buckets` array, single-bucket aggregations
//! (`nested`, `filter`) carry a `doc_count` and their sub-aggregations
//! inline. [`AggNode`] normalizes both into one recursive shape so the
//! flattening strategies can walk a fixed path of aggregation names.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Fields of a bucket object that are never sub-aggregations.
const RESERVED_FIELDS: &[&str] = &[
    "key",
    "key_as_string",
    "doc_count",
    "doc_count_error_upper_bound",
    "sum_other_doc_count",
    "meta",
];

/// The part of a `_search` response the pipeline cares about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    /// Top-level aggregations keyed by aggregation name.
    #[serde(default)]
    pub aggregations: Option<Map<String, Value>>,
}

/// Ways an otherwise successful response can fail to carry the aggregation
/// a report expects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    /// The response has no `aggregations` object, or it is empty.
    #[error("response carries no aggregations")]
    NoAggregations,

    /// The expected aggregation name is not present.
    #[error("aggregation '{0}' is absent from the response")]
    Absent(String),

    /// The expected aggregation is present but has no content.
    #[error("aggregation '{0}' is empty")]
    Empty(String),
}

impl SearchResponse {
    /// Build a response around a raw `aggregations` value.
    pub fn with_aggregations(aggregations: Value) -> Self {
        Self {
            aggregations: match aggregations {
                Value::Object(map) => Some(map),
                _ => None,
            },
        }
    }

    /// Extract the named top-level aggregation as a tree.
    ///
    /// Checks every level explicitly: the aggregation map must exist and be
    /// non-empty, it must hold `name`, and that entry must be a non-empty
    /// object.
    pub fn aggregation(&self, name: &str) -> Result<AggNode, ShapeError> {
        let aggregations = match &self.aggregations {
            Some(map) if !map.is_empty() => map,
            _ => return Err(ShapeError::NoAggregations),
        };

        let value = aggregations
            .get(name)
            .ok_or_else(|| ShapeError::Absent(name.to_string()))?;

        match value {
            Value::Object(obj) if !obj.is_empty() => Ok(AggNode::from_object(name, obj)),
            _ => Err(ShapeError::Empty(name.to_string())),
        }
    }
}

/// One node of an aggregation tree: a bucket (or single-bucket aggregation)
/// with its document count and any nested aggregations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggNode {
    /// Bucket key, rendered as a string.
    pub key: String,
    /// Number of documents in this bucket.
    pub doc_count: u64,
    /// Nested aggregations by name, each an ordered list of buckets.
    pub children: BTreeMap<String, Vec<AggNode>>,
}

impl AggNode {
    /// Create a bucket with no nested aggregations.
    pub fn leaf(key: impl Into<String>, doc_count: u64) -> Self {
        Self {
            key: key.into(),
            doc_count,
            children: BTreeMap::new(),
        }
    }

    /// Attach a nested aggregation (builder style).
    pub fn with_child(mut self, name: impl Into<String>, buckets: Vec<AggNode>) -> Self {
        self.children.insert(name.into(), buckets);
        self
    }

    /// Buckets of a nested aggregation, or `None` if the aggregation is absent.
    pub fn child(&self, name: &str) -> Option<&[AggNode]> {
        self.children.get(name).map(Vec::as_slice)
    }

    /// Buckets of a nested aggregation; absent aggregations read as empty.
    pub fn buckets(&self, name: &str) -> &[AggNode] {
        self.child(name).unwrap_or(&[])
    }

    /// First bucket of a nested aggregation in backend order.
    pub fn first(&self, name: &str) -> Option<&AggNode> {
        self.buckets(name).first()
    }

    /// Parse a node from a JSON value. `fallback_key` names the node when the
    /// JSON has no `key` of its own (single-bucket aggregations).
    pub fn from_json(fallback_key: &str, value: &Value) -> Self {
        match value {
            Value::Object(obj) => Self::from_object(fallback_key, obj),
            _ => Self::leaf(fallback_key, 0),
        }
    }

    fn from_object(fallback_key: &str, obj: &Map<String, Value>) -> Self {
        let key = obj
            .get("key_as_string")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| obj.get("key").and_then(render_key))
            .unwrap_or_else(|| fallback_key.to_string());

        let doc_count = obj.get("doc_count").and_then(Value::as_u64).unwrap_or(0);

        let mut children = BTreeMap::new();
        for (name, child) in obj {
            if RESERVED_FIELDS.contains(&name.as_str()) {
                continue;
            }
            let Value::Object(child_obj) = child else {
                continue;
            };

            match child_obj.get("buckets") {
                Some(Value::Array(buckets)) => {
                    let parsed = buckets.iter().map(|b| Self::from_json("", b)).collect();
                    children.insert(name.clone(), parsed);
                }
                // `keyed: true` bucket aggregations, kept in response order
                Some(Value::Object(keyed)) => {
                    let parsed = keyed
                        .iter()
                        .map(|(bucket_key, b)| Self::from_json(bucket_key, b))
                        .collect();
                    children.insert(name.clone(), parsed);
                }
                _ if child_obj.contains_key("doc_count") => {
                    children.insert(name.clone(), vec![Self::from_object(name, child_obj)]);
                }
                // Metric aggregations and anything else are not buckets.
                _ => {}
            }
        }

        Self {
            key,
            doc_count,
            children,
        }
    }
}

fn render_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(
            n.as_i64()
                .map(|i| i.to_string())
                .or_else(|| n.as_u64().map(|u| u.to_string()))
                .unwrap_or_else(|| n.to_string()),
        ),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
