use aggreport::search::{AggNode, CountFilter, SearchResponse, ShapeError};
use insta::assert_snapshot;
use serde_json::json;

fn interventions_response() -> SearchResponse {
    serde_json::from_value(json!({
        "took": 4,
        "timed_out": false,
        "hits": { "total": 120, "max_score": 0.0, "hits": [] },
        "aggregations": {
            "interventions": {
                "doc_count": 412,
                "arms.interventions.intervention_type": {
                    "doc_count_error_upper_bound": 0,
                    "sum_other_doc_count": 0,
                    "buckets": [
                        {
                            "key": "drug",
                            "doc_count": 300,
                            "arms.interventions.intervention_name": {
                                "buckets": [
                                    {
                                        "key": "aspirin",
                                        "doc_count": 12,
                                        "arms.interventions.intervention_code": {
                                            "buckets": [ { "key": "C287", "doc_count": 12 } ]
                                        }
                                    }
                                ]
                            }
                        },
                        {
                            "key": "device",
                            "doc_count": 112,
                            "arms.interventions.intervention_name": { "buckets": [] }
                        }
                    ]
                }
            }
        }
    }))
    .unwrap()
}

#[test]
fn test_parse_nested_bucket_tree() {
    let tree = interventions_response().aggregation("interventions").unwrap();

    assert_eq!(tree.key, "interventions");
    assert_eq!(tree.doc_count, 412);

    let types = tree.buckets("arms.interventions.intervention_type");
    let keys: Vec<_> = types.iter().map(|t| t.key.as_str()).collect();
    assert_eq!(keys, vec!["drug", "device"]);

    let aspirin = &types[0].buckets("arms.interventions.intervention_name")[0];
    assert_eq!(aspirin.key, "aspirin");
    assert_eq!(
        aspirin.first("arms.interventions.intervention_code"),
        Some(&AggNode::leaf("C287", 12))
    );
    assert!(types[1]
        .buckets("arms.interventions.intervention_name")
        .is_empty());
}

#[test]
fn test_keyed_buckets_keep_response_order() {
    let response: SearchResponse = serde_json::from_value(json!({
        "aggregations": {
            "statuses": {
                "doc_count": 9,
                "current_trial_status": {
                    "buckets": {
                        "Temporarily Closed": { "doc_count": 2 },
                        "Active": { "doc_count": 7 }
                    }
                }
            }
        }
    }))
    .unwrap();

    let tree = response.aggregation("statuses").unwrap();
    let keys: Vec<_> = tree
        .buckets("current_trial_status")
        .iter()
        .map(|b| b.key.as_str())
        .collect();
    assert_eq!(keys, vec!["Temporarily Closed", "Active"]);
    assert_eq!(
        tree.first("current_trial_status"),
        Some(&AggNode::leaf("Temporarily Closed", 2))
    );
}

#[test]
fn test_missing_aggregations_is_a_shape_error() {
    let response: SearchResponse = serde_json::from_value(json!({ "took": 1 })).unwrap();
    assert_eq!(
        response.aggregation("interventions"),
        Err(ShapeError::NoAggregations)
    );

    let empty = SearchResponse::with_aggregations(json!({}));
    assert_eq!(
        empty.aggregation("interventions"),
        Err(ShapeError::NoAggregations)
    );
}

#[test]
fn test_absent_and_empty_aggregation() {
    let response = SearchResponse::with_aggregations(json!({
        "biomarkers": {},
        "other": { "doc_count": 1 }
    }));

    assert_eq!(
        response.aggregation("interventions"),
        Err(ShapeError::Absent("interventions".to_string()))
    );
    assert_eq!(
        response.aggregation("biomarkers"),
        Err(ShapeError::Empty("biomarkers".to_string()))
    );
}

#[test]
fn test_unqualified_count_body() {
    let filter = CountFilter::nested("biomarkers")
        .term("biomarkers.nci_thesaurus_concept_id", "C1234");

    assert_eq!(filter.key(), "C1234");
    assert_snapshot!(
        filter.to_body().to_string(),
        @r#"{"query":{"bool":{"must":[{"nested":{"path":"biomarkers","score_mode":"avg","query":{"bool":{"must":[{"term":{"biomarkers.nci_thesaurus_concept_id":"C1234"}}]}}}}]}}}"#
    );
}

#[test]
fn test_qualified_count_body() {
    let filter = CountFilter::nested("biomarkers")
        .term("biomarkers.nci_thesaurus_concept_id", "C1234")
        .qualified_by(vec![json!({ "terms": { "current_trial_status": ["Active"] } })]);

    assert!(filter.is_qualified());
    assert_snapshot!(
        filter.to_body().to_string(),
        @r#"{"query":{"bool":{"must":[{"nested":{"path":"biomarkers","score_mode":"avg","query":{"bool":{"must":[{"term":{"biomarkers.nci_thesaurus_concept_id":"C1234"}}]}}}}],"should":[{"terms":{"current_trial_status":["Active"]}}],"minimum_should_match":1}}}"#
    );
}
