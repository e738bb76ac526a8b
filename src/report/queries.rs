//! Primary aggregation request bodies and the field paths they aggregate on.

use serde_json::{json, Value};

/// Nested path of trial interventions.
pub const INTERVENTIONS_PATH: &str = "arms.interventions";
pub const INTERVENTION_TYPE: &str = "arms.interventions.intervention_type";
pub const INTERVENTION_NAME: &str = "arms.interventions.intervention_name";
pub const INTERVENTION_CODE: &str = "arms.interventions.intervention_code";

/// Nested path of trial biomarkers.
pub const BIOMARKERS_PATH: &str = "biomarkers";
pub const BIOMARKER_CONCEPT_ID: &str = "biomarkers.nci_thesaurus_concept_id";
pub const BIOMARKER_NAME: &str = "biomarkers.name";
pub const BIOMARKER_ASSAY_PURPOSE: &str = "biomarkers.assay_purpose";

/// Assay purposes that mark a biomarker as an inclusion criterion.
pub const INCLUSION_PURPOSES: &[&str] = &["Eligibility Criterion - Inclusion"];

/// Trial status field and the statuses that make a trial viewable.
pub const TRIAL_STATUS: &str = "current_trial_status";
pub const VIEWABLE_STATUSES: &[&str] = &[
    "Active",
    "Approved",
    "Enrolling by Invitation",
    "In Review",
    "Temporarily Closed to Accrual",
    "Temporarily Closed to Accrual and Intervention",
];

/// Upper bound on buckets per terms aggregation.
const MAX_TERMS: usize = 10_000;

/// Clauses of which at least one must hold for a trial to be viewable.
pub fn viewable_trial_clauses() -> Vec<Value> {
    vec![json!({ "terms": { TRIAL_STATUS: VIEWABLE_STATUSES } })]
}

fn terms(field: &str) -> Value {
    json!({ "field": field, "size": MAX_TERMS })
}

/// Interventions grouped type -> name -> code.
pub fn interventions_by_type() -> Value {
    json!({
        "size": 0,
        "aggs": {
            "interventions": {
                "nested": { "path": INTERVENTIONS_PATH },
                "aggs": {
                    INTERVENTION_TYPE: {
                        "terms": terms(INTERVENTION_TYPE),
                        "aggs": {
                            INTERVENTION_NAME: {
                                "terms": terms(INTERVENTION_NAME),
                                "aggs": {
                                    INTERVENTION_CODE: { "terms": terms(INTERVENTION_CODE) }
                                }
                            }
                        }
                    }
                }
            }
        }
    })
}

/// Interventions of viewable trials grouped type -> name.
pub fn viewable_interventions_by_type() -> Value {
    json!({
        "size": 0,
        "query": {
            "bool": {
                "should": viewable_trial_clauses(),
                "minimum_should_match": 1
            }
        },
        "aggs": {
            "interventions": {
                "nested": { "path": INTERVENTIONS_PATH },
                "aggs": {
                    INTERVENTION_TYPE: {
                        "terms": terms(INTERVENTION_TYPE),
                        "aggs": {
                            INTERVENTION_NAME: { "terms": terms(INTERVENTION_NAME) }
                        }
                    }
                }
            }
        }
    })
}

/// Biomarkers grouped concept id -> name -> inclusion assay purpose.
pub fn inclusion_biomarkers() -> Value {
    json!({
        "size": 0,
        "aggs": {
            "biomarkers": {
                "nested": { "path": BIOMARKERS_PATH },
                "aggs": {
                    BIOMARKER_CONCEPT_ID: {
                        "terms": terms(BIOMARKER_CONCEPT_ID),
                        "aggs": {
                            BIOMARKER_NAME: {
                                "terms": terms(BIOMARKER_NAME),
                                "aggs": {
                                    BIOMARKER_ASSAY_PURPOSE: {
                                        "terms": {
                                            "field": BIOMARKER_ASSAY_PURPOSE,
                                            "size": MAX_TERMS,
                                            "include": INCLUSION_PURPOSES
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    })
}
