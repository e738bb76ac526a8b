//! Intervention instance counts across viewable trials.

use serde_json::Value;

use super::queries::{self, INTERVENTION_NAME, INTERVENTION_TYPE};
use super::{CandidateRow, EnrichmentPlan, ReportDefinition, ReportKind, RowKey};
use crate::search::AggNode;
use crate::workbook::CellValue;

/// One row per intervention type and name: `[type, name, count]`.
///
/// The primary query already restricts to viewable trials, and the count is
/// the name bucket's document count, i.e. intervention instances rather
/// than trials. No enrichment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewableInterventionsByType;

impl ReportDefinition for ViewableInterventionsByType {
    fn kind(&self) -> ReportKind {
        ReportKind::ViewableInterventionsByType
    }

    fn sheet_name(&self) -> &'static str {
        "Interventions"
    }

    fn header(&self) -> Vec<&'static str> {
        vec![INTERVENTION_TYPE, INTERVENTION_NAME, "count"]
    }

    fn aggregation(&self) -> &'static str {
        "interventions"
    }

    fn query_body(&self) -> Value {
        queries::viewable_interventions_by_type()
    }

    fn extract_rows(&self, tree: &AggNode) -> Vec<CandidateRow> {
        tree.buckets(INTERVENTION_TYPE)
            .iter()
            .flat_map(|type_bucket| {
                type_bucket
                    .buckets(INTERVENTION_NAME)
                    .iter()
                    .map(move |name_bucket| CandidateRow {
                        key: RowKey::TypeName {
                            kind: type_bucket.key.clone(),
                            name: name_bucket.key.clone(),
                        },
                        cells: vec![
                            CellValue::from(type_bucket.key.as_str()),
                            CellValue::from(name_bucket.key.as_str()),
                            CellValue::from(name_bucket.doc_count),
                        ],
                    })
            })
            .collect()
    }

    fn enrichment(&self) -> Option<EnrichmentPlan> {
        None
    }
}
