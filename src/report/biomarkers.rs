//! Inclusion-criterion biomarkers.

use serde_json::Value;
use tracing::debug;

use super::queries::{self, BIOMARKER_ASSAY_PURPOSE, BIOMARKER_CONCEPT_ID, BIOMARKER_NAME};
use super::{CandidateRow, EnrichmentPlan, ReportDefinition, ReportKind, RowKey};
use crate::search::AggNode;
use crate::workbook::CellValue;

/// One row per biomarker concept used as an inclusion criterion:
/// `[concept id, name, instance count]`, followed by the viewable and total
/// trial counts.
///
/// Each concept id is assumed to carry a single name. The first name bucket
/// is used; a concept with no name bucket is skipped. A name without any
/// inclusion assay-purpose bucket does not qualify. The instance count sums
/// the purpose buckets' document counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct InclusionBiomarkers;

impl ReportDefinition for InclusionBiomarkers {
    fn kind(&self) -> ReportKind {
        ReportKind::InclusionBiomarkers
    }

    fn sheet_name(&self) -> &'static str {
        "Biomarkers"
    }

    fn header(&self) -> Vec<&'static str> {
        vec![
            BIOMARKER_CONCEPT_ID,
            BIOMARKER_NAME,
            "Instance Count across All Trials",
            "Viewable Trial Count",
            "All Trial Count",
        ]
    }

    fn aggregation(&self) -> &'static str {
        "biomarkers"
    }

    fn query_body(&self) -> Value {
        queries::inclusion_biomarkers()
    }

    fn extract_rows(&self, tree: &AggNode) -> Vec<CandidateRow> {
        let mut rows = Vec::new();

        for concept in tree.buckets(BIOMARKER_CONCEPT_ID) {
            let names = concept.buckets(BIOMARKER_NAME);
            let Some(name) = names.first() else {
                continue;
            };
            if names.len() > 1 {
                debug!(
                    concept = %concept.key,
                    names = names.len(),
                    using = %name.key,
                    "concept has several names, using the first"
                );
            }

            let purposes = name.buckets(BIOMARKER_ASSAY_PURPOSE);
            if purposes.is_empty() {
                continue;
            }
            let instances: u64 = purposes.iter().map(|p| p.doc_count).sum();

            rows.push(CandidateRow {
                key: RowKey::Concept {
                    id: concept.key.clone(),
                },
                cells: vec![
                    CellValue::from(concept.key.as_str()),
                    CellValue::from(name.key.as_str()),
                    CellValue::from(instances),
                ],
            });
        }

        rows
    }

    fn enrichment(&self) -> Option<EnrichmentPlan> {
        Some(EnrichmentPlan::viewable_trials())
    }
}
