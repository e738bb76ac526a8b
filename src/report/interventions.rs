//! Interventions by type, optionally cross-referenced to PDQ ids.

use std::sync::Arc;

use serde_json::Value;

use super::queries::{self, INTERVENTION_CODE, INTERVENTION_NAME, INTERVENTION_TYPE};
use super::{CandidateRow, EnrichmentPlan, ReportDefinition, ReportKind, RowKey, UNKNOWN};
use crate::lookup::LookupTable;
use crate::search::AggNode;
use crate::workbook::CellValue;

/// One row per intervention type and name: `[code, type, name]`, plus the
/// PDQ id when a lookup table is attached, followed by the viewable and
/// total trial counts.
///
/// The code is the first code bucket under the name, or [`UNKNOWN`] when
/// the name has none. The PDQ id is [`UNKNOWN`] when the code is unknown or
/// has no mapping.
#[derive(Debug, Clone, Default)]
pub struct InterventionsByType {
    lookup: Option<Arc<LookupTable>>,
}

impl InterventionsByType {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a PDQ id column resolved through `lookup`.
    pub fn with_lookup(lookup: Arc<LookupTable>) -> Self {
        Self {
            lookup: Some(lookup),
        }
    }

    fn pdq_id(lookup: &LookupTable, code: &str) -> String {
        if code == UNKNOWN {
            return UNKNOWN.to_string();
        }
        lookup.source_id_for(code).unwrap_or(UNKNOWN).to_string()
    }
}

impl ReportDefinition for InterventionsByType {
    fn kind(&self) -> ReportKind {
        if self.lookup.is_some() {
            ReportKind::InterventionsByTypeWithPdq
        } else {
            ReportKind::InterventionsByType
        }
    }

    fn sheet_name(&self) -> &'static str {
        "Interventions"
    }

    fn header(&self) -> Vec<&'static str> {
        let mut header = vec![INTERVENTION_CODE, INTERVENTION_TYPE, INTERVENTION_NAME];
        if self.lookup.is_some() {
            header.push("PDQID");
        }
        header.extend(["Viewable Count", "All Count"]);
        header
    }

    fn aggregation(&self) -> &'static str {
        "interventions"
    }

    fn query_body(&self) -> Value {
        queries::interventions_by_type()
    }

    fn extract_rows(&self, tree: &AggNode) -> Vec<CandidateRow> {
        let mut rows = Vec::new();

        for type_bucket in tree.buckets(INTERVENTION_TYPE) {
            for name_bucket in type_bucket.buckets(INTERVENTION_NAME) {
                let code = name_bucket
                    .first(INTERVENTION_CODE)
                    .map(|b| b.key.clone())
                    .unwrap_or_else(|| UNKNOWN.to_string());

                let mut cells = vec![
                    CellValue::from(code.as_str()),
                    CellValue::from(type_bucket.key.as_str()),
                    CellValue::from(name_bucket.key.as_str()),
                ];
                if let Some(lookup) = &self.lookup {
                    cells.push(CellValue::from(Self::pdq_id(lookup, &code)));
                }

                rows.push(CandidateRow {
                    key: RowKey::TypeName {
                        kind: type_bucket.key.clone(),
                        name: name_bucket.key.clone(),
                    },
                    cells,
                });
            }
        }

        rows
    }

    fn enrichment(&self) -> Option<EnrichmentPlan> {
        Some(EnrichmentPlan::viewable_trials())
    }
}
