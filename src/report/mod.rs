//! Report definitions and aggregation flattening.
//!
//! Each report kind pairs a primary aggregation query with a flattening
//! strategy that walks the returned bucket tree along a fixed path of
//! aggregation names and emits one candidate row per qualifying leaf.
//!
//! ```text
//!  ReportKind ──definition()──► dyn ReportDefinition
//!                                 ├── query_body()      primary request
//!                                 ├── extract_rows()    AggNode -> CandidateRow*
//!                                 ├── enrichment()      derived count columns
//!                                 └── sheet_name() / header()
//! ```
//!
//! Flattening conventions shared by every strategy:
//! - buckets are visited in backend order, depth first
//! - a leaf-level aggregation with no buckets does not qualify and emits nothing
//! - where one identifying sub-bucket is expected, the first is used and a
//!   bucket with none is skipped
//! - an unresolvable secondary identifier is written as [`UNKNOWN`]

mod biomarkers;
mod interventions;
pub mod queries;
mod viewable;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{ReportError, ReportResult};
use crate::lookup::LookupTable;
use crate::search::{AggNode, CountFilter};
use crate::workbook::Row;

pub use biomarkers::InclusionBiomarkers;
pub use interventions::InterventionsByType;
pub use viewable::ViewableInterventionsByType;

/// Sentinel for identifiers that could not be resolved.
pub const UNKNOWN: &str = "UNK";

/// Identifying field values of a candidate row, used to build its count
/// filters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RowKey {
    /// An intervention identified by type and name.
    TypeName { kind: String, name: String },
    /// A biomarker identified by its thesaurus concept id.
    Concept { id: String },
}

impl RowKey {
    /// Unqualified count filter for this key.
    pub fn count_filter(&self) -> CountFilter {
        match self {
            Self::TypeName { kind, name } => CountFilter::nested(queries::INTERVENTIONS_PATH)
                .term(queries::INTERVENTION_TYPE, kind.as_str())
                .term(queries::INTERVENTION_NAME, name.as_str()),
            Self::Concept { id } => CountFilter::nested(queries::BIOMARKERS_PATH)
                .term(queries::BIOMARKER_CONCEPT_ID, id.as_str()),
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeName { kind, name } => write!(f, "{}/{}", kind, name),
            Self::Concept { id } => f.write_str(id),
        }
    }
}

/// A flattened row before enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRow {
    pub key: RowKey,
    pub cells: Row,
}

/// How a report derives its count columns.
///
/// Every enriched row gains two columns, in order: the count narrowed by
/// `qualifying`, then the unqualified count.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentPlan {
    pub qualifying: Vec<Value>,
}

impl EnrichmentPlan {
    /// Number of columns enrichment appends to each row.
    pub const DERIVED_COLUMNS: usize = 2;

    /// Count only rows of viewable trials as qualifying.
    pub fn viewable_trials() -> Self {
        Self {
            qualifying: queries::viewable_trial_clauses(),
        }
    }
}

/// A report: its primary query, flattening strategy and sheet layout.
pub trait ReportDefinition: Send + Sync {
    fn kind(&self) -> ReportKind;

    /// Name of the sheet the report is written to.
    fn sheet_name(&self) -> &'static str;

    /// Full header, derived columns included.
    fn header(&self) -> Vec<&'static str>;

    /// Name of the top-level aggregation `extract_rows` expects.
    fn aggregation(&self) -> &'static str;

    /// Primary aggregation request body.
    fn query_body(&self) -> Value;

    /// Flatten the aggregation tree into candidate rows.
    fn extract_rows(&self, tree: &AggNode) -> Vec<CandidateRow>;

    /// Derived count columns, if the report has any.
    fn enrichment(&self) -> Option<EnrichmentPlan>;

    /// Width of a row straight out of `extract_rows`.
    fn candidate_width(&self) -> usize {
        let derived = if self.enrichment().is_some() {
            EnrichmentPlan::DERIVED_COLUMNS
        } else {
            0
        };
        self.header().len() - derived
    }
}

/// The available reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    InterventionsByType,
    InterventionsByTypeWithPdq,
    ViewableInterventionsByType,
    InclusionBiomarkers,
}

impl ReportKind {
    pub const ALL: [ReportKind; 4] = [
        Self::InterventionsByType,
        Self::InterventionsByTypeWithPdq,
        Self::ViewableInterventionsByType,
        Self::InclusionBiomarkers,
    ];

    /// Command-line name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InterventionsByType => "interventions-by-type",
            Self::InterventionsByTypeWithPdq => "interventions-by-type-with-pdq",
            Self::ViewableInterventionsByType => "viewable-interventions-by-type",
            Self::InclusionBiomarkers => "inclusion-biomarkers",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::InterventionsByType => {
                "Interventions by type and name with viewable and total trial counts"
            }
            Self::InterventionsByTypeWithPdq => {
                "Interventions by type and name with PDQ ids and trial counts"
            }
            Self::ViewableInterventionsByType => {
                "Intervention instance counts across viewable trials"
            }
            Self::InclusionBiomarkers => {
                "Inclusion-criterion biomarkers with instance and trial counts"
            }
        }
    }

    /// Whether the report needs a lookup table to run.
    pub fn needs_lookup(&self) -> bool {
        matches!(self, Self::InterventionsByTypeWithPdq)
    }

    /// Build the report definition.
    ///
    /// Fails with a configuration error if the report needs a lookup table
    /// and none was supplied.
    pub fn definition(
        self,
        lookup: Option<Arc<LookupTable>>,
    ) -> ReportResult<Box<dyn ReportDefinition>> {
        let definition: Box<dyn ReportDefinition> = match self {
            Self::InterventionsByType => Box::new(InterventionsByType::new()),
            Self::InterventionsByTypeWithPdq => {
                let lookup = lookup.ok_or_else(|| {
                    ReportError::configuration(format!(
                        "report '{}' requires a lookup table",
                        self.name()
                    ))
                })?;
                Box::new(InterventionsByType::with_lookup(lookup))
            }
            Self::ViewableInterventionsByType => Box::new(ViewableInterventionsByType),
            Self::InclusionBiomarkers => Box::new(InclusionBiomarkers),
        };
        Ok(definition)
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReportKind {
    type Err = ReportError;

    /// Accepts the kebab-case name or the CamelCase name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        Self::ALL
            .into_iter()
            .find(|kind| kind.name().replace('-', "") == normalized)
            .ok_or_else(|| ReportError::configuration(format!("unknown report kind: {}", s)))
    }
}
