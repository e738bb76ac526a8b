//! Static cross-reference lookup table.
//!
//! Loads a delimited mapping file once and answers lookups in both
//! directions. The file has no header row; the two columns of interest are
//! named by [`LookupLayout`] rather than by bare indices.
//!
//! A missing key is an ordinary outcome and reads as `None`.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while loading a lookup table.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Failed to open lookup file {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse lookup file at record {record}: {source}")]
    Parse {
        record: u64,
        #[source]
        source: csv::Error,
    },
}

pub type LookupResult<T> = Result<T, LookupError>;

/// Which columns of the mapping file hold which identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LookupLayout {
    /// Column holding the source-vocabulary id (PDQ id).
    pub source_id_column: usize,
    /// Column holding the thesaurus concept code (NCIt C-code).
    pub concept_code_column: usize,
    /// Field delimiter.
    pub delimiter: u8,
}

impl Default for LookupLayout {
    fn default() -> Self {
        Self {
            source_id_column: 0,
            concept_code_column: 8,
            delimiter: b',',
        }
    }
}

/// Forward and reverse index over a two-column mapping.
#[derive(Debug, Clone, Default)]
pub struct LookupTable {
    by_source_id: HashMap<String, String>,
    by_concept_code: HashMap<String, String>,
}

impl LookupTable {
    /// Load a mapping file from disk.
    pub fn load<P: AsRef<Path>>(path: P, layout: LookupLayout) -> LookupResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| LookupError::Open {
            path: path.display().to_string(),
            source,
        })?;

        let table = Self::from_reader(file, layout)?;
        info!(
            path = %path.display(),
            entries = table.len(),
            "loaded lookup table"
        );
        Ok(table)
    }

    /// Load a mapping from any reader.
    ///
    /// Rows too short to hold both columns are skipped. When a key repeats,
    /// the later row wins.
    pub fn from_reader<R: Read>(reader: R, layout: LookupLayout) -> LookupResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(layout.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut table = Self::default();
        let mut skipped = 0usize;

        for (index, record) in csv_reader.records().enumerate() {
            let record = record.map_err(|source| LookupError::Parse {
                record: index as u64 + 1,
                source,
            })?;

            let (Some(source_id), Some(concept_code)) = (
                record.get(layout.source_id_column),
                record.get(layout.concept_code_column),
            ) else {
                skipped += 1;
                continue;
            };

            table.insert(source_id.trim(), concept_code.trim());
        }

        if skipped > 0 {
            debug!(skipped, "skipped short lookup rows");
        }

        Ok(table)
    }

    /// Add one mapping pair.
    pub fn insert(&mut self, source_id: impl Into<String>, concept_code: impl Into<String>) {
        let source_id = source_id.into();
        let concept_code = concept_code.into();
        self.by_concept_code
            .insert(concept_code.clone(), source_id.clone());
        self.by_source_id.insert(source_id, concept_code);
    }

    /// Source id mapped to a concept code.
    pub fn source_id_for(&self, concept_code: &str) -> Option<&str> {
        self.by_concept_code.get(concept_code).map(String::as_str)
    }

    /// Concept code mapped to a source id.
    pub fn concept_code_for(&self, source_id: &str) -> Option<&str> {
        self.by_source_id.get(source_id).map(String::as_str)
    }

    /// Number of distinct source ids.
    pub fn len(&self) -> usize {
        self.by_source_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_source_id.is_empty()
    }
}
