//! In-memory workbook assembly.
//!
//! A [`Workbook`] is an ordered list of named [`Sheet`]s that a pipeline run
//! fills in incrementally: header first, then data rows. Each sheet tracks
//! its own dimensions so its bounding range is always known without
//! rescanning cells:
//!
//! ```text
//!   (0,0) ┌──────────── header ────────────┐
//!         │ row 1                           │
//!         │ ...                             │
//!         └──────────────── (num_cols-1, num_rows-1)
//! ```
//!
//! Serialization lives behind [`OutputSink`]; sinks take `&Workbook`, so a
//! workbook cannot be mutated while it is being written.

mod sink;

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

pub use sink::{sink_for_path, CsvSink, OutputError, OutputResult, OutputSink, XlsxSink};

/// Excel worksheet maximum row count.
pub const MAX_ROWS: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const MAX_COLS: usize = 16_384;
/// Excel worksheet name maximum length.
pub const MAX_SHEET_NAME_LEN: usize = 31;
/// Characters Excel rejects in worksheet names.
const ILLEGAL_SHEET_NAME_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

/// Result type for workbook mutations.
pub type WorkbookResult<T> = Result<T, WorkbookError>;

/// Usage errors raised by workbook mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkbookError {
    #[error("sheet '{0}' already exists")]
    DuplicateSheet(String),

    #[error("sheet '{0}' cannot be found")]
    UnknownSheet(String),

    #[error("invalid sheet name '{name}': {reason}")]
    InvalidSheetName { name: String, reason: String },

    #[error("sheet '{0}' already has a header; headers cannot be modified")]
    HeaderAlreadySet(String),

    #[error("sheet '{0}' has no header; set the header before appending rows")]
    HeaderNotSet(String),

    #[error("header for sheet '{0}' has no columns")]
    EmptyHeader(String),

    #[error("row for sheet '{sheet}' has {actual} cells, expected {expected}")]
    RowWidth {
        sheet: String,
        expected: usize,
        actual: usize,
    },

    #[error("sheet '{sheet}' cannot hold {count} columns (max 16384)")]
    TooManyColumns { sheet: String, count: usize },

    #[error("sheet '{0}' is full (1048576 rows)")]
    TooManyRows(String),
}

/// A typed cell value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Text(String),
    Integer(i64),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u64> for CellValue {
    fn from(value: u64) -> Self {
        Self::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

/// One row of cells.
pub type Row = Vec<CellValue>;

/// Inclusive, zero-based rectangular cell range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub first_col: usize,
    pub first_row: usize,
    pub last_col: usize,
    pub last_row: usize,
}

impl CellRange {
    /// Range anchored at `(0,0)` covering `cols` by `rows` cells.
    ///
    /// Returns `None` when either dimension is zero.
    pub fn anchored(cols: usize, rows: usize) -> Option<Self> {
        if cols == 0 || rows == 0 {
            return None;
        }
        Some(Self {
            first_col: 0,
            first_row: 0,
            last_col: cols - 1,
            last_row: rows - 1,
        })
    }
}

impl fmt::Display for CellRange {
    /// A1 notation, e.g. `A1:E3`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}:{}{}",
            column_name(self.first_col),
            self.first_row + 1,
            column_name(self.last_col),
            self.last_row + 1
        )
    }
}

/// Spreadsheet column letters for a zero-based index (0 -> A, 26 -> AA).
pub fn column_name(mut col: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (col % 26) as u8);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// A named sheet: one header row followed by fixed-width data rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    name: String,
    header: Vec<String>,
    rows: Vec<Row>,
    num_cols: usize,
    num_rows: usize,
    range: Option<CellRange>,
}

impl Sheet {
    fn new(name: String) -> Self {
        Self {
            name,
            header: Vec::new(),
            rows: Vec::new(),
            num_cols: 0,
            num_rows: 0,
            range: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Data rows, excluding the header.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// Row count including the header row.
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Bounding range of all written cells, `None` while the sheet is empty.
    pub fn range(&self) -> Option<CellRange> {
        self.range
    }

    pub fn has_header(&self) -> bool {
        !self.header.is_empty()
    }

    pub fn has_data(&self) -> bool {
        !self.rows.is_empty()
    }

    fn set_header(&mut self, header: Vec<String>) -> WorkbookResult<()> {
        if self.has_header() {
            return Err(WorkbookError::HeaderAlreadySet(self.name.clone()));
        }
        if header.is_empty() {
            return Err(WorkbookError::EmptyHeader(self.name.clone()));
        }
        if header.len() > MAX_COLS {
            return Err(WorkbookError::TooManyColumns {
                sheet: self.name.clone(),
                count: header.len(),
            });
        }

        self.num_cols = header.len();
        self.num_rows += 1;
        self.header = header;
        self.update_range();
        Ok(())
    }

    fn append_row(&mut self, row: Row) -> WorkbookResult<()> {
        if !self.has_header() {
            return Err(WorkbookError::HeaderNotSet(self.name.clone()));
        }
        if row.len() != self.num_cols {
            return Err(WorkbookError::RowWidth {
                sheet: self.name.clone(),
                expected: self.num_cols,
                actual: row.len(),
            });
        }
        if self.num_rows >= MAX_ROWS {
            return Err(WorkbookError::TooManyRows(self.name.clone()));
        }

        self.rows.push(row);
        self.num_rows += 1;
        self.update_range();
        Ok(())
    }

    fn update_range(&mut self) {
        self.range = CellRange::anchored(self.num_cols, self.num_rows);
    }
}

/// Ordered collection of uniquely named sheets.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    index: HashMap<String, usize>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an empty sheet.
    pub fn add_sheet(&mut self, name: impl Into<String>) -> WorkbookResult<()> {
        let name = name.into();
        validate_sheet_name(&name)?;
        if self.index.contains_key(&name) {
            return Err(WorkbookError::DuplicateSheet(name));
        }

        self.index.insert(name.clone(), self.sheets.len());
        self.sheets.push(Sheet::new(name));
        Ok(())
    }

    /// Set a sheet's header row. Allowed once, before any data row.
    pub fn set_header<I, S>(&mut self, sheet: &str, columns: I) -> WorkbookResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let header = columns.into_iter().map(Into::into).collect();
        self.sheet_mut(sheet)?.set_header(header)
    }

    /// Append a data row; its width must equal the header's.
    pub fn append_row(&mut self, sheet: &str, row: Row) -> WorkbookResult<()> {
        self.sheet_mut(sheet)?.append_row(row)
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.index.get(name).map(|&i| &self.sheets[i])
    }

    /// Sheets in insertion order.
    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().map(Sheet::name)
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    fn sheet_mut(&mut self, name: &str) -> WorkbookResult<&mut Sheet> {
        match self.index.get(name) {
            Some(&i) => Ok(&mut self.sheets[i]),
            None => Err(WorkbookError::UnknownSheet(name.to_string())),
        }
    }
}

fn validate_sheet_name(name: &str) -> WorkbookResult<()> {
    let invalid = |reason: &str| WorkbookError::InvalidSheetName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.trim().is_empty() {
        return Err(invalid("name is blank"));
    }
    if name.chars().count() > MAX_SHEET_NAME_LEN {
        return Err(invalid("name is longer than 31 characters"));
    }
    if name.contains(ILLEGAL_SHEET_NAME_CHARS) {
        return Err(invalid("name contains one of [ ] : * ? / \\"));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(invalid("name starts or ends with an apostrophe"));
    }
    Ok(())
}
