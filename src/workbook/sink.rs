//! Workbook serialization sinks.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook, XlsxError};
use tempfile::NamedTempFile;
use thiserror::Error;

use super::{CellValue, Workbook};

/// Errors raised while writing a workbook out.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XLSX write error: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("workbook has no sheets to write")]
    EmptyWorkbook,

    #[error("output task did not finish: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for a finished workbook.
///
/// `write` blocks on file IO; the pipeline calls it from the blocking pool.
pub trait OutputSink: Send + Sync {
    /// Serialize `workbook` to `destination`.
    fn write(&self, workbook: &Workbook, destination: &Path) -> OutputResult<()>;
}

/// Writes every sheet into an `.xlsx` file. Text cells are written as
/// strings and integer cells as numbers; the header row is bold.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxSink;

impl OutputSink for XlsxSink {
    fn write(&self, workbook: &Workbook, destination: &Path) -> OutputResult<()> {
        if workbook.is_empty() {
            return Err(OutputError::EmptyWorkbook);
        }

        let mut xlsx = XlsxWorkbook::new();
        let bold = Format::new().set_bold();

        for sheet in workbook.sheets() {
            let worksheet = xlsx.add_worksheet();
            worksheet.set_name(sheet.name())?;

            for (col, title) in sheet.header().iter().enumerate() {
                worksheet.write_string_with_format(0, col as u16, title, &bold)?;
            }

            for (index, row) in sheet.rows().iter().enumerate() {
                let row_num = (index + 1) as u32;
                for (col, cell) in row.iter().enumerate() {
                    match cell {
                        CellValue::Text(s) => {
                            worksheet.write_string(row_num, col as u16, s)?;
                        }
                        CellValue::Integer(i) => {
                            worksheet.write_number(row_num, col as u16, *i as f64)?;
                        }
                    }
                }
            }
        }

        let bytes = xlsx.save_to_buffer()?;
        replace_file(destination, |file| {
            file.write_all(&bytes)?;
            Ok(())
        })
    }
}

/// Writes the first sheet as comma-separated text.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvSink;

impl OutputSink for CsvSink {
    fn write(&self, workbook: &Workbook, destination: &Path) -> OutputResult<()> {
        let sheet = workbook.sheets().first().ok_or(OutputError::EmptyWorkbook)?;

        replace_file(destination, |file| {
            let mut writer = csv::Writer::from_writer(file);
            if sheet.has_header() {
                writer.write_record(sheet.header())?;
            }
            for row in sheet.rows() {
                writer.write_record(row.iter().map(CellValue::to_string))?;
            }
            writer.flush()?;
            Ok(())
        })
    }
}

/// Write through a temp file in the destination's directory, then rename it
/// over `destination`. On error the temp file is removed and any existing
/// destination is left untouched.
fn replace_file<F>(destination: &Path, fill: F) -> OutputResult<()>
where
    F: FnOnce(&mut File) -> OutputResult<()>,
{
    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut staged = NamedTempFile::new_in(dir)?;
    fill(staged.as_file_mut())?;
    staged.as_file().sync_all()?;
    staged.persist(destination).map_err(|e| e.error)?;
    Ok(())
}

/// Pick a sink from the destination's extension: `.csv` gets [`CsvSink`],
/// everything else [`XlsxSink`].
pub fn sink_for_path(destination: &Path) -> Box<dyn OutputSink> {
    let is_csv = destination
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    if is_csv {
        Box::new(CsvSink)
    } else {
        Box::new(XlsxSink)
    }
}
