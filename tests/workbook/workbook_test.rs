use aggreport::workbook::{CellRange, CellValue, Workbook, WorkbookError};
use insta::assert_snapshot;

fn row(values: &[&str]) -> Vec<CellValue> {
    values.iter().map(|v| CellValue::from(*v)).collect()
}

#[test]
fn test_range_tracks_header_and_rows() {
    let mut wb = Workbook::new();
    wb.add_sheet("Interventions").unwrap();
    wb.set_header("Interventions", ["code", "type", "name", "viewable", "all"])
        .unwrap();

    let sheet = wb.sheet("Interventions").unwrap();
    assert_eq!(sheet.range(), CellRange::anchored(5, 1));
    assert_snapshot!(sheet.range().unwrap().to_string(), @"A1:E1");

    for name in ["aspirin", "vaccineX"] {
        let mut cells = row(&["UNK", "drug", name]);
        cells.extend([CellValue::Integer(3), CellValue::Integer(5)]);
        wb.append_row("Interventions", cells).unwrap();
    }

    let sheet = wb.sheet("Interventions").unwrap();
    assert_eq!(sheet.num_cols(), 5);
    assert_eq!(sheet.num_rows(), 3);
    assert_eq!(sheet.rows().len(), 2);
    assert_eq!(
        sheet.range(),
        Some(CellRange {
            first_col: 0,
            first_row: 0,
            last_col: 4,
            last_row: 2,
        })
    );
    assert_snapshot!(sheet.range().unwrap().to_string(), @"A1:E3");
}

#[test]
fn test_header_only_once() {
    let mut wb = Workbook::new();
    wb.add_sheet("Biomarkers").unwrap();
    wb.set_header("Biomarkers", ["id", "name"]).unwrap();

    assert_eq!(
        wb.set_header("Biomarkers", ["id", "name"]),
        Err(WorkbookError::HeaderAlreadySet("Biomarkers".to_string()))
    );

    wb.append_row("Biomarkers", row(&["C1", "EGFR"])).unwrap();
    assert!(matches!(
        wb.set_header("Biomarkers", ["other"]),
        Err(WorkbookError::HeaderAlreadySet(_))
    ));
}

#[test]
fn test_row_width_must_match_header() {
    let mut wb = Workbook::new();
    wb.add_sheet("Biomarkers").unwrap();
    wb.set_header("Biomarkers", ["id", "name", "count"]).unwrap();

    let err = wb
        .append_row("Biomarkers", row(&["C1", "EGFR"]))
        .unwrap_err();
    assert_eq!(
        err,
        WorkbookError::RowWidth {
            sheet: "Biomarkers".to_string(),
            expected: 3,
            actual: 2,
        }
    );
    assert_snapshot!(err.to_string(), @"row for sheet 'Biomarkers' has 2 cells, expected 3");
    assert!(!wb.sheet("Biomarkers").unwrap().has_data());
}

#[test]
fn test_rows_need_a_header_and_a_known_sheet() {
    let mut wb = Workbook::new();
    wb.add_sheet("Interventions").unwrap();

    assert_eq!(
        wb.append_row("Interventions", row(&["x"])),
        Err(WorkbookError::HeaderNotSet("Interventions".to_string()))
    );
    assert_eq!(
        wb.append_row("Missing", row(&["x"])),
        Err(WorkbookError::UnknownSheet("Missing".to_string()))
    );
    assert_eq!(
        wb.set_header("Interventions", Vec::<String>::new()),
        Err(WorkbookError::EmptyHeader("Interventions".to_string()))
    );
}

#[test]
fn test_sheets_keep_insertion_order() {
    let mut wb = Workbook::new();
    wb.add_sheet("Zeta").unwrap();
    wb.add_sheet("Alpha").unwrap();

    assert_eq!(
        wb.add_sheet("Zeta"),
        Err(WorkbookError::DuplicateSheet("Zeta".to_string()))
    );
    assert_eq!(wb.sheet_names().collect::<Vec<_>>(), vec!["Zeta", "Alpha"]);
    assert_eq!(wb.len(), 2);
}
