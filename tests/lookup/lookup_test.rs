use aggreport::lookup::{LookupError, LookupLayout, LookupTable};
use std::io::Write;
use tempfile::NamedTempFile;

const MAPPING: &str = "\
CDR0000040279,a,b,c,d,e,f,g,C287
CDR0000042987,a,b,c,d,e,f,g,C1647
CDR0000999999,too,short
CDR0000042987,a,b,c,d,e,f,g,C1648
";

#[test]
fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(MAPPING.as_bytes()).unwrap();

    let table = LookupTable::load(file.path(), LookupLayout::default()).unwrap();

    assert_eq!(table.source_id_for("C287"), Some("CDR0000040279"));
    assert_eq!(table.concept_code_for("CDR0000040279"), Some("C287"));
    assert_eq!(table.len(), 2);
}

#[test]
fn test_later_rows_win() {
    let table = LookupTable::from_reader(MAPPING.as_bytes(), LookupLayout::default()).unwrap();

    assert_eq!(table.concept_code_for("CDR0000042987"), Some("C1648"));
    assert_eq!(table.source_id_for("C1648"), Some("CDR0000042987"));
}

#[test]
fn test_absent_keys_read_as_none() {
    let table = LookupTable::from_reader(MAPPING.as_bytes(), LookupLayout::default()).unwrap();

    assert_eq!(table.source_id_for("C0000"), None);
    assert_eq!(table.concept_code_for("CDR0000999999"), None);
    assert_eq!(LookupTable::default().source_id_for("C287"), None);
}

#[test]
fn test_custom_layout() {
    let layout = LookupLayout {
        source_id_column: 1,
        concept_code_column: 0,
        delimiter: b'\t',
    };
    let table = LookupTable::from_reader("C287\tCDR0000040279\n".as_bytes(), layout).unwrap();

    assert_eq!(table.source_id_for("C287"), Some("CDR0000040279"));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = LookupTable::load(dir.path().join("absent.csv"), LookupLayout::default());

    assert!(matches!(result, Err(LookupError::Open { .. })));
}
