// Tests for the single-pass raw cell loader
mod common;

use common::{two_cell_library, write_temp, GdsBuilder};
use gds_rawcell::{read_rawcells, CellBody, DiagnosticSink, ErrorCode, RawCellConfig, RawSource};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn test_two_cell_library_loads() {
    let tmp = write_temp(&two_cell_library());
    let report = read_rawcells(tmp.path(), &RawCellConfig::default());

    assert!(report.is_complete(), "unexpected error: {:?}", report.error);
    assert_eq!(report.cells.len(), 2);
    assert_eq!(report.library_name.as_deref(), Some("TWO"));
    let units = report.units.expect("units record");
    assert_eq!(units.user, 1.0);

    let top = report.get("TOP").unwrap().borrow();
    assert!(top.is_lazy());
    assert_eq!(top.filename(), Some(tmp.path()));
    assert_eq!(top.dependency_names(), vec!["BOTTOM".to_string()]);
    assert_eq!(top.units(), Some(units));
    assert!(report.get("BOTTOM").unwrap().borrow().edges().is_empty());
}

#[test]
fn test_cell_offsets_and_sizes_cover_structure() {
    let mut gds = GdsBuilder::library("LIB", 1e-3, 1e-9);
    let a_start = gds.offset();
    gds.begin_cell("A").boundary(&[(0, 0), (1, 1), (1, 0)]).end_cell();
    let b_start = gds.offset();
    gds.begin_cell("B").aref("A").path(&[(0, 0), (5, 0)]).end_cell();
    let b_end = gds.offset();
    let tmp = write_temp(&gds.finish());

    let report = read_rawcells(tmp.path(), &RawCellConfig::default());
    assert!(report.is_complete());
    let a = report.get("A").unwrap().borrow();
    assert_eq!(a.size(), b_start - a_start);
    match a.body() {
        CellBody::Lazy { offset, .. } => assert_eq!(*offset, a_start),
        other => panic!("expected lazy body, got {:?}", other),
    }
    let b = report.get("B").unwrap().borrow();
    assert_eq!(b.size(), b_end - b_start);
    assert_eq!(b.dependency_names(), vec!["A".to_string()]);
}

#[test]
fn test_cells_share_one_source() {
    let tmp = write_temp(&two_cell_library());
    let report = read_rawcells(tmp.path(), &RawCellConfig::default());
    let source = match report.get("TOP").unwrap().borrow().body() {
        CellBody::Lazy { source, .. } => source.clone(),
        _ => panic!("expected lazy body"),
    };
    // two cells plus the clone above
    assert_eq!(RawSource::uses(&source), 3);
    drop(report);
    assert_eq!(RawSource::uses(&source), 1);
}

#[test]
fn test_cyclic_library_releases_source_on_drop() {
    let mut gds = GdsBuilder::library("LIB", 1e-3, 1e-9);
    gds.begin_cell("A").sref("B", (0, 0)).end_cell();
    gds.begin_cell("B").sref("A", (0, 0)).end_cell();
    gds.begin_cell("SELF").sref("SELF", (0, 0)).end_cell();
    let tmp = write_temp(&gds.finish());
    let report = read_rawcells(tmp.path(), &RawCellConfig::default());
    assert!(report.is_complete());

    let a = report.get("A").unwrap();
    let source = match a.borrow().body() {
        CellBody::Lazy { source, .. } => source.clone(),
        _ => panic!("expected lazy body"),
    };
    let weak_a = Rc::downgrade(a);
    assert_eq!(RawSource::uses(&source), 4);

    drop(report);
    assert!(weak_a.upgrade().is_none());
    assert_eq!(RawSource::uses(&source), 1);
}

#[test]
fn test_empty_structure_name_aborts_load() {
    let mut gds = GdsBuilder::library("LIB", 1e-3, 1e-9);
    gds.begin_cell("").end_cell();
    let tmp = write_temp(&gds.finish());

    let report = read_rawcells(tmp.path(), &RawCellConfig::default());
    assert_eq!(report.error, Some(ErrorCode::InvalidFile));
    assert!(report.cells.is_empty());
}

#[test]
fn test_missing_reference_is_recoverable() {
    let mut gds = GdsBuilder::library("LIB", 1e-3, 1e-9);
    gds.begin_cell("TOP")
        .sref("PRESENT", (0, 0))
        .sref("ABSENT", (0, 0))
        .end_cell();
    gds.begin_cell("PRESENT").end_cell();
    let tmp = write_temp(&gds.finish());

    let lines = Rc::new(RefCell::new(Vec::new()));
    let captured = lines.clone();
    let config = RawCellConfig::default()
        .with_sink(DiagnosticSink::new(move |msg| captured.borrow_mut().push(msg.to_string())));
    let report = read_rawcells(tmp.path(), &config);

    assert_eq!(report.error, Some(ErrorCode::MissingReference));
    assert_eq!(report.cells.len(), 2);
    assert_eq!(
        report.get("TOP").unwrap().borrow().dependency_names(),
        vec!["PRESENT".to_string()]
    );
    assert_eq!(report.missing_references, vec![("TOP".to_string(), "ABSENT".to_string())]);
    assert_eq!(lines.borrow().len(), 1);
    assert!(lines.borrow()[0].contains("ABSENT"));
}

#[test]
fn test_unterminated_library_is_invalid() {
    let mut gds = GdsBuilder::library("LIB", 1e-3, 1e-9);
    gds.begin_cell("A").boundary(&[(0, 0), (1, 1)]).end_cell();
    let tmp = write_temp(&gds.unterminated());

    let report = read_rawcells(tmp.path(), &RawCellConfig::default());
    assert_eq!(report.error, Some(ErrorCode::InvalidFile));
    assert!(report.cells.is_empty());
}

#[test]
fn test_truncated_record_is_invalid() {
    let mut bytes = two_cell_library();
    bytes.truncate(bytes.len() - 6);
    let tmp = write_temp(&bytes);

    let report = read_rawcells(tmp.path(), &RawCellConfig::default());
    assert_eq!(report.error, Some(ErrorCode::InvalidFile));
    assert!(report.cells.is_empty());
}

#[test]
fn test_unopenable_file() {
    let dir = tempfile::tempdir().unwrap();
    let report = read_rawcells(dir.path().join("missing.gds"), &RawCellConfig::default());
    assert_eq!(report.error, Some(ErrorCode::InputFileOpenError));
    assert!(report.cells.is_empty());
}

#[test]
fn test_record_limit_from_config() {
    let tmp = write_temp(&two_cell_library());
    let config = RawCellConfig::from_json_str(r#"{"max_record_length": 16}"#).unwrap();
    let report = read_rawcells(tmp.path(), &config);
    assert_eq!(report.error, Some(ErrorCode::InvalidFile));
}

#[test]
fn test_display_summary() {
    let tmp = write_temp(&two_cell_library());
    let report = read_rawcells(tmp.path(), &RawCellConfig::default());
    let top = report.get("TOP").unwrap().borrow();
    assert_eq!(
        top.to_string(),
        format!("RawCell 'TOP' with {} bytes and 1 dependencies", top.size())
    );
}
