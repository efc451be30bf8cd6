//! Filesystem tests for label export.

use std::path::Path;

use polar_core::PanopticLabel;
use polar_io::{prediction_path, read_labels, read_labels_for, save_prediction, PolarIoError};
use proptest::prelude::*;

#[test]
fn test_save_prediction_creates_tree() {
    let dir = tempfile::tempdir().unwrap();
    let codes: Vec<u32> = (0..50)
        .map(|i| PanopticLabel::pack(i % 20, i / 10).code())
        .collect();

    let scan = Path::new("/dataset/sequences/08/velodyne/000042.bin");
    let written = save_prediction(dir.path(), scan, &codes).unwrap();

    assert_eq!(
        written,
        dir.path().join("sequences/08/predictions/000042.label")
    );
    assert_eq!(std::fs::metadata(&written).unwrap().len(), 200);
    assert_eq!(read_labels(&written).unwrap(), codes);
}

#[test]
fn test_second_scan_in_same_sequence() {
    let dir = tempfile::tempdir().unwrap();
    for frame in ["000000", "000001"] {
        let scan = format!("/d/sequences/11/velodyne/{}.bin", frame);
        save_prediction(dir.path(), Path::new(&scan), &[1, 2, 3]).unwrap();
    }
    let pred_dir = dir.path().join("sequences/11/predictions");
    assert_eq!(std::fs::read_dir(pred_dir).unwrap().count(), 2);
}

#[test]
fn test_read_labels_for_checks_count() {
    let dir = tempfile::tempdir().unwrap();
    let scan = Path::new("x/sequences/00/velodyne/000000.bin");
    let path = save_prediction(dir.path(), scan, &[5, 6]).unwrap();
    assert!(matches!(
        read_labels_for(&path, 3),
        Err(PolarIoError::LengthMismatch { expected: 3, got: 2 })
    ));
    assert_eq!(read_labels_for(&path, 2).unwrap(), vec![5, 6]);
}

#[test]
fn test_unwritable_parent_propagates() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("sequences"), b"not a dir").unwrap();
    let scan = Path::new("/d/sequences/00/velodyne/000000.bin");
    assert!(save_prediction(dir.path(), scan, &[1]).is_err());
}

proptest! {
    #[test]
    fn prediction_path_keeps_sequence_and_frame(seq in 0u32..100, frame in 0u32..5000) {
        let scan = format!("/data/sequences/{:02}/velodyne/{:06}.bin", seq, frame);
        let out = prediction_path(Path::new("/out"), Path::new(&scan)).unwrap();
        let expected = format!("/out/sequences/{:02}/predictions/{:06}.label", seq, frame);
        prop_assert_eq!(out, Path::new(&expected).to_path_buf());
    }
}
