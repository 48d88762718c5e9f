use std::fs::File;
use std::io::Write;

use feeder_config::{CalibrationRow, LoadCellCalibration, load_calibration_csv};
use rstest::rstest;
use tempfile::tempdir;

fn row(raw: i64, grams: f32) -> CalibrationRow {
    CalibrationRow { raw, grams }
}

#[rstest]
fn two_point_fit_recovers_gain_and_zero() {
    let c = LoadCellCalibration::from_rows(&[row(8_000, 0.0), row(58_000, 500.0)]).unwrap();
    assert!((c.gain_g_per_count - 0.01).abs() < 1e-6);
    assert_eq!(c.zero_counts, 8_000);
}

#[rstest]
fn decreasing_raw_values_are_accepted() {
    // Some amplifiers are wired with inverted polarity.
    let c = LoadCellCalibration::from_rows(&[row(-100, 0.0), row(-200, 100.0), row(-300, 200.0)])
        .unwrap();
    assert!((c.gain_g_per_count + 1.0).abs() < 1e-6);
    assert_eq!(c.zero_counts, -100);
}

#[rstest]
fn single_bad_weighing_is_dropped_by_refit() {
    // grams = 0.01 * (raw - 1000), except the middle point which is 40 g off.
    let mut rows: Vec<CalibrationRow> = (0..9)
        .map(|i| {
            let raw = 1_000 + i * 10_000;
            row(raw, ((raw - 1_000) as f32) * 0.01)
        })
        .collect();
    rows[4].grams += 40.0;

    let c = LoadCellCalibration::from_rows(&rows).unwrap();
    assert!(
        (c.gain_g_per_count - 0.01).abs() < 1e-5,
        "gain {}",
        c.gain_g_per_count
    );
    assert!((c.zero_counts - 1_000).abs() <= 1, "zero {}", c.zero_counts);
}

#[rstest]
#[case(vec![row(100, 0.0)], "at least two rows")]
#[case(vec![row(100, 0.0), row(100, 10.0)], "duplicate raw")]
#[case(vec![row(100, 0.0), row(200, 100.0), row(150, 70.0)], "monotonic")]
#[case(vec![row(100, 5.0), row(200, 5.0)], "slope")]
fn rejects_unusable_rows(#[case] rows: Vec<CalibrationRow>, #[case] needle: &str) {
    let err = LoadCellCalibration::from_rows(&rows).expect_err("rows should be rejected");
    assert!(
        format!("{err}").to_lowercase().contains(needle),
        "unexpected error: {err}"
    );
}

#[rstest]
fn loads_csv_with_strict_headers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bowl.csv");
    let mut f = File::create(&path).unwrap();
    writeln!(f, "raw,grams").unwrap();
    writeln!(f, "8000,0").unwrap();
    writeln!(f, "33000,250").unwrap();
    writeln!(f, "58000,500").unwrap();
    drop(f);

    let c = load_calibration_csv(&path).unwrap();
    assert_eq!(c.zero_counts, 8_000);
    assert!((c.gain_g_per_count - 0.01).abs() < 1e-6);
}

#[rstest]
fn rejects_wrong_headers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tank.csv");
    let mut f = File::create(&path).unwrap();
    writeln!(f, "raw,value").unwrap();
    writeln!(f, "100,0.0").unwrap();
    writeln!(f, "200,1.0").unwrap();
    drop(f);

    let err = load_calibration_csv(&path).expect_err("bad headers");
    assert!(format!("{err}").contains("calibration CSV must have headers"));
}

#[rstest]
fn reports_line_number_of_bad_row() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad_row.csv");
    let mut f = File::create(&path).unwrap();
    writeln!(f, "raw,grams").unwrap();
    writeln!(f, "100,0.0").unwrap();
    writeln!(f, "oops,1.0").unwrap();
    drop(f);

    let err = load_calibration_csv(&path).expect_err("bad row");
    assert!(format!("{err}").contains("invalid CSV row 3"));
}
