//! Load cell calibration from a `raw,grams` CSV.
//!
//! Points are fitted with ordinary least squares. Points whose residual
//! exceeds twice the RMS residual are then dropped and the line refitted,
//! so a single bad weighing does not skew the gain.

use serde::Deserialize;
use std::path::Path;

/// Calibration CSV schema.
///
/// Expected headers:
/// raw,grams
///
/// Example:
/// raw,grams
/// 8000,0.0
/// 58000,500.0
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct CalibrationRow {
    pub raw: i64,
    pub grams: f32,
}

/// Fitted load cell model: `grams = gain_g_per_count * (raw - zero_counts)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadCellCalibration {
    pub zero_counts: i32,
    pub gain_g_per_count: f32,
}

/// Residuals beyond `OUTLIER_SIGMA * rms` are excluded from the refit.
const OUTLIER_SIGMA: f64 = 2.0;

#[derive(Debug, Clone, Copy)]
struct Line {
    slope: f64,
    intercept: f64,
}

impl Line {
    fn at(self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

fn least_squares(pts: &[(f64, f64)]) -> eyre::Result<Line> {
    let n = pts.len() as f64;
    let mean_x = pts.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pts.iter().map(|p| p.1).sum::<f64>() / n;
    let (sxx, sxy) = pts.iter().fold((0.0f64, 0.0f64), |(sxx, sxy), (x, y)| {
        let dx = x - mean_x;
        (sxx + dx * dx, sxy + dx * (y - mean_y))
    });
    if !sxx.is_finite() || sxx == 0.0 {
        eyre::bail!("calibration cannot determine slope (degenerate raw variance)");
    }
    let slope = sxy / sxx;
    if !slope.is_finite() || slope == 0.0 {
        eyre::bail!("calibration produced a zero or non-finite slope");
    }
    Ok(Line {
        slope,
        intercept: mean_y - slope * mean_x,
    })
}

fn check_monotonic(rows: &[CalibrationRow]) -> eyre::Result<()> {
    let mut direction = 0i64;
    for (i, pair) in rows.windows(2).enumerate() {
        let step = (pair[1].raw - pair[0].raw).signum();
        if step == 0 {
            eyre::bail!(
                "calibration rows have duplicate raw values at index {} and {}",
                i,
                i + 1
            );
        }
        if direction != 0 && step != direction {
            eyre::bail!(
                "calibration raw values must be monotonic (strictly increasing or strictly decreasing)"
            );
        }
        direction = step;
    }
    Ok(())
}

impl LoadCellCalibration {
    pub fn from_rows(rows: &[CalibrationRow]) -> eyre::Result<Self> {
        if rows.len() < 2 {
            eyre::bail!("calibration requires at least two rows, got {}", rows.len());
        }
        check_monotonic(rows)?;

        let pts: Vec<(f64, f64)> = rows
            .iter()
            .map(|r| (r.raw as f64, f64::from(r.grams)))
            .collect();
        let first = least_squares(&pts)?;

        let rms = (pts
            .iter()
            .map(|(x, y)| (y - first.at(*x)).powi(2))
            .sum::<f64>()
            / pts.len() as f64)
            .sqrt();

        let line = if rms.is_finite() && rms > 0.0 {
            let inliers: Vec<(f64, f64)> = pts
                .iter()
                .copied()
                .filter(|(x, y)| (y - first.at(*x)).abs() <= OUTLIER_SIGMA * rms)
                .collect();
            if inliers.len() >= 2 && inliers.len() < pts.len() {
                least_squares(&inliers).unwrap_or(first)
            } else {
                first
            }
        } else {
            first
        };

        // grams == 0 where raw == -intercept / slope
        let zero = -line.intercept / line.slope;
        if !zero.is_finite() || zero.abs() > f64::from(i32::MAX) {
            eyre::bail!("calibration produced invalid tare baseline");
        }

        Ok(Self {
            zero_counts: zero.round() as i32,
            gain_g_per_count: line.slope as f32,
        })
    }
}

impl TryFrom<&[CalibrationRow]> for LoadCellCalibration {
    type Error = eyre::Report;
    fn try_from(rows: &[CalibrationRow]) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

pub fn load_calibration_csv(path: &Path) -> eyre::Result<LoadCellCalibration> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let actual: Vec<&str> = headers.iter().collect();
    if actual != ["raw", "grams"] {
        eyre::bail!(
            "calibration CSV must have headers 'raw,grams', got: {}",
            actual.join(",")
        );
    }

    let rows = rdr
        .deserialize::<CalibrationRow>()
        .enumerate()
        .map(|(idx, rec)| rec.map_err(|e| eyre::eyre!("invalid CSV row {}: {}", idx + 2, e)))
        .collect::<eyre::Result<Vec<_>>>()?;

    LoadCellCalibration::from_rows(&rows)
}
