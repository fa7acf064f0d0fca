//! Per-column min-max scaling.
//!
//! Fit once over a training matrix, then applied unchanged at inference.
//! Columns whose range is zero map to 0 and inverse back to their constant.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    min: Vec<f64>,
    max: Vec<f64>,
}

impl MinMaxScaler {
    /// Fit over `rows`; every row must have the same width. Returns `None`
    /// for an empty matrix.
    pub fn fit(rows: &[Vec<f64>]) -> Option<Self> {
        let width = rows.first()?.len();
        let mut min = vec![f64::INFINITY; width];
        let mut max = vec![f64::NEG_INFINITY; width];
        for row in rows {
            for (c, &v) in row.iter().enumerate().take(width) {
                min[c] = min[c].min(v);
                max[c] = max[c].max(v);
            }
        }
        Some(Self { min, max })
    }

    pub fn columns(&self) -> usize {
        self.min.len()
    }

    fn range(&self, col: usize) -> f64 {
        self.max[col] - self.min[col]
    }

    pub fn transform_value(&self, col: usize, v: f64) -> f64 {
        let range = self.range(col);
        if range.abs() < f64::EPSILON {
            0.0
        } else {
            (v - self.min[col]) / range
        }
    }

    pub fn inverse_value(&self, col: usize, scaled: f64) -> f64 {
        self.min[col] + scaled * self.range(col)
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .enumerate()
            .map(|(c, &v)| self.transform_value(c, v))
            .collect()
    }

    /// Stored statistics must be finite and ordered.
    pub fn is_valid(&self) -> bool {
        self.min.len() == self.max.len()
            && self
                .min
                .iter()
                .zip(&self.max)
                .all(|(lo, hi)| lo.is_finite() && hi.is_finite() && lo <= hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_and_transform() {
        let rows = vec![vec![0.0, 10.0], vec![5.0, 20.0], vec![10.0, 30.0]];
        let s = MinMaxScaler::fit(&rows).unwrap();
        assert_eq!(s.columns(), 2);
        assert_eq!(s.transform_row(&[5.0, 30.0]), vec![0.5, 1.0]);
        assert!((s.inverse_value(1, 0.25) - 15.0).abs() < 1e-12);
        assert!(s.is_valid());
    }

    #[test]
    fn test_constant_column() {
        let rows = vec![vec![7.0], vec![7.0]];
        let s = MinMaxScaler::fit(&rows).unwrap();
        assert_eq!(s.transform_value(0, 7.0), 0.0);
        assert_eq!(s.inverse_value(0, 0.9), 7.0);
    }

    #[test]
    fn test_empty_matrix() {
        assert!(MinMaxScaler::fit(&[]).is_none());
    }
}
