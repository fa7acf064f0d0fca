//! Window regressor: a linear map from a normalized `W x F` feature window
//! to the normalized AQI of the next observation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowRegressor {
    window: usize,
    n_features: usize,
    /// Row-major: `weights[t * n_features + f]`
    weights: Vec<f64>,
    bias: f64,
}

impl WindowRegressor {
    /// Zero-initialized model.
    pub fn zeros(window: usize, n_features: usize) -> Self {
        Self {
            window,
            n_features,
            weights: vec![0.0; window * n_features],
            bias: 0.0,
        }
    }

    /// Rebuild from stored parameters; `None` if the shapes disagree.
    pub fn from_parts(window: usize, n_features: usize, weights: Vec<f64>, bias: f64) -> Option<Self> {
        (weights.len() == window * n_features && weights.iter().all(|w| w.is_finite()) && bias.is_finite())
            .then_some(Self {
                window,
                n_features,
                weights,
                bias,
            })
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    /// `inputs` is the flattened window, same layout as the weights.
    pub fn predict(&self, inputs: &[f64]) -> f64 {
        debug_assert_eq!(inputs.len(), self.window * self.n_features);
        self.weights
            .iter()
            .zip(inputs)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias
    }

    /// Flat parameter view for the optimizer: weights then bias.
    pub(crate) fn params_mut(&mut self) -> (&mut [f64], &mut f64) {
        (&mut self.weights, &mut self.bias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predict_is_dot_plus_bias() {
        let m = WindowRegressor::from_parts(2, 1, vec![0.5, 2.0], 1.0).unwrap();
        assert_eq!(m.predict(&[2.0, 3.0]), 0.5 * 2.0 + 2.0 * 3.0 + 1.0);
    }

    #[test]
    fn test_from_parts_rejects_bad_shape() {
        assert!(WindowRegressor::from_parts(2, 2, vec![0.0; 3], 0.0).is_none());
        assert!(WindowRegressor::from_parts(1, 1, vec![f64::NAN], 0.0).is_none());
    }
}
