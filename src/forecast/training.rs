//! Mini-batch Adam fitting for the window regressor.
//!
//! Loss is plain MSE on the normalized AQI target. The tail of the sample
//! set (in chronological order) is held out for validation, the rest is
//! shuffled each epoch with a seeded RNG so runs are reproducible.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

use super::model::WindowRegressor;
use super::ForecastError;
use crate::config::{defaults, ForecastConfig};

/// Max gradient norm for global gradient clipping.
const MAX_GRAD_NORM: f64 = 5.0;

/// One training example: flattened normalized window and normalized target.
#[derive(Debug, Clone)]
pub struct Sample {
    pub inputs: Vec<f64>,
    pub target: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingParams {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub validation_split: f64,
    pub seed: u64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            epochs: defaults::DEFAULT_TRAINING_EPOCHS,
            batch_size: defaults::DEFAULT_TRAINING_BATCH_SIZE,
            learning_rate: defaults::DEFAULT_LEARNING_RATE,
            validation_split: defaults::DEFAULT_VALIDATION_SPLIT,
            seed: 0x5EED,
        }
    }
}

impl From<&ForecastConfig> for TrainingParams {
    fn from(cfg: &ForecastConfig) -> Self {
        Self {
            epochs: cfg.epochs,
            batch_size: cfg.batch_size,
            learning_rate: cfg.learning_rate,
            validation_split: cfg.validation_split,
            ..Self::default()
        }
    }
}

/// Summary of a completed training run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrainingReport {
    pub samples: usize,
    pub train_samples: usize,
    pub validation_samples: usize,
    pub epochs: usize,
    pub final_train_loss: f64,
    pub final_validation_loss: Option<f64>,
}

// ============================================================================
// Adam
// ============================================================================

pub struct AdamOptimizer {
    pub lr: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    /// Total steps taken.
    pub steps: u64,
    m: Vec<f64>,
    v: Vec<f64>,
}

impl AdamOptimizer {
    pub fn new(num_params: usize, lr: f64) -> Self {
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            steps: 0,
            m: vec![0.0; num_params],
            v: vec![0.0; num_params],
        }
    }

    /// Apply one update. `params` and `grads` share the moment layout.
    fn apply(&mut self, params: &mut [f64], grads: &[f64]) {
        self.steps += 1;
        let t = self.steps as f64;

        // Bias-corrected LR
        let lr_t = self.lr * (1.0 - self.beta2.powf(t)).sqrt() / (1.0 - self.beta1.powf(t));

        for i in 0..params.len() {
            let g = grads[i];
            self.m[i] = self.beta1 * self.m[i] + (1.0 - self.beta1) * g;
            self.v[i] = self.beta2 * self.v[i] + (1.0 - self.beta2) * g * g;
            params[i] -= lr_t * self.m[i] / (self.v[i].sqrt() + self.eps);
        }
    }
}

// ============================================================================
// Fitting
// ============================================================================

fn mse(model: &WindowRegressor, samples: &[Sample]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let total: f64 = samples
        .iter()
        .map(|s| {
            let err = model.predict(&s.inputs) - s.target;
            err * err
        })
        .sum();
    total / samples.len() as f64
}

/// Fit a fresh regressor to `samples`.
pub fn fit(
    samples: &[Sample],
    window: usize,
    n_features: usize,
    params: &TrainingParams,
) -> Result<(WindowRegressor, TrainingReport), ForecastError> {
    let n_inputs = window * n_features;
    if samples.is_empty() {
        return Err(ForecastError::InsufficientData { needed: window + 1, got: 0 });
    }
    if samples.iter().any(|s| s.inputs.len() != n_inputs) {
        return Err(ForecastError::ShapeMismatch);
    }

    let n_val = ((samples.len() as f64) * params.validation_split).floor() as usize;
    // Always keep at least one training sample
    let n_val = n_val.min(samples.len() - 1);
    let (train, validation) = samples.split_at(samples.len() - n_val);

    let mut model = WindowRegressor::zeros(window, n_features);
    let mut adam = AdamOptimizer::new(n_inputs + 1, params.learning_rate);
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut order: Vec<usize> = (0..train.len()).collect();
    let batch_size = params.batch_size.max(1);

    let mut flat = vec![0.0; n_inputs + 1];
    let mut grads = vec![0.0; n_inputs + 1];
    let mut train_loss = f64::NAN;

    for epoch in 0..params.epochs {
        order.shuffle(&mut rng);

        for batch in order.chunks(batch_size) {
            grads.iter_mut().for_each(|g| *g = 0.0);
            let scale = 2.0 / batch.len() as f64;
            for &idx in batch {
                let s = &train[idx];
                let err = model.predict(&s.inputs) - s.target;
                for (g, x) in grads.iter_mut().zip(&s.inputs) {
                    *g += scale * err * x;
                }
                grads[n_inputs] += scale * err;
            }

            let norm = grads.iter().map(|g| g * g).sum::<f64>().sqrt();
            if norm > MAX_GRAD_NORM {
                let factor = MAX_GRAD_NORM / norm;
                grads.iter_mut().for_each(|g| *g *= factor);
            }

            let (weights, bias) = model.params_mut();
            flat[..n_inputs].copy_from_slice(weights);
            flat[n_inputs] = *bias;
            adam.apply(&mut flat, &grads);
            weights.copy_from_slice(&flat[..n_inputs]);
            *bias = flat[n_inputs];
        }

        train_loss = mse(&model, train);
        if !train_loss.is_finite() {
            return Err(ForecastError::Diverged { epoch });
        }
    }

    if params.epochs == 0 {
        train_loss = mse(&model, train);
    }
    let validation_loss = (!validation.is_empty()).then(|| mse(&model, validation));

    let report = TrainingReport {
        samples: samples.len(),
        train_samples: train.len(),
        validation_samples: validation.len(),
        epochs: params.epochs,
        final_train_loss: train_loss,
        final_validation_loss: validation_loss,
    };
    Ok((model, report))
}
