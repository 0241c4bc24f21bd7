//! Batch normalization layer implementation
//!
//! This module provides a BatchNorm2dLayer that normalizes each channel of an
//! NCHW feature map over the batch and spatial dimensions.
//!
//! # Batch Normalization Theory
//!
//! For every channel, batch normalization normalizes the inputs to zero mean and
//! unit variance, then applies a learnable scale (gamma) and shift (beta):
//!
//! 1. Compute statistics: mean μ and variance σ² over batch × height × width
//! 2. Normalize: x_norm = (x - μ) / sqrt(σ² + ε)
//! 3. Scale and shift: y = γ * x_norm + β
//!
//! During training the layer uses the statistics of the current batch and folds
//! them into running statistics with an exponential moving average. During
//! inference it uses the running statistics instead.
//!
//! # References
//!
//! Ioffe, S., & Szegedy, C. (2015). Batch Normalization: Accelerating Deep Network Training
//! by Reducing Internal Covariate Shift. ICML.

use crate::error::{Error, Result};
use crate::layers::Layer;
use crate::tensor::{FeatureMap, Shape};
use crate::weights::{join, StateDict};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

/// Hyper-parameters shared by every BatchNorm layer in a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormConfig {
    /// Small constant added to the variance (default 1e-5)
    pub epsilon: f32,
    /// Weight of the old running value in the moving average (default 0.9)
    pub momentum: f32,
}

impl Default for NormConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-5,
            momentum: 0.9,
        }
    }
}

/// Per-channel batch normalization for NCHW feature maps.
///
/// # Fields
///
/// * `channels` - Number of channels (batch norm doesn't change dimensions)
/// * `epsilon` - Small constant for numerical stability
/// * `momentum` - Momentum for updating running statistics
/// * `training` - Whether the layer is in training mode (true) or inference mode (false)
/// * `gamma` - Learnable scale parameter (initialized to 1.0)
/// * `beta` - Learnable shift parameter (initialized to 0.0)
/// * `running_mean` - Running average of channel means (initialized to 0.0)
/// * `running_var` - Running average of channel variances (initialized to 1.0)
///
/// # Example
///
/// ```
/// use rust_shufflenet::layers::{BatchNorm2dLayer, Layer};
///
/// let mut layer = BatchNorm2dLayer::new(24, 1e-5, 0.9).unwrap();
/// layer.set_training(false);
/// assert_eq!(layer.channels(), 24);
/// assert_eq!(layer.parameter_count(), 48);  // 24 gamma + 24 beta
/// ```
#[derive(Debug, Clone)]
pub struct BatchNorm2dLayer {
    channels: usize,
    epsilon: f32,
    momentum: f32,
    training: bool,

    gamma: Vec<f32>,
    beta: Vec<f32>,

    // Updated during training-mode forward passes, which only take &self
    running_mean: RefCell<Vec<f32>>,
    running_var: RefCell<Vec<f32>>,
}

impl BatchNorm2dLayer {
    /// Creates a new batch normalization layer over `channels` channels.
    ///
    /// The layer starts in training mode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Layer`] if `epsilon` is not positive or `momentum` lies
    /// outside [0.0, 1.0].
    pub fn new(channels: usize, epsilon: f32, momentum: f32) -> Result<Self> {
        if epsilon <= 0.0 {
            return Err(Error::layer("epsilon must be positive"));
        }
        if !(0.0..=1.0).contains(&momentum) {
            return Err(Error::layer("momentum must be in range [0.0, 1.0]"));
        }

        Ok(Self {
            channels,
            epsilon,
            momentum,
            training: true,
            gamma: vec![1.0f32; channels],
            beta: vec![0.0f32; channels],
            running_mean: RefCell::new(vec![0.0f32; channels]),
            running_var: RefCell::new(vec![1.0f32; channels]),
        })
    }

    /// Creates a layer using the hyper-parameters of `config`.
    pub fn with_config(channels: usize, config: &NormConfig) -> Result<Self> {
        Self::new(channels, config.epsilon, config.momentum)
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn momentum(&self) -> f32 {
        self.momentum
    }

    pub fn gamma(&self) -> &[f32] {
        &self.gamma
    }

    pub fn gamma_mut(&mut self) -> &mut [f32] {
        &mut self.gamma
    }

    pub fn beta(&self) -> &[f32] {
        &self.beta
    }

    pub fn beta_mut(&mut self) -> &mut [f32] {
        &mut self.beta
    }

    /// Get a copy of the running mean statistics.
    pub fn running_mean(&self) -> Vec<f32> {
        self.running_mean.borrow().clone()
    }

    /// Get a copy of the running variance statistics.
    pub fn running_var(&self) -> Vec<f32> {
        self.running_var.borrow().clone()
    }

    /// Per-channel mean and biased variance over batch × height × width.
    fn batch_statistics(&self, input: &FeatureMap) -> (Vec<f32>, Vec<f32>) {
        let shape = input.shape();
        let spatial = shape.spatial();
        let count = (shape.batch * spatial) as f32;
        let mut mean = vec![0.0f32; self.channels];
        let mut var = vec![0.0f32; self.channels];

        for (i, plane) in input.data().chunks_exact(spatial).enumerate() {
            mean[i % self.channels] += plane.iter().sum::<f32>();
        }
        for m in mean.iter_mut() {
            *m /= count;
        }

        for (i, plane) in input.data().chunks_exact(spatial).enumerate() {
            let c = i % self.channels;
            var[c] += plane.iter().map(|&x| (x - mean[c]) * (x - mean[c])).sum::<f32>();
        }
        for v in var.iter_mut() {
            *v /= count;
        }

        (mean, var)
    }

    fn update_running_statistics(&self, mean: &[f32], var: &[f32], count: usize) {
        // Running variance tracks the unbiased estimate
        let correction = if count > 1 {
            count as f32 / (count - 1) as f32
        } else {
            1.0
        };

        let mut running_mean = self.running_mean.borrow_mut();
        let mut running_var = self.running_var.borrow_mut();
        for c in 0..self.channels {
            running_mean[c] = self.momentum * running_mean[c] + (1.0 - self.momentum) * mean[c];
            running_var[c] =
                self.momentum * running_var[c] + (1.0 - self.momentum) * var[c] * correction;
        }
    }
}

impl Layer for BatchNorm2dLayer {
    /// Forward propagation through the batch normalization layer.
    ///
    /// In training mode, normalizes with the batch statistics and updates the
    /// running statistics. In inference mode, normalizes with the running statistics.
    fn forward(&self, input: &FeatureMap) -> Result<FeatureMap> {
        let shape = self.output_shape(input.shape())?;
        let spatial = shape.spatial();
        // Empty batches carry no statistics; running stats stay untouched.
        if shape.numel() == 0 {
            return Ok(input.clone());
        }

        let (mean, var) = if self.training {
            let (mean, var) = self.batch_statistics(input);
            self.update_running_statistics(&mean, &var, shape.batch * spatial);
            (mean, var)
        } else {
            (self.running_mean(), self.running_var())
        };

        let mut output = input.clone();
        for (i, plane) in output.data_mut().chunks_exact_mut(spatial).enumerate() {
            let c = i % self.channels;
            let inv_std = 1.0 / (var[c] + self.epsilon).sqrt();
            let scale = self.gamma[c] * inv_std;
            let shift = self.beta[c] - mean[c] * scale;
            for value in plane.iter_mut() {
                *value = *value * scale + shift;
            }
        }

        Ok(output)
    }

    fn output_shape(&self, input: Shape) -> Result<Shape> {
        if input.channels != self.channels {
            return Err(Error::shape(format!(
                "BatchNorm expects {} channels, got shape {}",
                self.channels, input
            )));
        }
        Ok(input)
    }

    /// gamma + beta
    fn parameter_count(&self) -> usize {
        2 * self.channels
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn save_state(&self, prefix: &str, state: &mut StateDict) {
        let shape = vec![self.channels];
        state.insert(join(prefix, "weight"), shape.clone(), &self.gamma);
        state.insert(join(prefix, "bias"), shape.clone(), &self.beta);
        state.insert(
            join(prefix, "running_mean"),
            shape.clone(),
            &self.running_mean.borrow(),
        );
        state.insert(join(prefix, "running_var"), shape, &self.running_var.borrow());
    }

    fn load_state(&mut self, prefix: &str, state: &StateDict) -> Result<()> {
        let shape = [self.channels];
        state.copy_into(&join(prefix, "weight"), &shape, &mut self.gamma)?;
        state.copy_into(&join(prefix, "bias"), &shape, &mut self.beta)?;
        state.copy_into(
            &join(prefix, "running_mean"),
            &shape,
            self.running_mean.get_mut(),
        )?;
        state.copy_into(&join(prefix, "running_var"), &shape, self.running_var.get_mut())?;
        Ok(())
    }
}
