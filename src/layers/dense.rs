//! Dense (fully connected) layer implementation
//!
//! This module provides a DenseLayer (also known as Linear or Fully Connected layer)
//! that performs the transformation: output = input × weightsᵀ + biases

use crate::error::{Error, Result};
use crate::layers::Layer;
use crate::tensor::{FeatureMap, Shape};
use crate::utils::SimpleRng;
use crate::weights::{join, StateDict};
use ndarray::linalg::general_mat_mul;
use ndarray::{ArrayView2, ArrayViewMut2};

/// Dense (fully connected) layer with weights and biases.
///
/// Performs the linear transformation: y = xWᵀ + b
/// where x is the input (batch_size × input_size),
/// W is the weight matrix (output_size × input_size),
/// and b is the bias vector (output_size).
///
/// Every sample of the incoming feature map is flattened, so an input of shape
/// `[N, C, 1, 1]` (the output of global average pooling) becomes `[N, C]`.
///
/// # Example
///
/// ```ignore
/// use rust_shufflenet::layers::DenseLayer;
/// use rust_shufflenet::utils::SimpleRng;
///
/// let mut rng = SimpleRng::new(42);
/// let layer = DenseLayer::new(1024, 1000, &mut rng);
/// assert_eq!(layer.input_size(), 1024);
/// assert_eq!(layer.output_size(), 1000);
/// ```
#[derive(Debug, Clone)]
pub struct DenseLayer {
    input_size: usize,
    output_size: usize,
    weights: Vec<f32>,
    biases: Vec<f32>,
}

impl DenseLayer {
    /// Create a new DenseLayer with Xavier initialization.
    ///
    /// Weights are initialized using Xavier/Glorot initialization:
    /// randomly sampled from uniform distribution [-limit, limit]
    /// where limit = sqrt(6 / (input_size + output_size)).
    ///
    /// Biases are initialized to zero.
    pub fn new(input_size: usize, output_size: usize, rng: &mut SimpleRng) -> Self {
        let mut weights = vec![0.0f32; input_size * output_size];
        let limit = (6.0f32 / (input_size + output_size) as f32).sqrt();

        for value in &mut weights {
            *value = rng.gen_range_f32(-limit, limit);
        }

        Self {
            input_size,
            output_size,
            weights,
            biases: vec![0.0f32; output_size],
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn weights_mut(&mut self) -> &mut [f32] {
        &mut self.weights
    }

    pub fn biases_mut(&mut self) -> &mut [f32] {
        &mut self.biases
    }
}

impl Layer for DenseLayer {
    fn forward(&self, input: &FeatureMap) -> Result<FeatureMap> {
        let out_shape = self.output_shape(input.shape())?;
        let batch = out_shape.batch;

        let x = ArrayView2::from_shape((batch, self.input_size), input.data())
            .map_err(|e| Error::shape(e.to_string()))?;
        let w = ArrayView2::from_shape((self.output_size, self.input_size), &self.weights)
            .map_err(|e| Error::shape(e.to_string()))?;

        // Broadcast biases into every row, then accumulate x · Wᵀ on top.
        let mut output = FeatureMap::zeros(out_shape);
        for row in output.data_mut().chunks_exact_mut(self.output_size) {
            row.copy_from_slice(&self.biases);
        }
        let mut y = ArrayViewMut2::from_shape((batch, self.output_size), output.data_mut())
            .map_err(|e| Error::shape(e.to_string()))?;
        general_mat_mul(1.0, &x, &w.t(), 1.0, &mut y);

        Ok(output)
    }

    fn output_shape(&self, input: Shape) -> Result<Shape> {
        if input.per_sample() != self.input_size {
            return Err(Error::shape(format!(
                "Dense layer expects {} features per sample, got shape {}",
                self.input_size, input
            )));
        }
        Ok(Shape::matrix(input.batch, self.output_size))
    }

    /// Returns input_size × output_size (weights) + output_size (biases).
    fn parameter_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }

    fn save_state(&self, prefix: &str, state: &mut StateDict) {
        state.insert(
            join(prefix, "weight"),
            vec![self.output_size, self.input_size],
            &self.weights,
        );
        state.insert(join(prefix, "bias"), vec![self.output_size], &self.biases);
    }

    fn load_state(&mut self, prefix: &str, state: &StateDict) -> Result<()> {
        state.copy_into(
            &join(prefix, "weight"),
            &[self.output_size, self.input_size],
            &mut self.weights,
        )?;
        state.copy_into(&join(prefix, "bias"), &[self.output_size], &mut self.biases)?;
        Ok(())
    }
}
