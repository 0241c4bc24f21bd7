//! Layer trait definition for neural network layers
//!
//! This module defines the core Layer trait that every building block of the
//! network implements, from a single convolution up to a whole ShuffleNetV2.
//! The trait covers forward propagation, shape inference, train/eval switching
//! and reading or writing named parameters.

use crate::error::Result;
use crate::tensor::{FeatureMap, Shape};
use crate::weights::StateDict;

/// Core trait for neural network layers.
///
/// Layers consume and produce NCHW [`FeatureMap`]s. Spatial sizes are not fixed
/// at construction, so the same layer accepts any input resolution that its
/// kernel and stride allow.
///
/// # Example
///
/// ```ignore
/// let input = FeatureMap::zeros(Shape::new(2, 3, 32, 32));
/// let output = layer.forward(&input)?;
/// assert_eq!(output.shape(), layer.output_shape(input.shape())?);
/// ```
pub trait Layer {
    /// Forward propagation through the layer.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Shape`] when the input does not match what the
    /// layer was built for (wrong channel count, spatial size too small, ...).
    fn forward(&self, input: &FeatureMap) -> Result<FeatureMap>;

    /// Shape produced by [`Layer::forward`] for an input of shape `input`.
    fn output_shape(&self, input: Shape) -> Result<Shape>;

    /// Number of trainable parameters (weights, biases, BatchNorm scale and shift).
    ///
    /// Running statistics are buffers, not parameters, and are not counted.
    fn parameter_count(&self) -> usize;

    /// Switch between training and inference behaviour.
    ///
    /// Only layers with mode-dependent behaviour (BatchNorm) need to override this.
    fn set_training(&mut self, _training: bool) {}

    /// Write this layer's parameters and buffers into `state` under `prefix`.
    fn save_state(&self, _prefix: &str, _state: &mut StateDict) {}

    /// Read this layer's parameters and buffers from `state` under `prefix`.
    fn load_state(&mut self, _prefix: &str, _state: &StateDict) -> Result<()> {
        Ok(())
    }
}
