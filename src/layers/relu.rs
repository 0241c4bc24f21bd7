//! ReLU activation as a layer

use crate::error::Result;
use crate::layers::Layer;
use crate::tensor::{FeatureMap, Shape};
use crate::utils::relu_inplace;

/// Element-wise `max(0, x)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReluLayer;

impl ReluLayer {
    pub fn new() -> Self {
        Self
    }
}

impl Layer for ReluLayer {
    fn forward(&self, input: &FeatureMap) -> Result<FeatureMap> {
        let mut output = input.clone();
        relu_inplace(output.data_mut());
        Ok(output)
    }

    fn output_shape(&self, input: Shape) -> Result<Shape> {
        Ok(input)
    }

    fn parameter_count(&self) -> usize {
        0
    }
}
