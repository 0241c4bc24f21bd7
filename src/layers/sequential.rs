//! Ordered container of layers
//!
//! Children are addressed by their position, so the parameters of the third
//! child of `stage2` are stored as `stage2.2.*`.

use crate::error::Result;
use crate::layers::Layer;
use crate::tensor::{FeatureMap, Shape};
use crate::weights::{join, StateDict};

/// Runs its children one after another.
#[derive(Default)]
pub struct Sequential {
    layers: Vec<Box<dyn Layer>>,
}

impl Sequential {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer, builder style.
    pub fn add<L: Layer + 'static>(mut self, layer: L) -> Self {
        self.layers.push(Box::new(layer));
        self
    }

    pub fn push(&mut self, layer: Box<dyn Layer>) {
        self.layers.push(layer);
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl Layer for Sequential {
    fn forward(&self, input: &FeatureMap) -> Result<FeatureMap> {
        let Some((first, rest)) = self.layers.split_first() else {
            return Ok(input.clone());
        };

        let mut x = first.forward(input)?;
        for layer in rest {
            x = layer.forward(&x)?;
        }
        Ok(x)
    }

    fn output_shape(&self, input: Shape) -> Result<Shape> {
        self.layers
            .iter()
            .try_fold(input, |shape, layer| layer.output_shape(shape))
    }

    fn parameter_count(&self) -> usize {
        self.layers.iter().map(|layer| layer.parameter_count()).sum()
    }

    fn set_training(&mut self, training: bool) {
        for layer in &mut self.layers {
            layer.set_training(training);
        }
    }

    fn save_state(&self, prefix: &str, state: &mut StateDict) {
        for (i, layer) in self.layers.iter().enumerate() {
            layer.save_state(&join(prefix, &i.to_string()), state);
        }
    }

    fn load_state(&mut self, prefix: &str, state: &StateDict) -> Result<()> {
        for (i, layer) in self.layers.iter_mut().enumerate() {
            layer.load_state(&join(prefix, &i.to_string()), state)?;
        }
        Ok(())
    }
}
