//! ShuffleNetV2 network
//!
//! ```text
//! input [N, 3, H, W]
//!   -> conv1   3x3/2 conv + BN + ReLU
//!   -> maxpool 3x3/2
//!   -> stage2, stage3, stage4 (one stride-2 block, then stride-1 blocks)
//!   -> conv5   1x1 conv + BN + ReLU
//!   -> global average pool
//!   -> fc      -> logits [N, num_classes]
//! ```

use crate::error::{Error, Result};
use crate::layers::{
    BatchNorm2dLayer, Conv2DLayer, DenseLayer, GlobalAvgPoolLayer, Layer, MaxPool2dLayer,
    NormConfig, ReluLayer, Sequential,
};
use crate::model::InvertedResidual;
use crate::tensor::{FeatureMap, Shape};
use crate::utils::{argmax, softmax_rows, SimpleRng};
use crate::weights::{join, StateDict};
use std::path::Path;
use tracing::{debug, info, trace};

/// Channels of the RGB input image.
pub const INPUT_CHANNELS: usize = 3;

const STAGE_NAMES: [&str; 3] = ["stage2", "stage3", "stage4"];

/// Options that do not change the topology of the network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShuffleNetV2Options {
    pub num_classes: usize,
    pub norm: NormConfig,
}

impl Default for ShuffleNetV2Options {
    fn default() -> Self {
        Self {
            num_classes: 1000,
            norm: NormConfig::default(),
        }
    }
}

/// Output shapes of every top-level module for a given input.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleSummary {
    pub name: &'static str,
    pub output_shape: Shape,
    pub parameters: usize,
}

pub struct ShuffleNetV2 {
    stage_out_channels: Vec<usize>,
    stages_repeats: Vec<usize>,
    num_classes: usize,
    conv1: Sequential,
    maxpool: MaxPool2dLayer,
    stages: [Sequential; 3],
    conv5: Sequential,
    pool: GlobalAvgPoolLayer,
    fc: DenseLayer,
}

impl ShuffleNetV2 {
    /// Build a network from three stage repeat counts and five stage widths.
    ///
    /// # Errors
    ///
    /// - [`Error::StagesRepeats`] unless `stages_repeats` holds 3 positive values.
    /// - [`Error::StagesOutChannels`] unless `stages_out_channels` holds 5 positive values.
    /// - [`Error::ChannelMismatch`] if a stage with more than one block has an
    ///   odd width. A single-block stage with an odd width builds, but produces
    ///   one channel less than declared and fails with [`Error::Shape`] in
    ///   `forward`.
    pub fn new(
        stages_repeats: &[usize],
        stages_out_channels: &[usize],
        options: ShuffleNetV2Options,
        rng: &mut SimpleRng,
    ) -> Result<Self> {
        Self::with_block_builder(
            stages_repeats,
            stages_out_channels,
            options,
            rng,
            |inp, oup, stride, norm, rng| {
                Ok(Box::new(InvertedResidual::new(inp, oup, stride, norm, rng)?) as Box<dyn Layer>)
            },
        )
    }

    /// Like [`ShuffleNetV2::new`] but with a custom block constructor.
    ///
    /// `build_block(inp, oup, stride, norm, rng)` is called once per block; the
    /// first block of each stage gets stride 2, the rest stride 1.
    pub fn with_block_builder<F>(
        stages_repeats: &[usize],
        stages_out_channels: &[usize],
        options: ShuffleNetV2Options,
        rng: &mut SimpleRng,
        mut build_block: F,
    ) -> Result<Self>
    where
        F: FnMut(usize, usize, usize, &NormConfig, &mut SimpleRng) -> Result<Box<dyn Layer>>,
    {
        if stages_repeats.len() != 3 || stages_repeats.contains(&0) {
            return Err(Error::StagesRepeats(stages_repeats.to_vec()));
        }
        if stages_out_channels.len() != 5 || stages_out_channels.contains(&0) {
            return Err(Error::StagesOutChannels(stages_out_channels.to_vec()));
        }
        if options.num_classes == 0 {
            return Err(Error::config("num_classes must be greater than 0"));
        }
        let norm = options.norm;

        let mut input_channels = INPUT_CHANNELS;
        let mut output_channels = stages_out_channels[0];
        let conv1 = Sequential::new()
            .add(Conv2DLayer::new(
                input_channels,
                output_channels,
                3,
                1,
                2,
                1,
                false,
                rng,
            )?)
            .add(BatchNorm2dLayer::with_config(output_channels, &norm)?)
            .add(ReluLayer::new());
        input_channels = output_channels;

        let maxpool = MaxPool2dLayer::new(3, 2, 1)?;

        let mut stages: [Sequential; 3] = Default::default();
        for ((stage, &repeats), (&output_channels, name)) in stages
            .iter_mut()
            .zip(stages_repeats)
            .zip(stages_out_channels[1..4].iter().zip(STAGE_NAMES))
        {
            stage.push(build_block(input_channels, output_channels, 2, &norm, rng)?);
            for _ in 0..repeats - 1 {
                stage.push(build_block(output_channels, output_channels, 1, &norm, rng)?);
            }
            debug!(
                stage = name,
                input_channels, output_channels, repeats, "built stage"
            );
            input_channels = output_channels;
        }

        output_channels = stages_out_channels[4];
        let conv5 = Sequential::new()
            .add(Conv2DLayer::pointwise(input_channels, output_channels, rng)?)
            .add(BatchNorm2dLayer::with_config(output_channels, &norm)?)
            .add(ReluLayer::new());

        let fc = DenseLayer::new(output_channels, options.num_classes, rng);

        let model = Self {
            stage_out_channels: stages_out_channels.to_vec(),
            stages_repeats: stages_repeats.to_vec(),
            num_classes: options.num_classes,
            conv1,
            maxpool,
            stages,
            conv5,
            pool: GlobalAvgPoolLayer::new(),
            fc,
        };
        debug!(
            parameters = model.parameter_count(),
            num_classes = model.num_classes,
            "built ShuffleNetV2"
        );
        Ok(model)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn stage_out_channels(&self) -> &[usize] {
        &self.stage_out_channels
    }

    pub fn stages_repeats(&self) -> &[usize] {
        &self.stages_repeats
    }

    /// Put every BatchNorm layer in training mode.
    pub fn train(&mut self) {
        self.set_training(true);
    }

    /// Put every BatchNorm layer in inference mode.
    pub fn eval(&mut self) {
        self.set_training(false);
    }

    fn modules(&self) -> [(&'static str, &dyn Layer); 8] {
        [
            ("conv1", &self.conv1),
            ("maxpool", &self.maxpool),
            (STAGE_NAMES[0], &self.stages[0]),
            (STAGE_NAMES[1], &self.stages[1]),
            (STAGE_NAMES[2], &self.stages[2]),
            ("conv5", &self.conv5),
            ("avgpool", &self.pool),
            ("fc", &self.fc),
        ]
    }

    fn modules_mut(&mut self) -> [(&'static str, &mut dyn Layer); 8] {
        let [stage2, stage3, stage4] = &mut self.stages;
        [
            ("conv1", &mut self.conv1),
            ("maxpool", &mut self.maxpool),
            (STAGE_NAMES[0], stage2),
            (STAGE_NAMES[1], stage3),
            (STAGE_NAMES[2], stage4),
            ("conv5", &mut self.conv5),
            ("avgpool", &mut self.pool),
            ("fc", &mut self.fc),
        ]
    }

    /// Per-module output shapes and parameter counts for an input shape.
    pub fn summary(&self, input: Shape) -> Result<Vec<ModuleSummary>> {
        let mut shape = self.check_input(input)?;
        let mut rows = Vec::with_capacity(8);
        for (name, module) in self.modules() {
            shape = module.output_shape(shape)?;
            rows.push(ModuleSummary {
                name,
                output_shape: shape,
                parameters: module.parameter_count(),
            });
        }
        Ok(rows)
    }

    /// Class probabilities, one softmax row per sample.
    pub fn probabilities(&self, input: &FeatureMap) -> Result<Vec<f32>> {
        let mut probs = self.forward(input)?.into_vec();
        let rows = probs.len() / self.num_classes;
        softmax_rows(&mut probs, rows, self.num_classes);
        Ok(probs)
    }

    /// Most likely class per sample.
    pub fn predict(&self, input: &FeatureMap) -> Result<Vec<usize>> {
        let logits = self.forward(input)?;
        Ok(argmax(logits.data(), self.num_classes))
    }

    /// All parameters and BatchNorm buffers under their dotted names.
    pub fn state_dict(&self) -> StateDict {
        let mut state = StateDict::new();
        self.save_state("", &mut state);
        state
    }

    /// Copy every tensor of `state` into the model.
    ///
    /// # Errors
    ///
    /// Fails on missing or mis-shaped tensors, and on tensors the model does
    /// not have. Every tensor is checked before the first copy, so the model
    /// is left untouched when an error is returned.
    pub fn load_state_dict(&mut self, state: &StateDict) -> Result<()> {
        let current = self.state_dict();

        let unexpected: Vec<String> = state
            .keys()
            .filter(|name| current.get(name).is_none())
            .cloned()
            .collect();
        if !unexpected.is_empty() {
            return Err(Error::UnexpectedParameters(unexpected));
        }

        for (name, tensor) in &current.tensors {
            let incoming = state
                .get(name)
                .ok_or_else(|| Error::MissingParameter(name.clone()))?;
            if incoming.shape != tensor.shape || incoming.data.len() != tensor.data.len() {
                return Err(Error::ParameterShape {
                    name: name.clone(),
                    expected: tensor.shape.clone(),
                    actual: incoming.shape.clone(),
                });
            }
        }

        self.load_state("", state)
    }

    /// Load weights from a JSON state dict file.
    pub fn load_weights(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let state = StateDict::load(path)?;
        self.load_state_dict(&state)?;
        info!(path = %path.display(), tensors = state.len(), "loaded weights");
        Ok(())
    }

    /// Save weights as a JSON state dict file.
    pub fn save_weights(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let state = self.state_dict();
        state.save(path)?;
        info!(path = %path.display(), tensors = state.len(), "saved weights");
        Ok(())
    }

    fn check_input(&self, input: Shape) -> Result<Shape> {
        if input.channels != INPUT_CHANNELS {
            return Err(Error::shape(format!(
                "ShuffleNetV2 expects {} input channels, got shape {}",
                INPUT_CHANNELS, input
            )));
        }
        Ok(input)
    }
}

impl Layer for ShuffleNetV2 {
    /// Logits of shape `[N, num_classes, 1, 1]`.
    fn forward(&self, input: &FeatureMap) -> Result<FeatureMap> {
        self.check_input(input.shape())?;

        self.modules()
            .iter()
            .try_fold(input.clone(), |x, (name, module)| {
                let x = module.forward(&x)?;
                trace!(module = *name, shape = %x.shape(), "forward");
                Ok(x)
            })
    }

    fn output_shape(&self, input: Shape) -> Result<Shape> {
        let input = self.check_input(input)?;
        self.modules()
            .iter()
            .try_fold(input, |shape, (_, module)| module.output_shape(shape))
    }

    fn parameter_count(&self) -> usize {
        self.modules()
            .iter()
            .map(|(_, module)| module.parameter_count())
            .sum()
    }

    fn set_training(&mut self, training: bool) {
        for (_, module) in self.modules_mut() {
            module.set_training(training);
        }
    }

    fn save_state(&self, prefix: &str, state: &mut StateDict) {
        for (name, module) in self.modules() {
            module.save_state(&join(prefix, name), state);
        }
    }

    fn load_state(&mut self, prefix: &str, state: &StateDict) -> Result<()> {
        for (name, module) in self.modules_mut() {
            module.load_state(&join(prefix, name), state)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny(rng: &mut SimpleRng) -> Result<ShuffleNetV2> {
        ShuffleNetV2::new(
            &[1, 2, 1],
            &[8, 16, 32, 64, 128],
            ShuffleNetV2Options {
                num_classes: 10,
                ..Default::default()
            },
            rng,
        )
    }

    #[test]
    fn test_rejects_wrong_stage_lengths() {
        let mut rng = SimpleRng::new(42);
        let options = ShuffleNetV2Options::default();

        let err = ShuffleNetV2::new(&[4, 8], &[24, 48, 96, 192, 1024], options, &mut rng);
        assert!(matches!(err, Err(Error::StagesRepeats(_))));

        let err = ShuffleNetV2::new(&[4, 8, 4], &[24, 48, 96, 192], options, &mut rng);
        assert!(matches!(err, Err(Error::StagesOutChannels(_))));
    }

    #[test]
    fn test_rejects_zero_entries() {
        let mut rng = SimpleRng::new(42);
        let options = ShuffleNetV2Options::default();

        let err = ShuffleNetV2::new(&[4, 0, 4], &[24, 48, 96, 192, 1024], options, &mut rng);
        assert!(matches!(err, Err(Error::StagesRepeats(_))));

        let err = ShuffleNetV2::new(&[4, 8, 4], &[24, 0, 96, 192, 1024], options, &mut rng);
        assert!(matches!(err, Err(Error::StagesOutChannels(_))));
    }

    #[test]
    fn test_odd_stage_width_fails_in_block() {
        let mut rng = SimpleRng::new(42);
        let err = ShuffleNetV2::new(
            &[2, 1, 1],
            &[8, 15, 32, 64, 128],
            ShuffleNetV2Options::default(),
            &mut rng,
        );
        assert!(matches!(err, Err(Error::ChannelMismatch { .. })));
    }

    #[test]
    fn test_odd_width_single_block_fails_in_forward() {
        let mut rng = SimpleRng::new(42);
        let model = ShuffleNetV2::new(
            &[1, 1, 1],
            &[8, 15, 32, 64, 128],
            ShuffleNetV2Options::default(),
            &mut rng,
        )
        .unwrap();

        let input = FeatureMap::zeros(Shape::new(1, 3, 32, 32));
        assert!(matches!(model.forward(&input), Err(Error::Shape { .. })));
        assert!(model.summary(input.shape()).is_err());
    }

    #[test]
    fn test_summary_tracks_downsampling() {
        let mut rng = SimpleRng::new(42);
        let model = tiny(&mut rng).unwrap();
        let rows = model.summary(Shape::new(1, 3, 64, 64)).unwrap();

        let shapes: Vec<Shape> = rows.iter().map(|row| row.output_shape).collect();
        assert_eq!(
            shapes,
            vec![
                Shape::new(1, 8, 32, 32),
                Shape::new(1, 8, 16, 16),
                Shape::new(1, 16, 8, 8),
                Shape::new(1, 32, 4, 4),
                Shape::new(1, 64, 2, 2),
                Shape::new(1, 128, 2, 2),
                Shape::new(1, 128, 1, 1),
                Shape::matrix(1, 10),
            ]
        );
        let total: usize = rows.iter().map(|row| row.parameters).sum();
        assert_eq!(total, model.parameter_count());
    }

    #[test]
    fn test_custom_block_builder_is_used() {
        let mut rng = SimpleRng::new(42);
        let mut calls = Vec::new();
        let model = ShuffleNetV2::with_block_builder(
            &[1, 2, 1],
            &[8, 16, 32, 64, 128],
            ShuffleNetV2Options::default(),
            &mut rng,
            |inp, oup, stride, norm, rng| {
                calls.push((inp, oup, stride));
                Ok(Box::new(InvertedResidual::new(inp, oup, stride, norm, rng)?) as Box<dyn Layer>)
            },
        )
        .unwrap();

        assert_eq!(
            calls,
            vec![(8, 16, 2), (16, 32, 2), (32, 32, 1), (32, 64, 2)]
        );
        assert_eq!(model.stages_repeats(), &[1, 2, 1]);
    }

    #[test]
    fn test_forward_rejects_grayscale() {
        let mut rng = SimpleRng::new(42);
        let model = tiny(&mut rng).unwrap();
        let input = FeatureMap::zeros(Shape::new(1, 1, 32, 32));
        assert!(matches!(model.forward(&input), Err(Error::Shape { .. })));
    }

    #[test]
    fn test_eval_switches_every_batchnorm() {
        let mut rng = SimpleRng::new(42);
        let mut model = tiny(&mut rng).unwrap();
        model.eval();

        let before = model.state_dict();
        let input = FeatureMap::from_vec(
            Shape::new(2, 3, 32, 32),
            SimpleRng::new(1).normal_vec(2 * 3 * 32 * 32),
        )
        .unwrap();
        model.forward(&input).unwrap();

        // running statistics are untouched in inference mode
        assert_eq!(model.state_dict(), before);
    }
}
