//! ShuffleNetV2 building block
//!
//! Each block splits its work between two branches and finishes with a
//! channel shuffle:
//!
//! - stride 1: the input is split in two channel halves; the first half passes
//!   through untouched, the second goes through `branch2`.
//! - stride 2 or 3: both branches see the full input and downsample it;
//!   `branch1` is a depthwise + pointwise projection.
//!
//! ```text
//! branch1: dw3x3(s) -> BN -> 1x1 -> BN -> ReLU
//! branch2: 1x1 -> BN -> ReLU -> dw3x3(s) -> BN -> 1x1 -> BN -> ReLU
//! ```

use crate::error::{Error, Result};
use crate::layers::{BatchNorm2dLayer, Conv2DLayer, Layer, NormConfig, ReluLayer, Sequential};
use crate::model::channel_shuffle;
use crate::tensor::{FeatureMap, Shape};
use crate::utils::SimpleRng;
use crate::weights::{join, StateDict};

pub struct InvertedResidual {
    inp: usize,
    oup: usize,
    stride: usize,
    branch1: Option<Sequential>,
    branch2: Sequential,
}

impl InvertedResidual {
    /// Build a block mapping `inp` channels to `oup` channels.
    ///
    /// # Errors
    ///
    /// - [`Error::IllegalStride`] if `stride` is outside `1..=3`.
    /// - [`Error::ChannelMismatch`] if `stride == 1` and `inp != 2 * (oup / 2)`.
    pub fn new(
        inp: usize,
        oup: usize,
        stride: usize,
        norm: &NormConfig,
        rng: &mut SimpleRng,
    ) -> Result<Self> {
        if !(1..=3).contains(&stride) {
            return Err(Error::IllegalStride(stride));
        }

        let branch_features = oup / 2;
        if stride == 1 && inp != branch_features << 1 {
            return Err(Error::ChannelMismatch { inp, oup });
        }
        if branch_features == 0 {
            return Err(Error::ChannelMismatch { inp, oup });
        }

        let branch1 = if stride > 1 {
            Some(
                Sequential::new()
                    .add(Conv2DLayer::depthwise(inp, 3, stride, 1, rng)?)
                    .add(BatchNorm2dLayer::with_config(inp, norm)?)
                    .add(Conv2DLayer::pointwise(inp, branch_features, rng)?)
                    .add(BatchNorm2dLayer::with_config(branch_features, norm)?)
                    .add(ReluLayer::new()),
            )
        } else {
            None
        };

        let branch2_in = if stride > 1 { inp } else { branch_features };
        let branch2 = Sequential::new()
            .add(Conv2DLayer::pointwise(branch2_in, branch_features, rng)?)
            .add(BatchNorm2dLayer::with_config(branch_features, norm)?)
            .add(ReluLayer::new())
            .add(Conv2DLayer::depthwise(branch_features, 3, stride, 1, rng)?)
            .add(BatchNorm2dLayer::with_config(branch_features, norm)?)
            .add(Conv2DLayer::pointwise(branch_features, branch_features, rng)?)
            .add(BatchNorm2dLayer::with_config(branch_features, norm)?)
            .add(ReluLayer::new());

        Ok(Self {
            inp,
            oup,
            stride,
            branch1,
            branch2,
        })
    }

    pub fn input_channels(&self) -> usize {
        self.inp
    }

    pub fn output_channels(&self) -> usize {
        self.oup
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn has_branch1(&self) -> bool {
        self.branch1.is_some()
    }
}

impl Layer for InvertedResidual {
    fn forward(&self, input: &FeatureMap) -> Result<FeatureMap> {
        if input.shape().channels != self.inp {
            return Err(Error::shape(format!(
                "block expects {} input channels, got shape {}",
                self.inp,
                input.shape()
            )));
        }

        let out = match &self.branch1 {
            None => {
                let channels = input.shape().channels;
                let half = channels / 2;
                let x1 = input.narrow_channels(0, half)?;
                let x2 = input.narrow_channels(half, channels - half)?;
                FeatureMap::concat_channels(&x1, &self.branch2.forward(&x2)?)?
            }
            Some(branch1) => {
                let left = branch1.forward(input)?;
                let right = self.branch2.forward(input)?;
                FeatureMap::concat_channels(&left, &right)?
            }
        };
        channel_shuffle(&out, 2)
    }

    fn output_shape(&self, input: Shape) -> Result<Shape> {
        if input.channels != self.inp {
            return Err(Error::shape(format!(
                "block expects {} input channels, got shape {}",
                self.inp, input
            )));
        }
        let branch_input = match self.branch1 {
            None => Shape {
                channels: input.channels / 2,
                ..input
            },
            Some(_) => input,
        };
        let branch = self.branch2.output_shape(branch_input)?;
        Ok(Shape {
            channels: 2 * branch.channels,
            ..branch
        })
    }

    fn parameter_count(&self) -> usize {
        self.branch1.as_ref().map_or(0, Layer::parameter_count) + self.branch2.parameter_count()
    }

    fn set_training(&mut self, training: bool) {
        if let Some(branch1) = &mut self.branch1 {
            branch1.set_training(training);
        }
        self.branch2.set_training(training);
    }

    fn save_state(&self, prefix: &str, state: &mut StateDict) {
        if let Some(branch1) = &self.branch1 {
            branch1.save_state(&join(prefix, "branch1"), state);
        }
        self.branch2.save_state(&join(prefix, "branch2"), state);
    }

    fn load_state(&mut self, prefix: &str, state: &StateDict) -> Result<()> {
        if let Some(branch1) = &mut self.branch1 {
            branch1.load_state(&join(prefix, "branch1"), state)?;
        }
        self.branch2.load_state(&join(prefix, "branch2"), state)
    }
}
