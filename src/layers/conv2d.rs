//! 2D Convolutional layer implementation
//!
//! This module provides a Conv2DLayer that performs (optionally grouped) 2D
//! convolution. Grouped convolution with `groups == in_channels` is the
//! depthwise convolution used throughout ShuffleNetV2.

use crate::error::{Error, Result};
use crate::layers::Layer;
use crate::tensor::{FeatureMap, Shape};
use crate::utils::SimpleRng;
use crate::weights::{join, StateDict};
use ndarray::linalg::general_mat_mul;
use ndarray::{ArrayView2, ArrayViewMut2};

/// 2D Convolutional layer with learnable filters.
///
/// Performs 2D convolution: slides filters over input to produce feature maps.
/// Supports zero-padding, configurable stride and channel groups.
///
/// # Fields
///
/// * `in_channels` - Number of input channels (e.g., 3 for RGB)
/// * `out_channels` - Number of output feature maps (number of filters)
/// * `kernel_size` - Size of the convolutional kernel (square: kernel_size × kernel_size)
/// * `padding` - Zero-padding applied to input (symmetric on all sides)
/// * `stride` - Stride for the convolution operation
/// * `groups` - Number of channel groups; each group sees `in_channels / groups` inputs
/// * `weights` - Filters (out_channels × in_channels/groups × kernel_size × kernel_size)
/// * `biases` - Optional bias for each output channel (out_channels)
///
/// # Example
///
/// ```ignore
/// use rust_shufflenet::layers::Conv2DLayer;
/// use rust_shufflenet::utils::SimpleRng;
///
/// let mut rng = SimpleRng::new(42);
/// // 3 input channels, 24 output channels, 3x3 kernel, padding=1, stride=2
/// let layer = Conv2DLayer::new(3, 24, 3, 1, 2, 1, false, &mut rng)?;
/// assert_eq!(layer.out_channels(), 24);
/// ```
#[derive(Debug, Clone)]
pub struct Conv2DLayer {
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    padding: usize,
    stride: usize,
    groups: usize,
    weights: Vec<f32>,
    biases: Option<Vec<f32>>,
}

impl Conv2DLayer {
    /// Create a new Conv2DLayer with Xavier initialization.
    ///
    /// Weights are sampled uniformly from [-limit, limit] where
    /// limit = sqrt(6 / (fan_in + fan_out)), with
    /// fan_in = in_channels/groups × kernel_size² and
    /// fan_out = out_channels/groups × kernel_size².
    ///
    /// Biases, when enabled, are initialized to zero.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Layer`] if a size is zero or if either channel count is
    /// not divisible by `groups`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        padding: usize,
        stride: usize,
        groups: usize,
        bias: bool,
        rng: &mut SimpleRng,
    ) -> Result<Self> {
        if in_channels == 0 || out_channels == 0 {
            return Err(Error::layer("Conv2D channel counts must be greater than 0"));
        }
        if kernel_size == 0 {
            return Err(Error::layer("Conv2D kernel_size must be greater than 0"));
        }
        if stride == 0 {
            return Err(Error::layer("Conv2D stride must be greater than 0"));
        }
        if groups == 0 || in_channels % groups != 0 || out_channels % groups != 0 {
            return Err(Error::layer(format!(
                "Conv2D groups={} must divide in_channels={} and out_channels={}",
                groups, in_channels, out_channels
            )));
        }

        let kernel_area = kernel_size * kernel_size;
        let fan_in = (in_channels / groups * kernel_area) as f32;
        let fan_out = (out_channels / groups * kernel_area) as f32;
        let limit = (6.0f32 / (fan_in + fan_out)).sqrt();

        let weight_count = out_channels * (in_channels / groups) * kernel_area;
        let mut weights = vec![0.0f32; weight_count];
        for value in &mut weights {
            *value = rng.gen_range_f32(-limit, limit);
        }

        Ok(Self {
            in_channels,
            out_channels,
            kernel_size,
            padding,
            stride,
            groups,
            weights,
            biases: bias.then(|| vec![0.0f32; out_channels]),
        })
    }

    /// Bias-free depthwise convolution (`groups == in_channels == out_channels`).
    pub fn depthwise(
        channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
        rng: &mut SimpleRng,
    ) -> Result<Self> {
        Self::new(
            channels,
            channels,
            kernel_size,
            padding,
            stride,
            channels,
            false,
            rng,
        )
    }

    /// Bias-free 1x1 convolution.
    pub fn pointwise(in_channels: usize, out_channels: usize, rng: &mut SimpleRng) -> Result<Self> {
        Self::new(in_channels, out_channels, 1, 0, 1, 1, false, rng)
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    pub fn padding(&self) -> usize {
        self.padding
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn groups(&self) -> usize {
        self.groups
    }

    pub fn has_bias(&self) -> bool {
        self.biases.is_some()
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn weights_mut(&mut self) -> &mut [f32] {
        &mut self.weights
    }

    fn weight_shape(&self) -> Vec<usize> {
        vec![
            self.out_channels,
            self.in_channels / self.groups,
            self.kernel_size,
            self.kernel_size,
        ]
    }

    /// Output spatial extent along one axis.
    ///
    /// Calculated as: (input + 2*padding - kernel_size) / stride + 1
    fn output_extent(&self, input: usize) -> Option<usize> {
        (input + 2 * self.padding)
            .checked_sub(self.kernel_size)
            .map(|span| span / self.stride + 1)
    }

    fn is_pointwise(&self) -> bool {
        self.kernel_size == 1 && self.stride == 1 && self.padding == 0 && self.groups == 1
    }

    // 1x1 convolution per sample: out[oc, hw] = W[oc, ic] · x[ic, hw]
    fn forward_pointwise(&self, input: &FeatureMap, output: &mut FeatureMap) -> Result<()> {
        let spatial = input.shape().spatial();
        let weights = ArrayView2::from_shape((self.out_channels, self.in_channels), &self.weights)
            .map_err(|e| Error::shape(e.to_string()))?;
        let out_len = self.out_channels * spatial;

        for (b, out_sample) in output.data_mut().chunks_exact_mut(out_len).enumerate() {
            let x = ArrayView2::from_shape((self.in_channels, spatial), input.sample(b))
                .map_err(|e| Error::shape(e.to_string()))?;
            let mut y = ArrayViewMut2::from_shape((self.out_channels, spatial), out_sample)
                .map_err(|e| Error::shape(e.to_string()))?;
            general_mat_mul(1.0, &weights, &x, 0.0, &mut y);
        }

        Ok(())
    }

    fn forward_direct(&self, input: &FeatureMap, output: &mut FeatureMap) {
        let in_shape = input.shape();
        let out_shape = output.shape();
        let (in_h, in_w) = (in_shape.height as isize, in_shape.width as isize);
        let (out_h, out_w) = (out_shape.height, out_shape.width);
        let in_spatial = in_shape.spatial();
        let out_spatial = out_shape.spatial();
        let k = self.kernel_size;
        let in_per_group = self.in_channels / self.groups;
        let out_per_group = self.out_channels / self.groups;
        let data = input.data();
        let out = output.data_mut();

        for b in 0..in_shape.batch {
            let in_base = b * self.in_channels * in_spatial;
            let out_base_b = b * self.out_channels * out_spatial;

            for oc in 0..self.out_channels {
                let group = oc / out_per_group;
                let out_base = out_base_b + oc * out_spatial;

                for oy in 0..out_h {
                    for ox in 0..out_w {
                        let mut sum = 0.0f32;

                        for icg in 0..in_per_group {
                            let ic = group * in_per_group + icg;
                            let w_base = (oc * in_per_group + icg) * k * k;
                            let in_base_c = in_base + ic * in_spatial;

                            for ky in 0..k {
                                let iy = (oy * self.stride + ky) as isize - self.padding as isize;
                                if iy < 0 || iy >= in_h {
                                    continue;
                                }
                                for kx in 0..k {
                                    let ix =
                                        (ox * self.stride + kx) as isize - self.padding as isize;
                                    if ix < 0 || ix >= in_w {
                                        continue;
                                    }
                                    let in_idx = in_base_c + (iy * in_w + ix) as usize;
                                    sum += data[in_idx] * self.weights[w_base + ky * k + kx];
                                }
                            }
                        }

                        out[out_base + oy * out_w + ox] = sum;
                    }
                }
            }
        }
    }
}

impl Layer for Conv2DLayer {
    fn forward(&self, input: &FeatureMap) -> Result<FeatureMap> {
        let out_shape = self.output_shape(input.shape())?;
        let mut output = FeatureMap::zeros(out_shape);

        if self.is_pointwise() {
            self.forward_pointwise(input, &mut output)?;
        } else {
            self.forward_direct(input, &mut output);
        }

        if let Some(biases) = &self.biases {
            let spatial = out_shape.spatial();
            for (i, plane) in output.data_mut().chunks_exact_mut(spatial).enumerate() {
                let bias = biases[i % self.out_channels];
                for value in plane.iter_mut() {
                    *value += bias;
                }
            }
        }

        Ok(output)
    }

    fn output_shape(&self, input: Shape) -> Result<Shape> {
        if input.channels != self.in_channels {
            return Err(Error::shape(format!(
                "Conv2D expects {} input channels, got shape {}",
                self.in_channels, input
            )));
        }
        let height = self.output_extent(input.height);
        let width = self.output_extent(input.width);
        match (height, width) {
            (Some(height), Some(width)) => {
                Ok(Shape::new(input.batch, self.out_channels, height, width))
            }
            _ => Err(Error::shape(format!(
                "input {} is smaller than the {}x{} kernel after padding {}",
                input, self.kernel_size, self.kernel_size, self.padding
            ))),
        }
    }

    /// Returns weights count + biases count
    fn parameter_count(&self) -> usize {
        self.weights.len() + self.biases.as_ref().map_or(0, Vec::len)
    }

    fn save_state(&self, prefix: &str, state: &mut StateDict) {
        state.insert(join(prefix, "weight"), self.weight_shape(), &self.weights);
        if let Some(biases) = &self.biases {
            state.insert(join(prefix, "bias"), vec![self.out_channels], biases);
        }
    }

    fn load_state(&mut self, prefix: &str, state: &StateDict) -> Result<()> {
        let shape = self.weight_shape();
        state.copy_into(&join(prefix, "weight"), &shape, &mut self.weights)?;
        if let Some(biases) = &mut self.biases {
            state.copy_into(&join(prefix, "bias"), &[self.out_channels], biases)?;
        }
        Ok(())
    }
}
