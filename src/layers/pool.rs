//! Spatial pooling layers
//!
//! `MaxPool2dLayer` downsamples with a sliding max window. `GlobalAvgPoolLayer`
//! collapses every channel plane to its mean, producing `[N, C, 1, 1]`.

use crate::error::{Error, Result};
use crate::layers::Layer;
use crate::tensor::{FeatureMap, Shape};

/// Max pooling over square windows with zero-free padding.
///
/// Padded positions never win the max: a window only considers cells that lie
/// inside the input.
#[derive(Debug, Clone)]
pub struct MaxPool2dLayer {
    kernel_size: usize,
    stride: usize,
    padding: usize,
}

impl MaxPool2dLayer {
    /// # Errors
    ///
    /// Returns [`Error::Layer`] if `kernel_size` or `stride` is zero, or if
    /// `padding` is larger than half the kernel (a window could then be empty).
    pub fn new(kernel_size: usize, stride: usize, padding: usize) -> Result<Self> {
        if kernel_size == 0 || stride == 0 {
            return Err(Error::layer(
                "MaxPool kernel_size and stride must be greater than 0",
            ));
        }
        if 2 * padding > kernel_size {
            return Err(Error::layer(format!(
                "MaxPool padding {} must be at most half of kernel_size {}",
                padding, kernel_size
            )));
        }
        Ok(Self {
            kernel_size,
            stride,
            padding,
        })
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn padding(&self) -> usize {
        self.padding
    }

    fn output_extent(&self, input: usize) -> Option<usize> {
        (input + 2 * self.padding)
            .checked_sub(self.kernel_size)
            .map(|span| span / self.stride + 1)
    }
}

impl Layer for MaxPool2dLayer {
    fn forward(&self, input: &FeatureMap) -> Result<FeatureMap> {
        let in_shape = input.shape();
        let out_shape = self.output_shape(in_shape)?;
        let (in_h, in_w) = (in_shape.height as isize, in_shape.width as isize);
        let (out_h, out_w) = (out_shape.height, out_shape.width);
        let mut output = FeatureMap::zeros(out_shape);

        let planes = input.data().chunks_exact(in_shape.spatial());
        let out_planes = output.data_mut().chunks_exact_mut(out_shape.spatial());
        for (plane, out_plane) in planes.zip(out_planes) {
            for oy in 0..out_h {
                for ox in 0..out_w {
                    let mut best = f32::NEG_INFINITY;
                    for ky in 0..self.kernel_size {
                        let iy = (oy * self.stride + ky) as isize - self.padding as isize;
                        if iy < 0 || iy >= in_h {
                            continue;
                        }
                        for kx in 0..self.kernel_size {
                            let ix = (ox * self.stride + kx) as isize - self.padding as isize;
                            if ix < 0 || ix >= in_w {
                                continue;
                            }
                            best = best.max(plane[(iy * in_w + ix) as usize]);
                        }
                    }
                    out_plane[oy * out_w + ox] = best;
                }
            }
        }

        Ok(output)
    }

    fn output_shape(&self, input: Shape) -> Result<Shape> {
        if input.spatial() == 0 {
            return Err(Error::shape(format!("cannot pool empty input {}", input)));
        }
        match (
            self.output_extent(input.height),
            self.output_extent(input.width),
        ) {
            (Some(height), Some(width)) => Ok(Shape { height, width, ..input }),
            _ => Err(Error::shape(format!(
                "input {} is smaller than the {}x{} pooling window",
                input, self.kernel_size, self.kernel_size
            ))),
        }
    }

    fn parameter_count(&self) -> usize {
        0
    }
}

/// Mean over height and width for every channel.
#[derive(Debug, Clone, Default)]
pub struct GlobalAvgPoolLayer;

impl GlobalAvgPoolLayer {
    pub fn new() -> Self {
        Self
    }
}

impl Layer for GlobalAvgPoolLayer {
    fn forward(&self, input: &FeatureMap) -> Result<FeatureMap> {
        let out_shape = self.output_shape(input.shape())?;
        let spatial = input.shape().spatial();
        let inv = 1.0 / spatial as f32;
        let data = input
            .data()
            .chunks_exact(spatial)
            .map(|plane| plane.iter().sum::<f32>() * inv)
            .collect();
        FeatureMap::from_vec(out_shape, data)
    }

    fn output_shape(&self, input: Shape) -> Result<Shape> {
        if input.spatial() == 0 {
            return Err(Error::shape(format!(
                "cannot average an empty spatial extent {}",
                input
            )));
        }
        Ok(Shape::new(input.batch, input.channels, 1, 1))
    }

    fn parameter_count(&self) -> usize {
        0
    }
}
