//! NCHW feature maps stored as flat `f32` buffers
//!
//! Layers exchange [`FeatureMap`] values: a row-major `Vec<f32>` together with the
//! [`Shape`] that describes it. A 2-D `[batch, features]` matrix is represented
//! with `height == width == 1`.

use crate::error::{Error, Result};
use std::fmt;

/// Dimensions of a 4-D feature map in NCHW order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
    pub batch: usize,
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl Shape {
    pub fn new(batch: usize, channels: usize, height: usize, width: usize) -> Self {
        Self {
            batch,
            channels,
            height,
            width,
        }
    }

    /// Shape of a `[batch, features]` matrix.
    pub fn matrix(batch: usize, features: usize) -> Self {
        Self::new(batch, features, 1, 1)
    }

    /// Number of elements in one channel plane (height × width).
    pub fn spatial(&self) -> usize {
        self.height * self.width
    }

    /// Number of elements in one sample (channels × height × width).
    pub fn per_sample(&self) -> usize {
        self.channels * self.spatial()
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.batch * self.per_sample()
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.batch, self.channels, self.height, self.width
        )
    }
}

/// Owned NCHW activation buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMap {
    shape: Shape,
    data: Vec<f32>,
}

impl FeatureMap {
    /// Zero-filled feature map of the given shape.
    pub fn zeros(shape: Shape) -> Self {
        Self {
            shape,
            data: vec![0.0f32; shape.numel()],
        }
    }

    /// Wrap an existing buffer. The buffer length must match the shape exactly.
    pub fn from_vec(shape: Shape, data: Vec<f32>) -> Result<Self> {
        if data.len() != shape.numel() {
            return Err(Error::shape(format!(
                "buffer of {} elements does not fit shape {} ({} elements)",
                data.len(),
                shape,
                shape.numel()
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// All values of sample `n` (channels × height × width).
    pub fn sample(&self, n: usize) -> &[f32] {
        let len = self.shape.per_sample();
        &self.data[n * len..(n + 1) * len]
    }

    /// Copy out channels `start..start + len` of every sample.
    pub fn narrow_channels(&self, start: usize, len: usize) -> Result<Self> {
        if start + len > self.shape.channels {
            return Err(Error::shape(format!(
                "channel range {}..{} out of bounds for shape {}",
                start,
                start + len,
                self.shape
            )));
        }

        let spatial = self.shape.spatial();
        let shape = Shape {
            channels: len,
            ..self.shape
        };
        let mut data = Vec::with_capacity(shape.numel());
        for n in 0..self.shape.batch {
            let begin = (n * self.shape.channels + start) * spatial;
            data.extend_from_slice(&self.data[begin..begin + len * spatial]);
        }

        Ok(Self { shape, data })
    }

    /// Concatenate two feature maps along the channel axis.
    pub fn concat_channels(a: &FeatureMap, b: &FeatureMap) -> Result<Self> {
        let (sa, sb) = (a.shape, b.shape);
        if sa.batch != sb.batch || sa.height != sb.height || sa.width != sb.width {
            return Err(Error::shape(format!(
                "cannot concatenate {} and {} along channels",
                sa, sb
            )));
        }

        let shape = Shape {
            channels: sa.channels + sb.channels,
            ..sa
        };
        let mut data = Vec::with_capacity(shape.numel());
        for n in 0..sa.batch {
            data.extend_from_slice(a.sample(n));
            data.extend_from_slice(b.sample(n));
        }

        Ok(Self { shape, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iota(shape: Shape) -> FeatureMap {
        let data = (0..shape.numel()).map(|v| v as f32).collect();
        FeatureMap::from_vec(shape, data).unwrap()
    }

    #[test]
    fn test_from_vec_rejects_wrong_length() {
        let result = FeatureMap::from_vec(Shape::new(1, 2, 2, 2), vec![0.0; 7]);
        assert!(matches!(result, Err(Error::Shape { .. })));
    }

    #[test]
    fn test_narrow_channels_per_sample() {
        let x = iota(Shape::new(2, 4, 1, 2));
        let upper = x.narrow_channels(2, 2).unwrap();

        assert_eq!(upper.shape(), Shape::new(2, 2, 1, 2));
        assert_eq!(upper.data(), &[4.0, 5.0, 6.0, 7.0, 12.0, 13.0, 14.0, 15.0]);
    }

    #[test]
    fn test_narrow_channels_out_of_bounds() {
        let x = iota(Shape::new(1, 4, 1, 1));
        assert!(x.narrow_channels(3, 2).is_err());
    }

    #[test]
    fn test_concat_restores_split() {
        let x = iota(Shape::new(3, 6, 2, 2));
        let lower = x.narrow_channels(0, 3).unwrap();
        let upper = x.narrow_channels(3, 3).unwrap();

        assert_eq!(FeatureMap::concat_channels(&lower, &upper).unwrap(), x);
    }

    #[test]
    fn test_concat_spatial_mismatch() {
        let a = FeatureMap::zeros(Shape::new(1, 2, 4, 4));
        let b = FeatureMap::zeros(Shape::new(1, 2, 2, 2));
        assert!(FeatureMap::concat_channels(&a, &b).is_err());
    }
}
