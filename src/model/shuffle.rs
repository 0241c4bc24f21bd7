//! Channel shuffle
//!
//! Interleaves channel groups so information flows between the two branches of
//! consecutive ShuffleNetV2 blocks. Viewing `[N, C, H, W]` as
//! `[N, g, C/g, H, W]`, swapping the two group axes and flattening back sends
//! input channel `i * (C/g) + j` to output channel `j * g + i`.

use crate::error::{Error, Result};
use crate::tensor::FeatureMap;

/// Reorder the channels of `x` across `groups` groups.
///
/// # Errors
///
/// Returns [`Error::Shape`] if `groups` is zero or does not divide the channel count.
///
/// # Example
///
/// ```
/// use rust_shufflenet::model::channel_shuffle;
/// use rust_shufflenet::{FeatureMap, Shape};
///
/// let x = FeatureMap::from_vec(Shape::new(1, 4, 1, 1), vec![0.0, 1.0, 2.0, 3.0]).unwrap();
/// let y = channel_shuffle(&x, 2).unwrap();
/// assert_eq!(y.data(), &[0.0, 2.0, 1.0, 3.0]);
/// ```
pub fn channel_shuffle(x: &FeatureMap, groups: usize) -> Result<FeatureMap> {
    let shape = x.shape();
    if groups == 0 || shape.channels % groups != 0 {
        return Err(Error::shape(format!(
            "cannot shuffle {} channels into {} groups",
            shape.channels, groups
        )));
    }

    let channels_per_group = shape.channels / groups;
    let spatial = shape.spatial();
    let mut output = FeatureMap::zeros(shape);
    let src = x.data();
    let dst = output.data_mut();

    for n in 0..shape.batch {
        let base = n * shape.channels * spatial;
        for g in 0..groups {
            for j in 0..channels_per_group {
                let from = base + (g * channels_per_group + j) * spatial;
                let to = base + (j * groups + g) * spatial;
                dst[to..to + spatial].copy_from_slice(&src[from..from + spatial]);
            }
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Shape;

    fn channel_ids(batch: usize, channels: usize, spatial: usize) -> FeatureMap {
        let shape = Shape::new(batch, channels, 1, spatial);
        let data = (0..shape.numel())
            .map(|i| ((i / spatial) % channels) as f32)
            .collect();
        FeatureMap::from_vec(shape, data).unwrap()
    }

    fn first_value_per_channel(x: &FeatureMap, n: usize) -> Vec<f32> {
        let spatial = x.shape().spatial();
        x.sample(n).chunks_exact(spatial).map(|p| p[0]).collect()
    }

    #[test]
    fn test_two_groups_interleave_halves() {
        let x = channel_ids(2, 6, 3);
        let y = channel_shuffle(&x, 2).unwrap();

        for n in 0..2 {
            assert_eq!(
                first_value_per_channel(&y, n),
                vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]
            );
        }
    }

    #[test]
    fn test_three_groups() {
        let x = channel_ids(1, 6, 1);
        let y = channel_shuffle(&x, 3).unwrap();
        assert_eq!(y.data(), &[0.0, 2.0, 4.0, 1.0, 3.0, 5.0]);
    }

    #[test]
    fn test_single_group_is_identity() {
        let x = channel_ids(1, 5, 4);
        assert_eq!(channel_shuffle(&x, 1).unwrap(), x);
    }

    #[test]
    fn test_spatial_values_move_with_channel() {
        let shape = Shape::new(1, 4, 2, 2);
        let data = (0..16).map(|v| v as f32).collect();
        let x = FeatureMap::from_vec(shape, data).unwrap();
        let y = channel_shuffle(&x, 2).unwrap();

        // channel order 0, 2, 1, 3
        assert_eq!(&y.data()[4..8], &[8.0, 9.0, 10.0, 11.0]);
        assert_eq!(&y.data()[8..12], &[4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_rejects_indivisible_groups() {
        let x = channel_ids(1, 5, 1);
        assert!(channel_shuffle(&x, 2).is_err());
        assert!(channel_shuffle(&x, 0).is_err());
    }
}
