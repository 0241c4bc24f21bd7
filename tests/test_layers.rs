//! Tests for the layer primitives used by ShuffleNetV2

use approx::assert_relative_eq;
use rust_shufflenet::layers::{
    BatchNorm2dLayer, Conv2DLayer, DenseLayer, GlobalAvgPoolLayer, Layer, MaxPool2dLayer,
    ReluLayer, Sequential,
};
use rust_shufflenet::utils::SimpleRng;
use rust_shufflenet::{FeatureMap, Shape};

fn map(shape: Shape, data: Vec<f32>) -> FeatureMap {
    FeatureMap::from_vec(shape, data).unwrap()
}

// ============================================================================
// Convolution Tests
// ============================================================================

mod conv_tests {
    use super::*;

    #[test]
    fn test_stem_conv_shape() {
        let mut rng = SimpleRng::new(1);
        let conv = Conv2DLayer::new(3, 24, 3, 1, 2, 1, false, &mut rng).unwrap();

        assert_eq!(conv.parameter_count(), 24 * 3 * 9);
        assert_eq!(
            conv.output_shape(Shape::new(2, 3, 224, 224)).unwrap(),
            Shape::new(2, 24, 112, 112)
        );
    }

    #[test]
    fn test_depthwise_filters_channels_independently() {
        let mut rng = SimpleRng::new(1);
        let mut conv = Conv2DLayer::depthwise(2, 3, 1, 1, &mut rng).unwrap();
        // channel 0 keeps the centre pixel, channel 1 sums its neighbourhood
        let weights = conv.weights_mut();
        weights.fill(0.0);
        weights[4] = 1.0;
        weights[9..18].fill(1.0);

        let input = map(Shape::new(1, 2, 2, 2), vec![1.0, 2.0, 3.0, 4.0, 1.0, 1.0, 1.0, 1.0]);
        let output = conv.forward(&input).unwrap();

        assert_eq!(output.shape(), Shape::new(1, 2, 2, 2));
        assert_eq!(&output.data()[..4], &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(&output.data()[4..], &[4.0, 4.0, 4.0, 4.0]);
    }

    #[test]
    fn test_depthwise_stride_two() {
        let mut rng = SimpleRng::new(1);
        let conv = Conv2DLayer::depthwise(4, 3, 2, 1, &mut rng).unwrap();
        assert_eq!(conv.parameter_count(), 4 * 9);
        assert_eq!(
            conv.output_shape(Shape::new(1, 4, 7, 7)).unwrap(),
            Shape::new(1, 4, 4, 4)
        );
    }

    #[test]
    fn test_invalid_groups_rejected() {
        let mut rng = SimpleRng::new(1);
        assert!(Conv2DLayer::new(6, 4, 3, 1, 1, 4, false, &mut rng).is_err());
        assert!(Conv2DLayer::new(6, 4, 3, 1, 0, 1, false, &mut rng).is_err());
    }
}

// ============================================================================
// BatchNorm Tests
// ============================================================================

mod batchnorm_tests {
    use super::*;

    #[test]
    fn test_training_normalises_each_channel() {
        let bn = BatchNorm2dLayer::new(2, 1e-5, 0.9).unwrap();
        let input = map(
            Shape::new(2, 2, 1, 2),
            vec![1.0, 3.0, 10.0, 10.0, 5.0, 7.0, 20.0, 40.0],
        );
        let output = bn.forward(&input).unwrap();

        for c in 0..2 {
            let values: Vec<f32> = (0..2)
                .flat_map(|n| output.sample(n)[c * 2..c * 2 + 2].to_vec())
                .collect();
            let mean: f32 = values.iter().sum::<f32>() / 4.0;
            let var: f32 = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / 4.0;
            assert_relative_eq!(mean, 0.0, epsilon = 1e-5);
            assert_relative_eq!(var, 1.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_inference_uses_running_stats() {
        let mut bn = BatchNorm2dLayer::new(1, 0.0001, 0.9).unwrap();
        bn.set_training(false);
        let input = map(Shape::new(1, 1, 1, 3), vec![-1.0, 0.0, 2.0]);

        // running_mean = 0 and running_var = 1 at construction
        let output = bn.forward(&input).unwrap();
        for (a, b) in output.data().iter().zip(input.data()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-3);
        }
    }
}

// ============================================================================
// Pooling, Activation and Dense Tests
// ============================================================================

mod misc_layer_tests {
    use super::*;

    #[test]
    fn test_maxpool_stem_shape() {
        let pool = MaxPool2dLayer::new(3, 2, 1).unwrap();
        assert_eq!(
            pool.output_shape(Shape::new(1, 24, 112, 112)).unwrap(),
            Shape::new(1, 24, 56, 56)
        );
        assert_eq!(pool.parameter_count(), 0);
    }

    #[test]
    fn test_maxpool_ignores_padding_for_negative_inputs() {
        let pool = MaxPool2dLayer::new(3, 2, 1).unwrap();
        let input = map(Shape::new(1, 1, 2, 2), vec![-4.0, -3.0, -2.0, -1.0]);
        let output = pool.forward(&input).unwrap();
        assert_eq!(output.data(), &[-1.0]);
    }

    #[test]
    fn test_global_average_pool() {
        let pool = GlobalAvgPoolLayer::new();
        let input = map(
            Shape::new(1, 2, 2, 2),
            vec![1.0, 2.0, 3.0, 4.0, -1.0, -1.0, 1.0, 1.0],
        );
        let output = pool.forward(&input).unwrap();
        assert_eq!(output.shape(), Shape::new(1, 2, 1, 1));
        assert_eq!(output.data(), &[2.5, 0.0]);
    }

    #[test]
    fn test_dense_accepts_pooled_features() {
        let mut rng = SimpleRng::new(1);
        let mut fc = DenseLayer::new(2, 1, &mut rng);
        fc.weights_mut().copy_from_slice(&[2.0, -1.0]);
        fc.biases_mut().copy_from_slice(&[0.5]);

        let input = map(Shape::new(2, 2, 1, 1), vec![1.0, 1.0, 3.0, 2.0]);
        let output = fc.forward(&input).unwrap();
        assert_eq!(output.shape(), Shape::matrix(2, 1));
        assert_relative_eq!(output.data()[0], 1.5);
        assert_relative_eq!(output.data()[1], 4.5);
    }

    #[test]
    fn test_sequential_chains_layers() {
        let mut rng = SimpleRng::new(1);
        let net = Sequential::new()
            .add(Conv2DLayer::pointwise(3, 4, &mut rng).unwrap())
            .add(ReluLayer::new())
            .add(GlobalAvgPoolLayer::new())
            .add(DenseLayer::new(4, 2, &mut rng));

        let input = FeatureMap::zeros(Shape::new(3, 3, 5, 5));
        assert_eq!(net.forward(&input).unwrap().shape(), Shape::matrix(3, 2));
        assert_eq!(net.parameter_count(), 12 + 8 + 2);
    }
}
