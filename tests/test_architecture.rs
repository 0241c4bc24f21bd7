//! Tests for ShuffleNetV2 construction and topology
//!
//! This file covers:
//! - Parameter counts of the published variants
//! - Stage tables and configuration errors
//! - Output shapes for several input resolutions

use rust_shufflenet::layers::Layer;
use rust_shufflenet::model::{InvertedResidual, ShuffleNetV2, ShuffleNetV2Options, Variant};
use rust_shufflenet::utils::SimpleRng;
use rust_shufflenet::{Error, FeatureMap, Shape};

fn build(variant: Variant, num_classes: usize) -> ShuffleNetV2 {
    let mut rng = SimpleRng::new(42);
    variant
        .build(
            ShuffleNetV2Options {
                num_classes,
                ..Default::default()
            },
            &mut rng,
        )
        .expect("variant should build")
}

// ============================================================================
// Parameter Count Tests
// ============================================================================

mod parameter_count_tests {
    use super::*;

    #[test]
    fn test_x0_5_parameter_count() {
        assert_eq!(build(Variant::X0_5, 1000).parameter_count(), 1_366_792);
    }

    #[test]
    fn test_x1_0_parameter_count() {
        assert_eq!(build(Variant::X1_0, 1000).parameter_count(), 2_278_604);
    }

    #[test]
    fn test_x1_5_parameter_count() {
        assert_eq!(build(Variant::X1_5, 1000).parameter_count(), 3_503_624);
    }

    #[test]
    fn test_x2_0_parameter_count() {
        assert_eq!(build(Variant::X2_0, 1000).parameter_count(), 7_393_996);
    }

    #[test]
    fn test_classifier_size_changes_only_fc() {
        let full = build(Variant::X1_0, 1000).parameter_count();
        let small = build(Variant::X1_0, 10).parameter_count();

        // fc: 1024 x classes weights + classes biases
        assert_eq!(full - small, 1024 * 990 + 990);
    }
}

// ============================================================================
// Configuration Error Tests
// ============================================================================

mod configuration_error_tests {
    use super::*;

    #[test]
    fn test_two_stage_repeats_rejected() {
        let mut rng = SimpleRng::new(1);
        let result = ShuffleNetV2::new(
            &[4, 8],
            &[24, 116, 232, 464, 1024],
            ShuffleNetV2Options::default(),
            &mut rng,
        );
        match result {
            Err(Error::StagesRepeats(got)) => assert_eq!(got, vec![4, 8]),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[test]
    fn test_six_stage_widths_rejected() {
        let mut rng = SimpleRng::new(1);
        let result = ShuffleNetV2::new(
            &[4, 8, 4],
            &[24, 116, 232, 464, 1024, 2048],
            ShuffleNetV2Options::default(),
            &mut rng,
        );
        assert!(matches!(result, Err(Error::StagesOutChannels(_))));
    }

    #[test]
    fn test_error_messages_name_the_list() {
        let mut rng = SimpleRng::new(1);
        let err = ShuffleNetV2::new(
            &[4],
            &[24, 116, 232, 464, 1024],
            ShuffleNetV2Options::default(),
            &mut rng,
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("stages_repeats"));
    }

    #[test]
    fn test_block_stride_range() {
        let mut rng = SimpleRng::new(1);
        let norm = Default::default();
        for stride in [0, 4, 7] {
            let result = InvertedResidual::new(24, 48, stride, &norm, &mut rng);
            assert!(matches!(result, Err(Error::IllegalStride(s)) if s == stride));
        }
        for stride in 1..=3 {
            let inp = if stride == 1 { 48 } else { 24 };
            assert!(InvertedResidual::new(inp, 48, stride, &norm, &mut rng).is_ok());
        }
    }
}

// ============================================================================
// Output Shape Tests
// ============================================================================

mod output_shape_tests {
    use super::*;

    #[test]
    fn test_summary_for_imagenet_resolution() {
        let model = build(Variant::X1_0, 1000);
        let rows = model.summary(Shape::new(1, 3, 224, 224)).unwrap();

        let names: Vec<&str> = rows.iter().map(|row| row.name).collect();
        assert_eq!(
            names,
            vec!["conv1", "maxpool", "stage2", "stage3", "stage4", "conv5", "avgpool", "fc"]
        );

        let shapes: Vec<Shape> = rows.iter().map(|row| row.output_shape).collect();
        assert_eq!(shapes[0], Shape::new(1, 24, 112, 112));
        assert_eq!(shapes[1], Shape::new(1, 24, 56, 56));
        assert_eq!(shapes[2], Shape::new(1, 116, 28, 28));
        assert_eq!(shapes[3], Shape::new(1, 232, 14, 14));
        assert_eq!(shapes[4], Shape::new(1, 464, 7, 7));
        assert_eq!(shapes[5], Shape::new(1, 1024, 7, 7));
        assert_eq!(shapes[6], Shape::new(1, 1024, 1, 1));
        assert_eq!(shapes[7], Shape::matrix(1, 1000));
    }

    #[test]
    fn test_forward_imagenet_resolution() {
        let mut model = build(Variant::X0_5, 1000);
        model.eval();
        let input = FeatureMap::zeros(Shape::new(1, 3, 224, 224));

        let logits = model.forward(&input).unwrap();
        assert_eq!(logits.shape(), Shape::matrix(1, 1000));
        assert!(logits.data().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_forward_small_and_odd_resolutions() {
        let mut model = build(Variant::X0_5, 10);
        model.eval();

        for side in [32, 33, 47, 64] {
            let input = FeatureMap::zeros(Shape::new(2, 3, side, side));
            let logits = model.forward(&input).unwrap();
            assert_eq!(logits.shape(), Shape::matrix(2, 10), "side {}", side);
            assert_eq!(
                model.output_shape(input.shape()).unwrap(),
                logits.shape()
            );
        }
    }

    #[test]
    fn test_non_square_input() {
        let mut model = build(Variant::X0_5, 10);
        model.eval();
        let input = FeatureMap::zeros(Shape::new(1, 3, 64, 96));

        let rows = model.summary(input.shape()).unwrap();
        assert_eq!(rows[4].output_shape, Shape::new(1, 192, 2, 3));
        assert_eq!(model.forward(&input).unwrap().shape(), Shape::matrix(1, 10));
    }

    #[test]
    fn test_wrong_channel_count_rejected() {
        let model = build(Variant::X0_5, 10);
        let input = FeatureMap::zeros(Shape::new(1, 4, 32, 32));
        assert!(model.forward(&input).is_err());
        assert!(model.output_shape(input.shape()).is_err());
    }
}
