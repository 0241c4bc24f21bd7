//! ShuffleNetV2 for CPU inference
//!
//! This library assembles the ShuffleNetV2 image classifier from a small set of
//! layer primitives operating on flat `f32` NCHW buffers.
//!
//! # Modules
//!
//! - `layers`: Layer trait and implementations (Conv2D, BatchNorm2d, Dense, pooling, ...)
//! - `model`: channel shuffle, inverted-residual block, ShuffleNetV2 and its variants
//! - `weights`: named parameter storage (JSON state dicts)
//! - `config`: model configuration files
//! - `utils`: RNG and activation helpers
//!
//! # Example
//!
//! ```no_run
//! use rust_shufflenet::layers::Layer;
//! use rust_shufflenet::model::{ShuffleNetV2Options, Variant};
//! use rust_shufflenet::utils::SimpleRng;
//! use rust_shufflenet::{FeatureMap, Shape};
//!
//! let mut rng = SimpleRng::new(42);
//! let mut model = Variant::X1_0.build(ShuffleNetV2Options::default(), &mut rng).unwrap();
//! model.eval();
//! let logits = model.forward(&FeatureMap::zeros(Shape::new(1, 3, 224, 224))).unwrap();
//! assert_eq!(logits.shape(), Shape::matrix(1, 1000));
//! ```

pub mod config;
pub mod error;
pub mod layers;
pub mod model;
pub mod tensor;
pub mod utils;
pub mod weights;

pub use error::{Error, Result};
pub use tensor::{FeatureMap, Shape};
