//! Layer abstractions for neural networks
//!
//! This module provides the Layer trait and the primitives ShuffleNetV2 is
//! assembled from: convolution, batch normalization, ReLU, pooling, dense
//! projection and a sequential container.

mod r#trait;
pub mod batchnorm;
pub mod conv2d;
pub mod dense;
pub mod pool;
pub mod relu;
pub mod sequential;

// Re-export the Layer trait for convenience
pub use batchnorm::{BatchNorm2dLayer, NormConfig};
pub use conv2d::Conv2DLayer;
pub use dense::DenseLayer;
pub use pool::{GlobalAvgPoolLayer, MaxPool2dLayer};
pub use r#trait::Layer;
pub use relu::ReluLayer;
pub use sequential::Sequential;
