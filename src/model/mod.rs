//! ShuffleNetV2 architecture
//!
//! - `shuffle`: the channel shuffle operation
//! - `inverted_residual`: the two-branch building block
//! - `shufflenet`: the full network
//! - `zoo`: the published width variants and pretrained weight lookup

pub mod inverted_residual;
pub mod shuffle;
pub mod shufflenet;
pub mod zoo;

pub use inverted_residual::InvertedResidual;
pub use shuffle::channel_shuffle;
pub use shufflenet::{ModuleSummary, ShuffleNetV2, ShuffleNetV2Options, INPUT_CHANNELS};
pub use zoo::{
    shufflenet_v2_x0_5, shufflenet_v2_x1_0, shufflenet_v2_x1_5, shufflenet_v2_x2_0, Variant,
};
