//! Published ShuffleNetV2 configurations
//!
//! The four width multipliers from the ShuffleNetV2 paper share the stage
//! repeats `[4, 8, 4]` and differ in stage widths. Pretrained weights are read
//! from a local hub directory: `$SHUFFLENET_HUB` if set, `./weights` otherwise.

use crate::error::{Error, Result};
use crate::model::{ShuffleNetV2, ShuffleNetV2Options};
use crate::utils::SimpleRng;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

/// Environment variable naming the pretrained weight directory.
pub const HUB_ENV: &str = "SHUFFLENET_HUB";

const DEFAULT_HUB_DIR: &str = "weights";
const STAGES_REPEATS: [usize; 3] = [4, 8, 4];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    #[serde(rename = "x0_5")]
    X0_5,
    #[serde(rename = "x1_0")]
    X1_0,
    #[serde(rename = "x1_5")]
    X1_5,
    #[serde(rename = "x2_0")]
    X2_0,
}

impl Variant {
    pub const ALL: [Variant; 4] = [Variant::X0_5, Variant::X1_0, Variant::X1_5, Variant::X2_0];

    pub fn stages_repeats(&self) -> [usize; 3] {
        STAGES_REPEATS
    }

    pub fn stages_out_channels(&self) -> [usize; 5] {
        match self {
            Variant::X0_5 => [24, 48, 96, 192, 1024],
            Variant::X1_0 => [24, 116, 232, 464, 1024],
            Variant::X1_5 => [24, 176, 352, 704, 1024],
            Variant::X2_0 => [24, 244, 488, 976, 2048],
        }
    }

    /// Architecture name, e.g. `shufflenetv2_x1.0`.
    pub fn arch_name(&self) -> &'static str {
        match self {
            Variant::X0_5 => "shufflenetv2_x0.5",
            Variant::X1_0 => "shufflenetv2_x1.0",
            Variant::X1_5 => "shufflenetv2_x1.5",
            Variant::X2_0 => "shufflenetv2_x2.0",
        }
    }

    /// Short tag used in configs and on the command line, e.g. `x1_0`.
    pub fn tag(&self) -> &'static str {
        match self {
            Variant::X0_5 => "x0_5",
            Variant::X1_0 => "x1_0",
            Variant::X1_5 => "x1_5",
            Variant::X2_0 => "x2_0",
        }
    }

    /// File name of the pretrained weights inside the hub directory.
    pub fn weights_file(&self) -> String {
        format!("shufflenet_v2_{}.json", self.tag())
    }

    /// Build a freshly initialised network of this variant.
    pub fn build(&self, options: ShuffleNetV2Options, rng: &mut SimpleRng) -> Result<ShuffleNetV2> {
        ShuffleNetV2::new(
            &self.stages_repeats(),
            &self.stages_out_channels(),
            options,
            rng,
        )
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.arch_name())
    }
}

impl FromStr for Variant {
    type Err = Error;

    /// Accepts `x1_0`, `1.0`, `shufflenet_v2_x1_0` and `shufflenetv2_x1.0` spellings.
    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_lowercase();
        let width = lowered
            .trim_start_matches("shufflenet_v2_")
            .trim_start_matches("shufflenetv2_")
            .trim_start_matches('x')
            .replace('_', ".");

        match width.as_str() {
            "0.5" => Ok(Variant::X0_5),
            "1.0" | "1" => Ok(Variant::X1_0),
            "1.5" => Ok(Variant::X1_5),
            "2.0" | "2" => Ok(Variant::X2_0),
            _ => Err(Error::UnknownVariant(s.to_string())),
        }
    }
}

/// Directory searched for pretrained weights.
pub fn hub_dir() -> PathBuf {
    env::var_os(HUB_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_HUB_DIR))
}

/// Path of the pretrained weights for `variant` inside the hub directory.
pub fn pretrained_path(variant: Variant) -> PathBuf {
    hub_dir().join(variant.weights_file())
}

fn shufflenetv2(variant: Variant, pretrained: bool) -> Result<ShuffleNetV2> {
    let mut rng = SimpleRng::from_time();
    let mut model = variant.build(ShuffleNetV2Options::default(), &mut rng)?;
    if pretrained {
        let path = pretrained_path(variant);
        info!(arch = variant.arch_name(), path = %path.display(), "loading pretrained weights");
        model.load_weights(&path)?;
    }
    Ok(model)
}

/// ShuffleNetV2 with 0.5x output channels.
pub fn shufflenet_v2_x0_5(pretrained: bool) -> Result<ShuffleNetV2> {
    shufflenetv2(Variant::X0_5, pretrained)
}

/// ShuffleNetV2 with 1.0x output channels.
pub fn shufflenet_v2_x1_0(pretrained: bool) -> Result<ShuffleNetV2> {
    shufflenetv2(Variant::X1_0, pretrained)
}

/// ShuffleNetV2 with 1.5x output channels.
pub fn shufflenet_v2_x1_5(pretrained: bool) -> Result<ShuffleNetV2> {
    shufflenetv2(Variant::X1_5, pretrained)
}

/// ShuffleNetV2 with 2.0x output channels.
pub fn shufflenet_v2_x2_0(pretrained: bool) -> Result<ShuffleNetV2> {
    shufflenetv2(Variant::X2_0, pretrained)
}
