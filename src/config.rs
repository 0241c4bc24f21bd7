//! Model configuration files
//!
//! A [`ModelConfig`] picks a ShuffleNetV2 variant (or explicit stage tables),
//! the classifier size, BatchNorm hyper-parameters, an initialization seed and
//! an optional weight file.

use crate::error::{Error, Result};
use crate::layers::NormConfig;
use crate::model::{ShuffleNetV2, ShuffleNetV2Options, Variant};
use crate::utils::SimpleRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Smallest input side that survives the five stride-2 reductions.
pub const MIN_INPUT_SIZE: usize = 32;

/// Configuration for building a ShuffleNetV2 model.
///
/// Either `variant` or both `stages_repeats` and `stages_out_channels` must be
/// given. Explicit stage tables take precedence over `variant`.
///
/// # Example
///
/// ```json
/// {
///   "variant": "x1_0",
///   "num_classes": 1000,
///   "input_size": 224,
///   "seed": 42,
///   "weights": "weights/shufflenet_v2_x1_0.json"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Published width variant: "x0_5", "x1_0", "x1_5" or "x2_0"
    pub variant: Option<Variant>,

    /// Blocks per stage (3 entries)
    pub stages_repeats: Option<Vec<usize>>,

    /// Stem, stage and final widths (5 entries)
    pub stages_out_channels: Option<Vec<usize>>,

    /// Number of classifier outputs (default 1000)
    #[serde(default = "default_num_classes")]
    pub num_classes: usize,

    /// Square input side used for summaries and synthetic inference (default 224)
    #[serde(default = "default_input_size")]
    pub input_size: usize,

    /// Seed for weight initialization (default 42)
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// JSON state dict loaded after construction
    pub weights: Option<PathBuf>,

    /// BatchNorm epsilon (default 1e-5)
    #[serde(default = "default_epsilon")]
    pub batchnorm_epsilon: f32,

    /// BatchNorm running-statistics momentum (default 0.9)
    #[serde(default = "default_momentum")]
    pub batchnorm_momentum: f32,
}

fn default_num_classes() -> usize {
    1000
}

fn default_input_size() -> usize {
    224
}

fn default_seed() -> u64 {
    42
}

fn default_epsilon() -> f32 {
    NormConfig::default().epsilon
}

fn default_momentum() -> f32 {
    NormConfig::default().momentum
}

impl ModelConfig {
    /// Configuration for a published variant with default settings.
    pub fn for_variant(variant: Variant) -> Self {
        Self {
            variant: Some(variant),
            stages_repeats: None,
            stages_out_channels: None,
            num_classes: default_num_classes(),
            input_size: default_input_size(),
            seed: default_seed(),
            weights: None,
            batchnorm_epsilon: default_epsilon(),
            batchnorm_momentum: default_momentum(),
        }
    }

    /// Stage tables described by this configuration.
    pub fn stages(&self) -> Result<(Vec<usize>, Vec<usize>)> {
        match (&self.stages_repeats, &self.stages_out_channels, self.variant) {
            (Some(repeats), Some(channels), _) => Ok((repeats.clone(), channels.clone())),
            (None, None, Some(variant)) => Ok((
                variant.stages_repeats().to_vec(),
                variant.stages_out_channels().to_vec(),
            )),
            (Some(_), None, _) | (None, Some(_), _) => Err(Error::config(
                "stages_repeats and stages_out_channels must be given together",
            )),
            (None, None, None) => Err(Error::config(
                "either 'variant' or explicit stage tables are required",
            )),
        }
    }

    pub fn options(&self) -> ShuffleNetV2Options {
        ShuffleNetV2Options {
            num_classes: self.num_classes,
            norm: NormConfig {
                epsilon: self.batchnorm_epsilon,
                momentum: self.batchnorm_momentum,
            },
        }
    }

    /// Build the model and load `weights` when configured.
    pub fn build(&self) -> Result<ShuffleNetV2> {
        let (repeats, channels) = self.stages()?;
        let mut rng = SimpleRng::new(self.seed);
        let mut model = ShuffleNetV2::new(&repeats, &channels, self.options(), &mut rng)?;
        if let Some(path) = &self.weights {
            model.load_weights(path)?;
        }
        Ok(model)
    }
}

/// Loads a model configuration from a JSON file.
///
/// Reads the file at `path`, deserializes it into a `ModelConfig` and validates it.
///
/// # Examples
///
/// ```no_run
/// use rust_shufflenet::config::load_config;
///
/// let cfg = load_config("config/shufflenet_v2_x1_0.json").unwrap();
/// assert_eq!(cfg.num_classes, 1000);
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<ModelConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let config: ModelConfig = serde_json::from_str(&contents)?;
    validate_config(&config)?;
    debug!(path = %path.display(), variant = ?config.variant, "loaded model config");
    Ok(config)
}

pub fn validate_config(config: &ModelConfig) -> Result<()> {
    config.stages()?;

    if config.num_classes == 0 {
        return Err(Error::config("num_classes must be greater than 0"));
    }

    if config.input_size < MIN_INPUT_SIZE {
        return Err(Error::config(format!(
            "input_size must be at least {}, got {}",
            MIN_INPUT_SIZE, config.input_size
        )));
    }

    if config.batchnorm_epsilon <= 0.0 {
        return Err(Error::config("batchnorm_epsilon must be positive"));
    }

    if !(0.0..=1.0).contains(&config.batchnorm_momentum) {
        return Err(Error::config(
            "batchnorm_momentum must be in range [0.0, 1.0]",
        ));
    }

    Ok(())
}
