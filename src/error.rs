//! Error type shared by every layer, the model and the config loader.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("illegal stride value {0}: expected 1..=3")]
    IllegalStride(usize),

    #[error("stride-1 block needs inp == 2 * (oup / 2), got inp={inp} oup={oup}")]
    ChannelMismatch { inp: usize, oup: usize },

    #[error("expected stages_repeats as list of 3 positive ints, got {0:?}")]
    StagesRepeats(Vec<usize>),

    #[error("expected stages_out_channels as list of 5 positive ints, got {0:?}")]
    StagesOutChannels(Vec<usize>),

    #[error("shape error: {message}")]
    Shape { message: String },

    #[error("invalid layer configuration: {message}")]
    Layer { message: String },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("unknown ShuffleNetV2 variant '{0}'")]
    UnknownVariant(String),

    #[error("missing parameter '{0}'")]
    MissingParameter(String),

    #[error("parameter '{name}' expects shape {expected:?}, got {actual:?}")]
    ParameterShape {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("unexpected parameters in state dict: {0:?}")]
    UnexpectedParameters(Vec<String>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn shape(message: impl Into<String>) -> Self {
        Error::Shape {
            message: message.into(),
        }
    }

    pub(crate) fn layer(message: impl Into<String>) -> Self {
        Error::Layer {
            message: message.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
