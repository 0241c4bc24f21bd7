//! Shared utilities
//!
//! Random number generation for weight initialization and synthetic inputs,
//! plus the activation helpers used by layers and prediction code, and
//! logging setup for the command-line tool.

pub mod activations;
pub mod logger;
pub mod rng;

pub use activations::{argmax, relu_inplace, softmax_rows};
pub use logger::init_cli_logger;
pub use rng::SimpleRng;
