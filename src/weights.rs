//! Named parameter storage
//!
//! A [`StateDict`] maps dotted parameter names (`stage2.0.branch2.3.weight`) to
//! flat tensors. It is serialized as JSON so weights exported from other
//! frameworks can be dropped into a hub directory and loaded by name.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// One stored parameter tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamTensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl ParamTensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
        Self { shape, data }
    }
}

/// Ordered collection of named parameters and buffers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDict {
    pub tensors: BTreeMap<String, ParamTensor>,
}

impl StateDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn insert(&mut self, name: String, shape: Vec<usize>, data: &[f32]) {
        self.tensors
            .insert(name, ParamTensor::new(shape, data.to_vec()));
    }

    pub fn get(&self, name: &str) -> Option<&ParamTensor> {
        self.tensors.get(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.tensors.keys()
    }

    /// Copy the tensor called `name` into `dest`, checking its shape.
    pub fn copy_into(&self, name: &str, expected_shape: &[usize], dest: &mut [f32]) -> Result<()> {
        let tensor = self
            .get(name)
            .ok_or_else(|| Error::MissingParameter(name.to_string()))?;

        let expected_len: usize = expected_shape.iter().product();
        if tensor.shape != expected_shape || tensor.data.len() != expected_len {
            return Err(Error::ParameterShape {
                name: name.to_string(),
                expected: expected_shape.to_vec(),
                actual: tensor.shape.clone(),
            });
        }

        dest.copy_from_slice(&tensor.data);
        Ok(())
    }

    /// Loads a state dict from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let state: StateDict = serde_json::from_reader(BufReader::new(file))?;
        Ok(state)
    }

    /// Writes the state dict as JSON, creating parent directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }
}

/// Join a module prefix and a child name with a dot.
pub(crate) fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}
