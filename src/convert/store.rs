// Copyright 2019-present, Laurent Mazare.
// Copyright 2019-present Guillaume Becquin
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::common::error::UerError;
use std::collections::HashMap;
use std::path::Path;
use tch::Tensor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// # On-disk formats of a parameter store
pub enum CheckpointFormat {
    /// tch / libtorch named tensors (`.ot`), written with `Tensor::save_multi`
    Torch,
    /// Numpy archive (`.npz`), used for exported TensorFlow checkpoints
    Npz,
    /// `.safetensors`
    SafeTensors,
}

impl CheckpointFormat {
    /// Picks the format from the file extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<CheckpointFormat, UerError> {
        let path = path.as_ref();
        match path.extension().and_then(|extension| extension.to_str()) {
            Some("ot") => Ok(CheckpointFormat::Torch),
            Some("npz") => Ok(CheckpointFormat::Npz),
            Some("safetensors") => Ok(CheckpointFormat::SafeTensors),
            _ => Err(UerError::InvalidConfiguration(format!(
                "unsupported checkpoint extension for {} (expected .ot, .npz or .safetensors)",
                path.display()
            ))),
        }
    }
}

/// # Ordered dictionary of named parameter tensors
/// Keys are dotted (native / HuggingFace) or slash-separated (TensorFlow) parameter names.
/// Insertion order is preserved; inserting an existing key replaces its tensor in place.
#[derive(Debug, Default)]
pub struct ParameterStore {
    entries: Vec<(String, Tensor)>,
    positions: HashMap<String, usize>,
}

impl ParameterStore {
    pub fn new() -> ParameterStore {
        ParameterStore::default()
    }

    /// Builds a store from named tensors, keeping their order.
    pub fn from_named_tensors(named_tensors: Vec<(String, Tensor)>) -> ParameterStore {
        let mut store = ParameterStore::new();
        for (name, tensor) in named_tensors {
            store.insert(name, tensor);
        }
        store
    }

    /// Loads a store from disk, the format being inferred from the file extension.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rust_uer::convert::ParameterStore;
    ///
    /// # fn main() -> Result<(), rust_uer::UerError> {
    /// let store = ParameterStore::load("path/to/pytorch_model.ot")?;
    /// println!("{} tensors", store.len());
    /// # Ok(())
    /// # }
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ParameterStore, UerError> {
        let path = path.as_ref();
        let named_tensors = match CheckpointFormat::from_path(path)? {
            CheckpointFormat::Torch => Tensor::load_multi(path)?,
            CheckpointFormat::Npz => Tensor::read_npz(path)?,
            CheckpointFormat::SafeTensors => Tensor::read_safetensors(path)?,
        };
        tracing::info!(
            path = %path.display(),
            tensors = named_tensors.len(),
            "loaded parameter store"
        );
        Ok(ParameterStore::from_named_tensors(named_tensors))
    }

    /// Saves the store, the format being inferred from the file extension.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), UerError> {
        let path = path.as_ref();
        match CheckpointFormat::from_path(path)? {
            CheckpointFormat::Torch => Tensor::save_multi(&self.entries, path)?,
            CheckpointFormat::Npz => Tensor::write_npz(&self.entries, path)?,
            CheckpointFormat::SafeTensors => Tensor::write_safetensors(&self.entries, path)?,
        };
        tracing::info!(
            path = %path.display(),
            tensors = self.entries.len(),
            "saved parameter store"
        );
        Ok(())
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) {
        let name = name.into();
        match self.positions.get(&name) {
            Some(&position) => self.entries[position].1 = tensor,
            None => {
                self.positions.insert(name.clone(), self.entries.len());
                self.entries.push((name, tensor));
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.positions
            .get(name)
            .map(|&position| &self.entries[position].1)
    }

    /// Same as `get`, failing with `MissingKey` when the parameter is absent.
    pub fn require(&self, name: &str) -> Result<&Tensor, UerError> {
        self.get(name).ok_or_else(|| {
            UerError::MissingKey(format!("parameter `{}` not found in the store", name))
        })
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.entries
            .iter()
            .map(|(name, tensor)| (name.as_str(), tensor))
    }
}
