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
use crate::convert::correspondence::{
    ForeignLayout, LayerCorrespondence, OutputHead, TensorMapping, TensorTransform,
};
use crate::convert::store::ParameterStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tch::Tensor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
/// # Conversion direction
pub enum Direction {
    /// Foreign (HuggingFace / TensorFlow) names to native names
    #[serde(rename = "to-native")]
    #[value(name = "to-native")]
    ForeignToNative,
    /// Native names to foreign (HuggingFace / TensorFlow) names
    #[serde(rename = "to-foreign")]
    #[value(name = "to-foreign")]
    NativeToForeign,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// # Configuration for a checkpoint remapper
pub struct RemapConfig {
    /// Foreign layout converted from or to
    pub layout: ForeignLayout,
    /// Task-specific head following the encoder
    pub head: OutputHead,
    /// Number of transformer blocks
    pub layers_num: usize,
    /// Position embedding rows kept when converting to the native layout
    pub max_position_embeddings: Option<i64>,
}

impl Default for RemapConfig {
    fn default() -> RemapConfig {
        RemapConfig {
            layout: ForeignLayout::HuggingFace,
            head: OutputHead::NextSentence,
            layers_num: 12,
            max_position_embeddings: None,
        }
    }
}

/// # Checkpoint remapper
/// Renames, transposes and reshapes the tensors of a parameter store following a
/// `LayerCorrespondence`. The input store is left untouched and a new store is returned.
pub struct CheckpointRemapper {
    config: RemapConfig,
    correspondence: LayerCorrespondence,
}

impl CheckpointRemapper {
    /// Build a new `CheckpointRemapper`
    ///
    /// # Arguments
    ///
    /// * `config` - `RemapConfig` describing the foreign layout, the output head and the number of
    ///   layers
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rust_uer::convert::{
    ///     CheckpointRemapper, Direction, ForeignLayout, ParameterStore, RemapConfig,
    /// };
    ///
    /// # fn main() -> Result<(), rust_uer::UerError> {
    /// let remapper = CheckpointRemapper::new(RemapConfig {
    ///     layout: ForeignLayout::TensorFlow,
    ///     max_position_embeddings: Some(512),
    ///     ..Default::default()
    /// });
    /// let tf_store = ParameterStore::load("path/to/bert_model.npz")?;
    /// let native_store = remapper.remap(&tf_store, Direction::ForeignToNative)?;
    /// native_store.save("path/to/uer_model.ot")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: RemapConfig) -> CheckpointRemapper {
        let correspondence =
            LayerCorrespondence::new(config.layout, config.head, config.layers_num);
        CheckpointRemapper {
            config,
            correspondence,
        }
    }

    pub fn config(&self) -> &RemapConfig {
        &self.config
    }

    pub fn correspondence(&self) -> &LayerCorrespondence {
        &self.correspondence
    }

    /// Converts a store to the other layout.
    ///
    /// # Arguments
    ///
    /// * `store` - source parameter store, in the foreign layout for `ForeignToNative` and in the
    ///   native layout for `NativeToForeign`
    /// * `direction` - conversion direction
    ///
    /// # Returns
    ///
    /// * `ParameterStore` in the target layout, ordered as the correspondence table
    pub fn remap(
        &self,
        store: &ParameterStore,
        direction: Direction,
    ) -> Result<ParameterStore, UerError> {
        let mut output = ParameterStore::new();
        let mut consumed: HashSet<&str> = HashSet::new();

        for mapping in self.correspondence.mappings() {
            let (source_key, target_key) = match direction {
                Direction::ForeignToNative => (mapping.foreign.as_str(), mapping.native.as_str()),
                Direction::NativeToForeign => (mapping.native.as_str(), mapping.foreign.as_str()),
            };
            let source = match store.get(source_key) {
                Some(tensor) => tensor,
                None if !mapping.required => {
                    tracing::debug!(key = source_key, "optional parameter absent, skipped");
                    continue;
                }
                None => {
                    return Err(UerError::MissingKey(format!(
                        "`{}` (expected for `{}` with layers_num = {})",
                        source_key, target_key, self.config.layers_num
                    )));
                }
            };
            let tensor = self.apply(mapping, source, source_key, direction)?;
            tracing::debug!(
                from = source_key,
                to = target_key,
                shape = ?tensor.size(),
                "mapped parameter"
            );
            consumed.insert(source_key);
            output.insert(target_key, tensor);
        }

        let ignored: Vec<&str> = store.keys().filter(|key| !consumed.contains(key)).collect();
        if !ignored.is_empty() {
            tracing::warn!(
                count = ignored.len(),
                keys = ?ignored,
                "source parameters without correspondence were not converted"
            );
        }
        tracing::info!(
            ?direction,
            layout = ?self.config.layout,
            head = ?self.config.head,
            layers_num = self.config.layers_num,
            tensors = output.len(),
            "remapped parameter store"
        );
        Ok(output)
    }

    fn apply(
        &self,
        mapping: &TensorMapping,
        source: &Tensor,
        source_key: &str,
        direction: Direction,
    ) -> Result<Tensor, UerError> {
        match (mapping.transform, direction) {
            (TensorTransform::Copy, _) => Ok(source.shallow_clone()),
            (TensorTransform::Transpose, _) => transpose_matrix(source, source_key),
            (TensorTransform::ReservedRow, Direction::ForeignToNative) => {
                prepend_reserved_row(source, source_key)
            }
            (TensorTransform::ReservedRow, Direction::NativeToForeign) => {
                drop_reserved_row(source, source_key)
            }
            (TensorTransform::PositionTable, Direction::ForeignToNative) => {
                match self.config.max_position_embeddings {
                    Some(max_rows) => truncate_rows(source, source_key, max_rows),
                    None => Ok(source.shallow_clone()),
                }
            }
            (TensorTransform::PositionTable, Direction::NativeToForeign) => {
                Ok(source.shallow_clone())
            }
        }
    }
}

/// Converts a store between the HuggingFace and the native layout, with the next sentence head.
///
/// # Arguments
///
/// * `store` - source parameter store
/// * `layers_num` - number of transformer blocks
/// * `direction` - conversion direction
pub fn remap(
    store: &ParameterStore,
    layers_num: usize,
    direction: Direction,
) -> Result<ParameterStore, UerError> {
    CheckpointRemapper::new(RemapConfig {
        layers_num,
        ..Default::default()
    })
    .remap(store, direction)
}

pub(crate) fn transpose_matrix(tensor: &Tensor, key: &str) -> Result<Tensor, UerError> {
    if tensor.dim() != 2 {
        return Err(UerError::ShapeMismatch(format!(
            "cannot transpose `{}` of shape {:?}, a 2-D tensor is expected",
            key,
            tensor.size()
        )));
    }
    Ok(tensor.transpose(0, 1).contiguous())
}

/// Adds the reserved zero row at index 0 of a segment embedding table.
pub(crate) fn prepend_reserved_row(tensor: &Tensor, key: &str) -> Result<Tensor, UerError> {
    let mut row_shape = tensor.size();
    if row_shape.is_empty() {
        return Err(UerError::ShapeMismatch(format!(
            "`{}` is a scalar, a segment embedding table is expected",
            key
        )));
    }
    row_shape[0] = 1;
    let reserved_row = Tensor::zeros(row_shape.as_slice(), (tensor.kind(), tensor.device()));
    Ok(Tensor::cat(&[&reserved_row, tensor], 0))
}

/// Removes the reserved row at index 0 of a native segment embedding table.
pub(crate) fn drop_reserved_row(tensor: &Tensor, key: &str) -> Result<Tensor, UerError> {
    let size = tensor.size();
    match size.first() {
        Some(&rows) if rows >= 1 => Ok(tensor.narrow(0, 1, rows - 1).copy()),
        _ => Err(UerError::ShapeMismatch(format!(
            "`{}` of shape {:?} has no reserved segment row to drop",
            key, size
        ))),
    }
}

pub(crate) fn truncate_rows(tensor: &Tensor, key: &str, max_rows: i64) -> Result<Tensor, UerError> {
    let size = tensor.size();
    match size.first() {
        Some(&rows) if rows > max_rows => {
            tracing::info!(key, rows, max_rows, "truncating position embeddings");
            Ok(tensor.narrow(0, 0, max_rows).copy())
        }
        Some(_) => Ok(tensor.shallow_clone()),
        None => Err(UerError::ShapeMismatch(format!(
            "`{}` is a scalar, a position embedding table is expected",
            key
        ))),
    }
}
