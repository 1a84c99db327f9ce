use crate::common::config::Config;
use crate::common::error::UerError;
use crate::convert::adapter::FallbackPolicy;
use crate::convert::correspondence::{ForeignLayout, OutputHead};
use crate::convert::remapper::{Direction, RemapConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Position rows kept from TensorFlow checkpoints unless configured otherwise
pub const TENSORFLOW_MAX_POSITION_EMBEDDINGS: i64 = 512;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// # Checkpoint conversion configuration
/// Can be read from a JSON file (see `Config`); missing fields take their default value.
pub struct ConversionConfig {
    /// Number of transformer blocks
    pub layers_num: usize,
    /// Foreign layout converted from or to
    pub layout: ForeignLayout,
    /// Output head following the encoder
    pub head: OutputHead,
    /// Conversion direction
    pub direction: Direction,
    /// Position embedding rows kept when converting to the native layout
    pub max_position_embeddings: Option<i64>,
    /// Vocabulary the source checkpoint was trained with
    pub old_vocab_path: Option<PathBuf>,
    /// Vocabulary the converted checkpoint should use
    pub new_vocab_path: Option<PathBuf>,
    /// Initialization of embedding rows for tokens unknown to the old vocabulary
    pub fallback: FallbackPolicy,
}

impl Default for ConversionConfig {
    fn default() -> ConversionConfig {
        ConversionConfig {
            layers_num: 12,
            layout: ForeignLayout::HuggingFace,
            head: OutputHead::NextSentence,
            direction: Direction::ForeignToNative,
            max_position_embeddings: None,
            old_vocab_path: None,
            new_vocab_path: None,
            fallback: FallbackPolicy::default(),
        }
    }
}

impl Config for ConversionConfig {}

impl ConversionConfig {
    /// Checks the consistency of the configuration.
    pub fn validate(&self) -> Result<(), UerError> {
        if self.layers_num == 0 {
            return Err(UerError::InvalidConfiguration(
                "layers_num must be at least 1".to_string(),
            ));
        }
        if let Some(max_rows) = self.max_position_embeddings {
            if max_rows <= 0 {
                return Err(UerError::InvalidConfiguration(format!(
                    "max_position_embeddings must be positive, got {}",
                    max_rows
                )));
            }
        }
        match (&self.old_vocab_path, &self.new_vocab_path) {
            (None, None) => Ok(()),
            (Some(_), Some(_)) if self.direction == Direction::ForeignToNative => Ok(()),
            (Some(_), Some(_)) => Err(UerError::InvalidConfiguration(
                "vocabulary adaptation is only supported when converting to the native layout"
                    .to_string(),
            )),
            _ => Err(UerError::InvalidConfiguration(
                "old_vocab_path and new_vocab_path must be provided together".to_string(),
            )),
        }
    }

    pub fn remap_config(&self) -> RemapConfig {
        RemapConfig {
            layout: self.layout,
            head: self.head,
            layers_num: self.layers_num,
            max_position_embeddings: self.max_position_embeddings,
        }
    }

    /// Limits TensorFlow position tables to `TENSORFLOW_MAX_POSITION_EMBEDDINGS` rows when no limit
    /// is set. An explicit limit, or a HuggingFace layout, is left unchanged.
    pub fn with_default_position_limit(mut self) -> ConversionConfig {
        if self.layout == ForeignLayout::TensorFlow && self.max_position_embeddings.is_none() {
            self.max_position_embeddings = Some(TENSORFLOW_MAX_POSITION_EMBEDDINGS);
        }
        self
    }

    /// Vocabulary paths, when adaptation is configured
    pub fn vocab_paths(&self) -> Option<(&PathBuf, &PathBuf)> {
        self.old_vocab_path.as_ref().zip(self.new_vocab_path.as_ref())
    }
}
