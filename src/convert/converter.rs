use crate::common::error::UerError;
use crate::convert::adapter::VocabularyAdapter;
use crate::convert::config::ConversionConfig;
use crate::convert::remapper::CheckpointRemapper;
use crate::convert::store::ParameterStore;
use crate::convert::vocab::Vocabulary;
use std::path::Path;

/// # Checkpoint converter
/// Chains the remapper and, when vocabularies are configured and differ in size, the vocabulary
/// adapter. The adapter always operates on the remapped (native) store.
pub struct CheckpointConverter {
    config: ConversionConfig,
    remapper: CheckpointRemapper,
    vocabularies: Option<(Vocabulary, Vocabulary)>,
}

impl CheckpointConverter {
    /// Build a new `CheckpointConverter`, loading the vocabularies referenced by the configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - `ConversionConfig` describing the conversion
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rust_uer::convert::{CheckpointConverter, ConversionConfig, ForeignLayout};
    ///
    /// # fn main() -> Result<(), rust_uer::UerError> {
    /// let converter = CheckpointConverter::new(ConversionConfig {
    ///     layout: ForeignLayout::TensorFlow,
    ///     max_position_embeddings: Some(512),
    ///     old_vocab_path: Some("path/to/ernie_vocab.txt".into()),
    ///     new_vocab_path: Some("path/to/google_zh_vocab.txt".into()),
    ///     ..Default::default()
    /// })?;
    /// converter.convert("path/to/bert_model.npz", "path/to/uer_model.ot")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: ConversionConfig) -> Result<CheckpointConverter, UerError> {
        config.validate()?;
        let vocabularies = match config.vocab_paths() {
            Some((old_path, new_path)) => Some((
                Vocabulary::from_file(old_path)?,
                Vocabulary::from_file(new_path)?,
            )),
            None => None,
        };
        Ok(CheckpointConverter::new_with_vocabularies(config, vocabularies))
    }

    /// Build a new `CheckpointConverter` with vocabularies already in memory.
    /// Vocabulary paths of the configuration are ignored.
    pub fn new_with_vocabularies(
        config: ConversionConfig,
        vocabularies: Option<(Vocabulary, Vocabulary)>,
    ) -> CheckpointConverter {
        let remapper = CheckpointRemapper::new(config.remap_config());
        CheckpointConverter {
            config,
            remapper,
            vocabularies,
        }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Converts an in-memory store.
    pub fn convert_store(&self, store: &ParameterStore) -> Result<ParameterStore, UerError> {
        let remapped = self.remapper.remap(store, self.config.direction)?;
        match &self.vocabularies {
            Some((old_vocab, new_vocab))
                if VocabularyAdapter::is_required(old_vocab, new_vocab) =>
            {
                VocabularyAdapter::new(self.config.fallback.clone()).adapt(
                    &remapped,
                    old_vocab,
                    new_vocab,
                )
            }
            Some((old_vocab, _)) => {
                tracing::info!(
                    vocab_size = old_vocab.len(),
                    "vocabularies have the same size, no adaptation"
                );
                Ok(remapped)
            }
            None => Ok(remapped),
        }
    }

    /// Loads, converts and saves a checkpoint. Formats are inferred from the file extensions.
    pub fn convert<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_model_path: P,
        output_model_path: Q,
    ) -> Result<(), UerError> {
        let store = ParameterStore::load(input_model_path)?;
        let converted = self.convert_store(&store)?;
        converted.save(output_model_path)
    }
}
