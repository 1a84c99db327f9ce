use crate::common::error::UerError;
use crate::convert::store::ParameterStore;
use crate::convert::vocab::Vocabulary;
use serde::{Deserialize, Serialize};
use tch::Tensor;

/// Token used by BERT-style vocabularies for unknown characters
pub const DEFAULT_UNKNOWN_TOKEN: &str = "[UNK]";

/// Native word embedding table, whose rows must follow the old vocabulary
pub const WORD_EMBEDDING_KEY: &str = "embedding.word_embedding.weight";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// # Initialization of rows for tokens missing from the old vocabulary
pub enum FallbackPolicy {
    /// Copy the row of the given token of the old vocabulary, or use zeros if it is absent as well
    UnknownToken(String),
    /// Use a zero row
    Zeros,
}

impl Default for FallbackPolicy {
    fn default() -> FallbackPolicy {
        FallbackPolicy::UnknownToken(DEFAULT_UNKNOWN_TOKEN.to_string())
    }
}

/// # Vocabulary adapter
/// Re-indexes the vocabulary-sized parameters of a store (word embeddings, tied output
/// projections and their biases) from an old vocabulary to a new one.
#[derive(Debug, Clone, Default)]
pub struct VocabularyAdapter {
    fallback: FallbackPolicy,
}

impl VocabularyAdapter {
    pub fn new(fallback: FallbackPolicy) -> VocabularyAdapter {
        VocabularyAdapter { fallback }
    }

    /// Adaptation is only needed when the two vocabularies have different sizes.
    pub fn is_required(old_vocab: &Vocabulary, new_vocab: &Vocabulary) -> bool {
        old_vocab.len() != new_vocab.len()
    }

    /// Source row of every new token: an old row index, or `old_vocab.len()` for the zero row.
    fn row_indices(&self, old_vocab: &Vocabulary, new_vocab: &Vocabulary) -> (Vec<i64>, usize) {
        let zero_row = old_vocab.len();
        let fallback_row = match &self.fallback {
            FallbackPolicy::UnknownToken(token) => old_vocab.id(token).unwrap_or(zero_row),
            FallbackPolicy::Zeros => zero_row,
        };
        let mut missing = 0;
        let indices = new_vocab
            .tokens()
            .iter()
            .map(|token| match old_vocab.id(token) {
                Some(id) => id as i64,
                None => {
                    missing += 1;
                    fallback_row as i64
                }
            })
            .collect();
        (indices, missing)
    }

    /// Builds a new store whose vocabulary-sized parameters follow `new_vocab`.
    ///
    /// Every parameter whose first dimension equals `old_vocab.len()` gets `new_vocab.len()` rows.
    /// Rows of tokens shared by both vocabularies are copied unchanged; other rows follow the
    /// fallback policy. Remaining parameters are passed through.
    ///
    /// The word embedding table must have exactly `old_vocab.len()` rows, otherwise the old
    /// vocabulary does not belong to the store and a `ShapeMismatch` is returned.
    ///
    /// # Arguments
    ///
    /// * `store` - parameter store in the native layout
    /// * `old_vocab` - vocabulary the store was trained with
    /// * `new_vocab` - target vocabulary
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rust_uer::convert::{ParameterStore, Vocabulary, VocabularyAdapter};
    ///
    /// # fn main() -> Result<(), rust_uer::UerError> {
    /// let store = ParameterStore::load("path/to/uer_model.ot")?;
    /// let old_vocab = Vocabulary::from_file("path/to/ernie_vocab.txt")?;
    /// let new_vocab = Vocabulary::from_file("path/to/google_zh_vocab.txt")?;
    /// let adapted = VocabularyAdapter::default().adapt(&store, &old_vocab, &new_vocab)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn adapt(
        &self,
        store: &ParameterStore,
        old_vocab: &Vocabulary,
        new_vocab: &Vocabulary,
    ) -> Result<ParameterStore, UerError> {
        if new_vocab.is_empty() {
            return Err(UerError::EmptyInput(
                "target vocabulary contains no token".to_string(),
            ));
        }
        let old_rows = old_vocab.len() as i64;
        let word_embedding_rows = store.require(WORD_EMBEDDING_KEY)?.size().first().copied();
        if word_embedding_rows != Some(old_rows) {
            return Err(UerError::ShapeMismatch(format!(
                "`{}` has {} rows but the old vocabulary has {} tokens",
                WORD_EMBEDDING_KEY,
                word_embedding_rows.unwrap_or(0),
                old_rows
            )));
        }
        let (indices, missing) = self.row_indices(old_vocab, new_vocab);

        let mut output = ParameterStore::new();
        let mut adapted = 0;
        for (name, tensor) in store.iter() {
            let size = tensor.size();
            if size.first() == Some(&old_rows) {
                let index = Tensor::from_slice(&indices).to_device(tensor.device());
                let mut zero_row_shape = size.clone();
                zero_row_shape[0] = 1;
                let zero_row =
                    Tensor::zeros(zero_row_shape.as_slice(), (tensor.kind(), tensor.device()));
                let extended = Tensor::cat(&[tensor, &zero_row], 0);
                let rows = extended.index_select(0, &index);
                tracing::debug!(
                    key = name,
                    from = ?size,
                    to = ?rows.size(),
                    "adapted vocabulary-sized parameter"
                );
                output.insert(name, rows);
                adapted += 1;
            } else {
                output.insert(name, tensor.shallow_clone());
            }
        }

        tracing::info!(
            old_vocab = old_vocab.len(),
            new_vocab = new_vocab.len(),
            missing_tokens = missing,
            adapted_parameters = adapted,
            fallback = ?self.fallback,
            "adapted vocabulary"
        );
        Ok(output)
    }
}

/// Adapts a store from `old_vocab` to `new_vocab` with the default fallback (unknown token row).
pub fn adapt(
    store: &ParameterStore,
    old_vocab: &Vocabulary,
    new_vocab: &Vocabulary,
) -> Result<ParameterStore, UerError> {
    VocabularyAdapter::default().adapt(store, old_vocab, new_vocab)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{Device, Kind};

    fn embeddings(rows: i64, cols: i64) -> Tensor {
        (Tensor::arange(rows * cols, (Kind::Float, Device::Cpu)) + 1.0).reshape([rows, cols])
    }

    fn store(vocab_size: i64) -> ParameterStore {
        let mut store = ParameterStore::new();
        store.insert(WORD_EMBEDDING_KEY, embeddings(vocab_size, 6));
        store.insert("embedding.layer_norm.gamma", Tensor::ones([6], (Kind::Float, Device::Cpu)));
        store.insert(
            "target.mlm_linear_2.bias",
            Tensor::arange(vocab_size, (Kind::Float, Device::Cpu)),
        );
        store
    }

    #[test]
    fn shared_tokens_keep_their_rows() -> Result<(), UerError> {
        let old_vocab = Vocabulary::from_tokens(["[PAD]", "[UNK]", "我", "你"])?;
        let new_vocab = Vocabulary::from_tokens(["[PAD]", "你", "他", "[UNK]", "我"])?;
        let source = store(4);
        let adapted = VocabularyAdapter::default().adapt(&source, &old_vocab, &new_vocab)?;

        let old = source.require("embedding.word_embedding.weight")?;
        let new = adapted.require("embedding.word_embedding.weight")?;
        assert_eq!(new.size(), vec![5, 6]);
        assert!(new.get(0).equal(&old.get(0)));
        assert!(new.get(1).equal(&old.get(3)));
        assert!(new.get(3).equal(&old.get(1)));
        assert!(new.get(4).equal(&old.get(2)));
        // unknown token row for "他"
        assert!(new.get(2).equal(&old.get(1)));

        let bias = adapted.require("target.mlm_linear_2.bias")?;
        assert_eq!(bias.size(), vec![5]);
        assert_eq!(bias.double_value(&[1]), 3.0);

        let gamma = adapted.require("embedding.layer_norm.gamma")?;
        assert!(gamma.equal(source.require("embedding.layer_norm.gamma")?));
        assert_eq!(
            adapted.keys().collect::<Vec<&str>>(),
            source.keys().collect::<Vec<&str>>()
        );
        Ok(())
    }

    #[test]
    fn zero_fallback() -> Result<(), UerError> {
        let old_vocab = Vocabulary::from_tokens(["a", "b", "[UNK]"])?;
        let new_vocab = Vocabulary::from_tokens(["b", "c"])?;
        let source = store(3);
        let adapted = VocabularyAdapter::new(FallbackPolicy::Zeros).adapt(
            &source,
            &old_vocab,
            &new_vocab,
        )?;

        let new = adapted.require("embedding.word_embedding.weight")?;
        assert_eq!(new.size(), vec![2, 6]);
        assert!(new
            .get(1)
            .equal(&Tensor::zeros([6], (Kind::Float, Device::Cpu))));
        Ok(())
    }

    #[test]
    fn unknown_token_absent_falls_back_to_zeros() -> Result<(), UerError> {
        let old_vocab = Vocabulary::from_tokens(["a", "b"])?;
        let new_vocab = Vocabulary::from_tokens(["c", "a", "b"])?;
        let adapted = adapt(&store(2), &old_vocab, &new_vocab)?;

        let new = adapted.require("embedding.word_embedding.weight")?;
        assert!(new
            .get(0)
            .equal(&Tensor::zeros([6], (Kind::Float, Device::Cpu))));
        assert!(VocabularyAdapter::is_required(&old_vocab, &new_vocab));
        Ok(())
    }

    #[test]
    fn mismatched_old_vocabulary_is_rejected() -> Result<(), UerError> {
        let old_vocab = Vocabulary::from_tokens(["[PAD]", "[UNK]", "我", "你"])?;
        let new_vocab = Vocabulary::from_tokens(["[PAD]", "[UNK]", "我", "你", "他", "她"])?;
        match adapt(&store(5), &old_vocab, &new_vocab) {
            Err(UerError::ShapeMismatch(message)) => {
                assert!(message.contains(WORD_EMBEDDING_KEY));
                assert!(message.contains("5 rows"));
                assert!(message.contains("4 tokens"));
            }
            other => panic!("unexpected result: {:?}", other.map(|store| store.len())),
        }

        let without_embedding = ParameterStore::from_named_tensors(
            store(4)
                .iter()
                .filter(|(name, _)| *name != WORD_EMBEDDING_KEY)
                .map(|(name, tensor)| (name.to_string(), tensor.shallow_clone()))
                .collect(),
        );
        assert!(matches!(
            adapt(&without_embedding, &old_vocab, &new_vocab),
            Err(UerError::MissingKey(_))
        ));
        Ok(())
    }
}
