//! # Checkpoint conversion between the native (UER) layout and foreign BERT layouts
//!
//! A checkpoint is handled as a flat, ordered dictionary of named tensors (`ParameterStore`).
//! Conversion renames every tensor following a declarative `LayerCorrespondence`, built for a
//! foreign layout, an output head and a number of transformer blocks:
//! - HuggingFace PyTorch checkpoints share the native matrix orientation, tensors are renamed only.
//! - TensorFlow checkpoints (exported to `.npz`) store dense kernels input-major: attention
//!   query/key/value kernels and every dense kernel are transposed.
//! - The native segment embedding reserves a zero row at index 0, added when converting to the
//!   native layout and dropped when converting back. This row cannot round-trip.
//!
//! When the source checkpoint was trained with a vocabulary of a different size, the
//! `VocabularyAdapter` re-indexes the vocabulary-sized parameters of the converted store.
//!
//! ```no_run
//! use rust_uer::convert::{remap, Direction, ParameterStore};
//!
//! # fn main() -> Result<(), rust_uer::UerError> {
//! let hf_store = ParameterStore::load("path/to/pytorch_model.ot")?;
//! let native_store = remap(&hf_store, 12, Direction::ForeignToNative)?;
//! native_store.save("path/to/uer_model.ot")?;
//! # Ok(())
//! # }
//! ```

mod adapter;
mod config;
mod converter;
mod correspondence;
mod remapper;
mod store;
mod vocab;

pub use adapter::{
    adapt, FallbackPolicy, VocabularyAdapter, DEFAULT_UNKNOWN_TOKEN, WORD_EMBEDDING_KEY,
};
pub use config::{ConversionConfig, TENSORFLOW_MAX_POSITION_EMBEDDINGS};
pub use converter::CheckpointConverter;
pub use correspondence::{
    ForeignLayout, LayerCorrespondence, OutputHead, TensorMapping, TensorTransform,
};
pub use remapper::{remap, CheckpointRemapper, Direction, RemapConfig};
pub use store::{CheckpointFormat, ParameterStore};
pub use vocab::Vocabulary;
