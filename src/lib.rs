//! # Inference post-processing and checkpoint conversion for BERT-family Chinese NLP models
//!
//! This crate provides the non-neural parts of a Chinese NLP toolkit built around BERT-style
//! encoders:
//! - ChID multiple choice post-processing (`chid`): resolves per-choice, per-blank scores into a
//!   one-to-one assignment between the blanks of a passage and its candidate answers.
//! - Checkpoint conversion (`convert`): remaps parameter tensors between the native (UER) layout
//!   and HuggingFace or TensorFlow BERT checkpoints, and adapts embedding tables to a new
//!   vocabulary.
//!
//! Tensors are handled with [tch-rs](https://github.com/LaurentMazare/tch-rs), the Rust bindings
//! to libtorch. Model scoring, training and tokenization are left to external tooling.
//!
//! Two binaries expose these components:
//! - `convert-checkpoint`: `cargo run --bin convert-checkpoint -- --help`
//! - `chid-postprocess`: `cargo run --bin chid-postprocess -- --help`
//!
//! ```no_run
//! use rust_uer::chid::{resolve, Candidate};
//!
//! # fn main() -> Result<(), rust_uer::UerError> {
//! let candidates = [
//!     Candidate::new("#idiom000000#", vec![0.9, 0.1]),
//!     Candidate::new("#idiom000001#", vec![0.2, 0.8]),
//! ];
//! let assignment = resolve(&candidates)?;
//! # Ok(())
//! # }
//! ```

pub mod chid;
pub mod common;
pub mod convert;

pub use common::error::UerError;
pub use common::Config;
