//! # ChID multiple choice post-processing
//!
//! ChID is a Chinese idiom cloze benchmark: every passage contains several blanks and a shared list
//! of candidate answers. A multiple choice model (external to this crate) scores every candidate
//! against every blank of its passage. This module turns these scores into a one-to-one assignment
//! between blanks and candidates, one passage (group) at a time.
//!
//! The assignment is greedy: all `(choice, blank, score)` triples of a group are ranked by
//! descending score and committed whenever both the choice and the blank are still free.
//! This is fast and deterministic but does not guarantee the maximum total score.
//!
//! ```no_run
//! use rust_uer::chid::{postprocess_chid_predictions, read_scored_examples};
//!
//! # fn main() -> Result<(), rust_uer::UerError> {
//! let examples = read_scored_examples("path/to/chid_scores.json")?;
//! let predictions = postprocess_chid_predictions(examples)?;
//! predictions.save("path/to/predictions.json")?;
//! # Ok(())
//! # }
//! ```

mod postprocess;
mod resolver;

pub use postprocess::{
    group_examples, postprocess_chid_predictions, read_scored_examples, ChidPredictions, GroupId,
    ScoredExample,
};
pub use resolver::{build_triples, resolve, Assignment, Candidate, ScoredTriple};
