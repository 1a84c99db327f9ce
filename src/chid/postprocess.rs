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

use crate::chid::resolver::{resolve, Candidate};
use crate::common::error::UerError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
/// Identifier of the passage a candidate belongs to
pub enum GroupId {
    Index(u64),
    Name(String),
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupId::Index(index) => write!(f, "{}", index),
            GroupId::Name(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// # Scored example produced by the multiple choice model
pub struct ScoredExample {
    /// Passage the example belongs to
    pub group: GroupId,
    /// Tag of the candidate
    pub tag: String,
    /// Score of the candidate for every blank of the passage
    pub scores: Vec<f64>,
}

/// Reads a JSON array of `ScoredExample` records.
pub fn read_scored_examples<P: AsRef<Path>>(path: P) -> Result<Vec<ScoredExample>, UerError> {
    let path = path.as_ref();
    let f = File::open(path).map_err(|e| {
        UerError::IOError(format!("could not open scores file {}: {}", path.display(), e))
    })?;
    let examples: Vec<ScoredExample> = serde_json::from_reader(BufReader::new(f))?;
    Ok(examples)
}

/// Buckets examples per group.
///
/// Groups are returned in the order of their first appearance, and candidates keep their
/// relative order within a group.
pub fn group_examples(examples: Vec<ScoredExample>) -> Vec<(GroupId, Vec<Candidate>)> {
    let mut groups: Vec<(GroupId, Vec<Candidate>)> = Vec::new();
    let mut group_positions: HashMap<GroupId, usize> = HashMap::new();
    for example in examples {
        let position = *group_positions.entry(example.group.clone()).or_insert_with(|| {
            groups.push((example.group.clone(), Vec::new()));
            groups.len() - 1
        });
        groups[position]
            .1
            .push(Candidate::new(example.tag, example.scores));
    }
    groups
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
/// # ChID predictions, `{tag: blank_index}`
pub struct ChidPredictions {
    pub predictions: BTreeMap<String, usize>,
}

impl ChidPredictions {
    pub fn get(&self, tag: &str) -> Option<usize> {
        self.predictions.get(tag).copied()
    }

    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    /// Writes the predictions as a flat, pretty-printed JSON object.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), UerError> {
        let path = path.as_ref();
        let f = File::create(path).map_err(|e| {
            UerError::IOError(format!(
                "could not create prediction file {}: {}",
                path.display(),
                e
            ))
        })?;
        let mut writer = BufWriter::new(f);
        serde_json::to_writer_pretty(&mut writer, &self.predictions)?;
        writer.flush()?;
        Ok(())
    }
}

/// Resolves every group of scored examples and merges the assignments.
///
/// # Arguments
///
/// * `examples` - scored examples, possibly spanning several groups
///
/// # Returns
///
/// * `ChidPredictions` mapping each assigned tag to its blank index
///
/// # Example
///
/// ```
/// use rust_uer::chid::{postprocess_chid_predictions, GroupId, ScoredExample};
///
/// # fn main() -> Result<(), rust_uer::UerError> {
/// let examples = vec![
///     ScoredExample {
///         group: GroupId::Index(0),
///         tag: "#idiom000000#".into(),
///         scores: vec![0.2, 0.7],
///     },
///     ScoredExample {
///         group: GroupId::Index(0),
///         tag: "#idiom000001#".into(),
///         scores: vec![0.6, 0.1],
///     },
/// ];
/// let predictions = postprocess_chid_predictions(examples)?;
/// assert_eq!(predictions.get("#idiom000000#"), Some(1));
/// assert_eq!(predictions.get("#idiom000001#"), Some(0));
/// # Ok(())
/// # }
/// ```
pub fn postprocess_chid_predictions(
    examples: Vec<ScoredExample>,
) -> Result<ChidPredictions, UerError> {
    if examples.is_empty() {
        return Err(UerError::EmptyInput(
            "no scored example to post-process".to_string(),
        ));
    }
    let groups = group_examples(examples);
    tracing::info!(groups = groups.len(), "resolving ChID groups");

    let mut predictions = BTreeMap::new();
    for (group, candidates) in groups {
        let assignment = resolve(&candidates).map_err(|e| match e {
            UerError::ShapeMismatch(message) => {
                UerError::ShapeMismatch(format!("group {}: {}", group, message))
            }
            UerError::EmptyInput(message) => {
                UerError::EmptyInput(format!("group {}: {}", group, message))
            }
            UerError::ValueError(message) => {
                UerError::ValueError(format!("group {}: {}", group, message))
            }
            other => other,
        })?;
        tracing::debug!(
            %group,
            candidates = candidates.len(),
            assigned = assignment.len(),
            "resolved group"
        );
        for (blank_index, tag) in assignment {
            if let Some(previous) = predictions.insert(tag.clone(), blank_index) {
                tracing::warn!(
                    %group,
                    %tag,
                    previous,
                    blank_index,
                    "tag already assigned by an earlier group, overwriting"
                );
            }
        }
    }
    Ok(ChidPredictions { predictions })
}
