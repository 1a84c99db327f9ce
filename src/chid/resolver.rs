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
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// # Answer choice scored against every blank of its group
pub struct Candidate {
    /// Identifier reported in the final predictions
    pub tag: String,
    /// One score per blank, in blank order
    pub scores: Vec<f64>,
}

impl Candidate {
    pub fn new(tag: impl Into<String>, scores: Vec<f64>) -> Candidate {
        Candidate {
            tag: tag.into(),
            scores,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Entry of the flattened choice x blank score matrix
pub struct ScoredTriple {
    pub choice_index: usize,
    pub blank_index: usize,
    pub score: f64,
}

impl ScoredTriple {
    /// Descending score, NaN after every other score (negative infinity included).
    fn sort_key(&self) -> (bool, Reverse<OrderedFloat<f64>>) {
        (self.score.is_nan(), Reverse(OrderedFloat(self.score)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
/// # One-to-one assignment between blanks and candidate tags
/// Pairs are ordered by ascending blank index. Every blank and every tag appears at most once.
pub struct Assignment {
    pairs: Vec<(usize, String)>,
}

impl Assignment {
    /// `(blank_index, tag)` pairs, sorted by blank index
    pub fn pairs(&self) -> &[(usize, String)] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Tag assigned to a blank, if any
    pub fn tag_for_blank(&self, blank_index: usize) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(blank, _)| *blank == blank_index)
            .map(|(_, tag)| tag.as_str())
    }

    /// Externally observed form of the assignment: `{tag: blank_index}`
    pub fn to_tag_map(&self) -> BTreeMap<String, usize> {
        self.pairs
            .iter()
            .map(|(blank, tag)| (tag.clone(), *blank))
            .collect()
    }
}

impl IntoIterator for Assignment {
    type Item = (usize, String);
    type IntoIter = std::vec::IntoIter<(usize, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.into_iter()
    }
}

/// Flattens the candidate scores into a dense list of triples, choice-major.
///
/// # Arguments
///
/// * `candidates` - candidates of a single group. All score vectors must have the same length and
///   tags must be unique.
///
/// # Returns
///
/// * `Vec<ScoredTriple>` with `num_choices * num_blanks` entries, ordered
///   `(choice 0, blank 0), (choice 0, blank 1), ..., (choice 1, blank 0), ...`
pub fn build_triples(candidates: &[Candidate]) -> Result<Vec<ScoredTriple>, UerError> {
    let first = candidates.first().ok_or_else(|| {
        UerError::EmptyInput("no candidate provided for assignment resolution".to_string())
    })?;
    let num_blanks = first.scores.len();
    if let Some(candidate) = candidates.iter().find(|c| c.scores.len() != num_blanks) {
        return Err(UerError::ShapeMismatch(format!(
            "candidate `{}` has {} scores, expected {} (from candidate `{}`)",
            candidate.tag,
            candidate.scores.len(),
            num_blanks,
            first.tag
        )));
    }
    let mut tags = HashSet::with_capacity(candidates.len());
    if let Some(candidate) = candidates.iter().find(|c| !tags.insert(c.tag.as_str())) {
        return Err(UerError::ValueError(format!(
            "candidate tag `{}` appears more than once",
            candidate.tag
        )));
    }

    let triples = candidates
        .iter()
        .enumerate()
        .flat_map(|(choice_index, candidate)| {
            candidate
                .scores
                .iter()
                .enumerate()
                .map(move |(blank_index, &score)| ScoredTriple {
                    choice_index,
                    blank_index,
                    score,
                })
        })
        .collect();
    Ok(triples)
}

/// Resolves the candidates of a group into a one-to-one blank assignment.
///
/// Triples are ranked by descending score and swept once: a triple is committed if both its choice
/// and its blank are still free. This greedy selection is not guaranteed to maximize the total
/// score over all possible matchings.
/// Sorting is stable, so equal scores keep the choice-major flatten order (lower choice index
/// first, then lower blank index). NaN scores rank after every other score, negative infinity
/// included.
///
/// # Arguments
///
/// * `candidates` - non-empty slice of candidates with score vectors of equal length
///
/// # Returns
///
/// * `Assignment` with exactly `min(num_blanks, num_choices)` pairs
///
/// # Example
///
/// ```
/// use rust_uer::chid::{resolve, Candidate};
///
/// # fn main() -> Result<(), rust_uer::UerError> {
/// let candidates = [
///     Candidate::new("tag0", vec![0.9, 0.1]),
///     Candidate::new("tag1", vec![0.2, 0.8]),
///     Candidate::new("tag2", vec![0.5, 0.5]),
/// ];
/// let assignment = resolve(&candidates)?;
/// assert_eq!(assignment.tag_for_blank(0), Some("tag0"));
/// assert_eq!(assignment.tag_for_blank(1), Some("tag1"));
/// # Ok(())
/// # }
/// ```
pub fn resolve(candidates: &[Candidate]) -> Result<Assignment, UerError> {
    let mut triples = build_triples(candidates)?;
    triples.sort_by_key(ScoredTriple::sort_key);

    let num_blanks = candidates[0].scores.len();
    let mut remaining_choices: BTreeSet<usize> = (0..candidates.len()).collect();
    let mut remaining_blanks: BTreeSet<usize> = (0..num_blanks).collect();
    let mut committed: Vec<(usize, usize)> = Vec::with_capacity(num_blanks.min(candidates.len()));

    for triple in triples {
        if remaining_choices.is_empty() || remaining_blanks.is_empty() {
            break;
        }
        if remaining_blanks.contains(&triple.blank_index)
            && remaining_choices.contains(&triple.choice_index)
        {
            remaining_blanks.remove(&triple.blank_index);
            remaining_choices.remove(&triple.choice_index);
            committed.push((triple.blank_index, triple.choice_index));
        }
    }

    committed.sort_by_key(|(blank_index, _)| *blank_index);
    let pairs = committed
        .into_iter()
        .map(|(blank_index, choice_index)| (blank_index, candidates[choice_index].tag.clone()))
        .collect();
    Ok(Assignment { pairs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn candidates(scores: &[&[f64]]) -> Vec<Candidate> {
        scores
            .iter()
            .enumerate()
            .map(|(idx, s)| Candidate::new(format!("tag{}", idx), s.to_vec()))
            .collect()
    }

    fn total_score(candidates: &[Candidate], pairs: &[(usize, usize)]) -> f64 {
        pairs
            .iter()
            .map(|(blank, choice)| candidates[*choice].scores[*blank])
            .sum()
    }

    #[test]
    fn two_blanks_three_choices() -> Result<(), UerError> {
        let candidates = candidates(&[&[0.9, 0.1], &[0.2, 0.8], &[0.5, 0.5]]);
        let assignment = resolve(&candidates)?;

        assert_eq!(
            assignment.pairs(),
            &[(0, "tag0".to_string()), (1, "tag1".to_string())]
        );
        let tag_map = assignment.to_tag_map();
        assert_eq!(tag_map.get("tag0"), Some(&0));
        assert_eq!(tag_map.get("tag1"), Some(&1));
        assert!(!tag_map.contains_key("tag2"));
        Ok(())
    }

    #[test]
    fn triples_are_choice_major() -> Result<(), UerError> {
        let candidates = candidates(&[&[1.0, 2.0], &[3.0, 4.0]]);
        let triples = build_triples(&candidates)?;
        let positions: Vec<(usize, usize)> = triples
            .iter()
            .map(|t| (t.choice_index, t.blank_index))
            .collect();
        assert_eq!(positions, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
        assert_eq!(triples[2].score, 3.0);
        Ok(())
    }

    #[test]
    fn more_blanks_than_choices() -> Result<(), UerError> {
        let candidates = candidates(&[&[0.1, 0.7, 0.3], &[0.6, 0.9, 0.2]]);
        let assignment = resolve(&candidates)?;

        // choice 1 takes blank 1 (0.9), choice 0 then takes blank 2 (0.3)
        assert_eq!(
            assignment.pairs(),
            &[(1, "tag1".to_string()), (2, "tag0".to_string())]
        );
        Ok(())
    }

    #[test]
    fn greedy_is_not_globally_optimal() -> Result<(), UerError> {
        // Global optimum is tag0->blank1, tag1->blank0 (0.8 + 0.8), greedy grabs 0.9 first.
        let candidates = candidates(&[&[0.9, 0.8], &[0.8, 0.0]]);
        let assignment = resolve(&candidates)?;
        assert_eq!(assignment.tag_for_blank(0), Some("tag0"));
        assert_eq!(assignment.tag_for_blank(1), Some("tag1"));
        Ok(())
    }

    #[test]
    fn ties_keep_flatten_order() -> Result<(), UerError> {
        let candidates = candidates(&[&[0.5, 0.5], &[0.5, 0.5]]);
        let assignment = resolve(&candidates)?;
        assert_eq!(
            assignment.pairs(),
            &[(0, "tag0".to_string()), (1, "tag1".to_string())]
        );
        Ok(())
    }

    #[test]
    fn nan_scores_rank_last() -> Result<(), UerError> {
        let candidates = candidates(&[&[f64::NAN, 0.1], &[0.2, 0.3]]);
        let assignment = resolve(&candidates)?;
        // 0.3 (choice1, blank1) first, then the only remaining pair (choice0, blank0)
        assert_eq!(
            assignment.pairs(),
            &[(0, "tag0".to_string()), (1, "tag1".to_string())]
        );
        Ok(())
    }

    #[test]
    fn nan_ranks_below_negative_infinity() -> Result<(), UerError> {
        let candidates = candidates(&[&[f64::NAN], &[f64::NEG_INFINITY]]);
        let assignment = resolve(&candidates)?;
        assert_eq!(assignment.pairs(), &[(0, "tag1".to_string())]);
        Ok(())
    }

    #[test]
    fn output_is_partial_bijection_and_deterministic() -> Result<(), UerError> {
        let scores: Vec<Vec<f64>> = (0..7)
            .map(|choice| {
                (0..4)
                    .map(|blank| ((choice * 31 + blank * 17) % 11) as f64 / 11.0)
                    .collect()
            })
            .collect();
        let candidates: Vec<Candidate> = scores
            .iter()
            .enumerate()
            .map(|(idx, s)| Candidate::new(format!("tag{}", idx), s.clone()))
            .collect();

        let first = resolve(&candidates)?;
        let second = resolve(&candidates)?;
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);

        let blanks: HashSet<usize> = first.pairs().iter().map(|(b, _)| *b).collect();
        let tags: HashSet<&str> = first.pairs().iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(blanks.len(), first.len());
        assert_eq!(tags.len(), first.len());
        assert!(first.pairs().windows(2).all(|w| w[0].0 < w[1].0));
        Ok(())
    }

    #[test]
    fn greedy_assignment_is_single_swap_optimal() -> Result<(), UerError> {
        let candidates = candidates(&[
            &[0.3, 0.9, 0.4],
            &[0.8, 0.7, 0.1],
            &[0.2, 0.6, 0.5],
            &[0.05, 0.1, 0.45],
        ]);
        let assignment = resolve(&candidates)?;
        let chosen: Vec<(usize, usize)> = assignment
            .pairs()
            .iter()
            .map(|(blank, tag)| {
                let choice = candidates.iter().position(|c| &c.tag == tag).unwrap();
                (*blank, choice)
            })
            .collect();
        let chosen_total = total_score(&candidates, &chosen);

        // swap the choices of two committed blanks
        for a in 0..chosen.len() {
            for b in (a + 1)..chosen.len() {
                let mut swapped = chosen.clone();
                swapped[a].1 = chosen[b].1;
                swapped[b].1 = chosen[a].1;
                assert!(chosen_total >= total_score(&candidates, &swapped));
            }
        }
        // replace a committed choice by an unused one
        let used: HashSet<usize> = chosen.iter().map(|(_, c)| *c).collect();
        for unused in (0..candidates.len()).filter(|c| !used.contains(c)) {
            for a in 0..chosen.len() {
                let mut replaced = chosen.clone();
                replaced[a].1 = unused;
                assert!(chosen_total >= total_score(&candidates, &replaced));
            }
        }
        Ok(())
    }

    #[test]
    fn empty_and_ragged_inputs_are_rejected() {
        assert!(matches!(resolve(&[]), Err(UerError::EmptyInput(_))));

        let ragged = candidates(&[&[0.1, 0.2], &[0.3]]);
        match resolve(&ragged) {
            Err(UerError::ShapeMismatch(message)) => assert!(message.contains("tag1")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn duplicate_tags_are_rejected() {
        let duplicated = [
            Candidate::new("tag0", vec![0.9, 0.1]),
            Candidate::new("tag1", vec![0.2, 0.8]),
            Candidate::new("tag0", vec![0.5, 0.5]),
        ];
        match resolve(&duplicated) {
            Err(UerError::ValueError(message)) => assert!(message.contains("`tag0`")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn zero_blanks_resolve_to_empty_assignment() -> Result<(), UerError> {
        let candidates = candidates(&[&[], &[]]);
        assert!(resolve(&candidates)?.is_empty());
        Ok(())
    }
}
