use std::cmp::Ordering;

use crate::domain::models::ThoughtState;

/// Keep the `n` best states, best first.
///
/// Unscored states rank as 0.0. The sort is stable, so among equal scores
/// the state that arrived first wins.
pub fn keep_best_n(mut inputs: Vec<ThoughtState>, n: usize, highest_is_best: bool) -> Vec<ThoughtState> {
    inputs.sort_by(|a, b| {
        let ordering = a.score_or_zero().total_cmp(&b.score_or_zero());
        if highest_is_best {
            ordering.reverse()
        } else {
            ordering
        }
    });
    inputs.truncate(n);
    inputs
}

/// Index of the highest-scoring state, first one on ties.
pub(super) fn best_index(states: &[ThoughtState]) -> Option<usize> {
    states
        .iter()
        .enumerate()
        .reduce(|best, candidate| {
            match candidate.1.score_or_zero().total_cmp(&best.1.score_or_zero()) {
                Ordering::Greater => candidate,
                _ => best,
            }
        })
        .map(|(index, _)| index)
}
