//! Structural diff between two shadow table projections.
//!
//! # Invariants
//! - A row present in both projections is never reported as delete+insert.
//! - Rows kept in relative order (longest increasing run of old indices)
//!   are not reported as moves, even when insertions shift their index.
//! - Reloads use new indices and only name unmoved common rows.

use crate::model::row::RowId;
use std::collections::{HashMap, HashSet};

/// Categorized changes between an old and a new projection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShadowTableChanges {
    /// Old indices of rows no longer listed.
    pub deletes: Vec<usize>,
    /// New indices of rows listed for the first time.
    pub inserts: Vec<usize>,
    /// `(old, new)` index pairs of rows that changed relative position.
    pub moves: Vec<(usize, usize)>,
    /// New indices of unmoved rows whose content or attributes changed.
    pub reloads: Vec<usize>,
}

impl ShadowTableChanges {
    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty()
            && self.inserts.is_empty()
            && self.moves.is_empty()
            && self.reloads.is_empty()
    }

    pub fn is_only_reloads(&self) -> bool {
        self.deletes.is_empty() && self.inserts.is_empty() && self.moves.is_empty()
    }

    /// Reload-only changes for the given new indices.
    pub fn reloading(mut indices: Vec<usize>) -> Self {
        indices.sort_unstable();
        indices.dedup();
        Self {
            reloads: indices,
            ..Self::default()
        }
    }
}

/// Computes the changes that turn `old` into `new`.
///
/// `touched` names rows whose content changed; they become reloads when
/// they survive in place.
pub fn diff_projections(
    old: &[RowId],
    new: &[RowId],
    touched: &HashSet<RowId>,
) -> ShadowTableChanges {
    let old_index = old
        .iter()
        .enumerate()
        .map(|(index, id)| (id.as_str(), index))
        .collect::<HashMap<_, _>>();
    let new_ids = new.iter().map(String::as_str).collect::<HashSet<_>>();

    let deletes = old
        .iter()
        .enumerate()
        .filter(|(_, id)| !new_ids.contains(id.as_str()))
        .map(|(index, _)| index)
        .collect::<Vec<_>>();

    let mut inserts = Vec::new();
    // (old index, new index) of rows listed in both projections, new order.
    let mut common = Vec::new();
    for (new_position, id) in new.iter().enumerate() {
        match old_index.get(id.as_str()) {
            Some(old_position) => common.push((*old_position, new_position)),
            None => inserts.push(new_position),
        }
    }

    let old_positions = common.iter().map(|(old, _)| *old).collect::<Vec<_>>();
    let kept = longest_increasing_run(&old_positions);

    let mut moves = Vec::new();
    let mut reloads = Vec::new();
    for ((old_position, new_position), in_place) in common.into_iter().zip(kept) {
        if !in_place {
            moves.push((old_position, new_position));
        } else if touched.contains(&new[new_position]) {
            reloads.push(new_position);
        }
    }

    ShadowTableChanges {
        deletes,
        inserts,
        moves,
        reloads,
    }
}

/// Marks the members of one longest strictly increasing subsequence.
fn longest_increasing_run(values: &[usize]) -> Vec<bool> {
    let mut tails: Vec<usize> = Vec::new();
    let mut previous: Vec<Option<usize>> = vec![None; values.len()];

    for (position, value) in values.iter().enumerate() {
        let slot = tails.partition_point(|tail| values[*tail] < *value);
        if slot > 0 {
            previous[position] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(position);
        } else {
            tails[slot] = position;
        }
    }

    let mut kept = vec![false; values.len()];
    let mut cursor = tails.last().copied();
    while let Some(position) = cursor {
        kept[position] = true;
        cursor = previous[position];
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::{diff_projections, longest_increasing_run};
    use std::collections::HashSet;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn insertion_shifts_are_not_moves() {
        let changes = diff_projections(&ids(&["a", "c"]), &ids(&["a", "b", "c"]), &HashSet::new());
        assert_eq!(changes.inserts, vec![1]);
        assert!(changes.deletes.is_empty());
        assert!(changes.moves.is_empty());
    }

    #[test]
    fn reordered_row_is_a_move_not_delete_insert() {
        let changes = diff_projections(
            &ids(&["a", "b", "c"]),
            &ids(&["b", "c", "a"]),
            &HashSet::new(),
        );
        assert!(changes.inserts.is_empty());
        assert!(changes.deletes.is_empty());
        assert_eq!(changes.moves, vec![(0, 2)]);
    }

    #[test]
    fn touched_rows_reload_at_new_index() {
        let touched = ["c".to_string()].into_iter().collect::<HashSet<_>>();
        let changes = diff_projections(&ids(&["a", "b", "c"]), &ids(&["a", "c"]), &touched);
        assert_eq!(changes.deletes, vec![1]);
        assert_eq!(changes.reloads, vec![1]);
        assert!(!changes.is_only_reloads());
    }

    #[test]
    fn increasing_run_prefers_longest_chain() {
        assert_eq!(
            longest_increasing_run(&[2, 0, 1, 3]),
            vec![false, true, true, true]
        );
        assert!(longest_increasing_run(&[]).is_empty());
    }
}
