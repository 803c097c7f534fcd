//! FILENAME: core/lineup-data/src/selection.rs
//! PURPOSE: The set of user-selected rows.
//! CONTEXT: Selection is toggled per row and is not derived from row data.
//! Selection columns read it, so it carries its own generation counter.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::store::DataIndex;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    selected: BTreeSet<DataIndex>,
    #[serde(skip)]
    generation: u64,
}

impl Selection {
    pub fn new() -> Self {
        Selection::default()
    }

    pub fn is_selected(&self, index: DataIndex) -> bool {
        self.selected.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Selected indices in ascending order.
    pub fn indices(&self) -> impl Iterator<Item = DataIndex> + '_ {
        self.selected.iter().copied()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Clicking a row: a selected row is deselected (alone when `additive`,
    /// otherwise together with everything else); an unselected row becomes
    /// selected, replacing the current selection unless `additive`.
    /// Returns the row's new state.
    pub fn toggle(&mut self, index: DataIndex, additive: bool) -> bool {
        if self.is_selected(index) {
            if additive {
                self.selected.remove(&index);
            } else {
                self.selected.clear();
            }
            self.generation += 1;
            return false;
        }
        self.select(index, additive);
        true
    }

    pub fn select(&mut self, index: DataIndex, additive: bool) {
        if !additive {
            self.selected.clear();
        }
        self.selected.insert(index);
        self.generation += 1;
    }

    /// Replaces the selection. Returns false when nothing changed.
    pub fn set(&mut self, indices: impl IntoIterator<Item = DataIndex>) -> bool {
        let next: BTreeSet<DataIndex> = indices.into_iter().collect();
        if next == self.selected {
            return false;
        }
        self.selected = next;
        self.generation += 1;
        true
    }

    /// Sets or clears a batch of rows (used by group-level toggles).
    pub fn set_many(&mut self, indices: &[DataIndex], value: bool) -> bool {
        let mut changed = false;
        for &index in indices {
            changed |= if value {
                self.selected.insert(index)
            } else {
                self.selected.remove(&index)
            };
        }
        if changed {
            self.generation += 1;
        }
        changed
    }

    pub fn clear(&mut self) -> bool {
        if self.selected.is_empty() {
            return false;
        }
        self.selected.clear();
        self.generation += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_replaces_unless_additive() {
        let mut sel = Selection::new();
        assert!(sel.toggle(1, false));
        assert!(sel.toggle(2, false));
        assert_eq!(sel.indices().collect::<Vec<_>>(), vec![2]);

        assert!(sel.toggle(3, true));
        assert_eq!(sel.indices().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_toggle_selected_row() {
        let mut sel = Selection::new();
        sel.set([1, 2, 3]);

        assert!(!sel.toggle(2, true));
        assert_eq!(sel.indices().collect::<Vec<_>>(), vec![1, 3]);

        assert!(!sel.toggle(1, false));
        assert!(sel.is_empty());
    }

    #[test]
    fn test_generation_tracks_changes_only() {
        let mut sel = Selection::new();
        sel.set([4]);
        let g = sel.generation();
        assert!(!sel.set([4]));
        assert!(!sel.set_many(&[4], true));
        assert_eq!(sel.generation(), g);
        assert!(sel.clear());
        assert_eq!(sel.generation(), g + 1);
    }
}
