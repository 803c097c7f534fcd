//! FILENAME: core/lineup-data/src/source.rs
//! PURPOSE: Read-only view of row data handed to the ranking engine.
//! CONTEXT: Rankings never touch the store directly; they compute over a
//! `RowSource` and compare its version before and after a pass to detect
//! that the data moved underneath them.

use crate::selection::Selection;
use crate::store::{DataIndex, RowState, RowStore};

/// Identifies one state of the row data. Any mutation yields a different value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SourceVersion {
    pub rows: u64,
    pub selection: u64,
}

pub trait RowSource {
    /// Number of row slots, i.e. one past the largest valid `DataIndex`.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn row(&self, index: DataIndex) -> RowState<'_>;

    fn is_selected(&self, index: DataIndex) -> bool;

    fn version(&self) -> SourceVersion;
}

/// A store paired with the selection that selection columns read.
#[derive(Debug, Clone, Copy)]
pub struct DataView<'a> {
    pub store: &'a RowStore,
    pub selection: &'a Selection,
}

impl<'a> DataView<'a> {
    pub fn new(store: &'a RowStore, selection: &'a Selection) -> Self {
        DataView { store, selection }
    }
}

impl RowSource for DataView<'_> {
    fn len(&self) -> usize {
        self.store.len()
    }

    fn row(&self, index: DataIndex) -> RowState<'_> {
        self.store.row(index)
    }

    fn is_selected(&self, index: DataIndex) -> bool {
        self.selection.is_selected(index)
    }

    fn version(&self) -> SourceVersion {
        SourceVersion {
            rows: self.store.generation(),
            selection: self.selection.generation(),
        }
    }
}

/// A bare store has nothing selected.
impl RowSource for RowStore {
    fn len(&self) -> usize {
        RowStore::len(self)
    }

    fn row(&self, index: DataIndex) -> RowState<'_> {
        RowStore::row(self, index)
    }

    fn is_selected(&self, _index: DataIndex) -> bool {
        false
    }

    fn version(&self) -> SourceVersion {
        SourceVersion {
            rows: self.generation(),
            selection: 0,
        }
    }
}
