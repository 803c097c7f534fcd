//! FILENAME: core/lineup-data/src/lib.rs
//! PURPOSE: Row-level data layer for the lineup ranking engine.
//! CONTEXT: Holds everything the engine reads but never owns: raw values,
//! rows, the row store with its stable data indices, the selection, and the
//! typed event bus every entity uses to announce changes.

pub mod bus;
pub mod error;
pub mod row;
pub mod selection;
pub mod source;
pub mod store;
pub mod value;

// Re-export commonly used types at the crate root
pub use bus::{drain, EventBus};
pub use error::{DataError, Result};
pub use row::Row;
pub use selection::Selection;
pub use source::{DataView, RowSource, SourceVersion};
pub use store::{DataEvent, DataIndex, RowState, RowStore};
pub use value::{format_number, RowValue};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_view_version_tracks_store_and_selection() {
        let mut store = RowStore::from_rows(vec![Row::new().with("a", 1.0)]);
        let mut selection = Selection::new();

        let v0 = DataView::new(&store, &selection).version();
        selection.select(0, false);
        let v1 = DataView::new(&store, &selection).version();
        store.set_value(0, "a", 2.0).unwrap();
        let v2 = DataView::new(&store, &selection).version();

        assert_ne!(v0, v1);
        assert_ne!(v1, v2);
        assert!(DataView::new(&store, &selection).is_selected(0));
    }
}
