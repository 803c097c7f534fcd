//! FILENAME: core/lineup-data/src/store.rs
//! PURPOSE: Owns the ingested rows and hands out stable data indices.
//! CONTEXT: A row's `DataIndex` is its slot position and never changes while
//! the row exists. Slots may be `Pending` until their data resolves; readers
//! see pending rows as entirely missing. Every mutation bumps the store
//! generation and is announced on the store's event bus.

use std::sync::mpsc::Receiver;

use crate::bus::EventBus;
use crate::error::{DataError, Result};
use crate::row::Row;
use crate::value::RowValue;

/// Stable identifier of a row, assigned at ingestion time.
pub type DataIndex = u32;

/// Raw-data mutations announced by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum DataEvent {
    /// `count` rows were appended starting at `first`.
    RowsAdded { first: DataIndex, count: usize },
    /// Previously pending rows received their data.
    RowsResolved { indices: Vec<DataIndex> },
    /// Field values of existing rows changed. `fields` is empty when whole
    /// rows were replaced.
    ValuesChanged {
        indices: Vec<DataIndex>,
        fields: Vec<String>,
    },
}

#[derive(Debug, Clone)]
enum RowSlot {
    Ready(Row),
    Pending,
}

/// Read access to one slot.
#[derive(Debug, Clone, Copy)]
pub enum RowState<'a> {
    Ready(&'a Row),
    Pending,
}

impl<'a> RowState<'a> {
    /// Reads a field, treating pending rows as missing.
    pub fn get(&self, field: &str) -> &'a RowValue {
        static MISSING: RowValue = RowValue::Missing;
        match *self {
            RowState::Ready(row) => row.get(field),
            RowState::Pending => &MISSING,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, RowState::Pending)
    }

    pub fn row(&self) -> Option<&'a Row> {
        match *self {
            RowState::Ready(row) => Some(row),
            RowState::Pending => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct RowStore {
    slots: Vec<RowSlot>,
    generation: u64,
    pending: usize,
    events: EventBus<DataEvent>,
}

impl RowStore {
    pub fn new() -> Self {
        RowStore::default()
    }

    pub fn from_rows(rows: impl IntoIterator<Item = Row>) -> Self {
        let mut store = RowStore::new();
        store.slots = rows.into_iter().map(RowSlot::Ready).collect();
        store
    }

    /// Loads a JSON array of row objects.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let items = value
            .as_array()
            .ok_or_else(|| DataError::NotAnObject(value.to_string()))?;
        let rows = items.iter().map(Row::from_json).collect::<Result<Vec<_>>>()?;
        Ok(RowStore::from_rows(rows))
    }

    pub fn subscribe(&mut self) -> Receiver<DataEvent> {
        self.events.subscribe()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Monotonic counter, bumped by every mutation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pending_count(&self) -> usize {
        self.pending
    }

    /// Out-of-range indices read like pending rows: entirely missing.
    pub fn row(&self, index: DataIndex) -> RowState<'_> {
        match self.slots.get(index as usize) {
            Some(RowSlot::Ready(row)) => RowState::Ready(row),
            _ => RowState::Pending,
        }
    }

    pub fn indices(&self) -> impl Iterator<Item = DataIndex> {
        0..self.slots.len() as DataIndex
    }

    /// Appends a resolved row and returns its data index.
    pub fn push(&mut self, row: Row) -> DataIndex {
        self.append(RowSlot::Ready(row))
    }

    /// Reserves a slot whose data will arrive later through [`RowStore::resolve`].
    pub fn push_pending(&mut self) -> DataIndex {
        self.pending += 1;
        self.append(RowSlot::Pending)
    }

    fn append(&mut self, slot: RowSlot) -> DataIndex {
        let index = self.slots.len() as DataIndex;
        self.slots.push(slot);
        self.generation += 1;
        self.events.emit(DataEvent::RowsAdded {
            first: index,
            count: 1,
        });
        index
    }

    /// Appends many rows with a single event.
    pub fn extend(&mut self, rows: impl IntoIterator<Item = Row>) -> std::ops::Range<DataIndex> {
        let first = self.slots.len() as DataIndex;
        self.slots.extend(rows.into_iter().map(RowSlot::Ready));
        let end = self.slots.len() as DataIndex;
        if end > first {
            self.generation += 1;
            self.events.emit(DataEvent::RowsAdded {
                first,
                count: (end - first) as usize,
            });
        }
        first..end
    }

    /// Fills a pending slot with its data.
    pub fn resolve(&mut self, index: DataIndex, row: Row) -> Result<()> {
        let len = self.slots.len();
        let slot = self
            .slots
            .get_mut(index as usize)
            .ok_or(DataError::IndexOutOfRange { index, len })?;
        if let RowSlot::Ready(_) = slot {
            return Err(DataError::NotPending(index));
        }
        *slot = RowSlot::Ready(row);
        self.pending -= 1;
        self.generation += 1;
        self.events.emit(DataEvent::RowsResolved {
            indices: vec![index],
        });
        Ok(())
    }

    /// Updates a single field of a resolved row, returning the previous value.
    pub fn set_value(
        &mut self,
        index: DataIndex,
        field: &str,
        value: impl Into<RowValue>,
    ) -> Result<RowValue> {
        let row = self.ready_row_mut(index)?;
        let previous = row.set(field, value);
        self.generation += 1;
        self.events.emit(DataEvent::ValuesChanged {
            indices: vec![index],
            fields: vec![field.to_string()],
        });
        Ok(previous)
    }

    /// Replaces a whole row (pending slots are resolved by this too).
    pub fn replace_row(&mut self, index: DataIndex, row: Row) -> Result<()> {
        if self.row(index).is_pending() {
            return self.resolve(index, row);
        }
        *self.ready_row_mut(index)? = row;
        self.generation += 1;
        self.events.emit(DataEvent::ValuesChanged {
            indices: vec![index],
            fields: Vec::new(),
        });
        Ok(())
    }

    fn ready_row_mut(&mut self, index: DataIndex) -> Result<&mut Row> {
        let len = self.slots.len();
        match self.slots.get_mut(index as usize) {
            Some(RowSlot::Ready(row)) => Ok(row),
            // Writing a single field into a row that has not arrived yet would
            // be overwritten by the resolution, so it is treated as absent.
            Some(RowSlot::Pending) | None => Err(DataError::IndexOutOfRange { index, len }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::drain;
    use pretty_assertions::assert_eq;

    fn create_test_store() -> RowStore {
        RowStore::from_rows(vec![
            Row::new().with("score", 3.0),
            Row::new().with("score", 1.0),
        ])
    }

    #[test]
    fn test_indices_are_slot_positions() {
        let mut store = create_test_store();
        let idx = store.push(Row::new().with("score", 7.0));
        assert_eq!(idx, 2);
        assert_eq!(store.row(2).get("score"), &RowValue::Number(7.0));
    }

    #[test]
    fn test_pending_rows_read_as_missing() {
        let mut store = create_test_store();
        let idx = store.push_pending();
        assert!(store.row(idx).is_pending());
        assert!(store.row(idx).get("score").is_missing());
        assert_eq!(store.pending_count(), 1);

        store.resolve(idx, Row::new().with("score", 5.0)).unwrap();
        assert_eq!(store.row(idx).get("score"), &RowValue::Number(5.0));
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn test_resolve_twice_is_rejected() {
        let mut store = create_test_store();
        assert!(matches!(
            store.resolve(0, Row::new()),
            Err(DataError::NotPending(0))
        ));
    }

    #[test]
    fn test_mutations_emit_events_and_bump_generation() {
        let mut store = create_test_store();
        let rx = store.subscribe();
        let before = store.generation();

        store.set_value(1, "score", 9.0).unwrap();
        let p = store.push_pending();
        store.resolve(p, Row::new()).unwrap();

        assert_eq!(store.generation(), before + 3);
        assert_eq!(
            drain(&rx),
            vec![
                DataEvent::ValuesChanged {
                    indices: vec![1],
                    fields: vec!["score".to_string()],
                },
                DataEvent::RowsAdded { first: 2, count: 1 },
                DataEvent::RowsResolved { indices: vec![2] },
            ]
        );
    }

    #[test]
    fn test_set_value_out_of_range() {
        let mut store = create_test_store();
        assert!(matches!(
            store.set_value(10, "score", 1.0),
            Err(DataError::IndexOutOfRange { index: 10, len: 2 })
        ));
    }

    #[test]
    fn test_from_json() {
        let store = RowStore::from_json(r#"[{"a": 1}, {"a": null}]"#).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.row(1).get("a").is_missing());
    }
}
