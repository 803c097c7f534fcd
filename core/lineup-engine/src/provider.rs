//! FILENAME: core/lineup-engine/src/provider.rs
//! PURPOSE: Owns the row store, the selection and every ranking of a session.
//! CONTEXT: Raw-data mutations go through the store, which announces them on
//! its bus. The provider drains those announcements in `refresh`, forwards
//! them to its rankings, then lets each ranking run its recomputation pass.

use std::sync::mpsc::Receiver;

use log::debug;
use serde::{Deserialize, Serialize};

use lineup_data::{drain, DataEvent, DataIndex, DataView, EventBus, Row, RowState, RowStore, RowValue, Selection};

use crate::column::{ColumnId, RankingId};
use crate::config::RankingConfig;
use crate::descriptor::RankingDesc;
use crate::error::{EngineError, Result};
use crate::events::ProviderEvent;
use crate::ranking::Ranking;
use crate::stats::{BoxPlotSummary, SubsetSlot, SubsetStats, Summary};

/// A row returned by [`DataProvider::fetch`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FetchedRow<'a> {
    Ready(&'a Row),
    /// The row's data has not arrived yet.
    Pending,
}

/// Serializable state of a whole session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDump {
    pub rankings: Vec<RankingDesc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selection: Vec<DataIndex>,
}

impl SessionDump {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub struct DataProvider {
    store: RowStore,
    store_events: Receiver<DataEvent>,
    selection: Selection,
    rankings: Vec<Ranking>,
    next_ranking: RankingId,
    config: RankingConfig,
    events: EventBus<ProviderEvent>,
}

impl DataProvider {
    pub fn new(store: RowStore) -> Self {
        Self::with_config(store, RankingConfig::default())
    }

    /// `config` is the configuration given to rankings created later.
    pub fn with_config(mut store: RowStore, config: RankingConfig) -> Self {
        let store_events = store.subscribe();
        DataProvider {
            store,
            store_events,
            selection: Selection::new(),
            rankings: Vec::new(),
            next_ranking: 0,
            config,
            events: EventBus::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(RowStore::from_json(json)?))
    }

    pub fn subscribe(&mut self) -> Receiver<ProviderEvent> {
        self.events.subscribe()
    }

    pub fn store(&self) -> &RowStore {
        &self.store
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn view(&self) -> DataView<'_> {
        DataView::new(&self.store, &self.selection)
    }

    // ------------------------------------------------------------------------
    // Raw data
    // ------------------------------------------------------------------------

    pub fn push_row(&mut self, row: Row) -> DataIndex {
        let index = self.store.push(row);
        self.events.emit(ProviderEvent::DataDirty);
        index
    }

    pub fn push_rows(&mut self, rows: impl IntoIterator<Item = Row>) -> std::ops::Range<DataIndex> {
        let range = self.store.extend(rows);
        self.events.emit(ProviderEvent::DataDirty);
        range
    }

    /// Reserves a row whose data arrives later via [`DataProvider::resolve_row`].
    pub fn push_pending(&mut self) -> DataIndex {
        let index = self.store.push_pending();
        self.events.emit(ProviderEvent::DataDirty);
        index
    }

    pub fn resolve_row(&mut self, index: DataIndex, row: Row) -> Result<()> {
        self.store.resolve(index, row)?;
        self.events.emit(ProviderEvent::DataDirty);
        Ok(())
    }

    pub fn set_value(&mut self, index: DataIndex, field: &str, value: impl Into<RowValue>) -> Result<RowValue> {
        let previous = self.store.set_value(index, field, value)?;
        self.events.emit(ProviderEvent::DataDirty);
        Ok(previous)
    }

    pub fn replace_row(&mut self, index: DataIndex, row: Row) -> Result<()> {
        self.store.replace_row(index, row)?;
        self.events.emit(ProviderEvent::DataDirty);
        Ok(())
    }

    /// Rows for each requested index sequence, in the same shape.
    pub fn fetch(&self, orders: &[&[DataIndex]]) -> Vec<Vec<FetchedRow<'_>>> {
        orders
            .iter()
            .map(|order| {
                order
                    .iter()
                    .map(|index| match self.store.row(*index) {
                        RowState::Ready(row) => FetchedRow::Ready(row),
                        RowState::Pending => FetchedRow::Pending,
                    })
                    .collect()
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Rankings
    // ------------------------------------------------------------------------

    fn allocate_ranking(&mut self) -> RankingId {
        let id = self.next_ranking;
        self.next_ranking += 1;
        id
    }

    pub fn add_empty_ranking(&mut self) -> RankingId {
        let id = self.allocate_ranking();
        self.rankings.push(Ranking::new(id, self.config.clone()));
        self.events.emit(ProviderEvent::RankingAdded { ranking: id });
        id
    }

    pub fn add_ranking(&mut self, desc: &RankingDesc) -> Result<RankingId> {
        let id = self.next_ranking;
        let ranking = Ranking::from_desc(id, desc, self.config.clone())?;
        self.allocate_ranking();
        self.rankings.push(ranking);
        self.events.emit(ProviderEvent::RankingAdded { ranking: id });
        Ok(id)
    }

    pub fn remove_ranking(&mut self, id: RankingId) -> Result<()> {
        let position = self
            .rankings
            .iter()
            .position(|r| r.id() == id)
            .ok_or(EngineError::UnknownRanking(id))?;
        self.rankings.remove(position);
        self.events.emit(ProviderEvent::RankingRemoved { ranking: id });
        Ok(())
    }

    pub fn rankings(&self) -> &[Ranking] {
        &self.rankings
    }

    pub fn ranking(&self, id: RankingId) -> Result<&Ranking> {
        self.rankings
            .iter()
            .find(|r| r.id() == id)
            .ok_or(EngineError::UnknownRanking(id))
    }

    pub fn ranking_mut(&mut self, id: RankingId) -> Result<&mut Ranking> {
        self.rankings
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or(EngineError::UnknownRanking(id))
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    fn selection_changed(&mut self) {
        for ranking in &mut self.rankings {
            ranking.invalidate_selection();
        }
        self.events.emit(ProviderEvent::SelectionChanged {
            selected: self.selection.indices().collect(),
        });
    }

    /// Row click semantics of [`Selection::toggle`]. Returns the row's new state.
    pub fn toggle_selection(&mut self, index: DataIndex, additive: bool) -> bool {
        let selected = self.selection.toggle(index, additive);
        self.selection_changed();
        selected
    }

    pub fn set_selection(&mut self, indices: impl IntoIterator<Item = DataIndex>) {
        if self.selection.set(indices) {
            self.selection_changed();
        }
    }

    pub fn clear_selection(&mut self) {
        if self.selection.clear() {
            self.selection_changed();
        }
    }

    /// Selects or deselects every row of one leaf group.
    pub fn set_group_selected(&mut self, ranking: RankingId, group: usize, selected: bool) -> Result<bool> {
        let groups = self.ranking(ranking)?.groups();
        let rows = groups
            .leaves()
            .get(group)
            .ok_or(EngineError::InvalidIndex {
                index: group,
                len: groups.len(),
            })?
            .order
            .shared();
        let changed = self.selection.set_many(&rows, selected);
        if changed {
            self.selection_changed();
        }
        Ok(changed)
    }

    /// Selects every resolved row.
    pub fn select_all(&mut self) {
        let all: Vec<DataIndex> = self
            .store
            .indices()
            .filter(|i| !self.store.row(*i).is_pending())
            .collect();
        self.set_selection(all);
    }

    // ------------------------------------------------------------------------
    // Aggregation
    // ------------------------------------------------------------------------

    /// Whether one leaf group of a ranking is shown aggregated.
    pub fn is_aggregated(&self, ranking: RankingId, group: usize) -> Result<bool> {
        let ranking = self.ranking(ranking)?;
        let groups = ranking.groups();
        let leaf = groups.leaves().get(group).ok_or(EngineError::InvalidIndex {
            index: group,
            len: groups.len(),
        })?;
        Ok(ranking.is_aggregated(leaf))
    }

    pub fn set_aggregated(&mut self, ranking: RankingId, group: usize, aggregated: bool) -> Result<bool> {
        self.ranking_mut(ranking)?.set_aggregated(group, aggregated)
    }

    // ------------------------------------------------------------------------
    // Recomputation
    // ------------------------------------------------------------------------

    /// Forwards pending store events to every ranking, then refreshes them.
    /// Returns the rankings that published a new order.
    pub fn refresh(&mut self) -> Vec<RankingId> {
        let data_events = drain(&self.store_events);
        if !data_events.is_empty() {
            debug!("provider: forwarding {} data events", data_events.len());
        }
        for ranking in &mut self.rankings {
            for event in &data_events {
                ranking.invalidate_data(event);
            }
        }

        let view = DataView::new(&self.store, &self.selection);
        let mut published = Vec::new();
        for ranking in &mut self.rankings {
            if ranking.refresh(&view) {
                published.push((ranking.id(), ranking.generation()));
            }
        }
        for (ranking, generation) in &published {
            self.events.emit(ProviderEvent::OrderChanged {
                ranking: *ranking,
                generation: *generation,
            });
        }
        published.into_iter().map(|(id, _)| id).collect()
    }

    /// Runs `f` against the statistics of one subset of a ranking.
    pub fn with_stats<R>(
        &mut self,
        ranking: RankingId,
        slot: SubsetSlot,
        f: impl FnOnce(&mut SubsetStats<'_>) -> R,
    ) -> Result<R> {
        let view = DataView::new(&self.store, &self.selection);
        let ranking = self
            .rankings
            .iter_mut()
            .find(|r| r.id() == ranking)
            .ok_or(EngineError::UnknownRanking(ranking))?;
        let mut stats = ranking.stats(slot, &view)?;
        Ok(f(&mut stats))
    }

    pub fn summary(&mut self, ranking: RankingId, slot: SubsetSlot, column: ColumnId) -> Result<Option<Summary>> {
        self.with_stats(ranking, slot, |stats| stats.for_column(column))
    }

    pub fn box_plot(
        &mut self,
        ranking: RankingId,
        slot: SubsetSlot,
        column: ColumnId,
    ) -> Result<Option<BoxPlotSummary>> {
        self.with_stats(ranking, slot, |stats| stats.box_plot(column))
    }

    // ------------------------------------------------------------------------
    // Session persistence
    // ------------------------------------------------------------------------

    pub fn dump(&self) -> SessionDump {
        SessionDump {
            rankings: self.rankings.iter().map(Ranking::to_desc).collect(),
            selection: self.selection.indices().collect(),
        }
    }

    /// Replaces every ranking and the selection with the dumped state.
    /// Nothing changes if any ranking fails to build.
    pub fn restore(&mut self, dump: &SessionDump) -> Result<Vec<RankingId>> {
        let mut rebuilt = Vec::with_capacity(dump.rankings.len());
        for (offset, desc) in dump.rankings.iter().enumerate() {
            let id = self.next_ranking + offset as RankingId;
            rebuilt.push(Ranking::from_desc(id, desc, self.config.clone())?);
        }
        self.next_ranking += rebuilt.len() as RankingId;

        let old = std::mem::replace(&mut self.rankings, rebuilt);
        for ranking in old {
            self.events.emit(ProviderEvent::RankingRemoved { ranking: ranking.id() });
        }
        let ids: Vec<RankingId> = self.rankings.iter().map(Ranking::id).collect();
        for id in &ids {
            self.events.emit(ProviderEvent::RankingAdded { ranking: *id });
        }

        let len = self.store.len() as DataIndex;
        self.set_selection(dump.selection.iter().copied().filter(|i| *i < len));
        Ok(ids)
    }
}
