//! FILENAME: core/lineup-engine/src/events.rs
//! Change notifications emitted by rankings and the provider.
//!
//! Every event names what changed and carries a closed reason tag so a
//! renderer can tell a cheap re-layout from a re-sort or a re-stat.

use lineup_data::DataIndex;
use serde::Serialize;

use crate::column::{ColumnId, RankingId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeReason {
    OrderChanged,
    GroupChanged,
    ColumnChanged,
    FilterChanged,
    DataChanged,
    SelectionChanged,
}

/// Scope of a column mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnChange {
    /// Only the horizontal layout is affected.
    Width,
    /// Label, color or collapsed state; a repaint is enough.
    Metadata,
    /// Derived values changed; sorting and statistics are affected.
    Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RankingEvent {
    OrderChanged {
        ranking: RankingId,
        generation: u64,
        reason: ChangeReason,
    },
    GroupChanged {
        ranking: RankingId,
        generation: u64,
        reason: ChangeReason,
    },
    ColumnAdded {
        ranking: RankingId,
        column: ColumnId,
        index: usize,
    },
    ColumnRemoved {
        ranking: RankingId,
        /// The removed column followed by its removed descendants.
        columns: Vec<ColumnId>,
    },
    ColumnMoved {
        ranking: RankingId,
        column: ColumnId,
        from: usize,
        to: usize,
    },
    ColumnChanged {
        ranking: RankingId,
        column: ColumnId,
        change: ColumnChange,
    },
    SortCriteriaChanged {
        ranking: RankingId,
        columns: Vec<ColumnId>,
    },
    GroupCriteriaChanged {
        ranking: RankingId,
        columns: Vec<ColumnId>,
    },
    FilterChanged {
        ranking: RankingId,
        column: ColumnId,
    },
    AggregationChanged {
        ranking: RankingId,
        group: String,
        aggregated: bool,
    },
    StatsInvalidated {
        ranking: RankingId,
        column: ColumnId,
    },
}

impl RankingEvent {
    pub fn ranking(&self) -> RankingId {
        match self {
            RankingEvent::OrderChanged { ranking, .. }
            | RankingEvent::GroupChanged { ranking, .. }
            | RankingEvent::ColumnAdded { ranking, .. }
            | RankingEvent::ColumnRemoved { ranking, .. }
            | RankingEvent::ColumnMoved { ranking, .. }
            | RankingEvent::ColumnChanged { ranking, .. }
            | RankingEvent::SortCriteriaChanged { ranking, .. }
            | RankingEvent::GroupCriteriaChanged { ranking, .. }
            | RankingEvent::FilterChanged { ranking, .. }
            | RankingEvent::AggregationChanged { ranking, .. }
            | RankingEvent::StatsInvalidated { ranking, .. } => *ranking,
        }
    }

    pub fn reason(&self) -> ChangeReason {
        match self {
            RankingEvent::OrderChanged { reason, .. } | RankingEvent::GroupChanged { reason, .. } => *reason,
            RankingEvent::SortCriteriaChanged { .. } => ChangeReason::OrderChanged,
            RankingEvent::GroupCriteriaChanged { .. } | RankingEvent::AggregationChanged { .. } => {
                ChangeReason::GroupChanged
            }
            RankingEvent::FilterChanged { .. } => ChangeReason::FilterChanged,
            RankingEvent::StatsInvalidated { .. } => ChangeReason::DataChanged,
            RankingEvent::ColumnAdded { .. }
            | RankingEvent::ColumnRemoved { .. }
            | RankingEvent::ColumnMoved { .. }
            | RankingEvent::ColumnChanged { .. } => ChangeReason::ColumnChanged,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProviderEvent {
    /// Raw data changed; rankings will recompute on the next refresh.
    DataDirty,
    RankingAdded { ranking: RankingId },
    RankingRemoved { ranking: RankingId },
    /// A refresh published a new order for this ranking.
    OrderChanged { ranking: RankingId, generation: u64 },
    SelectionChanged { selected: Vec<DataIndex> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_tags() {
        let id = ColumnId { ranking: 2, local: 0 };
        let moved = RankingEvent::ColumnMoved {
            ranking: 2,
            column: id,
            from: 0,
            to: 1,
        };
        assert_eq!(moved.ranking(), 2);
        assert_eq!(moved.reason(), ChangeReason::ColumnChanged);
        assert_eq!(
            RankingEvent::FilterChanged { ranking: 2, column: id }.reason(),
            ChangeReason::FilterChanged
        );
    }

    #[test]
    fn test_event_json_is_tagged() {
        let json = serde_json::to_string(&ProviderEvent::OrderChanged {
            ranking: 1,
            generation: 4,
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"orderChanged","ranking":1,"generation":4}"#);
    }
}
