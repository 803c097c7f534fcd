//! FILENAME: core/lineup-engine/src/lib.rs
//! Ranking, grouping and statistics engine.
//!
//! Turns a row store plus user-configured column descriptors into ordered,
//! grouped, filtered views with cached per-column statistics. Rendering is
//! left to consumers, which read snapshots and subscribe to change events.
//!
//! Layers:
//! - `descriptor`: Serializable configuration (what the columns ARE)
//! - `column`: Live column tree, accessors, filters, layout
//! - `order` / `group` / `aggregate`: Order and partition computation
//! - `stats`: Summaries and their generation-keyed cache
//! - `ranking`: Orchestration and invalidation of one ranking
//! - `provider` / `shared`: Session ownership, single- and multi-threaded

pub mod aggregate;
pub mod column;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod events;
pub mod group;
pub mod order;
pub mod provider;
pub mod ranking;
pub mod shared;
pub mod stats;

pub use aggregate::{AggregationOverrides, AggregationPolicy, ThresholdPolicy};
pub use column::{
    Categorical, Category, Column, ColumnFilter, ColumnId, ColumnKind, ColumnTree, FlatColumn, Numeric,
    RankingId, RowRef, StackContribution,
};
pub use config::{GroupMeta, GroupOrdering, LayoutOptions, MissingPlacement, RankingConfig};
pub use descriptor::{CategoryDesc, ColumnDesc, ColumnPath, ColumnType, RankingDesc, SortDesc};
pub use error::{ConfigError, EngineError, Result};
pub use events::{ChangeReason, ColumnChange, ProviderEvent, RankingEvent};
pub use group::{Group, GroupExtent, GroupNode, GroupSegment, Groups};
pub use order::{Order, SortCriterion, SortKey};
pub use provider::{DataProvider, FetchedRow, SessionDump};
pub use ranking::{Phase, Ranking, RankingState};
pub use shared::{ProviderSnapshot, RankingSnapshot, SharedProvider};
pub use stats::{
    BoxPlot, BoxPlotSummary, CategoricalSummary, CategoryBin, HistogramBin, NumericSummary, SubsetId, SubsetSlot,
    SubsetStats, Summary, SummaryKind,
};

// The data layer is part of the public surface.
pub use lineup_data;
