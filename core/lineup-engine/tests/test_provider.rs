//! FILENAME: tests/test_provider.rs
//! PURPOSE: Tests for the provider: lazy rows, selection, events and sharing.

mod common;

use std::sync::Arc;
use std::thread;

use common::TestHarness;
use lineup_engine::lineup_data::{drain, Row};
use lineup_engine::{ColumnDesc, EngineError, FetchedRow, ProviderEvent, RankingDesc, SharedProvider};
use pretty_assertions::assert_eq;

fn sorted_by_score() -> TestHarness {
    let mut harness = TestHarness::with_sample_data();
    let score = harness.column(1);
    harness
        .provider
        .ranking_mut(harness.ranking)
        .unwrap()
        .sort_by(score, true, false)
        .unwrap();
    harness.provider.refresh();
    harness
}

fn with_selection_column() -> TestHarness {
    let mut columns = common::sample_columns();
    columns.push(ColumnDesc::selection());
    let mut harness = TestHarness::new(common::sample_rows(), columns);
    let selection = harness.column(3);
    harness
        .provider
        .ranking_mut(harness.ranking)
        .unwrap()
        .sort_by(selection, true, false)
        .unwrap();
    harness.provider.refresh();
    harness
}

// ============================================================================
// LAZY ROWS
// ============================================================================

#[test]
fn test_pending_row_resolves_into_order() {
    let mut harness = sorted_by_score();
    let pending = harness.provider.push_pending();
    harness.provider.refresh();

    // unresolved rows read as missing and trail
    assert_eq!(harness.order(), vec![1, 3, 4, 0, 2, 5]);
    let order = harness.order();
    let fetched = harness.provider.fetch(&[&order]);
    assert_eq!(fetched[0][5], FetchedRow::Pending);
    assert!(matches!(fetched[0][0], FetchedRow::Ready(_)));

    harness
        .provider
        .resolve_row(
            pending,
            Row::new().with("score", 0.0).with("kind", "X").with("name", "f"),
        )
        .unwrap();
    harness.provider.refresh();

    assert_eq!(harness.order(), vec![5, 1, 3, 4, 0, 2]);
}

#[test]
fn test_resolving_twice_is_an_error() {
    let mut harness = TestHarness::with_sample_data();
    let pending = harness.provider.push_pending();
    harness.provider.resolve_row(pending, Row::new()).unwrap();

    assert!(matches!(
        harness.provider.resolve_row(pending, Row::new()),
        Err(EngineError::Data(_))
    ));
    assert!(harness.provider.set_value(99, "score", 1.0).is_err());
}

#[test]
fn test_fetch_keeps_request_shape() {
    let harness = TestHarness::with_sample_data();
    let first: &[u32] = &[4, 0];
    let second: &[u32] = &[2];

    let fetched = harness.provider.fetch(&[first, second]);

    assert_eq!(fetched.len(), 2);
    assert_eq!(fetched[0].len(), 2);
    match fetched[0][0] {
        FetchedRow::Ready(row) => assert_eq!(row.get("name").display(), "e"),
        FetchedRow::Pending => panic!("row 4 is resolved"),
    }
    assert_eq!(fetched[1].len(), 1);
}

// ============================================================================
// EVENTS
// ============================================================================

#[test]
fn test_provider_events() {
    let mut harness = sorted_by_score();
    let events = harness.provider.subscribe();

    harness.provider.push_row(Row::new().with("score", 9.0));
    let published = harness.provider.refresh();

    assert_eq!(published, vec![harness.ranking]);
    let generation = harness.provider.ranking(harness.ranking).unwrap().generation();
    assert_eq!(
        drain(&events),
        vec![
            ProviderEvent::DataDirty,
            ProviderEvent::OrderChanged {
                ranking: harness.ranking,
                generation
            },
        ]
    );
}

#[test]
fn test_remove_ranking() {
    let mut harness = TestHarness::with_sample_data();
    let events = harness.provider.subscribe();

    harness.provider.remove_ranking(harness.ranking).unwrap();

    assert!(matches!(
        harness.provider.ranking(harness.ranking),
        Err(EngineError::UnknownRanking(_))
    ));
    assert!(harness.provider.remove_ranking(harness.ranking).is_err());
    assert_eq!(
        drain(&events),
        vec![ProviderEvent::RankingRemoved {
            ranking: harness.ranking
        }]
    );
}

// ============================================================================
// SELECTION
// ============================================================================

#[test]
fn test_selection_sorts_selected_first() {
    let mut harness = with_selection_column();

    harness.provider.set_selection([3, 4]);
    harness.provider.refresh();

    assert_eq!(harness.order(), vec![3, 4, 0, 1, 2]);
}

#[test]
fn test_selection_only_refreshes_dependent_rankings() {
    let mut harness = with_selection_column();
    let other = harness
        .provider
        .add_ranking(&RankingDesc::new(common::sample_columns()))
        .unwrap();
    harness.provider.refresh();
    let events = harness.provider.subscribe();

    assert!(harness.provider.toggle_selection(2, false));
    assert_eq!(harness.provider.refresh(), vec![harness.ranking]);

    assert_eq!(harness.order(), vec![2, 0, 1, 3, 4]);
    assert!(!harness.provider.ranking(other).unwrap().is_dirty());
    assert_eq!(
        drain(&events)[0],
        ProviderEvent::SelectionChanged { selected: vec![2] }
    );
}

#[test]
fn test_select_group() {
    let mut harness = sorted_by_score();
    let kind = harness.column(2);
    harness
        .provider
        .ranking_mut(harness.ranking)
        .unwrap()
        .group_by(vec![kind])
        .unwrap();
    harness.provider.refresh();

    assert!(harness
        .provider
        .set_group_selected(harness.ranking, 1, true)
        .unwrap());
    assert_eq!(harness.provider.selection().indices().collect::<Vec<_>>(), vec![2, 4]);

    assert!(harness
        .provider
        .set_group_selected(harness.ranking, 1, false)
        .unwrap());
    assert!(harness.provider.selection().is_empty());

    assert!(matches!(
        harness.provider.set_group_selected(harness.ranking, 7, true),
        Err(EngineError::InvalidIndex { index: 7, len: 2 })
    ));
}

#[test]
fn test_select_all_skips_pending_rows() {
    let mut harness = TestHarness::with_sample_data();
    harness.provider.push_pending();

    harness.provider.select_all();

    assert_eq!(harness.provider.selection().len(), 5);
    harness.provider.clear_selection();
    assert!(harness.provider.selection().is_empty());
}

// ============================================================================
// SHARED ACCESS
// ============================================================================

#[test]
fn test_shared_snapshot_is_consistent() {
    let harness = sorted_by_score();
    let ranking = harness.ranking;
    let shared = Arc::new(SharedProvider::new(harness.provider));

    let writer = {
        let shared = Arc::clone(&shared);
        thread::spawn(move || {
            for i in 0..10 {
                shared.update(|p| p.push_row(Row::new().with("score", i as f64).with("kind", "Y")));
                shared.request_refresh();
            }
        })
    };
    for _ in 0..10 {
        let snapshot = shared.snapshot();
        let published = snapshot.ranking(ranking).unwrap();
        assert_eq!(published.groups.generation(), published.order.generation());
        assert_eq!(published.order.len(), snapshot.rows);
    }
    writer.join().unwrap();
    shared.request_refresh();

    let snapshot = shared.snapshot();
    assert_eq!(snapshot.rows, 15);
    assert_eq!(snapshot.ranking(ranking).unwrap().order.len(), 15);
}
