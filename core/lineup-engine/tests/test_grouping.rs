//! FILENAME: tests/test_grouping.rs
//! PURPOSE: Tests for grouping, group layout and aggregation decisions.

mod common;

use common::TestHarness;
use lineup_engine::lineup_data::RowStore;
use lineup_engine::{ColumnDesc, DataProvider, EngineError, GroupOrdering, RankingConfig, RankingDesc};
use pretty_assertions::assert_eq;

fn sorted_and_grouped_by_kind() -> TestHarness {
    let mut harness = TestHarness::with_sample_data();
    let (score, kind) = (harness.column(1), harness.column(2));
    let ranking = harness.provider.ranking_mut(harness.ranking).unwrap();
    ranking.sort_by(score, true, false).unwrap();
    ranking.group_by(vec![kind]).unwrap();
    harness.provider.refresh();
    harness
}

// ============================================================================
// PARTITIONING
// ============================================================================

#[test]
fn test_group_by_category_after_sorting() {
    let harness = sorted_and_grouped_by_kind();

    assert_eq!(
        harness.groups(),
        vec![
            ("X".to_string(), vec![1, 3, 0]),
            ("Y".to_string(), vec![4, 2]),
        ]
    );
}

#[test]
fn test_groups_partition_the_order() {
    let harness = sorted_and_grouped_by_kind();

    let concatenated: Vec<u32> = harness.groups().into_iter().flat_map(|(_, rows)| rows).collect();
    assert_eq!(concatenated, harness.order());
    assert_eq!(harness.order(), vec![1, 3, 0, 4, 2]);
}

#[test]
fn test_no_criteria_gives_default_group() {
    let mut harness = TestHarness::with_sample_data();
    harness.provider.refresh();

    assert_eq!(harness.groups(), vec![("Default".to_string(), vec![0, 1, 2, 3, 4])]);
}

#[test]
fn test_numeric_grouping_puts_missing_last() {
    let mut harness = TestHarness::with_sample_data();
    let score = harness.column(1);
    harness
        .provider
        .ranking_mut(harness.ranking)
        .unwrap()
        .group_by(vec![score])
        .unwrap();
    harness.provider.refresh();

    assert_eq!(
        harness.groups(),
        vec![
            ("3".to_string(), vec![0]),
            ("1".to_string(), vec![1, 3]),
            ("2".to_string(), vec![4]),
            ("Missing values".to_string(), vec![2]),
        ]
    );
}

#[test]
fn test_nested_grouping_names() {
    let mut harness = TestHarness::with_sample_data();
    let (name, kind) = (harness.column(0), harness.column(2));
    harness
        .provider
        .ranking_mut(harness.ranking)
        .unwrap()
        .group_by(vec![kind, name])
        .unwrap();
    harness.provider.refresh();

    let groups = harness.provider.ranking(harness.ranking).unwrap().groups().clone();
    let names: Vec<&str> = groups.leaves().iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["X ∩ a", "X ∩ b", "X ∩ d", "Y ∩ c", "Y ∩ e"]);
    assert_eq!(groups.tree().len(), 2);
    assert_eq!(groups.tree()[0].size, 3);
    assert_eq!(groups.leaves()[3].path, vec!["Y".to_string(), "c".to_string()]);
    assert_eq!(groups.leaves()[3].depth, 1);
}

#[test]
fn test_explicit_group_ordering() {
    let config = RankingConfig {
        group_ordering: GroupOrdering::Explicit(vec!["Y".to_string()]),
        ..Default::default()
    };
    let mut provider = DataProvider::with_config(RowStore::from_rows(common::sample_rows()), config);
    let id = provider
        .add_ranking(&RankingDesc::new(common::sample_columns()))
        .unwrap();
    let kind = provider.ranking(id).unwrap().children()[2];
    provider.ranking_mut(id).unwrap().group_by(vec![kind]).unwrap();
    provider.refresh();

    let names: Vec<String> = provider
        .ranking(id)
        .unwrap()
        .groups()
        .leaves()
        .iter()
        .map(|g| g.name.clone())
        .collect();
    assert_eq!(names, vec!["Y", "X"]);
}

#[test]
fn test_nested_column_is_not_groupable() {
    let mut harness = TestHarness::new(
        common::sample_rows(),
        vec![ColumnDesc::nested(vec![ColumnDesc::string("name"), ColumnDesc::number("score")])],
    );
    let nested = harness.column(0);
    let result = harness
        .provider
        .ranking_mut(harness.ranking)
        .unwrap()
        .group_by(vec![nested]);

    assert!(matches!(result, Err(EngineError::NotGroupable(_))));
}

#[test]
fn test_regroup_keeps_order() {
    let mut harness = sorted_and_grouped_by_kind();
    let before = harness.order();
    let generation = harness.provider.ranking(harness.ranking).unwrap().generation();

    harness
        .provider
        .ranking_mut(harness.ranking)
        .unwrap()
        .group_by(Vec::new())
        .unwrap();
    harness.provider.refresh();

    let ranking = harness.provider.ranking(harness.ranking).unwrap();
    // the sorted order comes back without the grouped arrangement
    assert_eq!(before, vec![1, 3, 0, 4, 2]);
    assert_eq!(harness.order(), vec![1, 3, 4, 0, 2]);
    assert!(ranking.generation() > generation);
    assert_eq!(ranking.groups().generation(), ranking.order().generation());
    assert_eq!(ranking.groups().len(), 1);
}

// ============================================================================
// LAYOUT AND AGGREGATION
// ============================================================================

#[test]
fn test_group_layout() {
    let harness = sorted_and_grouped_by_kind();
    let layout = harness.provider.ranking(harness.ranking).unwrap().group_layout();

    assert_eq!(layout.len(), 2);
    assert_eq!(layout[0].y, 0.0);
    assert_eq!(layout[0].height, 60.0);
    assert!(!layout[0].aggregated);
    // three rows of 20 plus one unit of padding
    assert_eq!(layout[1].y, 61.0);
    assert_eq!(layout[1].height, 40.0);
}

#[test]
fn test_threshold_aggregates_small_groups() {
    let config = RankingConfig {
        aggregation_threshold: 3,
        ..Default::default()
    };
    let mut provider = DataProvider::with_config(RowStore::from_rows(common::sample_rows()), config);
    let id = provider
        .add_ranking(&RankingDesc::new(common::sample_columns()))
        .unwrap();
    let kind = provider.ranking(id).unwrap().children()[2];
    provider.ranking_mut(id).unwrap().group_by(vec![kind]).unwrap();
    provider.refresh();

    assert!(!provider.is_aggregated(id, 0).unwrap());
    assert!(provider.is_aggregated(id, 1).unwrap());

    let layout = provider.ranking(id).unwrap().group_layout();
    assert_eq!(layout[1].height, 100.0);
}

#[test]
fn test_explicit_aggregation_overrides_policy() {
    let mut harness = sorted_and_grouped_by_kind();
    let events = harness
        .provider
        .ranking_mut(harness.ranking)
        .unwrap()
        .subscribe();

    assert!(harness.provider.set_aggregated(harness.ranking, 0, true).unwrap());
    assert!(!harness.provider.set_aggregated(harness.ranking, 0, true).unwrap());
    assert!(harness.provider.is_aggregated(harness.ranking, 0).unwrap());
    assert!(!harness.provider.is_aggregated(harness.ranking, 1).unwrap());

    let received: Vec<_> = events.try_iter().collect();
    assert_eq!(received.len(), 1);

    let layout = harness.provider.ranking(harness.ranking).unwrap().group_layout();
    assert!(layout[0].aggregated);
    assert_eq!(layout[0].height, 100.0);
}

#[test]
fn test_aggregation_override_ignores_shared_labels() {
    let columns = vec![
        ColumnDesc::string("name"),
        serde_json::from_str(
            r#"{"type": "categorical", "column": "kind", "categories": [
                {"name": "X", "label": "Missing values"},
                {"name": "Y", "label": "Missing values"}
            ]}"#,
        )
        .unwrap(),
        ColumnDesc::number("score"),
    ];
    let mut harness = TestHarness::new(common::sample_rows(), columns);
    let (kind, score) = (harness.column(1), harness.column(2));
    harness
        .provider
        .ranking_mut(harness.ranking)
        .unwrap()
        .group_by(vec![kind])
        .unwrap();
    harness.provider.refresh();
    assert_eq!(harness.groups().len(), 2);

    assert!(harness.provider.set_aggregated(harness.ranking, 0, true).unwrap());

    assert!(harness.provider.is_aggregated(harness.ranking, 0).unwrap());
    assert!(!harness.provider.is_aggregated(harness.ranking, 1).unwrap());

    // the decision follows the category through regrouping
    harness
        .provider
        .ranking_mut(harness.ranking)
        .unwrap()
        .group_by(vec![score])
        .unwrap();
    harness.provider.refresh();
    assert!(harness.provider.ranking(harness.ranking).unwrap().groups().len() > 2);
    harness
        .provider
        .ranking_mut(harness.ranking)
        .unwrap()
        .group_by(vec![kind])
        .unwrap();
    harness.provider.refresh();
    assert!(harness.provider.is_aggregated(harness.ranking, 0).unwrap());
    assert!(!harness.provider.is_aggregated(harness.ranking, 1).unwrap());
}
