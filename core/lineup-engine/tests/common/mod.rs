//! FILENAME: tests/common/mod.rs
//! Test harness and fixtures for lineup-engine integration tests.

#![allow(dead_code)]

use lineup_engine::lineup_data::{Row, RowStore, RowValue};
use lineup_engine::{ColumnDesc, ColumnId, DataProvider, RankingDesc, RankingId};

/// Test harness wrapping a provider with one ranking.
pub struct TestHarness {
    pub provider: DataProvider,
    pub ranking: RankingId,
}

impl TestHarness {
    /// Provider over `rows` with one ranking built from `columns`.
    pub fn new(rows: Vec<Row>, columns: Vec<ColumnDesc>) -> Self {
        let mut provider = DataProvider::new(RowStore::from_rows(rows));
        let ranking = provider
            .add_ranking(&RankingDesc::new(columns))
            .expect("fixture ranking builds");
        TestHarness { provider, ranking }
    }

    /// Five rows: `score` = [3, 1, missing, 1, 2], `kind` = [X, X, Y, X, Y],
    /// `name` = [a, b, c, d, e]. Columns: name, score, kind.
    pub fn with_sample_data() -> Self {
        Self::new(sample_rows(), sample_columns())
    }

    /// `n` rows with a numeric `value`, a two-way `bucket` and a `name`.
    pub fn with_large_data(n: u32) -> Self {
        let rows = (0..n)
            .map(|i| {
                Row::new()
                    .with("value", ((i * 7919) % 1000) as f64)
                    .with("bucket", if i % 2 == 0 { "even" } else { "odd" })
                    .with("name", format!("row {}", i))
            })
            .collect();
        Self::new(
            rows,
            vec![
                ColumnDesc::string("name"),
                ColumnDesc::number("value"),
                ColumnDesc::categorical("bucket", ["even", "odd"]),
            ],
        )
    }

    /// Top-level column at `index`.
    pub fn column(&self, index: usize) -> ColumnId {
        self.provider.ranking(self.ranking).unwrap().children()[index]
    }

    pub fn order(&self) -> Vec<u32> {
        self.provider
            .ranking(self.ranking)
            .unwrap()
            .order()
            .indices()
            .to_vec()
    }

    /// Names and row indices of the leaf groups.
    pub fn groups(&self) -> Vec<(String, Vec<u32>)> {
        self.provider
            .ranking(self.ranking)
            .unwrap()
            .groups()
            .leaves()
            .iter()
            .map(|g| (g.name.clone(), g.order.indices().to_vec()))
            .collect()
    }
}

pub fn sample_rows() -> Vec<Row> {
    let scores = [Some(3.0), Some(1.0), None, Some(1.0), Some(2.0)];
    let kinds = ["X", "X", "Y", "X", "Y"];
    let names = ["a", "b", "c", "d", "e"];
    scores
        .iter()
        .zip(kinds)
        .zip(names)
        .map(|((score, kind), name)| {
            Row::new()
                .with("score", RowValue::from(*score))
                .with("kind", kind)
                .with("name", name)
        })
        .collect()
}

pub fn sample_columns() -> Vec<ColumnDesc> {
    vec![
        ColumnDesc::string("name"),
        ColumnDesc::number("score"),
        ColumnDesc::categorical("kind", ["X", "Y"]),
    ]
}
