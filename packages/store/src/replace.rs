//! # Replace engine — user-scoped delete-then-insert over an abstract table store
//!
//! [`ReplaceEngine`] swaps every row a user owns in a table for a new set of rows
//! while leaving the header and every other user's rows untouched. All reads and
//! writes go through the [`TableStore`] trait, so the same logic runs against the
//! Google Sheets adapter in the `api` crate and against [`crate::MemoryStore`].
//!
//! ## [`TableStore`] trait
//!
//! Three whole-table primitives: `read_all`, `write_all` (full overwrite, not a
//! merge, told the [`Extent`] the table had before) and `append_rows` (no-op on
//! an empty batch). There is no row-level
//! update; an update is a delete followed by an insert.
//!
//! ## Algorithm (per table)
//!
//! 1. Read the full table.
//! 2. Keep the header and every data row whose owner differs from the user.
//! 3. If nothing was removed, skip the write.
//! 4. Otherwise overwrite the table with the kept rows.
//! 5. Append the new rows.
//!
//! Steps 1–4 always complete before step 5 for the same table. A failure in any
//! step stops that table; rows are never appended onto a table whose clear failed.
//!
//! ## Dataset operations
//!
//! | Method | Description |
//! |--------|-------------|
//! | [`replace_user_data`](ReplaceEngine::replace_user_data) | One table, by sheet name. |
//! | [`replace_user_dataset`](ReplaceEngine::replace_user_dataset) | All four tables concurrently; returns a [`SaveReport`] with per-table outcomes. |
//! | [`load_user_dataset`](ReplaceEngine::load_user_dataset) | Reads all four tables and decodes the user's rows. |
//!
//! Tables share no rows, so they are processed concurrently. There is no
//! cross-table atomicity unless [`ReplacePolicy::compensate`] is set, in which
//! case a failed save writes every already-mutated table back to its snapshot.

use std::future::Future;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::{DatasetConfig, ReplacePolicy};
use crate::error::{ReplaceError, StoreError};
use crate::models::{row_owner, Row, TableKind, UserDataset};

/// Async trait for reading and writing whole tables.
pub trait TableStore {
    /// All rows of `table`, header first. Empty when the table has no content.
    fn read_all(&self, table: &str)
        -> impl Future<Output = Result<Vec<Row>, StoreError>> + Send;

    /// Overwrite `table` with exactly `rows`, in order. Every cell inside
    /// `previous` that `rows` does not cover must end up blank.
    fn write_all(
        &self,
        table: &str,
        rows: &[Row],
        previous: Extent,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Insert `rows` after the last row of `table`. Must not touch the store
    /// when `rows` is empty.
    fn append_rows(
        &self,
        table: &str,
        rows: &[Row],
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Rows and columns a table occupies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Extent {
    pub rows: usize,
    pub cols: usize,
}

impl Extent {
    pub fn of(rows: &[Row]) -> Self {
        Self {
            rows: rows.len(),
            cols: rows.iter().map(Vec::len).max().unwrap_or(0),
        }
    }

    /// Smallest extent covering both.
    pub fn union(self, other: Extent) -> Self {
        Self {
            rows: self.rows.max(other.rows),
            cols: self.cols.max(other.cols),
        }
    }
}

/// Outcome of a successful single-table replace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplaceSummary {
    pub table: String,
    /// Data rows of the user that were removed.
    pub removed: usize,
    /// Rows appended.
    pub appended: usize,
    /// Whether the table was overwritten (false when nothing had to be cleared).
    pub rewritten: bool,
}

/// A table whose replace did not complete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableFailure {
    pub table: String,
    pub error: ReplaceError,
}

/// Per-table outcomes of a dataset save.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub replaced: Vec<ReplaceSummary>,
    pub failed: Vec<TableFailure>,
    /// Tables written back to their pre-save snapshot.
    pub restored: Vec<String>,
}

impl SaveReport {
    /// True when every table was replaced.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_tables(&self) -> Vec<String> {
        self.failed.iter().map(|f| f.table.clone()).collect()
    }
}

/// One table's attempt, with what is needed to undo it.
struct Attempt {
    table: String,
    snapshot: Option<Vec<Row>>,
    /// Everything this attempt may have written, for overwriting on restore.
    extent: Extent,
    mutated: bool,
    result: Result<ReplaceSummary, ReplaceError>,
}

/// Split `current` into the rows to keep and the number of `user_id` rows dropped.
/// Row 0 is the header and is always kept.
fn without_user(current: &[Row], user_id: &str) -> (Vec<Row>, usize) {
    let mut keep = Vec::with_capacity(current.len());
    let mut removed = 0;
    for (index, row) in current.iter().enumerate() {
        if index > 0 && row_owner(row).as_deref() == Some(user_id) {
            removed += 1;
        } else {
            keep.push(row.clone());
        }
    }
    (keep, removed)
}

/// User-scoped replace over a [`TableStore`].
pub struct ReplaceEngine<'a, S> {
    store: &'a S,
    dataset: &'a DatasetConfig,
    policy: ReplacePolicy,
}

impl<'a, S: TableStore + Sync> ReplaceEngine<'a, S> {
    pub fn new(store: &'a S, dataset: &'a DatasetConfig) -> Self {
        Self {
            store,
            dataset,
            policy: ReplacePolicy::default(),
        }
    }

    /// Builder method to set the engine's policy.
    pub fn with_policy(mut self, policy: ReplacePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace every row `user_id` owns in `table` with `new_rows`.
    pub async fn replace_user_data(
        &self,
        table: &str,
        user_id: &str,
        new_rows: &[Row],
    ) -> Result<ReplaceSummary, ReplaceError> {
        let attempt = self.attempt(table, None, user_id, new_rows).await;
        if attempt.result.is_err() && self.policy.compensate {
            self.restore(&attempt).await;
        }
        attempt.result
    }

    /// Replace the user's rows in all four tables with `data`.
    ///
    /// Tables run concurrently. A failed table is reported in the returned
    /// [`SaveReport`]; the other tables still complete.
    pub async fn replace_user_dataset(&self, user_id: &str, data: &UserDataset) -> SaveReport {
        let attempts = join_all(TableKind::ALL.into_iter().map(|kind| {
            let rows = data.rows_for(kind, user_id);
            async move {
                self.attempt(self.dataset.sheet(kind), Some(kind.header()), user_id, &rows)
                    .await
            }
        }))
        .await;

        let mut report = SaveReport::default();
        let any_failed = attempts.iter().any(|a| a.result.is_err());

        if any_failed && self.policy.compensate {
            for attempt in attempts.iter().filter(|a| a.mutated) {
                if self.restore(attempt).await {
                    report.restored.push(attempt.table.clone());
                }
            }
        }

        for attempt in attempts {
            match attempt.result {
                Ok(summary) => report.replaced.push(summary),
                Err(error) => report.failed.push(TableFailure {
                    table: attempt.table,
                    error,
                }),
            }
        }

        info!(
            user_id,
            replaced = report.replaced.len(),
            failed = report.failed.len(),
            restored = report.restored.len(),
            "dataset replace finished"
        );
        report
    }

    /// Read all four tables and decode the rows `user_id` owns.
    pub async fn load_user_dataset(&self, user_id: &str) -> Result<UserDataset, ReplaceError> {
        let tables = join_all(TableKind::ALL.into_iter().map(|kind| async move {
            let rows = self.store.read_all(self.dataset.sheet(kind)).await;
            (kind, rows)
        }))
        .await;

        let mut data = UserDataset::default();
        for (kind, rows) in tables {
            let rows = rows.map_err(ReplaceError::Read)?;
            for row in rows.iter().skip(1) {
                if row_owner(row).as_deref() == Some(user_id) {
                    data.push_row(kind, row);
                }
            }
        }
        Ok(data)
    }

    /// Run steps 1–5 for one table. `header` seeds a table that has no content at all.
    async fn attempt(
        &self,
        table: &str,
        header: Option<Row>,
        user_id: &str,
        new_rows: &[Row],
    ) -> Attempt {
        let mut attempt = Attempt {
            table: table.to_string(),
            snapshot: None,
            extent: Extent::default(),
            mutated: false,
            result: Err(ReplaceError::Read(StoreError::read(table, "not started"))),
        };

        let current = match self.store.read_all(table).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(table, user_id, error = %e, "abandoning table replace");
                attempt.result = Err(ReplaceError::Read(e));
                return attempt;
            }
        };

        attempt.extent = Extent::of(&current);
        let (mut keep, removed) = without_user(&current, user_id);
        if current.is_empty() {
            keep.extend(header);
        }

        let rewritten = keep.len() != current.len();
        if rewritten {
            attempt.mutated = true;
            if let Err(e) = self.store.write_all(table, &keep, attempt.extent).await {
                warn!(table, user_id, error = %e, "abandoning table replace");
                attempt.snapshot = Some(current);
                attempt.result = Err(ReplaceError::Clear(e));
                return attempt;
            }
        } else {
            debug!(table, user_id, "no rows to clear, skipping write");
        }

        attempt.mutated |= !new_rows.is_empty();
        attempt.extent = attempt.extent.union(Extent {
            rows: keep.len() + new_rows.len(),
            cols: Extent::of(&keep).cols.max(Extent::of(new_rows).cols),
        });
        attempt.snapshot = Some(current);
        if let Err(e) = self.store.append_rows(table, new_rows).await {
            warn!(table, user_id, error = %e, "append failed after clear");
            attempt.result = Err(ReplaceError::Append(e));
            return attempt;
        }

        debug!(table, user_id, removed, appended = new_rows.len(), "table replaced");
        attempt.result = Ok(ReplaceSummary {
            table: table.to_string(),
            removed,
            appended: new_rows.len(),
            rewritten,
        });
        attempt
    }

    /// Write a mutated table back to its snapshot. Returns whether it succeeded.
    async fn restore(&self, attempt: &Attempt) -> bool {
        let Some(snapshot) = attempt.snapshot.as_ref().filter(|_| attempt.mutated) else {
            return false;
        };
        match self
            .store
            .write_all(&attempt.table, snapshot, attempt.extent)
            .await {
            Ok(()) => {
                info!(table = %attempt.table, "restored table snapshot");
                true
            }
            Err(e) => {
                warn!(table = %attempt.table, error = %e, "failed to restore table snapshot");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::models::{AnnualOccurrence, Cell, UsedHoliday, WeekendSubHoliday};

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|&c| Cell::from(c)).collect()
    }

    fn user_date_table() -> Vec<Row> {
        vec![
            row(&["userId", "date"]),
            row(&["u1", "2024-01-01"]),
            row(&["u2", "2024-02-02"]),
        ]
    }

    #[tokio::test]
    async fn test_replace_moves_user_rows_after_kept_prefix() {
        let store = MemoryStore::new();
        store.insert_table("T", user_date_table());
        let dataset = DatasetConfig::default();
        let engine = ReplaceEngine::new(&store, &dataset);

        let summary = engine
            .replace_user_data("T", "u1", &[row(&["u1", "2024-03-03"])])
            .await
            .unwrap();

        assert_eq!(
            store.table("T"),
            vec![
                row(&["userId", "date"]),
                row(&["u2", "2024-02-02"]),
                row(&["u1", "2024-03-03"]),
            ]
        );
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.appended, 1);
        assert!(summary.rewritten);
    }

    #[tokio::test]
    async fn test_replace_is_idempotent() {
        let store = MemoryStore::new();
        store.insert_table("T", user_date_table());
        let dataset = DatasetConfig::default();
        let engine = ReplaceEngine::new(&store, &dataset);
        let rows = vec![row(&["u1", "2024-03-03"]), row(&["u1", "2024-04-04"])];

        engine.replace_user_data("T", "u1", &rows).await.unwrap();
        let once = store.table("T");
        engine.replace_user_data("T", "u1", &rows).await.unwrap();

        assert_eq!(store.table("T"), once);
    }

    #[tokio::test]
    async fn test_replace_leaves_other_users_untouched() {
        let store = MemoryStore::new();
        store.insert_table(
            "T",
            vec![
                row(&["userId", "date"]),
                row(&["u2", "2024-02-02"]),
                row(&["u1", "2024-01-01"]),
                row(&["u3", "2024-05-05"]),
                row(&["u2", "2024-06-06"]),
            ],
        );
        let dataset = DatasetConfig::default();
        let engine = ReplaceEngine::new(&store, &dataset);

        engine.replace_user_data("T", "u1", &[]).await.unwrap();

        let others: Vec<Row> = store
            .table("T")
            .into_iter()
            .skip(1)
            .filter(|r| row_owner(r).as_deref() != Some("u1"))
            .collect();
        assert_eq!(
            others,
            vec![
                row(&["u2", "2024-02-02"]),
                row(&["u3", "2024-05-05"]),
                row(&["u2", "2024-06-06"]),
            ]
        );
        assert_eq!(store.table("T").len(), 4);
    }

    #[tokio::test]
    async fn test_header_with_user_id_label_is_kept() {
        let store = MemoryStore::new();
        store.insert_table("T", vec![row(&["u1", "date"]), row(&["u1", "2024-01-01"])]);
        let dataset = DatasetConfig::default();
        let engine = ReplaceEngine::new(&store, &dataset);

        engine.replace_user_data("T", "u1", &[]).await.unwrap();

        assert_eq!(store.table("T"), vec![row(&["u1", "date"])]);
    }

    #[tokio::test]
    async fn test_skips_write_when_nothing_removed() {
        let store = MemoryStore::new();
        store.insert_table("T", user_date_table());
        let dataset = DatasetConfig::default();
        let engine = ReplaceEngine::new(&store, &dataset);

        let summary = engine
            .replace_user_data("T", "u9", &[row(&["u9", "2024-07-07"])])
            .await
            .unwrap();

        assert!(!summary.rewritten);
        assert_eq!(store.writes(), 0);
        assert_eq!(store.appends(), 1);
        assert_eq!(store.table("T").len(), 4);
    }

    #[tokio::test]
    async fn test_empty_replacement_issues_no_append() {
        let store = MemoryStore::new();
        store.insert_table("T", user_date_table());
        let dataset = DatasetConfig::default();
        let engine = ReplaceEngine::new(&store, &dataset);

        engine.replace_user_data("T", "u9", &[]).await.unwrap();

        assert_eq!(store.writes(), 0);
        assert_eq!(store.appends(), 0);
    }

    #[tokio::test]
    async fn test_failed_read_abandons_table() {
        let store = MemoryStore::new();
        store.insert_table("T", user_date_table());
        store.fail_reads("T");
        let dataset = DatasetConfig::default();
        let engine = ReplaceEngine::new(&store, &dataset);

        let err = engine
            .replace_user_data("T", "u1", &[row(&["u1", "2024-03-03"])])
            .await
            .unwrap_err();

        assert!(matches!(err, ReplaceError::Read(_)));
        assert_eq!(store.appends(), 0);
        assert_eq!(store.table("T"), user_date_table());
    }

    #[tokio::test]
    async fn test_failed_clear_does_not_append() {
        let store = MemoryStore::new();
        store.insert_table("T", user_date_table());
        store.fail_writes("T");
        let dataset = DatasetConfig::default();
        let engine = ReplaceEngine::new(&store, &dataset);

        let err = engine
            .replace_user_data("T", "u1", &[row(&["u1", "2024-03-03"])])
            .await
            .unwrap_err();

        assert!(matches!(err, ReplaceError::Clear(_)));
        assert_eq!(store.table("T"), user_date_table());
    }

    fn sample_dataset() -> UserDataset {
        UserDataset {
            annual_occurrences: vec![AnnualOccurrence {
                id: "a1".into(),
                date: "2024-01-01".into(),
                remaining: 15.into(),
            }],
            weekend_sub_holidays: vec![WeekendSubHoliday {
                date: "2024-03-02".into(),
                weekday: "Sat".into(),
            }],
            used_holidays: vec![UsedHoliday {
                date: "2024-04-01".into(),
                weekday: "Mon".into(),
                amount: 1.into(),
            }],
            used_sub_holidays: vec![],
        }
    }

    #[tokio::test]
    async fn test_dataset_replace_seeds_headers_on_empty_sheets() {
        let store = MemoryStore::new();
        let dataset = DatasetConfig::default();
        let engine = ReplaceEngine::new(&store, &dataset);

        let report = engine.replace_user_dataset("u1", &sample_dataset()).await;

        assert!(report.is_complete());
        let annual = store.table("AnnualOccurrences");
        assert_eq!(annual[0], TableKind::AnnualOccurrences.header());
        assert_eq!(
            annual[1],
            vec![
                Cell::from("u1"),
                Cell::from("a1"),
                Cell::from("2024-01-01"),
                Cell::from(15_i64),
            ]
        );
        assert_eq!(
            store.table("UsedSubHolidays"),
            vec![TableKind::UsedSubHolidays.header()]
        );
    }

    #[tokio::test]
    async fn test_dataset_round_trips_through_load() {
        let store = MemoryStore::new();
        let dataset = DatasetConfig::default();
        let engine = ReplaceEngine::new(&store, &dataset);

        engine.replace_user_dataset("u1", &sample_dataset()).await;
        engine.replace_user_dataset("u2", &UserDataset::default()).await;

        assert_eq!(engine.load_user_dataset("u1").await.unwrap(), sample_dataset());
        assert!(engine.load_user_dataset("u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_table_does_not_stop_others() {
        let store = MemoryStore::new();
        store.fail_reads("WeekendSubHolidays");
        let dataset = DatasetConfig::default();
        let engine = ReplaceEngine::new(&store, &dataset);

        let report = engine.replace_user_dataset("u1", &sample_dataset()).await;

        assert!(!report.is_complete());
        assert_eq!(report.failed_tables(), vec!["WeekendSubHolidays".to_string()]);
        assert_eq!(report.replaced.len(), 3);
        assert!(report.restored.is_empty());
        assert_eq!(store.table("UsedHolidays").len(), 2);
    }

    #[tokio::test]
    async fn test_compensation_restores_mutated_tables() {
        let store = MemoryStore::new();
        store.insert_table(
            "AnnualOccurrences",
            vec![
                TableKind::AnnualOccurrences.header(),
                vec![
                    Cell::from("u1"),
                    Cell::from("old"),
                    Cell::from("2023-01-01"),
                    Cell::from(3_i64),
                ],
            ],
        );
        store.fail_reads("UsedHolidays");
        let before = store.table("AnnualOccurrences");
        let dataset = DatasetConfig::default();
        let engine = ReplaceEngine::new(&store, &dataset)
            .with_policy(ReplacePolicy { compensate: true });

        let report = engine.replace_user_dataset("u1", &sample_dataset()).await;

        assert_eq!(report.failed_tables(), vec!["UsedHolidays".to_string()]);
        assert!(report.restored.contains(&"AnnualOccurrences".to_string()));
        assert_eq!(store.table("AnnualOccurrences"), before);
    }

    #[tokio::test]
    async fn test_overwrite_is_told_previous_extent() {
        let store = MemoryStore::new();
        store.insert_table("T", user_date_table());
        let dataset = DatasetConfig::default();
        let engine = ReplaceEngine::new(&store, &dataset);

        engine.replace_user_data("T", "u1", &[]).await.unwrap();

        assert_eq!(store.write_extents(), vec![Extent { rows: 3, cols: 2 }]);
    }

    #[tokio::test]
    async fn test_restore_covers_appended_rows() {
        let store = MemoryStore::new();
        let weekend = vec![
            TableKind::WeekendSubHolidays.header(),
            row(&["u2", "2024-06-01", "Sat"]),
        ];
        store.insert_table("WeekendSubHolidays", weekend.clone());
        store.fail_reads("UsedHolidays");
        let dataset = DatasetConfig::default();
        let engine = ReplaceEngine::new(&store, &dataset)
            .with_policy(ReplacePolicy { compensate: true });

        let report = engine.replace_user_dataset("u1", &sample_dataset()).await;

        assert!(report.restored.contains(&"WeekendSubHolidays".to_string()));
        assert_eq!(store.table("WeekendSubHolidays"), weekend);
        // header + u2 + the appended u1 row
        assert!(store.write_extents().contains(&Extent { rows: 3, cols: 3 }));
    }
}
