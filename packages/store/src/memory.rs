use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::StoreError;
use crate::models::Row;
use crate::replace::{Extent, TableStore};

/// In-memory TableStore for tests and local runs.
///
/// Counts the mutating calls that reach storage and can be told to fail reads
/// or writes for a given table.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<HashMap<String, Vec<Row>>>>,
    failing_reads: Arc<Mutex<HashSet<String>>>,
    failing_writes: Arc<Mutex<HashSet<String>>>,
    writes: Arc<AtomicUsize>,
    write_extents: Arc<Mutex<Vec<Extent>>>,
    appends: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents of `table` without counting a write.
    pub fn insert_table(&self, table: &str, rows: Vec<Row>) {
        self.tables.lock().unwrap().insert(table.to_string(), rows);
    }

    /// Current contents of `table`; empty if it was never written.
    pub fn table(&self, table: &str) -> Vec<Row> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Make every later `read_all` of `table` fail.
    pub fn fail_reads(&self, table: &str) {
        self.failing_reads.lock().unwrap().insert(table.to_string());
    }

    /// Make every later `write_all` and `append_rows` of `table` fail.
    pub fn fail_writes(&self, table: &str) {
        self.failing_writes.lock().unwrap().insert(table.to_string());
    }

    /// Number of `write_all` calls that reached storage.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// The `previous` extent passed to each `write_all`, in call order.
    pub fn write_extents(&self) -> Vec<Extent> {
        self.write_extents.lock().unwrap().clone()
    }

    /// Number of non-empty `append_rows` calls that reached storage.
    pub fn appends(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }

    fn check_write(&self, table: &str) -> Result<(), StoreError> {
        if self.failing_writes.lock().unwrap().contains(table) {
            return Err(StoreError::write(table, "injected write failure"));
        }
        Ok(())
    }
}

impl TableStore for MemoryStore {
    async fn read_all(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        if self.failing_reads.lock().unwrap().contains(table) {
            return Err(StoreError::read(table, "injected read failure"));
        }
        Ok(self.table(table))
    }

    async fn write_all(
        &self,
        table: &str,
        rows: &[Row],
        previous: Extent,
    ) -> Result<(), StoreError> {
        self.check_write(table)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.write_extents.lock().unwrap().push(previous);
        self.insert_table(table, rows.to_vec());
        Ok(())
    }

    async fn append_rows(&self, table: &str, rows: &[Row]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        self.check_write(table)?;
        self.appends.fetch_add(1, Ordering::SeqCst);
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .extend_from_slice(rows);
        Ok(())
    }
}
