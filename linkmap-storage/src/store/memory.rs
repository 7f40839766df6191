// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! In-memory statistics store
//!
//! Ordered tables of `row -> column -> u64` with the store semantics the
//! pipeline relies on: atomic add, set-if-greater and ordered range scans
//! with an optional trailing fuzzy byte filter.

use super::cache::{Closeable, TableConnector, TableKey, TableMutator};
use super::{RowWrite, StatisticsStore, StoreError, TableName};
use crate::keys::{FuzzyRange, RowKeyDistributor};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

pub type Columns = BTreeMap<Bytes, u64>;
type Rows = BTreeMap<Bytes, Columns>;

#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<BTreeMap<TableName, Rows>>>,
    writes: Arc<AtomicU64>,
    closed_mutators: Arc<AtomicUsize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, table: &TableName, rows: &[RowWrite]) {
        let mut tables = self.tables.write();
        let stored = tables.entry(table.clone()).or_default();
        for row in rows {
            let columns = stored.entry(row.row_key.clone()).or_default();
            for (column, delta) in &row.increments {
                let value = columns.entry(column.clone()).or_insert(0);
                *value = value.saturating_add(*delta);
            }
            for (column, max) in &row.maxima {
                let value = columns.entry(column.clone()).or_insert(0);
                *value = (*value).max(*max);
            }
        }
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, table: &TableName, row_key: &[u8], column: &[u8]) -> Option<u64> {
        self.tables
            .read()
            .get(table)
            .and_then(|rows| rows.get(row_key))
            .and_then(|columns| columns.get(column))
            .copied()
    }

    pub fn row(&self, table: &TableName, row_key: &[u8]) -> Option<Columns> {
        self.tables
            .read()
            .get(table)
            .and_then(|rows| rows.get(row_key))
            .cloned()
    }

    /// Rows in `[start, stop)`, optionally filtered on their trailing byte.
    pub fn scan(
        &self,
        table: &TableName,
        start: &[u8],
        stop: &[u8],
        filter: Option<FuzzyRange>,
    ) -> Vec<(Bytes, Columns)> {
        if start >= stop {
            return Vec::new();
        }
        let tables = self.tables.read();
        let Some(rows) = tables.get(table) else {
            return Vec::new();
        };
        rows.range::<[u8], _>((Bound::Included(start), Bound::Excluded(stop)))
            .filter(|(key, _)| filter.map_or(true, |range| range.matches(key)))
            .map(|(key, columns)| (key.clone(), columns.clone()))
            .collect()
    }

    /// Scan an unsalted range across every salt bucket of `distributor`.
    pub fn scan_distributed(
        &self,
        table: &TableName,
        distributor: &dyn RowKeyDistributor,
        start: &[u8],
        stop: &[u8],
        filter: Option<FuzzyRange>,
    ) -> Vec<(Bytes, Columns)> {
        distributor
            .scan_ranges(start, stop)
            .into_iter()
            .flat_map(|(start, stop)| self.scan(table, &start, &stop, filter))
            .collect()
    }

    pub fn tables(&self) -> Vec<TableName> {
        self.tables.read().keys().cloned().collect()
    }

    pub fn row_count(&self, table: &TableName) -> usize {
        self.tables.read().get(table).map_or(0, BTreeMap::len)
    }

    pub fn column_count(&self, table: &TableName) -> usize {
        self.tables
            .read()
            .get(table)
            .map_or(0, |rows| rows.values().map(BTreeMap::len).sum())
    }

    /// Sum of every stored value of `table`.
    pub fn total(&self, table: &TableName) -> u64 {
        self.tables.read().get(table).map_or(0, |rows| {
            rows.values().flat_map(|columns| columns.values()).sum()
        })
    }

    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn closed_mutators(&self) -> usize {
        self.closed_mutators.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl StatisticsStore for InMemoryStore {
    async fn write(&self, table: &TableName, rows: &[RowWrite]) -> Result<(), StoreError> {
        self.apply(table, rows);
        Ok(())
    }
}

/// Per-table handle handed out through [`TableConnector`].
pub struct InMemoryMutator {
    store: InMemoryStore,
    table: TableName,
    closed: AtomicBool,
}

impl InMemoryMutator {
    pub fn table(&self) -> &TableName {
        &self.table
    }
}

impl Closeable for InMemoryMutator {
    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.store.closed_mutators.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[async_trait]
impl TableMutator for InMemoryMutator {
    async fn mutate(&self, rows: &[RowWrite]) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable(format!("mutator for {} is closed", self.table)));
        }
        self.store.apply(&self.table, rows);
        Ok(())
    }
}

impl TableConnector for InMemoryStore {
    type Mutator = InMemoryMutator;

    fn connect(&self, key: &TableKey) -> Result<Self::Mutator, StoreError> {
        Ok(InMemoryMutator {
            store: self.clone(),
            table: key.table.clone(),
            closed: AtomicBool::new(false),
        })
    }
}
